//! Cache-aside wrapper for expensive upstream reads.
//!
//! [`ResponseCache::get_or_compute`] returns the decoded entry when one exists and only runs the
//! producer on a miss. Entries that no longer decode (schema drift, truncated writes) are deleted
//! and treated as misses, so a corrupt entry costs one extra upstream call instead of an error.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	error::ConfigError,
	obs::{self, CacheEvent},
	store::{KvStore, StoreError},
};

/// Cache key scoped to one user and tagged with every parameter that shaped the response.
///
/// Renders as `<prefix><user>:<segment>...`, e.g.
/// `spotify:tokens:u1:artist:42:albums:limit20:offset0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);
impl CacheKey {
	/// Starts a key under the user's namespace.
	pub fn user(prefix: &str, user_id: &UserId) -> Self {
		Self(format!("{prefix}{user_id}"))
	}

	/// Appends a literal segment.
	pub fn segment(mut self, segment: impl Display) -> Self {
		self.0.push(':');
		self.0.push_str(&segment.to_string());

		self
	}

	/// Appends a named parameter rendered as `<name><value>`.
	pub fn param(mut self, name: &str, value: impl Display) -> Self {
		self.0.push(':');
		self.0.push_str(name);
		self.0.push_str(&value.to_string());

		self
	}

	/// Returns the rendered key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// JSON cache-aside layer over a shared [`KvStore`].
#[derive(Clone)]
pub struct ResponseCache {
	store: Arc<dyn KvStore>,
}
impl ResponseCache {
	/// Wraps the provided store.
	pub fn new(store: Arc<dyn KvStore>) -> Self {
		Self { store }
	}

	/// Returns the cached value for `key`, or runs `producer`, stores its result for `ttl_secs`,
	/// and returns it.
	///
	/// The producer runs at most once per call and never on a hit. Producer errors propagate
	/// unchanged and leave the store untouched.
	pub async fn get_or_compute<T, F, Fut>(
		&self,
		key: impl AsRef<str>,
		ttl_secs: u64,
		producer: F,
	) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let key = key.as_ref();

		if ttl_secs == 0 {
			return Err(ConfigError::InvalidTtl.into());
		}

		if let Some(raw) = self.store.get(key).await? {
			match serde_json::from_str::<T>(&raw) {
				Ok(value) => {
					record(CacheEvent::Hit, key);

					return Ok(value);
				},
				Err(_) => {
					self.store.delete(key).await?;
					record(CacheEvent::Repaired, key);
				},
			}
		}

		record(CacheEvent::Miss, key);

		let fresh = producer().await?;
		let encoded = serde_json::to_string(&fresh)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.store.set_ex(key, encoded, ttl_secs).await?;

		Ok(fresh)
	}

	/// Drops the entry for `key` so the next read recomputes it.
	pub async fn invalidate(&self, key: impl AsRef<str>) -> Result<()> {
		self.store.delete(key.as_ref()).await?;

		Ok(())
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ResponseCache(..)")
	}
}

fn record(event: CacheEvent, key: &str) {
	obs::record_cache_event(event);
	obs::trace_cache_event(event, key);
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Payload {
		v: u32,
	}

	fn cache() -> (ResponseCache, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());

		(ResponseCache::new(backend.clone()), backend)
	}

	#[test]
	fn keys_carry_every_query_parameter() {
		let user = UserId::new("u1").expect("User fixture should be valid.");
		let key = CacheKey::user("spotify:tokens:", &user)
			.segment("artist")
			.segment("42")
			.segment("albums")
			.param("limit", 20)
			.param("offset", 0);

		assert_eq!(key.as_str(), "spotify:tokens:u1:artist:42:albums:limit20:offset0");
	}

	#[tokio::test]
	async fn second_call_is_served_from_cache() {
		let (cache, _) = cache();
		let calls = AtomicUsize::new(0);
		let counter = &calls;
		let produce = move || async move {
			counter.fetch_add(1, Ordering::SeqCst);

			Ok(Payload { v: 1 })
		};
		let first = cache.get_or_compute("k", 60, produce).await.expect("Miss should compute.");
		let second = cache.get_or_compute("k", 60, produce).await.expect("Hit should decode.");

		assert_eq!(first, Payload { v: 1 });
		assert_eq!(second, Payload { v: 1 });
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn producer_failure_writes_nothing() {
		let (cache, backend) = cache();
		let err = cache
			.get_or_compute::<Payload, _, _>("k", 60, || async { Err(Error::Upstream { status: 502 }) })
			.await
			.expect_err("Producer failure should propagate.");

		assert!(matches!(err, Error::Upstream { status: 502 }));
		assert!(backend.is_empty());
	}

	#[tokio::test]
	async fn zero_ttl_is_rejected_before_producing() {
		let (cache, _) = cache();
		let err = cache
			.get_or_compute("k", 0, || async { Ok(Payload { v: 1 }) })
			.await
			.expect_err("Zero TTL should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidTtl)));
	}

	#[tokio::test]
	async fn invalidate_forces_recompute() {
		let (cache, _) = cache();

		cache
			.get_or_compute("k", 60, || async { Ok(Payload { v: 1 }) })
			.await
			.expect("Miss should compute.");
		cache.invalidate("k").await.expect("Invalidation should succeed.");

		let value = cache
			.get_or_compute("k", 60, || async { Ok(Payload { v: 2 }) })
			.await
			.expect("Recompute should succeed.");

		assert_eq!(value, Payload { v: 2 });
	}
}
