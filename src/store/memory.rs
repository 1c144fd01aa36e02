//! Thread-safe in-memory [`KvStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{KvStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: OffsetDateTime,
}

/// In-process store honoring per-key TTLs; expired entries are dropped lazily on read.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of live (unexpired) keys.
	pub fn len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.0.read().values().filter(|entry| entry.expires_at > now).count()
	}

	/// Returns `true` when no live keys remain.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Remaining lifetime of `key`, if it is live.
	pub fn ttl(&self, key: &str) -> Option<Duration> {
		let now = OffsetDateTime::now_utc();

		self.0.read().get(key).map(|entry| entry.expires_at - now).filter(|left| left.is_positive())
	}

	fn get_now(map: &StoreMap, key: &str) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
				None => return None,
				Some(_) => {},
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| entry.expires_at <= now) {
			guard.remove(key);
		}

		None
	}

	fn set_now(map: &StoreMap, key: &str, value: String, ttl_secs: u64) {
		let ttl = Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
		let expires_at = OffsetDateTime::now_utc().saturating_add(ttl);

		map.write().insert(key.to_owned(), Entry { value, expires_at });
	}
}
impl KvStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key)) })
	}

	fn set_ex<'a>(&'a self, key: &'a str, value: String, ttl_secs: u64) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			Self::set_now(&self.0, key, value, ttl_secs);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().remove(key);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_get_delete_round() {
		let store = MemoryStore::default();

		assert_eq!(store.get("k").await.expect("Get should succeed."), None);

		store.set_ex("k", "v".into(), 60).await.expect("Set should succeed.");

		assert_eq!(store.get("k").await.expect("Get should succeed."), Some("v".into()));
		assert!(store.ttl("k").is_some_and(|left| left <= Duration::seconds(60)));

		store.delete("k").await.expect("Delete should succeed.");

		assert!(store.is_empty());
		store.delete("k").await.expect("Deleting a missing key should succeed.");
	}

	#[test]
	fn expired_entries_are_invisible_and_evicted() {
		let store = MemoryStore::default();

		store.0.write().insert(
			"stale".into(),
			Entry {
				value: "old".into(),
				expires_at: OffsetDateTime::now_utc() - Duration::seconds(1),
			},
		);

		assert_eq!(store.len(), 0);
		assert_eq!(MemoryStore::get_now(&store.0, "stale"), None);
		assert!(store.0.read().get("stale").is_none());
	}
}
