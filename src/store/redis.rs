//! Redis-backed [`KvStore`] with an explicit connect/disconnect lifecycle.
//!
//! Construct the store at startup with [`RedisStore::open`], call [`RedisStore::connect`] once
//! the runtime is up, and [`RedisStore::disconnect`] during shutdown. A failed connect is logged
//! and returned to the caller without tearing anything down; until a connect succeeds, every
//! operation fails with [`StoreError::Disconnected`].

// crates.io
use ::redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	store::{KvStore, StoreError, StoreFuture},
};

/// Shared Redis connection handle.
pub struct RedisStore {
	client: Client,
	connection: RwLock<Option<ConnectionManager>>,
}
impl RedisStore {
	/// Parses the connection URL without dialing the server.
	pub fn open(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(backend_error)?;

		Ok(Self { client, connection: RwLock::new(None) })
	}

	/// Establishes the managed connection; reconnects are handled by the manager afterwards.
	pub async fn connect(&self) -> Result<(), StoreError> {
		match self.client.get_connection_manager().await {
			Ok(manager) => {
				*self.connection.write() = Some(manager);

				#[cfg(feature = "tracing")]
				tracing::info!("Redis connected.");

				Ok(())
			},
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::error!(error = %e, "Failed to connect Redis.");

				Err(backend_error(e))
			},
		}
	}

	/// Drops the managed connection. Later operations fail until [`connect`](Self::connect).
	pub fn disconnect(&self) {
		if self.connection.write().take().is_some() {
			#[cfg(feature = "tracing")]
			tracing::info!("Redis disconnected.");
		}
	}

	/// Returns `true` while a managed connection is held.
	pub fn is_connected(&self) -> bool {
		self.connection.read().is_some()
	}

	fn connection(&self) -> Result<ConnectionManager, StoreError> {
		self.connection.read().clone().ok_or(StoreError::Disconnected)
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore").field("connected", &self.is_connected()).finish()
	}
}
impl KvStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut conn = self.connection()?;

			conn.get::<_, Option<String>>(key).await.map_err(backend_error)
		})
	}

	fn set_ex<'a>(&'a self, key: &'a str, value: String, ttl_secs: u64) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection()?;

			conn.set_ex::<_, _, ()>(key, value, ttl_secs).await.map_err(backend_error)
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut conn = self.connection()?;

			conn.del::<_, ()>(key).await.map_err(backend_error)
		})
	}
}

fn backend_error(e: RedisError) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn open_rejects_malformed_urls() {
		assert!(matches!(RedisStore::open("not a url"), Err(StoreError::Backend { .. })));
	}

	#[tokio::test]
	async fn operations_fail_until_connected() {
		let store = RedisStore::open("redis://127.0.0.1:6379")
			.expect("Well-formed Redis URL should open without dialing.");

		assert!(!store.is_connected());
		assert_eq!(store.get("k").await, Err(StoreError::Disconnected));
		assert_eq!(store.set_ex("k", "v".into(), 60).await, Err(StoreError::Disconnected));
		assert_eq!(store.delete("k").await, Err(StoreError::Disconnected));

		store.disconnect();

		assert!(!store.is_connected());
	}
}
