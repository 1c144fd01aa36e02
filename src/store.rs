//! Key-value store contract and built-in backends.
//!
//! The broker only needs three string operations from its store: read, write with a TTL, and
//! delete. Credentials and cached responses share one injected [`KvStore`] handle;
//! there is no process-wide connection.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use self::redis::RedisStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KvStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Minimal async string store with per-key expiry.
pub trait KvStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, if present and not expired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value, expiring after `ttl_secs`.
	fn set_ex<'a>(&'a self, key: &'a str, value: String, ttl_secs: u64) -> StoreFuture<'a, ()>;

	/// Removes `key`. Deleting a missing key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KvStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced while encoding a value for the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend has no live connection (never connected, or disconnected).
	#[error("Store is not connected.")]
	Disconnected,
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "redis unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("redis unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn disconnected_is_not_retried_as_login_failure() {
		let broker_error: Error = StoreError::Disconnected.into();

		assert!(!broker_error.requires_login());
	}
}
