//! Per-user credential persistence on top of a [`KvStore`].
//!
//! Each user owns one key (`<prefix><user_id>`) holding a flat JSON [`CredentialRecord`]. The
//! key's TTL tracks the token lifetime plus [`STORE_GRACE`](crate::auth::STORE_GRACE), so a
//! record outlives its access token long enough to be refreshed and then cleans itself up.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, TokenGrant, UserId, UserProfile},
	store::{KvStore, StoreError},
};

/// Default key namespace for credential records.
pub const DEFAULT_TOKEN_PREFIX: &str = "spotify:tokens:";

/// Reads and writes credential records.
#[derive(Clone)]
pub struct CredentialStore {
	store: Arc<dyn KvStore>,
	prefix: String,
}
impl CredentialStore {
	/// Creates a store using [`DEFAULT_TOKEN_PREFIX`].
	pub fn new(store: Arc<dyn KvStore>) -> Self {
		Self::with_prefix(store, DEFAULT_TOKEN_PREFIX)
	}

	/// Creates a store using a custom key namespace.
	pub fn with_prefix(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
		Self { store, prefix: prefix.into() }
	}

	/// Key namespace shared by credential records and the user's cached responses.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Store key for `user_id`.
	pub fn key(&self, user_id: &UserId) -> String {
		format!("{}{user_id}", self.prefix)
	}

	/// Merges `profile` with a fresh `grant`, stamps the expiry from the current clock, and
	/// persists the result. Overwrites any previous record.
	pub async fn save(&self, profile: UserProfile, grant: TokenGrant) -> Result<CredentialRecord> {
		let record = CredentialRecord::issue(profile, grant, OffsetDateTime::now_utc());

		self.put(&record).await?;

		Ok(record)
	}

	/// Persists an already-built record, resetting its TTL.
	pub async fn put(&self, record: &CredentialRecord) -> Result<()> {
		let payload = serde_json::to_string(record)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
		let key = self.key(record.user_id());

		self.store.set_ex(&key, payload, record.store_ttl_secs()).await?;

		Ok(())
	}

	/// Loads the full record. `None` when the user has no record; a malformed value is
	/// [`Error::InvalidRecord`].
	pub async fn load(&self, user_id: &UserId) -> Result<Option<CredentialRecord>> {
		self.load_as(user_id).await
	}

	/// Loads only the profile subset of the record, never exposing tokens.
	pub async fn load_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
		self.load_as(user_id).await
	}

	/// Removes the user's record (sign-out).
	pub async fn delete(&self, user_id: &UserId) -> Result<()> {
		self.store.delete(&self.key(user_id)).await?;

		Ok(())
	}

	async fn load_as<T>(&self, user_id: &UserId) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let Some(raw) = self.store.get(&self.key(user_id)).await? else {
			return Ok(None);
		};
		let mut deserializer = serde_json::Deserializer::from_str(&raw);
		let value = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| Error::InvalidRecord { message: e.to_string() })?;

		Ok(Some(value))
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore").field("prefix", &self.prefix).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::TokenSecret, store::MemoryStore};

	fn fixture() -> (CredentialStore, Arc<MemoryStore>, UserId) {
		let backend = Arc::new(MemoryStore::default());
		let user = UserId::new("u1").expect("User fixture should be valid.");

		(CredentialStore::new(backend.clone()), backend, user)
	}

	#[tokio::test]
	async fn save_sets_ttl_to_lifetime_plus_grace() {
		let (store, backend, user) = fixture();
		let grant = TokenGrant::new("access", Duration::seconds(3600))
			.expect("Grant fixture should be valid.")
			.with_refresh_token("refresh");
		let saved = store
			.save(UserProfile::new(user.clone()).with_email("u1@example.com"), grant)
			.await
			.expect("Save should succeed.");
		let ttl = backend.ttl("spotify:tokens:u1").expect("Record key should be live.");

		assert!(ttl > Duration::seconds(3600) && ttl <= Duration::seconds(3660));

		let loaded =
			store.load(&user).await.expect("Load should succeed.").expect("Record should exist.");

		assert_eq!(loaded.access_token, saved.access_token);
		assert_eq!(loaded.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh"));
		assert_eq!(loaded.profile.email.as_deref(), Some("u1@example.com"));
	}

	#[tokio::test]
	async fn missing_and_malformed_records_are_distinct() {
		let (store, backend, user) = fixture();

		assert!(store.load(&user).await.expect("Missing record is not an error.").is_none());

		backend
			.set_ex("spotify:tokens:u1", "{\"userId\":\"u1\"}".into(), 60)
			.await
			.expect("Seeding should succeed.");

		let err = store.load(&user).await.expect_err("Record without tokens should be invalid.");

		assert!(matches!(err, Error::InvalidRecord { .. }));

		let profile = store
			.load_profile(&user)
			.await
			.expect("Profile subset should validate.")
			.expect("Profile should exist.");

		assert_eq!(profile.user_id, user);
	}

	#[tokio::test]
	async fn last_write_wins_and_delete_removes() {
		let (store, _, user) = fixture();

		for token in ["first", "second"] {
			store
				.save(
					UserProfile::new(user.clone()),
					TokenGrant::new(token, Duration::seconds(60)).expect("Grant should be valid."),
				)
				.await
				.expect("Save should succeed.");
		}

		let loaded =
			store.load(&user).await.expect("Load should succeed.").expect("Record should exist.");

		assert_eq!(loaded.access_token.expose(), "second");

		store.delete(&user).await.expect("Delete should succeed.");

		assert!(store.load_profile(&user).await.expect("Load should succeed.").is_none());
	}
}
