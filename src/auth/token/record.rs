//! Per-user credential record, profile projection, and token grants.

// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
	error::ConfigError,
};

/// Extra store lifetime granted on top of the token lifetime so an expired record can still be
/// refreshed before the key-value store drops it.
pub const STORE_GRACE: Duration = Duration::seconds(60);

/// Profile fields denormalized into every credential record.
///
/// Deserializing a stored record into this type drops every token field, which is what the
/// "who am I" read path relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Music-service user identifier.
	#[serde(rename = "userId")]
	pub user_id: UserId,
	/// Display name, when the user set one.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Account e-mail, when the granted scopes expose it.
	#[serde(default)]
	pub email: Option<String>,
	/// First avatar image URL.
	#[serde(default)]
	pub avatar_url: Option<String>,
}
impl UserProfile {
	/// Creates a profile with only the identifier populated.
	pub fn new(user_id: UserId) -> Self {
		Self { user_id, display_name: None, email: None, avatar_url: None }
	}

	/// Sets the display name.
	pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
		self.display_name = Some(name.into());

		self
	}

	/// Sets the e-mail address.
	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());

		self
	}

	/// Sets the avatar image URL.
	pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
		self.avatar_url = Some(url.into());

		self
	}
}

/// Tokens minted by one token-endpoint exchange.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Fresh access token.
	pub access_token: TokenSecret,
	/// Refresh token, when the authorization server issued (or rotated) one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token.
	pub expires_in: Duration,
}
impl TokenGrant {
	/// Creates a grant, rejecting non-positive lifetimes.
	pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Result<Self, ConfigError> {
		if !expires_in.is_positive() {
			return Err(ConfigError::NonPositiveExpiresIn);
		}

		Ok(Self { access_token: TokenSecret::new(access_token), refresh_token: None, expires_in })
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}
}

/// Stored credentials for one user: profile, tokens, and expiry.
///
/// Serialized as one flat JSON object so the record and its [`UserProfile`] projection share a
/// single key.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Denormalized profile fields.
	#[serde(flatten)]
	pub profile: UserProfile,
	/// Current bearer token.
	pub access_token: TokenSecret,
	/// Long-lived refresh token; absent when the user must sign in again.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime granted with the current access token.
	#[serde(with = "whole_seconds")]
	pub expires_in: Duration,
	/// Absolute expiry of the access token, stored as epoch milliseconds.
	#[serde(with = "epoch_millis")]
	pub expires_at: OffsetDateTime,
}
impl CredentialRecord {
	/// Merges a profile with a fresh grant issued at `issued_at`.
	pub fn issue(profile: UserProfile, grant: TokenGrant, issued_at: OffsetDateTime) -> Self {
		Self {
			profile,
			access_token: grant.access_token,
			refresh_token: grant.refresh_token,
			expires_in: grant.expires_in,
			expires_at: issued_at + grant.expires_in,
		}
	}

	/// Applies a refresh grant, keeping the previous refresh token when upstream omitted one.
	pub fn refreshed(self, grant: TokenGrant, issued_at: OffsetDateTime) -> Self {
		let refresh_token = grant.refresh_token.or(self.refresh_token);

		Self {
			profile: self.profile,
			access_token: grant.access_token,
			refresh_token,
			expires_in: grant.expires_in,
			expires_at: issued_at + grant.expires_in,
		}
	}

	/// Identifier of the owning user.
	pub fn user_id(&self) -> &UserId {
		&self.profile.user_id
	}

	/// Key-value store TTL: token lifetime plus [`STORE_GRACE`], in whole seconds.
	pub fn store_ttl_secs(&self) -> u64 {
		let ttl = (self.expires_in + STORE_GRACE).whole_seconds();

		u64::try_from(ttl).unwrap_or(0).max(1)
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("profile", &self.profile)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

mod epoch_millis {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as DeError};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let millis = instant.unix_timestamp_nanos() / 1_000_000;

		serializer.serialize_i64(i64::try_from(millis).unwrap_or(i64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
			.map_err(DeError::custom)
	}
}

mod whole_seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(duration.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn profile() -> UserProfile {
		UserProfile::new(UserId::new("u1").expect("User fixture should be valid."))
			.with_display_name("Ada")
	}

	#[test]
	fn issue_computes_absolute_expiry_and_store_ttl() {
		let grant = TokenGrant::new("access", Duration::seconds(3600))
			.expect("Grant fixture should be valid.")
			.with_refresh_token("refresh");
		let record =
			CredentialRecord::issue(profile(), grant, macros::datetime!(2025-01-01 00:00 UTC));

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(record.store_ttl_secs(), 3660);
	}

	#[test]
	fn refresh_without_new_refresh_token_keeps_previous() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let original = CredentialRecord::issue(
			profile(),
			TokenGrant::new("old", Duration::seconds(60))
				.expect("Grant fixture should be valid.")
				.with_refresh_token("r1"),
			issued,
		);
		let refreshed = original.clone().refreshed(
			TokenGrant::new("new", Duration::seconds(120)).expect("Grant fixture should be valid."),
			issued + Duration::minutes(5),
		);

		assert_eq!(refreshed.access_token.expose(), "new");
		assert_eq!(refreshed.refresh_token.as_ref().map(TokenSecret::expose), Some("r1"));
		assert_eq!(refreshed.expires_at, macros::datetime!(2025-01-01 00:07 UTC));
		assert_eq!(refreshed.profile, original.profile);

		let rotated = refreshed.refreshed(
			TokenGrant::new("newer", Duration::seconds(60))
				.expect("Grant fixture should be valid.")
				.with_refresh_token("r2"),
			issued,
		);

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
	}

	#[test]
	fn record_serializes_flat_with_epoch_millis() {
		let record = CredentialRecord::issue(
			profile(),
			TokenGrant::new("access", Duration::seconds(10)).expect("Grant fixture should be valid."),
			macros::datetime!(1970-01-01 00:00 UTC),
		);
		let json = serde_json::to_value(&record).expect("Record should serialize.");

		assert_eq!(json["userId"], "u1");
		assert_eq!(json["display_name"], "Ada");
		assert_eq!(json["access_token"], "access");
		assert_eq!(json["expires_in"], 10);
		assert_eq!(json["expires_at"], 10_000);
		assert!(json.get("refresh_token").is_none());

		let profile: UserProfile =
			serde_json::from_value(json).expect("Profile projection should deserialize.");

		assert_eq!(profile.display_name.as_deref(), Some("Ada"));
	}

	#[test]
	fn grant_rejects_non_positive_lifetimes() {
		assert!(matches!(
			TokenGrant::new("access", Duration::ZERO),
			Err(ConfigError::NonPositiveExpiresIn)
		));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let record = CredentialRecord::issue(
			profile(),
			TokenGrant::new("visible?", Duration::seconds(10))
				.expect("Grant fixture should be valid.")
				.with_refresh_token("hidden"),
			OffsetDateTime::now_utc(),
		);
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("visible?"));
		assert!(!rendered.contains("hidden"));
	}
}
