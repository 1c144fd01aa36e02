//! Process configuration read from the environment.

// self
use crate::{_prelude::*, credentials::DEFAULT_TOKEN_PREFIX, error::ConfigError};

/// Default Redis endpoint used when `REDIS_URL` is unset.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
/// Default lifetime of cached upstream reads.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Startup configuration for a [`Broker`](crate::flows::Broker) and its store.
#[derive(Clone)]
pub struct BrokerConfig {
	/// OAuth client identifier (`SPOTIFY_CLIENT_ID`).
	pub client_id: String,
	/// OAuth client secret (`SPOTIFY_CLIENT_SECRET`).
	pub client_secret: String,
	/// Registered redirect URI (`SPOTIFY_REDIRECT_URI`).
	pub redirect_uri: Url,
	/// Key-value store endpoint (`REDIS_URL`).
	pub redis_url: String,
	/// Lifetime of cached reads in whole seconds (`CACHE_TTL_SECONDS`).
	pub cache_ttl_secs: u64,
	/// Namespace for credential records and cached reads (`TOKEN_PREFIX`).
	pub token_prefix: String,
}
impl BrokerConfig {
	/// Reads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads configuration through `lookup`, which maps a variable name to its value.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = |name: &'static str| {
			lookup(name).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::MissingEnv { name })
		};
		let client_id = required("SPOTIFY_CLIENT_ID")?;
		let client_secret = required("SPOTIFY_CLIENT_SECRET")?;
		let redirect_uri = required("SPOTIFY_REDIRECT_URI")?;
		let redirect_uri = Url::parse(&redirect_uri).map_err(|e| ConfigError::InvalidEnv {
			name: "SPOTIFY_REDIRECT_URI",
			reason: e.to_string(),
		})?;
		let cache_ttl_secs = match lookup("CACHE_TTL_SECONDS") {
			Some(raw) => match raw.trim().parse::<u64>() {
				Ok(0) => Err(ConfigError::InvalidEnv {
					name: "CACHE_TTL_SECONDS",
					reason: "must be at least one second".into(),
				}),
				Ok(secs) => Ok(secs),
				Err(e) =>
					Err(ConfigError::InvalidEnv { name: "CACHE_TTL_SECONDS", reason: e.to_string() }),
			}?,
			None => DEFAULT_CACHE_TTL_SECS,
		};

		Ok(Self {
			client_id,
			client_secret,
			redirect_uri,
			redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.into()),
			cache_ttl_secs,
			token_prefix: lookup("TOKEN_PREFIX").unwrap_or_else(|| DEFAULT_TOKEN_PREFIX.into()),
		})
	}
}
impl Debug for BrokerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("redis_url", &self.redis_url)
			.field("cache_ttl_secs", &self.cache_ttl_secs)
			.field("token_prefix", &self.token_prefix)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	const REQUIRED: [(&str, &str); 3] = [
		("SPOTIFY_CLIENT_ID", "client"),
		("SPOTIFY_CLIENT_SECRET", "secret"),
		("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:3000/callback"),
	];

	#[test]
	fn defaults_fill_optional_values() {
		let config =
			BrokerConfig::from_lookup(lookup_from(&REQUIRED)).expect("Config should load.");

		assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
		assert_eq!(config.cache_ttl_secs, 60);
		assert_eq!(config.token_prefix, "spotify:tokens:");
		assert!(!format!("{config:?}").contains("secret\""));
	}

	#[test]
	fn optional_values_override_defaults() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			("REDIS_URL", "redis://cache:6380"),
			("CACHE_TTL_SECONDS", " 300 "),
			("TOKEN_PREFIX", "music:tokens:"),
		]);

		let config = BrokerConfig::from_lookup(lookup_from(&pairs)).expect("Config should load.");

		assert_eq!(config.redis_url, "redis://cache:6380");
		assert_eq!(config.cache_ttl_secs, 300);
		assert_eq!(config.token_prefix, "music:tokens:");
	}

	#[test]
	fn missing_required_variable_is_named() {
		let err = BrokerConfig::from_lookup(lookup_from(&REQUIRED[..2]))
			.expect_err("Redirect URI should be required.");

		assert!(matches!(err, ConfigError::MissingEnv { name: "SPOTIFY_REDIRECT_URI" }));
	}

	#[test]
	fn invalid_ttl_is_rejected() {
		let mut pairs = REQUIRED.to_vec();

		pairs.push(("CACHE_TTL_SECONDS", "0"));

		let err = BrokerConfig::from_lookup(lookup_from(&pairs)).expect_err("Zero TTL is invalid.");

		assert!(matches!(err, ConfigError::InvalidEnv { name: "CACHE_TTL_SECONDS", .. }));

		pairs.pop();
		pairs.push(("CACHE_TTL_SECONDS", "soon"));

		assert!(BrokerConfig::from_lookup(lookup_from(&pairs)).is_err());
	}
}
