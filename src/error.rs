//! Broker-level error types shared by the credential store, cache, and flows.
//!
//! [`Error`] is a closed set of outcomes. Callers match on the variant to decide whether the
//! user has to sign in again ([`Error::Unauthenticated`], [`Error::MissingRefreshCredential`],
//! [`Error::UpstreamAuth`]) or whether the music service itself misbehaved
//! ([`Error::Upstream`]). Cache corruption never appears here; the cache repairs it in place.

// self
use crate::{_prelude::*, provider::ProviderDescriptorError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No credential record exists for the user.
	#[error("User is not authenticated.")]
	Unauthenticated,
	/// The stored credential record carries no refresh token; the user must sign in again.
	#[error("Stored credentials are missing a refresh token.")]
	MissingRefreshCredential,
	/// The authorization server rejected the grant or the client.
	#[error("Authorization server rejected the request: {reason}.")]
	UpstreamAuth {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The resource API answered with a non-success status.
	#[error("Error fetching data upstream (status {status}).")]
	Upstream {
		/// HTTP status returned by the resource API.
		status: u16,
	},
	/// A stored credential record does not match the expected schema.
	#[error("Stored credential record is invalid: {message}.")]
	InvalidRecord {
		/// Path-aware description of the validation failure.
		message: String,
	},
}
impl Error {
	/// Returns `true` when the caller must send the user through sign-in again.
	pub fn requires_login(&self) -> bool {
		matches!(
			self,
			Self::Unauthenticated | Self::MissingRefreshCredential | Self::UpstreamAuth { .. }
		)
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// A required environment variable is absent.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds an unusable value.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Parser failure summary.
		reason: String,
	},
	/// Cache entries need a positive lifetime.
	#[error("Cache TTL must be at least one second.")]
	InvalidTtl,
	/// Playlist creation needs a non-empty name.
	#[error("Playlist name cannot be empty.")]
	InvalidPlaylistName,
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded.")]
	InvalidRequestBody {
		/// Underlying encoder failure.
		#[source]
		source: serde_json::Error,
	},

	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Resource API responded with a payload that does not match the expected shape.
	#[error("Resource API returned an unexpected payload.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint}.")]
	Network {
		/// Which upstream was being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling upstream.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_classification_covers_auth_failures_only() {
		assert!(Error::Unauthenticated.requires_login());
		assert!(Error::MissingRefreshCredential.requires_login());
		assert!(Error::UpstreamAuth { reason: "revoked".into() }.requires_login());
		assert!(!Error::Upstream { status: 500 }.requires_login());
		assert!(!Error::InvalidRecord { message: "access_token: missing field".into() }
			.requires_login());
	}

	#[test]
	fn upstream_error_mentions_status() {
		let err = Error::Upstream { status: 503 };

		assert_eq!(err.to_string(), "Error fetching data upstream (status 503).");
	}
}
