//! Provider descriptor data structures shared by all flows.
//!
//! A descriptor names the authorization server endpoints, the resource API base, the client
//! authentication method for token calls, and the scopes requested at sign-in.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant identifiers used by token exchanges.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::_prelude::*;

/// Scopes requested at sign-in unless the descriptor overrides them.
pub const DEFAULT_SCOPES: [&str; 6] = [
	"user-read-private",
	"user-read-email",
	"user-top-read",
	"playlist-read-private",
	"playlist-modify-public",
	"playlist-modify-private",
];

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint used by the Authorization Code flow.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Base URL of the bearer-authenticated resource API.
	pub api_base: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Scopes requested during sign-in.
	pub scopes: Vec<String>,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new()
	}

	/// Production Spotify endpoints with the default scope set.
	pub fn spotify() -> Result<Self, ProviderDescriptorError> {
		let parse = |endpoint: &'static str, raw: &str| {
			Url::parse(raw).map_err(|e| ProviderDescriptorError::InvalidUrl {
				endpoint,
				reason: e.to_string(),
			})
		};

		Self::builder()
			.authorization_endpoint(parse(
				"authorization",
				"https://accounts.spotify.com/authorize",
			)?)
			.token_endpoint(parse("token", "https://accounts.spotify.com/api/token")?)
			.api_base(parse("api_base", "https://api.spotify.com/v1/")?)
			.build()
	}

	/// Joins `segments` onto the resource API base, percent-encoding each one.
	pub fn api_url<I, S>(&self, segments: I) -> Result<Url, ProviderDescriptorError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut url = self.endpoints.api_base.clone();

		url.path_segments_mut()
			.map_err(|_| ProviderDescriptorError::InvalidApiBase {
				url: self.endpoints.api_base.to_string(),
			})?
			.pop_if_empty()
			.extend(segments);

		Ok(url)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spotify_descriptor_uses_production_endpoints() {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");

		assert_eq!(descriptor.endpoints.token.as_str(), "https://accounts.spotify.com/api/token");
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(descriptor.scopes.len(), DEFAULT_SCOPES.len());
	}

	#[test]
	fn api_url_appends_encoded_segments() {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");
		let url = descriptor
			.api_url(["artists", "4Z8W 4fKe", "albums"])
			.expect("Segments should join onto the base.");

		assert_eq!(url.as_str(), "https://api.spotify.com/v1/artists/4Z8W%204fKe/albums");
	}
}
