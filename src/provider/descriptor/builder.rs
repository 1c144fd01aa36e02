// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, DEFAULT_SCOPES, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required for sign-in.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for all flows.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Resource API base is mandatory for authorized calls.
	#[error("Missing resource API base URL.")]
	MissingApiBase,
	/// A hard-coded endpoint failed to parse.
	#[error("The {endpoint} URL is invalid: {reason}.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser failure summary.
		reason: String,
	},
	/// Endpoints must use HTTPS unless they point at the loopback interface.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Resource API base cannot carry path segments.
	#[error("The resource API base cannot be extended with path segments: {url}.")]
	InvalidApiBase {
		/// Offending URL.
		url: String,
	},
	/// Scopes must be non-empty and free of whitespace.
	#[error("Scope `{scope}` is empty or contains whitespace.")]
	InvalidScope {
		/// Offending scope.
		scope: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Authorization endpoint used at sign-in.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Resource API base URL.
	pub api_base: Option<Url>,
	/// Preferred client authentication method for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Scopes requested during sign-in.
	pub scopes: Vec<String>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with [`DEFAULT_SCOPES`].
	pub fn new() -> Self {
		Self {
			authorization_endpoint: None,
			token_endpoint: None,
			api_base: None,
			preferred_client_auth_method: ClientAuthMethod::default(),
			scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the resource API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Replaces the requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let api_base = self.api_base.ok_or(ProviderDescriptorError::MissingApiBase)?;
		let descriptor = ProviderDescriptor {
			endpoints: ProviderEndpoints { authorization, token, api_base },
			preferred_client_auth_method: self.preferred_client_auth_method,
			scopes: self.scopes,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}
impl Default for ProviderDescriptorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("api_base", &self.endpoints.api_base)?;

		if self.endpoints.api_base.cannot_be_a_base() {
			return Err(ProviderDescriptorError::InvalidApiBase {
				url: self.endpoints.api_base.to_string(),
			});
		}

		for scope in &self.scopes {
			if scope.is_empty() || scope.chars().any(char::is_whitespace) {
				return Err(ProviderDescriptorError::InvalidScope { scope: scope.clone() });
			}
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match (url.scheme(), url.host_str()) {
		("https", _) => Ok(()),
		("http", Some("localhost" | "127.0.0.1" | "[::1]")) => Ok(()),
		_ =>
			Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	fn secure() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder()
			.authorization_endpoint(url("https://accounts.example.com/authorize"))
			.token_endpoint(url("https://accounts.example.com/api/token"))
			.api_base(url("https://api.example.com/v1/"))
	}

	#[test]
	fn rejects_plain_http_off_loopback() {
		let err = secure()
			.token_endpoint(url("http://accounts.example.com/api/token"))
			.build()
			.expect_err("Plain HTTP token endpoint should be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));

		secure()
			.token_endpoint(url("http://127.0.0.1:8080/api/token"))
			.build()
			.expect("Loopback HTTP should be accepted.");
	}

	#[test]
	fn requires_every_endpoint() {
		let err = ProviderDescriptor::builder()
			.authorization_endpoint(url("https://accounts.example.com/authorize"))
			.token_endpoint(url("https://accounts.example.com/api/token"))
			.build()
			.expect_err("Missing API base should be rejected.");

		assert_eq!(err, ProviderDescriptorError::MissingApiBase);
	}

	#[test]
	fn rejects_malformed_scopes_and_bases() {
		let err = secure().scopes(["user-read-email", "top read"]).build().expect_err("Bad scope.");

		assert!(matches!(err, ProviderDescriptorError::InvalidScope { .. }));

		let err =
			secure().api_base(url("mailto:api@example.com")).build().expect_err("Bad API base.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { .. }));
	}
}
