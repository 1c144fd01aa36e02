// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, provider::ProviderDescriptor};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Authorization Code + PKCE handshake state returned by
/// [`Broker::start_authorization`](crate::flows::Broker::start_authorization).
///
/// Keep it server-side (keyed by the `state` value) until the redirect comes back.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Authorize URL that callers should send end-users to.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	pub(super) fn new(redirect_uri: Url, authorize_url: Url, state: String, pkce: PkcePair) -> Self {
		Self { state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::UpstreamAuth { reason: "authorization state mismatch".into() })
		}
	}

	pub(super) fn into_exchange_parts(self) -> (Url, PkcePair) {
		let AuthorizationSession { redirect_uri, pkce, .. } = self;

		(redirect_uri, pkce)
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
pub(super) struct PkcePair {
	pub(super) verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	pub(super) fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

pub(super) fn build_session(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: Url,
) -> AuthorizationSession {
	let state = random_string(STATE_LEN);
	let pkce = PkcePair::generate();
	let authorize_url = build_authorize_url(descriptor, client_id, &redirect_uri, &state, &pkce);

	AuthorizationSession::new(redirect_uri, authorize_url, state, pkce)
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if !descriptor.scopes.is_empty() {
		pairs.append_pair("scope", &descriptor.scopes.join(" "));
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(verifier.as_bytes());
	let digest = hasher.finalize();
	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session() -> AuthorizationSession {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");
		let redirect =
			Url::parse("http://127.0.0.1:3000/callback").expect("Redirect fixture should parse.");

		build_session(&descriptor, "client-abc", redirect)
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = session();
		let state = session.state.clone();

		assert!(session.validate_state(&state).is_ok());

		let err = session.validate_state("other").expect_err("State mismatch should fail.");

		assert!(matches!(err, Error::UpstreamAuth { .. }));
	}

	#[test]
	fn authorize_url_carries_pkce_and_scopes() {
		let session = session();
		let pairs = session.authorize_url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(session.state.len(), STATE_LEN);
		assert_eq!(pairs["response_type"], "code");
		assert_eq!(pairs["client_id"], "client-abc");
		assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:3000/callback");
		assert_eq!(pairs["state"], session.state);
		assert_eq!(pairs["code_challenge_method"], "S256");
		assert_eq!(pairs["code_challenge"], compute_pkce_challenge(&session.pkce.verifier));
		assert!(pairs["scope"].split(' ').any(|scope| scope == "user-top-read"));
	}
}
