//! Classification of token endpoint failures.
//!
//! A refresh that the authorization server rejects must end the session, while a flaky token
//! endpoint should surface as a retryable error. Strategies make that call from plain data so
//! flows stay independent of the HTTP client.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Decides whether a failed token request is a rejection or a temporary failure.
pub trait ProviderStrategy: Send + Sync {
	/// Classifies one failed token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Outcome categories for a failed token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The code or refresh token was rejected; the user has to sign in again.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Temporary failure.
	Transient,
}

/// What is known about a failed token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant that was being exchanged.
	pub grant_type: GrantType,
	/// HTTP status of the token endpoint response, when one arrived.
	pub http_status: Option<u16>,
	/// OAuth `error` code.
	pub oauth_error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
	/// Leading characters of a body that was not an OAuth error document.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Starts an empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Records the HTTP status.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Records the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Records the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Records the start of an unstructured body, cut at a fixed number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		let body = body.into();
		let preview = match body.char_indices().nth(Self::BODY_PREVIEW_LIMIT) {
			Some((cut, _)) => format!("{}…", &body[..cut]),
			None => body,
		};

		self.body_preview = Some(preview);

		self
	}
}

/// Classifies by OAuth `error` code first, then by codes mentioned in the description or body,
/// then by HTTP status.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(kind_for_code)
			.or_else(|| ctx.error_description.as_deref().and_then(kind_mentioned_in))
			.or_else(|| ctx.body_preview.as_deref().and_then(kind_mentioned_in))
			.unwrap_or_else(|| kind_for_status(ctx.http_status))
	}
}

const CODES: [(&str, ProviderErrorKind); 6] = [
	("invalid_grant", ProviderErrorKind::InvalidGrant),
	("access_denied", ProviderErrorKind::InvalidGrant),
	("invalid_client", ProviderErrorKind::InvalidClient),
	("unauthorized_client", ProviderErrorKind::InvalidClient),
	("temporarily_unavailable", ProviderErrorKind::Transient),
	("server_error", ProviderErrorKind::Transient),
];

fn kind_for_code(code: &str) -> Option<ProviderErrorKind> {
	CODES.iter().find(|(known, _)| code.trim().eq_ignore_ascii_case(known)).map(|(_, kind)| *kind)
}

fn kind_mentioned_in(text: &str) -> Option<ProviderErrorKind> {
	let lowered = text.to_ascii_lowercase();

	CODES.iter().find(|(known, _)| lowered.contains(known)).map(|(_, kind)| *kind)
}

fn kind_for_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401 | 403) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn oauth_error_codes_take_precedence_over_status() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("invalid_grant")
			.with_http_status(503);

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn unknown_codes_fall_back_to_description_then_status() {
		let described = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("weird")
			.with_error_description("client is invalid_client")
			.with_http_status(400);

		assert_eq!(classify(described), ProviderErrorKind::InvalidClient);

		let bare = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("weird")
			.with_http_status(400);

		assert_eq!(classify(bare), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn rejection_statuses_are_permanent() {
		let status = |code| {
			classify(ProviderErrorContext::new(GrantType::RefreshToken).with_http_status(code))
		};

		assert_eq!(status(400), ProviderErrorKind::InvalidGrant);
		assert_eq!(status(401), ProviderErrorKind::InvalidClient);
		assert_eq!(status(502), ProviderErrorKind::Transient);
		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::RefreshToken)),
			ProviderErrorKind::Transient
		);
	}

	#[test]
	fn body_previews_are_truncated_and_scanned() {
		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_body_preview(format!("<html>temporarily_unavailable{}</html>", "x".repeat(300)))
			.with_http_status(400);

		assert_eq!(
			ctx.body_preview.as_ref().map(|preview| preview.chars().count()),
			Some(ProviderErrorContext::BODY_PREVIEW_LIMIT + 1)
		);
		assert_eq!(classify(ctx), ProviderErrorKind::Transient);
	}
}
