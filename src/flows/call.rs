//! Auth-retry orchestration for bearer-authenticated resource calls.
//!
//! A call runs at most twice: once with the stored access token and, only when the resource API
//! answered 401, once more after a single credential refresh. Every other outcome of the first
//! attempt is final, and so is every outcome of the retry.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	flows::Broker,
	http::{UpstreamHttpClient, UpstreamStatus},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs `request` with the user's access token, refreshing and retrying once on a 401.
	///
	/// `request` receives the access token to present and returns anything exposing an HTTP
	/// status. Errors it returns (transport failures) propagate unchanged. A non-2xx status other
	/// than 401 becomes [`Error::Upstream`] without a refresh, as does any non-2xx retry.
	pub async fn call_with_auth<R, F, Fut>(&self, user_id: &UserId, mut request: F) -> Result<R>
	where
		R: UpstreamStatus,
		F: FnMut(TokenSecret) -> Fut,
		Fut: Future<Output = Result<R>>,
	{
		const KIND: FlowKind = FlowKind::AuthorizedCall;

		let span = FlowSpan::new(KIND, "call_with_auth");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let record =
					self.credentials.load(user_id).await?.ok_or(Error::Unauthenticated)?;
				let first = request(record.access_token.clone()).await?;

				if first.is_success() {
					return Ok(first);
				}
				if !first.is_unauthorized() {
					return Err(Error::Upstream { status: first.status_code() });
				}

				#[cfg(feature = "tracing")]
				tracing::debug!(user = %user_id, "Access token rejected; refreshing once.");

				self.refresh_rejected(user_id, Some(&record.access_token)).await?;

				let refreshed =
					self.credentials.load(user_id).await?.ok_or(Error::Unauthenticated)?;
				let retry = request(refreshed.access_token).await?;

				if retry.is_success() {
					Ok(retry)
				} else {
					Err(Error::Upstream { status: retry.status_code() })
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
