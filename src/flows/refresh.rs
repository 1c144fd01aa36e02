//! Credential refresh with per-user singleflight guards and metrics.
//!
//! [`Broker::refresh_credentials`] exchanges the stored refresh token for a new access token and
//! re-saves the merged record. Refreshes for one user serialize on an async guard; a caller that
//! queued behind a refresh which already replaced the rejected access token reuses the stored
//! record instead of calling the token endpoint again.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, TokenSecret, UserId},
	flows::{Broker, common},
	http::UpstreamHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the user's refresh token and persists the rotated credentials.
	///
	/// The previous refresh token is kept when the token endpoint omits a new one. Fails with
	/// [`Error::Unauthenticated`] when no record exists, [`Error::MissingRefreshCredential`] when
	/// the record has no refresh token, and [`Error::UpstreamAuth`] when the token endpoint
	/// rejects the grant or the client.
	pub async fn refresh_credentials(&self, user_id: &UserId) -> Result<CredentialRecord> {
		self.refresh_rejected(user_id, None).await
	}

	/// Refreshes unless the stored access token already differs from `rejected`.
	pub(crate) async fn refresh_rejected(
		&self,
		user_id: &UserId,
		rejected: Option<&TokenSecret>,
	) -> Result<CredentialRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				let guard = common::flow_guard(self, user_id);
				let _singleflight = guard.lock().await;
				let current = self.credentials.load(user_id).await?.ok_or(Error::Unauthenticated)?;

				if rejected.is_some_and(|token| *token != current.access_token) {
					return Ok(current);
				}

				let refresh_token =
					current.refresh_token.clone().ok_or(Error::MissingRefreshCredential)?;
				let facade = <BasicFacade<C, M>>::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.as_deref(),
					None,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;

				self.refresh_metrics.record_exchange();

				let grant =
					facade.refresh_token(self.strategy.as_ref(), refresh_token.expose()).await?;
				let updated = current.refreshed(grant, OffsetDateTime::now_utc());

				self.credentials.put(&updated).await?;

				Ok(updated)
			})
			.await;

		match &result {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}
}
