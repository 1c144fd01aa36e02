//! Authorization Code + PKCE sign-in.
//!
//! [`Broker::start_authorization`] produces the authorize URL plus the state and PKCE verifier
//! that must survive the redirect. [`Broker::complete_authorization`] checks the returned state,
//! exchanges the code, looks up who signed in, and persists their credentials.

mod session;

pub use session::{AuthorizationSession, PkceCodeChallengeMethod};

// self
use crate::{
	_prelude::*,
	api::model::RawProfile,
	auth::{CredentialRecord, UserProfile},
	error::ConfigError,
	flows::{Broker, common},
	http::{self, Method, UpstreamHttpClient, UpstreamStatus},
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a sign-in by generating state, a PKCE pair, and the authorize URL.
	///
	/// Nothing is recorded as a flow attempt until [`Broker::complete_authorization`] runs.
	pub fn start_authorization(&self, redirect_uri: Url) -> AuthorizationSession {
		let session = session::build_session(&self.descriptor, &self.client_id, redirect_uri);

		#[cfg(feature = "tracing")]
		tracing::debug!(
			flow = FlowKind::AuthorizationCode.as_str(),
			"Authorization session started."
		);

		session
	}

	/// Completes a sign-in started by [`Broker::start_authorization`].
	///
	/// Fails with [`Error::UpstreamAuth`] when `returned_state` does not match or the token
	/// endpoint rejects the code, and with [`Error::Upstream`] when the profile lookup fails.
	pub async fn complete_authorization(
		&self,
		session: AuthorizationSession,
		returned_state: &str,
		code: &str,
	) -> Result<CredentialRecord> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				session.validate_state(returned_state)?;

				let (redirect_uri, pkce) = session.into_exchange_parts();
				let facade = <BasicFacade<C, M>>::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.as_deref(),
					Some(&redirect_uri),
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let grant = facade
					.exchange_authorization_code(
						self.strategy.as_ref(),
						code,
						&pkce.verifier,
						&redirect_uri,
					)
					.await?;
				let url = self.descriptor.api_url(["me"]).map_err(ConfigError::from)?;
				let response = self
					.send(http::bearer_request(Method::GET, &url, &grant.access_token, None)?)
					.await?;

				if !response.is_success() {
					return Err(Error::Upstream { status: response.status_code() });
				}

				let raw: RawProfile = common::decode_json(&response)?;
				let profile = UserProfile::try_from(raw)?;

				self.credentials.save(profile, grant).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

#[cfg(all(test, feature = "metrics", feature = "reqwest"))]
mod tests {
	// crates.io
	use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
	// self
	use super::*;
	use crate::{_preludet, provider::ProviderDescriptor};

	#[derive(Default)]
	struct CounterLog(Mutex<Vec<String>>);
	impl Recorder for CounterLog {
		fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

		fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
			let labels = key
				.labels()
				.map(|label| format!("{}={}", label.key(), label.value()))
				.collect::<Vec<_>>();

			self.0.lock().push(format!("{}{{{}}}", key.name(), labels.join(",")));

			Counter::noop()
		}

		fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
			Gauge::noop()
		}

		fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
			Histogram::noop()
		}
	}

	#[test]
	fn starting_a_session_records_no_flow_attempt() {
		let descriptor = ProviderDescriptor::spotify().expect("Spotify descriptor should build.");
		let (broker, _) =
			_preludet::build_reqwest_test_broker(descriptor, "client-abc", "secret-abc");
		let redirect =
			Url::parse("http://127.0.0.1:3000/callback").expect("Redirect fixture should parse.");
		let log = CounterLog::default();
		let session = metrics::with_local_recorder(&log, || broker.start_authorization(redirect));

		assert!(!session.state.is_empty());
		assert!(log.0.lock().iter().all(|entry| !entry.contains("flow=authorization_code")));
	}
}
