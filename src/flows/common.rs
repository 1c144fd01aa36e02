//! Shared helpers for flow implementations (singleflight guards, resource API dispatch).

// crates.io
use oauth2::AsyncHttpClient;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	error::TransientError,
	flows::Broker,
	http::{HttpRequest, HttpResponse, ResponseMetadataSlot, UpstreamEndpoint, UpstreamHttpClient},
	oauth::TransportErrorMapper,
};

/// Returns (and creates on demand) the refresh guard for a user.
pub(crate) fn flow_guard<C, M>(broker: &Broker<C, M>, user_id: &UserId) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = broker.refresh_guards.lock();

	guards.entry(user_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Dispatches a prepared resource API request through the broker's transport.
	///
	/// Any HTTP response, including 4xx/5xx, is returned as-is so the auth-retry orchestrator
	/// can inspect the status. Only transport failures become errors.
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());

		handle.call(request).await.map_err(|err| {
			self.transport_mapper.map_transport_error(
				UpstreamEndpoint::ResourceApi,
				meta.take().as_ref(),
				err,
			)
		})
	}
}

/// Decodes a JSON response body with path-aware errors.
pub(crate) fn decode_json<T>(response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		TransientError::ResponseParse { source, status: response.status().as_u16() }.into()
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::StatusCode;

	#[derive(Debug, Deserialize)]
	struct Me {
		id: String,
	}

	fn response(status: StatusCode, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = status;

		response
	}

	#[test]
	fn decode_reports_field_path() {
		let ok: Me = decode_json(&response(StatusCode::OK, r#"{"id":"u1"}"#))
			.expect("Valid payload should decode.");

		assert_eq!(ok.id, "u1");

		let err = decode_json::<Me>(&response(StatusCode::OK, r#"{"id":7}"#))
			.expect_err("Wrong type should fail.");

		match err {
			Error::Transient(TransientError::ResponseParse { source, status }) => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "id");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
