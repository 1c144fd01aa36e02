//! High-level flow orchestrators powered by the broker facade.

pub mod authorize;
pub mod call;
pub mod common;
pub mod refresh;

pub use authorize::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	cache::ResponseCache,
	config::{BrokerConfig, DEFAULT_CACHE_TTL_SECS},
	credentials::CredentialStore,
	http::UpstreamHttpClient,
	oauth::TransportErrorMapper,
	provider::{ProviderDescriptor, ProviderStrategy},
	store::KvStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper,
	provider::DefaultProviderStrategy,
};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates sign-in, credential refresh, and authorized resource calls against one provider.
///
/// The broker owns the HTTP client, the injected key-value store (shared by the credential
/// store and the response cache), the provider descriptor, and the strategy so individual flows
/// can focus on their own logic. Client credentials are configured once here and applied to
/// every token endpoint call.
#[derive(Clone)]
pub struct Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Per-user credential records.
	pub credentials: CredentialStore,
	/// Cache-aside layer for resource API reads.
	pub cache: ResponseCache,
	/// Provider descriptor that defines endpoints and scopes.
	pub descriptor: ProviderDescriptor,
	/// Strategy that classifies token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth 2.0 client identifier used in every grant.
	pub client_id: String,
	/// Client secret for confidential authentication.
	pub client_secret: Option<String>,
	/// Lifetime of cached reads in whole seconds.
	pub cache_ttl_secs: u64,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	store: Arc<dyn KvStore>,
	refresh_guards: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn KvStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			credentials: CredentialStore::new(store.clone()),
			cache: ResponseCache::new(store.clone()),
			descriptor,
			strategy,
			client_id: client_id.into(),
			client_secret: None,
			cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
			refresh_metrics: Default::default(),
			store,
			refresh_guards: Default::default(),
		}
	}

	/// Sets or replaces the client secret used for token endpoint authentication.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the lifetime of cached reads.
	pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
		self.cache_ttl_secs = ttl_secs;

		self
	}

	/// Moves credential records and cached reads under a different key namespace.
	pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.credentials = CredentialStore::with_prefix(self.store.clone(), prefix);

		self
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new broker for the provided descriptor and client identifier.
	///
	/// The broker provisions its own reqwest-backed transport so callers do not need
	/// to pass HTTP handles explicitly. Use [`Broker::with_client_secret`] to attach the
	/// confidential client secret.
	pub fn new(
		store: Arc<dyn KvStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
	) -> Self {
		Self::with_http_client(
			store,
			descriptor,
			strategy,
			client_id,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Builds a Spotify broker from process configuration and an injected store.
	pub fn from_config(config: &BrokerConfig, store: Arc<dyn KvStore>) -> Result<Self> {
		let descriptor = ProviderDescriptor::spotify().map_err(crate::error::ConfigError::from)?;

		Ok(Self::new(store, descriptor, Arc::new(DefaultProviderStrategy), &config.client_id)
			.with_client_secret(&config.client_secret)
			.with_cache_ttl(config.cache_ttl_secs)
			.with_token_prefix(&config.token_prefix))
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("token_prefix", &self.credentials.prefix())
			.field("cache_ttl_secs", &self.cache_ttl_secs)
			.finish()
	}
}
