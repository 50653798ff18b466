//! Credential flows orchestrated by [`CredentialBroker`].

pub mod common;
pub mod refresh;
pub mod request;
pub mod resolve;
pub mod retry;

pub use common::*;
pub use refresh::*;
pub use request::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeCatalog, ServiceKey},
	config::ServiceConfig,
	diagnostics::DEFAULT_PROBE_TIMEOUT,
	http::ReqwestHttpClient,
	oauth::TokenEndpoint,
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
	store::CredentialStore,
};

/// Resolves, refreshes, and spends one provider's per-user credentials.
///
/// The broker owns the HTTP client, credential store, provider descriptor, strategy, scope
/// catalog, and retry policy, so nothing is cached in process-wide state. Clones share the
/// refresh metrics and the per-user singleflight guards.
#[derive(Clone)]
pub struct CredentialBroker {
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: ReqwestHttpClient,
	/// Encrypted credential persistence.
	pub store: CredentialStore,
	/// Provider descriptor that defines OAuth and API endpoints.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for refresh request adjustments and error classification.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Client credentials registered with the provider.
	pub config: ServiceConfig,
	/// Named scope bundles available to [`CredentialBroker::client_for`].
	pub catalog: ScopeCatalog,
	/// Backoff policy applied by [`CredentialBroker::handle_api_errors`].
	pub retry_policy: RetryPolicy,
	/// Timeout of the diagnostics reachability probe.
	pub probe_timeout: std::time::Duration,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Arc<Mutex<HashMap<CredentialKey, Arc<AsyncMutex<()>>>>>,
}
impl CredentialBroker {
	/// Creates a broker with the default reqwest transport, strategy, catalog, and policy.
	pub fn new(
		store: CredentialStore,
		descriptor: ProviderDescriptor,
		config: ServiceConfig,
	) -> Self {
		Self {
			http_client: ReqwestHttpClient::default(),
			store,
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			config,
			catalog: ScopeCatalog::standard(),
			retry_policy: RetryPolicy::default(),
			probe_timeout: DEFAULT_PROBE_TIMEOUT,
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the HTTP client (custom TLS roots, proxies, timeouts).
	pub fn with_http_client(mut self, http_client: ReqwestHttpClient) -> Self {
		self.http_client = http_client;

		self
	}

	/// Replaces the provider strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the scope catalog.
	pub fn with_catalog(mut self, catalog: ScopeCatalog) -> Self {
		self.catalog = catalog;

		self
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Replaces the diagnostics probe timeout.
	pub fn with_probe_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.probe_timeout = timeout;

		self
	}

	/// Service key under which user tokens are stored.
	pub fn service(&self) -> &ServiceKey {
		&self.descriptor.service
	}

	pub(crate) fn token_endpoint(&self) -> TokenEndpoint {
		TokenEndpoint::new(
			self.http_client.clone(),
			&self.descriptor,
			&self.config,
			Arc::clone(&self.strategy),
		)
	}
}
impl Debug for CredentialBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialBroker")
			.field("descriptor", &self.descriptor)
			.field("client_credentials_set", &self.config.has_client_credentials())
			.field("retry_policy", &self.retry_policy)
			.finish()
	}
}
