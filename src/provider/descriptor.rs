//! Provider descriptor data structures shared by every flow.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ServiceKey, error::ConfigError};

/// Client authentication mode used against the token endpoint.
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
	/// Consent page; only probed for reachability by diagnostics.
	pub authorization: Url,
	/// Token endpoint used for refreshes.
	pub token: Url,
	/// Base URL that relative API paths are joined onto.
	pub api_base: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Service key under which user tokens are stored.
	pub service: ServiceKey,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Client authentication mechanism for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided service key.
	pub fn builder(service: ServiceKey) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(service)
	}

	/// Zoom's public OAuth and REST endpoints.
	pub fn zoom() -> Result<Self, ConfigError> {
		let parse = |endpoint, raw: &str| {
			Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })
		};

		Ok(Self::builder(ServiceKey::new("zoom")?)
			.authorization_endpoint(parse("authorization", "https://zoom.us/oauth/authorize")?)
			.token_endpoint(parse("token", "https://zoom.us/oauth/token")?)
			.api_base(parse("api_base", "https://api.zoom.us/v2/")?)
			.build()?)
	}

	/// Resolves an API path against the base URL.
	///
	/// Relative paths are always appended below the base path, with or without a leading
	/// slash. Absolute URLs must share the base URL's origin.
	pub fn api_url(&self, endpoint: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidEndpoint { endpoint: "api", source };

		if let Ok(absolute) = Url::parse(endpoint) {
			if absolute.origin() != self.endpoints.api_base.origin() {
				return Err(ConfigError::ForeignApiOrigin { url: absolute.to_string() });
			}

			return Ok(absolute);
		}

		let mut base = self.endpoints.api_base.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		base.join(endpoint.trim_start_matches('/')).map_err(invalid)
	}
}
