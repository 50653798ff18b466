//! Refresh-token exchange against the provider's token endpoint.
//!
//! The request is a form-encoded `grant_type=refresh_token` POST authenticated with the
//! client credentials (HTTP Basic by default). Responses are normalized into a
//! [`RefreshGrant`] or a classified [`Error`]; nothing here touches storage.

pub use oauth2;

// crates.io
use oauth2::{ClientId, ClientSecret, basic::BasicErrorResponse};
use reqwest::{Method, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::{RefreshGrant, ScopeSet, TokenSecret},
	config::ServiceConfig,
	error::TransportError,
	http::{self, ReqwestHttpClient, ResponseMetadata},
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Token endpoint client bound to one provider and one set of client credentials.
#[derive(Clone)]
pub struct TokenEndpoint {
	http: ReqwestHttpClient,
	url: Url,
	auth_method: ClientAuthMethod,
	client_id: Option<ClientId>,
	client_secret: Option<ClientSecret>,
	strategy: Arc<dyn ProviderStrategy>,
}
impl TokenEndpoint {
	/// Builds an endpoint client from the descriptor and configuration.
	pub fn new(
		http: ReqwestHttpClient,
		descriptor: &ProviderDescriptor,
		config: &ServiceConfig,
		strategy: Arc<dyn ProviderStrategy>,
	) -> Self {
		Self {
			http,
			url: descriptor.endpoints.token.clone(),
			auth_method: descriptor.client_auth_method,
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			strategy,
		}
	}

	/// Token endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Exchanges `refresh_token` for a new access token.
	///
	/// Errors:
	/// - `RefreshTokenInvalid` when the provider rejects the grant itself.
	/// - `TokenRefreshFailed` for any other non-success response (retryable for 429/5xx).
	/// - `InvalidResponse` for a success body without a usable access token.
	/// - `Network` for transport failures and timeouts.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<RefreshGrant> {
		let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
			return Err(Error::TokenRefreshFailed {
				reason: "client credentials are not configured".into(),
				status: None,
				retryable: false,
			});
		};
		let mut form = BTreeMap::from([
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("refresh_token".to_owned(), refresh_token.expose().to_owned()),
		]);

		self.strategy.augment_refresh_request(&mut form);

		let mut request =
			self.http.request(Method::POST, self.url.clone()).header(ACCEPT, "application/json");

		match self.auth_method {
			ClientAuthMethod::ClientSecretBasic => {
				request = request.basic_auth(client_id.as_str(), Some(client_secret.secret()));
			},
			ClientAuthMethod::ClientSecretPost => {
				form.insert("client_id".into(), client_id.as_str().to_owned());
				form.insert("client_secret".into(), client_secret.secret().to_owned());
			},
		}

		let response = request.form(&form).send().await.map_err(TransportError::from)?;
		let meta = ResponseMetadata::from_response(&response);
		let body = response.bytes().await.map_err(TransportError::from)?;

		match meta.status {
			Some(status) if (200..300).contains(&status) => parse_success(&body),
			status => Err(self.classify_failure(status.unwrap_or_default(), &body)),
		}
	}

	fn classify_failure(&self, status: u16, body: &[u8]) -> Error {
		let ctx = match serde_json::from_slice::<BasicErrorResponse>(body) {
			Ok(parsed) => {
				let ctx =
					ProviderErrorContext::new(status).with_oauth_error(parsed.error().as_ref());

				match parsed.error_description() {
					Some(description) => ctx.with_error_description(description.as_str()),
					None => ctx,
				}
			},
			Err(_) => ProviderErrorContext::new(status)
				.with_body_preview(http::body_preview(body, BODY_PREVIEW_LIMIT)),
		};
		let reason = ctx.reason();

		match self.strategy.classify_token_error(&ctx) {
			ProviderErrorKind::InvalidGrant => Error::RefreshTokenInvalid { reason },
			ProviderErrorKind::Transient =>
				Error::TokenRefreshFailed { reason, status: Some(status), retryable: true },
			ProviderErrorKind::InvalidClient | ProviderErrorKind::Rejected =>
				Error::TokenRefreshFailed { reason, status: Some(status), retryable: false },
		}
	}
}
impl Debug for TokenEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("url", &self.url.as_str())
			.field("auth_method", &self.auth_method)
			.field("client_id", &self.client_id)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	scope: Option<ScopeSet>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(i64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<i64> {
		match self {
			Self::Seconds(secs) => Some(*secs),
			Self::Text(text) => text.trim().parse().ok(),
		}
	}
}

fn parse_success(body: &[u8]) -> Result<RefreshGrant> {
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: TokenResponseBody = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| Error::InvalidResponse {
			reason: format!("token response is not valid JSON at `{}`", e.path()),
			source: Some(Box::new(e)),
		})?;
	let access_token = parsed
		.access_token
		.map(TokenSecret::new)
		.filter(|token| !token.is_blank())
		.ok_or_else(|| Error::InvalidResponse {
			reason: "response did not include an access_token".into(),
			source: None,
		})?;
	let expires_in = parsed
		.expires_in
		.as_ref()
		.and_then(ExpiresIn::seconds)
		.map(|secs| Duration::seconds(secs.max(0)));

	Ok(RefreshGrant {
		access_token,
		expires_in,
		refresh_token: parsed.refresh_token.map(TokenSecret::new).filter(|token| !token.is_blank()),
		scope: parsed.scope.filter(|scope| !scope.is_empty()),
	})
}
