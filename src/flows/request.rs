//! Authorized API calls with a single 401 recovery, plus the scoped-client helper.

// crates.io
use reqwest::{
	Method,
	header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeBundle, ScopeSet, UserId},
	error::TransportError,
	ext::{BearerSigner, RequestSignerExt},
	flows::CredentialBroker,
	http::{self, ResponseMetadata},
	obs::{self, FlowKind},
};

const API_ERROR_PREVIEW_LIMIT: usize = 256;

/// Method, query, headers, and JSON body of an authorized API call.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method; defaults to `GET`.
	pub method: Method,
	/// Query pairs appended to the URL.
	pub query: Vec<(String, String)>,
	/// Extra request headers. `Authorization` is always overwritten.
	pub headers: HeaderMap,
	/// Optional JSON body.
	pub json: Option<Value>,
}
impl RequestOptions {
	/// Options for a bodiless request with the given method.
	pub fn new(method: Method) -> Self {
		Self { method, query: Vec::new(), headers: HeaderMap::new(), json: None }
	}

	/// `GET` request.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// `POST` request.
	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	/// `PATCH` request.
	pub fn patch() -> Self {
		Self::new(Method::PATCH)
	}

	/// `DELETE` request.
	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a request header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the JSON body.
	pub fn with_json(mut self, body: Value) -> Self {
		self.json = Some(body);

		self
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::get()
	}
}

/// Successful (2xx) API response with its body already read.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Deserializes the body as JSON; failures report the offending path.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| Error::InvalidResponse {
			reason: format!("API response did not match the expected shape at `{}`", e.path()),
			source: Some(Box::new(e)),
		})
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	fn into_result(self, meta: ResponseMetadata) -> Result<Self> {
		if (200..300).contains(&self.status) {
			return Ok(self);
		}

		let preview = http::body_preview(&self.body, API_ERROR_PREVIEW_LIMIT);
		let message = if preview.is_empty() {
			StatusCode::from_u16(self.status)
				.ok()
				.and_then(|status| status.canonical_reason())
				.unwrap_or("request failed")
				.to_owned()
		} else {
			preview
		};

		Err(Error::Api { status: self.status, message, retry_after: meta.retry_after })
	}
}

impl CredentialBroker {
	/// Calls `endpoint` on the provider API with the user's bearer token.
	///
	/// `endpoint` is resolved against the descriptor's API base. A 401 triggers exactly one
	/// recovery: the credential is force-refreshed and the call is repeated once. If that
	/// recovery fails with `InsufficientScopes` the error surfaces as is; any other recovery
	/// failure becomes `RefreshFailed`. Non-2xx responses map to [`Error::Api`].
	pub async fn make_authenticated_request(
		&self,
		user_id: &UserId,
		endpoint: &str,
		options: &RequestOptions,
		required: &ScopeSet,
	) -> Result<ApiResponse> {
		obs::observe(FlowKind::AuthorizedRequest, "make_authenticated_request", async move {
			let url = self.descriptor.api_url(endpoint)?;
			let credential = self.get_credentials(user_id, required).await?;
			let (response, meta) = self.send(&url, options, &credential).await?;

			if response.status != StatusCode::UNAUTHORIZED.as_u16() {
				return response.into_result(meta);
			}

			tracing::warn!(
				user_id = %user_id,
				path = url.path(),
				"Provider rejected the access token; refreshing once."
			);

			let refreshed = match self.force_refresh(&credential, required).await {
				Ok(refreshed) => refreshed,
				Err(e @ Error::InsufficientScopes { .. }) => return Err(e),
				Err(e) => return Err(Error::refresh_failed(e)),
			};
			let (response, meta) = self.send(&url, options, &refreshed).await?;

			response.into_result(meta)
		})
		.await
	}

	async fn send(
		&self,
		url: &Url,
		options: &RequestOptions,
		credential: &Credential,
	) -> Result<(ApiResponse, ResponseMetadata)> {
		let mut request = self
			.http_client
			.request(options.method.clone(), url.clone())
			.headers(options.headers.clone());

		if !options.query.is_empty() {
			request = request.query(&options.query);
		}
		if let Some(body) = &options.json {
			request = request.json(body);
		}

		let request = BearerSigner.attach_token(request, credential)?;
		let response = request.send().await.map_err(TransportError::from)?;
		let meta = ResponseMetadata::from_response(&response);
		let status = response.status().as_u16();
		let headers = response.headers().clone();
		let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

		Ok((ApiResponse { status, headers, body }, meta))
	}
}

/// Client bound to one user and one scope bundle.
///
/// Every call re-resolves the credential, so a long-lived client keeps working across
/// token refreshes.
#[derive(Clone, Debug)]
pub struct ScopedClient<'a> {
	broker: &'a CredentialBroker,
	user_id: UserId,
	bundle: ScopeBundle,
	credential: Credential,
}
impl<'a> ScopedClient<'a> {
	pub(crate) fn new(
		broker: &'a CredentialBroker,
		user_id: UserId,
		bundle: ScopeBundle,
		credential: Credential,
	) -> Self {
		Self { broker, user_id, bundle, credential }
	}

	/// User the client acts for.
	pub fn user_id(&self) -> &UserId {
		&self.user_id
	}

	/// Scope bundle the client was created for.
	pub fn bundle(&self) -> &ScopeBundle {
		&self.bundle
	}

	/// Credential resolved when the client was created.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Authorized call restricted to the bundle's scopes.
	pub async fn request(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse> {
		self.broker
			.make_authenticated_request(&self.user_id, endpoint, options, &self.bundle.scopes)
			.await
	}

	/// [`ScopedClient::request`] wrapped in the broker's retry policy.
	pub async fn request_with_retries(
		&self,
		endpoint: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse> {
		let broker = self.broker;
		let user_id = &self.user_id;
		let scopes = &self.bundle.scopes;

		broker
			.handle_api_errors(user_id, scopes, move || {
				broker.make_authenticated_request(user_id, endpoint, options, scopes)
			})
			.await
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::RETRY_AFTER;
	// self
	use super::*;

	fn response(status: u16, body: &str) -> ApiResponse {
		ApiResponse { status, headers: HeaderMap::new(), body: body.as_bytes().to_vec() }
	}

	#[test]
	fn success_statuses_pass_through() {
		let ok = response(204, "")
			.into_result(ResponseMetadata::default())
			.expect("2xx responses should pass through.");

		assert_eq!(ok.status, 204);
	}

	#[test]
	fn failures_become_api_errors_with_retry_hints() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		let meta =
			ResponseMetadata { status: Some(429), retry_after: http::parse_retry_after(&headers) };
		let err = response(429, "{\"message\":\"slow down\"}")
			.into_result(meta)
			.expect_err("429 must fail.");

		assert!(err.is_retryable());
		assert_eq!(err.status(), Some(429));
		assert_eq!(err.retry_after(), Some(Duration::seconds(7)));
		assert!(err.to_string().contains("slow down"));
	}

	#[test]
	fn empty_error_bodies_use_the_canonical_reason() {
		let err = response(404, "  ")
			.into_result(ResponseMetadata::default())
			.expect_err("404 must fail.");

		assert!(matches!(
			err,
			Error::Api { status: 404, ref message, .. } if message == "Not Found"
		));
	}

	#[test]
	fn json_bodies_report_mismatched_paths() {
		#[derive(Debug, Deserialize)]
		struct Meeting {
			#[allow(dead_code)]
			id: u64,
		}

		let ok = response(200, "{\"id\":42}").json::<Meeting>();
		let err = response(200, "{\"id\":\"forty-two\"}")
			.json::<Meeting>()
			.expect_err("String ids must not deserialize.");

		assert!(ok.is_ok());
		assert!(matches!(err, Error::InvalidResponse { ref reason, .. } if reason.contains("id")));
	}

	#[test]
	fn options_builder_accumulates_parts() {
		let options = RequestOptions::post()
			.with_query("page_size", "30")
			.with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"))
			.with_json(serde_json::json!({ "topic": "Standup" }));

		assert_eq!(options.method, Method::POST);
		assert_eq!(options.query, vec![("page_size".to_owned(), "30".to_owned())]);
		assert!(options.headers.contains_key("x-trace"));
		assert!(options.json.is_some());
		assert_eq!(RequestOptions::default().method, Method::GET);
	}
}
