//! Transport primitives shared by the token endpoint, authorized requests, and diagnostics.
//!
//! [`ReqwestHttpClient`] owns the bounded per-request timeout; [`ResponseMetadata`] captures the
//! status and `Retry-After` hint of a response so error mapping stays consistent.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use reqwest::{
	Method, RequestBuilder, Response,
	header::{HeaderMap, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Timeout applied to token-endpoint and API calls.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Every request built through [`ReqwestHttpClient::request`] carries the configured timeout;
/// a timed-out call surfaces as a retryable network error.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	timeout: StdDuration,
}
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, timeout: DEFAULT_REQUEST_TIMEOUT }
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Per-request timeout currently applied.
	pub fn timeout(&self) -> StdDuration {
		self.timeout
	}

	/// Starts a request with the configured timeout.
	pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
		self.client.request(method, url).timeout(self.timeout)
	}
}
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self::with_client(ReqwestClient::default())
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}

/// Status and retry hint captured from an HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Captures metadata before the body is consumed.
	pub fn from_response(response: &Response) -> Self {
		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

/// Parses `Retry-After` as delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(i64::from(secs)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Reads at most `limit` characters of a body for error messages.
pub(crate) fn body_preview(body: &[u8], limit: usize) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.chars().count() <= limit {
		return trimmed.to_owned();
	}

	let mut preview = trimmed.chars().take(limit).collect::<String>();

	preview.push('…');

	preview
}
