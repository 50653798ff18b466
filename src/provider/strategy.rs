//! Provider strategy hooks that customize the refresh exchange.
//!
//! Implementations decorate the outgoing refresh form and normalize error mapping without
//! tying flows to any particular HTTP client.

// self
use crate::_prelude::*;

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Hooks only see crate-owned data so implementations never depend on reqwest types.
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps a non-success token endpoint response into the broker taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific form parameters to the refresh request.
	fn augment_refresh_request(&self, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the refresh token itself; the user must re-consent.
	InvalidGrant,
	/// Client credentials were rejected.
	InvalidClient,
	/// Failure is temporary and the same refresh may succeed later.
	Transient,
	/// Any other rejection.
	Rejected,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// HTTP status code returned by the provider.
	pub http_status: u16,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context for the provided HTTP status.
	pub fn new(http_status: u16) -> Self {
		Self { http_status, oauth_error: None, error_description: None, body_preview: None }
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Human-readable reason assembled from the most specific field available.
	pub fn reason(&self) -> String {
		match (self.oauth_error.as_deref(), self.error_description.as_deref()) {
			(Some(error), Some(description)) => format!("{error}: {description}"),
			(Some(error), None) => error.to_owned(),
			(None, Some(description)) => description.to_owned(),
			(None, None) => self
				.body_preview
				.clone()
				.filter(|body| !body.trim().is_empty())
				.unwrap_or_else(|| format!("HTTP {}", self.http_status)),
		}
	}
}

/// Default strategy for the meeting platform's token endpoint.
///
/// `400` with `invalid_grant` or `invalid_request` means the refresh token is dead. `429` and
/// `5xx` are transient. Everything else is a plain rejection.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		let code =
			ctx.oauth_error.as_deref().or_else(|| body_error_code(ctx.body_preview.as_deref()));

		if let Some(kind) = code.and_then(|code| classify_oauth_error(ctx.http_status, code)) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(status: u16, code: &str) -> Option<ProviderErrorKind> {
	let code = code.to_ascii_lowercase();

	match code.as_str() {
		"invalid_grant" | "invalid_request" if status == 400 =>
			Some(ProviderErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ProviderErrorKind::InvalidClient),
		"temporarily_unavailable" | "server_error" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn body_error_code(body: Option<&str>) -> Option<&'static str> {
	let lowered = body?.to_ascii_lowercase();

	["invalid_grant", "invalid_request", "invalid_client", "temporarily_unavailable"]
		.into_iter()
		.find(|code| lowered.contains(code))
}

fn classify_status(status: u16) -> ProviderErrorKind {
	match status {
		429 | 500..=599 => ProviderErrorKind::Transient,
		_ => ProviderErrorKind::Rejected,
	}
}
