//! Static client configuration for the meeting platform.
//!
//! Configuration is validated once at startup with [`ServiceConfig::validate_and_log`]. Issues
//! are logged rather than raised, so a misconfigured deployment keeps serving and the
//! problem shows up as refresh failures for the affected calls.

// std
use std::env;
// crates.io
use oauth2::{ClientId, ClientSecret, RedirectUrl};
// self
use crate::_prelude::*;

/// Problems detected by [`ServiceConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ConfigIssue {
	/// `client_id` is absent or blank.
	#[error("Client id is not configured.")]
	MissingClientId,
	/// `client_secret` is absent or blank.
	#[error("Client secret is not configured.")]
	MissingClientSecret,
	/// `redirect_uri` is absent or blank.
	#[error("Redirect URI is not configured.")]
	MissingRedirectUri,
	/// `redirect_uri` cannot be parsed as an absolute URL.
	#[error("Redirect URI `{value}` is malformed: {reason}.")]
	InvalidRedirectUri {
		/// Raw configured value.
		value: String,
		/// Parser message.
		reason: String,
	},
}

/// Client credentials registered with the provider.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
	/// OAuth client identifier.
	pub client_id: Option<ClientId>,
	/// OAuth client secret; redacted in `Debug`.
	pub client_secret: Option<ClientSecret>,
	/// Redirect URI registered for the consent flow.
	pub redirect_uri: Option<String>,
}
impl ServiceConfig {
	/// Builds a configuration from explicit values.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: impl Into<String>,
	) -> Self {
		Self {
			client_id: non_blank(client_id.into()).map(ClientId::new),
			client_secret: non_blank(client_secret.into()).map(ClientSecret::new),
			redirect_uri: non_blank(redirect_uri.into()),
		}
	}

	/// Reads `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET`, and `<PREFIX>_REDIRECT_URI`.
	pub fn from_env(prefix: &str) -> Self {
		Self::from_lookup(prefix, |key| env::var(key).ok())
	}

	/// Same as [`ServiceConfig::from_env`] with a custom variable source.
	pub fn from_lookup<F>(prefix: &str, lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |suffix: &str| lookup(&format!("{prefix}_{suffix}")).and_then(non_blank);

		Self {
			client_id: read("CLIENT_ID").map(ClientId::new),
			client_secret: read("CLIENT_SECRET").map(ClientSecret::new),
			redirect_uri: read("REDIRECT_URI"),
		}
	}

	/// Returns true when both client credentials are present.
	pub fn has_client_credentials(&self) -> bool {
		self.client_id.is_some() && self.client_secret.is_some()
	}

	/// Lists every configuration problem; empty when the configuration is complete.
	pub fn validate(&self) -> Vec<ConfigIssue> {
		let mut issues = Vec::new();

		if self.client_id.is_none() {
			issues.push(ConfigIssue::MissingClientId);
		}
		if self.client_secret.is_none() {
			issues.push(ConfigIssue::MissingClientSecret);
		}

		match self.redirect_uri.as_deref() {
			None => issues.push(ConfigIssue::MissingRedirectUri),
			Some(value) =>
				if let Err(e) = RedirectUrl::new(value.to_owned()) {
					issues.push(ConfigIssue::InvalidRedirectUri {
						value: value.to_owned(),
						reason: e.to_string(),
					});
				},
		}

		issues
	}

	/// Validates and logs each issue with `tracing::error!`; returns true when none were found.
	pub fn validate_and_log(&self) -> bool {
		let issues = self.validate();

		for issue in &issues {
			tracing::error!(%issue, "Meeting platform configuration problem.");
		}

		if issues.is_empty() {
			tracing::info!(
				client_id = self.client_id.as_ref().map(|id| id.as_str()),
				"Meeting platform configuration validated."
			);
		}

		issues.is_empty()
	}
}

fn non_blank(value: String) -> Option<String> {
	let trimmed = value.trim();

	(!trimmed.is_empty()).then(|| trimmed.to_owned())
}
