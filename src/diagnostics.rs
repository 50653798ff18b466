//! Read-only health report for one user's credential, meant for support tooling.
//!
//! [`CredentialBroker::diagnose_auth_issues`] never fails. Every sub-check (configuration,
//! record lookup, credential inspection, provider reachability) records its problem as a field
//! of the [`DiagnosticReport`] plus a human-readable recommendation.

// std
use std::time::{Duration as StdDuration, Instant};
// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialStatus, ScopeSet, ServiceKey, UserId},
	flows::CredentialBroker,
	obs::{FlowKind, FlowOutcome, FlowSpan, record_flow_outcome},
};

/// Timeout of the reachability probe against the authorization endpoint.
pub const DEFAULT_PROBE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Composite result of [`CredentialBroker::diagnose_auth_issues`].
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticReport {
	/// User the report was generated for.
	pub user_id: UserId,
	/// Service whose token sub-record was inspected.
	pub service: ServiceKey,
	/// When the report was generated.
	#[serde(with = "time::serde::rfc3339")]
	pub checked_at: OffsetDateTime,
	/// Client configuration completeness.
	pub configuration: ConfigurationCheck,
	/// Presence and readability of the stored record.
	pub record: RecordCheck,
	/// Credential inspection; absent when the record could not be loaded.
	pub credential: Option<CredentialCheck>,
	/// Reachability of the provider's authorization endpoint.
	pub network: NetworkCheck,
	/// Suggested fixes, one per detected problem.
	pub recommendations: Vec<String>,
}
impl DiagnosticReport {
	/// Returns true when no sub-check reported a problem.
	pub fn is_healthy(&self) -> bool {
		self.recommendations.is_empty()
	}
}

/// Result of validating the client configuration.
#[derive(Clone, Debug, Serialize)]
pub struct ConfigurationCheck {
	/// True when no issue was found.
	pub ok: bool,
	/// One message per configuration issue.
	pub issues: Vec<String>,
}

/// Outcome of loading the user's token sub-record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
	/// Record and token sub-record were loaded and decrypted.
	Found,
	/// No user record exists.
	UserNotFound,
	/// The user exists but never connected the service.
	ServiceNotAuthenticated,
	/// Storage or decryption failed.
	Unreadable,
}

/// Result of the record lookup.
#[derive(Clone, Debug, Serialize)]
pub struct RecordCheck {
	/// Lookup outcome.
	pub status: RecordStatus,
	/// Error message when the lookup failed.
	pub detail: Option<String>,
}

/// Snapshot of the loaded credential. Never contains token material.
#[derive(Clone, Debug, Serialize)]
pub struct CredentialCheck {
	/// Lifecycle position at `checked_at`.
	pub status: CredentialStatus,
	/// Whether a refresh token is stored.
	pub has_refresh_token: bool,
	/// Absolute expiry, if known.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// Seconds until expiry; negative once expired.
	pub expires_in_seconds: Option<i64>,
	/// Granted scopes.
	pub scopes: ScopeSet,
	/// Catalog bundles the granted scopes do not cover.
	pub unsatisfied_bundles: Vec<String>,
}

/// Result of the reachability probe.
#[derive(Clone, Debug, Serialize)]
pub struct NetworkCheck {
	/// True when the endpoint answered with any HTTP status.
	pub reachable: bool,
	/// Status returned by the endpoint.
	pub status: Option<u16>,
	/// Round-trip time of the probe.
	pub latency_ms: u64,
	/// Transport error message when the probe failed.
	pub error: Option<String>,
}

impl CredentialBroker {
	/// Builds a [`DiagnosticReport`] for `user_id` without modifying any state.
	pub async fn diagnose_auth_issues(&self, user_id: &UserId) -> DiagnosticReport {
		let span = FlowSpan::new(FlowKind::Diagnostics, "diagnose_auth_issues");

		record_flow_outcome(FlowKind::Diagnostics, FlowOutcome::Attempt);

		let report = span.instrument(self.build_report(user_id)).await;

		record_flow_outcome(FlowKind::Diagnostics, FlowOutcome::Success);
		tracing::info!(
			user_id = %user_id,
			healthy = report.is_healthy(),
			problems = report.recommendations.len(),
			"Generated credential diagnostics."
		);

		report
	}

	async fn build_report(&self, user_id: &UserId) -> DiagnosticReport {
		let checked_at = OffsetDateTime::now_utc();
		let mut recommendations = Vec::new();
		let configuration = self.check_configuration(&mut recommendations);
		let (record, credential) = match self.store.load(user_id, self.service()).await {
			Ok(credential) => (
				RecordCheck { status: RecordStatus::Found, detail: None },
				Some(self.check_credential(&credential, checked_at, &mut recommendations)),
			),
			Err(e) => (check_lookup_failure(&e, &mut recommendations), None),
		};
		let network = self.check_network(&mut recommendations).await;

		DiagnosticReport {
			user_id: user_id.clone(),
			service: self.service().clone(),
			checked_at,
			configuration,
			record,
			credential,
			network,
			recommendations,
		}
	}

	fn check_configuration(&self, recommendations: &mut Vec<String>) -> ConfigurationCheck {
		let issues = self.config.validate().iter().map(ToString::to_string).collect::<Vec<_>>();

		if !issues.is_empty() {
			recommendations.push(
				"Set the client id, client secret, and redirect URI for the meeting platform app."
					.into(),
			);
		}

		ConfigurationCheck { ok: issues.is_empty(), issues }
	}

	fn check_credential(
		&self,
		credential: &Credential,
		now: OffsetDateTime,
		recommendations: &mut Vec<String>,
	) -> CredentialCheck {
		let status = credential.status_at(now);
		let has_refresh_token = credential.can_refresh();

		match status {
			CredentialStatus::Valid => {},
			CredentialStatus::Expiring | CredentialStatus::Expired if has_refresh_token => {
				recommendations
					.push("Access token is stale; it will be refreshed on the next request.".into());
			},
			CredentialStatus::Missing if has_refresh_token => recommendations
				.push("No access token is stored; one will be minted on the next request.".into()),
			_ => recommendations.push(
				"No refresh token is stored; ask the user to reconnect their account.".into(),
			),
		}

		let unsatisfied_bundles = self
			.catalog
			.names()
			.filter(|name| {
				self.catalog
					.scopes_for(name)
					.map(|scopes| !scopes.is_subset_of(&credential.scopes))
					.unwrap_or(false)
			})
			.map(str::to_owned)
			.collect::<Vec<_>>();

		CredentialCheck {
			status,
			has_refresh_token,
			expires_at: credential.expiry,
			expires_in_seconds: credential.remaining_at(now).map(|left| left.whole_seconds()),
			scopes: credential.scopes.clone(),
			unsatisfied_bundles,
		}
	}

	async fn check_network(&self, recommendations: &mut Vec<String>) -> NetworkCheck {
		let url = self.descriptor.endpoints.authorization.clone();
		let started = Instant::now();
		let outcome =
			self.http_client.request(Method::GET, url).timeout(self.probe_timeout).send().await;
		let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

		match outcome {
			Ok(response) => NetworkCheck {
				reachable: true,
				status: Some(response.status().as_u16()),
				latency_ms,
				error: None,
			},
			Err(e) => {
				let error = if e.is_timeout() {
					format!("probe timed out after {}ms", self.probe_timeout.as_millis())
				} else {
					e.to_string()
				};

				recommendations.push(
					"The authorization endpoint is unreachable; check outbound network access.".into(),
				);

				NetworkCheck { reachable: false, status: None, latency_ms, error: Some(error) }
			},
		}
	}
}

fn check_lookup_failure(error: &Error, recommendations: &mut Vec<String>) -> RecordCheck {
	let (status, recommendation) = match error {
		Error::UserNotFound { .. } =>
			(RecordStatus::UserNotFound, "No user record exists; verify the user id."),
		Error::ServiceNotAuthenticated { .. } => (
			RecordStatus::ServiceNotAuthenticated,
			"The user has not connected the meeting platform; send them through consent.",
		),
		_ => (
			RecordStatus::Unreadable,
			"The stored record could not be read; check the storage backend and encryption key.",
		),
	};

	recommendations.push(recommendation.into());

	RecordCheck { status, detail: Some(error.to_string()) }
}
