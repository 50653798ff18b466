mod common;

// crates.io
use time::Duration;
// self
use common::*;
use meeting_credential_broker::{
	auth::CredentialStatus, config::ServiceConfig, diagnostics::RecordStatus,
};

#[tokio::test]
async fn healthy_credentials_produce_a_clean_report() {
	let harness = Harness::start().await;
	let seeded = harness.credential(
		"secret-access",
		Some("secret-refresh"),
		Duration::hours(1),
		"meeting:read user:read",
	);

	harness.seed(&seeded).await;

	let report = harness.broker.diagnose_auth_issues(&harness.user).await;
	let credential = report.credential.as_ref().expect("Loaded credential should be inspected.");

	assert!(report.is_healthy(), "Unexpected recommendations: {:?}", report.recommendations);
	assert!(report.configuration.ok);
	assert_eq!(report.record.status, RecordStatus::Found);
	assert_eq!(credential.status, CredentialStatus::Valid);
	assert!(credential.has_refresh_token);
	assert!(credential.expires_in_seconds.is_some_and(|secs| secs > 3_500));
	assert!(credential.unsatisfied_bundles.contains(&"meeting_write".to_owned()));
	assert!(report.network.reachable, "Any HTTP answer counts as reachable.");
	assert!(report.network.status.is_some());

	let json = serde_json::to_string(&report).expect("Report should serialize.");

	assert!(!json.contains("secret-access"));
	assert!(!json.contains("secret-refresh"));
	assert!(json.contains("\"status\":\"valid\""));
}

#[tokio::test]
async fn missing_records_are_reported_not_raised() {
	let harness = Harness::start().await;
	let report = harness.broker.diagnose_auth_issues(&harness.user).await;

	assert_eq!(report.record.status, RecordStatus::UserNotFound);
	assert!(report.record.detail.is_some());
	assert!(report.credential.is_none());
	assert!(!report.is_healthy());

	let json = serde_json::to_string(&report).expect("Report should serialize.");

	assert!(json.contains("user_not_found"));
}

#[tokio::test]
async fn every_failing_check_adds_a_recommendation() {
	let harness = Harness::start().await;
	let seeded = harness.credential("access-1", None, -Duration::hours(1), "meeting:read");
	let mut broker = harness.broker.clone().with_probe_timeout(std::time::Duration::from_secs(1));

	broker.config = ServiceConfig::default();
	broker.descriptor.endpoints.authorization =
		"http://127.0.0.1:9/oauth/authorize".parse().expect("Discard-port URL should parse.");

	harness.seed(&seeded).await;

	let report = broker.diagnose_auth_issues(&harness.user).await;
	let credential = report.credential.as_ref().expect("Loaded credential should be inspected.");

	assert!(!report.configuration.ok);
	assert_eq!(report.configuration.issues.len(), 3);
	assert_eq!(credential.status, CredentialStatus::Expired);
	assert!(!credential.has_refresh_token);
	assert!(credential.expires_in_seconds.is_some_and(|secs| secs < 0));
	assert!(!report.network.reachable);
	assert!(report.network.error.is_some());
	assert_eq!(report.recommendations.len(), 3);
}
