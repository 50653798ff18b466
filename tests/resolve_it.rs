mod common;

// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use common::*;
use meeting_credential_broker::{
	auth::{CredentialStatus, ScopeSet},
	error::ErrorKind,
	store::UserRecord,
};

#[tokio::test]
async fn valid_credentials_resolve_without_network() {
	let harness = Harness::start().await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;

	let seeded = harness.credential(
		"access-1",
		Some("refresh-1"),
		Duration::hours(1),
		"meeting:read user:read",
	);

	harness.seed(&seeded).await;

	let credential = harness
		.broker
		.get_credentials(&harness.user, &scopes("meeting:read"))
		.await
		.expect("Valid credential should resolve.");

	assert_eq!(credential.access_token.as_ref().map(|token| token.expose()), Some("access-1"));
	assert_eq!(credential.status(), CredentialStatus::Valid);

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_scopes_fail_fast_without_network() {
	let harness = Harness::start().await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(token_body(
				"access-2",
				None,
				3600,
				Some("meeting:write"),
			));
		})
		.await;

	// Expired on purpose: the scope check must win over the refresh path.
	let seeded = harness.credential(
		"access-1",
		Some("refresh-1"),
		-Duration::hours(1),
		"meeting:read",
	);

	harness.seed(&seeded).await;

	let err = harness
		.broker
		.get_credentials(&harness.user, &scopes("meeting:write"))
		.await
		.expect_err("Missing scopes must fail.");

	assert_eq!(err.kind(), ErrorKind::InsufficientScopes);
	assert!(err.requires_reauthentication());
	assert!(!err.is_retryable());

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn lookup_failures_propagate_unchanged() {
	let harness = Harness::start().await;
	let err = harness
		.broker
		.get_credentials(&harness.user, &scopes("meeting:read"))
		.await
		.expect_err("Unknown users must fail.");

	assert_eq!(err.kind(), ErrorKind::UserNotFound);

	harness.repository.insert(UserRecord::new(user()));

	let err = harness
		.broker
		.get_credentials(&harness.user, &scopes("meeting:read"))
		.await
		.expect_err("Users without the service must fail.");

	assert_eq!(err.kind(), ErrorKind::ServiceNotAuthenticated);
	assert!(err.requires_reauthentication());
}

#[tokio::test]
async fn stale_credentials_without_refresh_token_are_invalid() {
	let harness = Harness::start().await;

	let seeded = harness.credential("access-1", None, -Duration::minutes(1), "meeting:read");

	harness.seed(&seeded).await;

	let err = harness
		.broker
		.get_credentials(&harness.user, &scopes("meeting:read"))
		.await
		.expect_err("Expired credential without refresh token must fail.");

	assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn credentials_inside_the_refresh_buffer_are_refreshed() {
	let harness = Harness::start().await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", None, 3600, None));
		})
		.await;

	let seeded = harness.credential(
		"access-1",
		Some("refresh-1"),
		Duration::minutes(2),
		"meeting:read",
	);

	harness.seed(&seeded).await;

	let credential = harness
		.broker
		.get_credentials(&harness.user, &ScopeSet::default())
		.await
		.expect("Expiring credential should refresh.");

	assert_eq!(credential.access_token.as_ref().map(|token| token.expose()), Some("access-2"));

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn client_for_resolves_bundle_scopes() {
	let harness = Harness::start().await;

	let seeded = harness.credential(
		"access-1",
		Some("refresh-1"),
		Duration::hours(1),
		"meeting:read user:read",
	);

	harness.seed(&seeded).await;

	let client = harness
		.broker
		.client_for(&harness.user, "meeting_read")
		.await
		.expect("Granted bundle should resolve.");

	assert_eq!(client.bundle().name, "meeting_read");
	assert_eq!(client.user_id(), &harness.user);

	let err = harness
		.broker
		.client_for(&harness.user, "meeting_write")
		.await
		.expect_err("Ungranted bundle must fail.");

	assert_eq!(err.kind(), ErrorKind::InsufficientScopes);

	let err = harness
		.broker
		.client_for(&harness.user, "webinar_admin")
		.await
		.expect_err("Unknown bundle must fail.");

	assert_eq!(err.kind(), ErrorKind::Configuration);
}
