mod common;

// std
use std::{
	sync::atomic::{AtomicU32, Ordering},
	time::{Duration as StdDuration, Instant},
};
// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use common::*;
use meeting_credential_broker::{
	error::{Error, ErrorKind},
	flows::{CredentialBroker, RequestOptions, RetryPolicy},
};

fn fast_retries(harness: &Harness) -> CredentialBroker {
	harness
		.broker
		.clone()
		.with_retry_policy(RetryPolicy::default().with_base_delay(StdDuration::from_millis(10)))
}

fn api_error(status: u16) -> Error {
	Error::Api { status, message: "upstream".into(), retry_after: None }
}

#[tokio::test]
async fn always_unavailable_operations_are_attempted_max_retries_times() {
	let harness = Harness::start().await;
	let broker = fast_retries(&harness);
	let calls = AtomicU32::new(0);
	let required = scopes("meeting:read");
	let started = Instant::now();
	let err = broker
		.handle_api_errors(&harness.user, &required, || {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err::<(), _>(api_error(503)) }
		})
		.await
		.expect_err("Persistent 503 must be rethrown.");

	assert_eq!(err.status(), Some(503));
	assert_eq!(calls.load(Ordering::SeqCst), broker.retry_policy.max_retries);
	// 20ms after the first attempt, 40ms after the second.
	assert!(started.elapsed() >= StdDuration::from_millis(60));
}

#[tokio::test]
async fn auth_failures_refresh_and_retry() {
	let harness = Harness::start().await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("new", None, 3600, None));
		})
		.await;
	let seeded =
		harness.credential("old", Some("refresh-1"), Duration::hours(1), "meeting:read user:read");

	harness.seed(&seeded).await;

	let calls = AtomicU32::new(0);
	let required = scopes("meeting:read");
	let value = harness
		.broker
		.handle_api_errors(&harness.user, &required, || {
			let call = calls.fetch_add(1, Ordering::SeqCst);

			async move {
				if call == 0 {
					Err(api_error(401))
				} else {
					Ok("done")
				}
			}
		})
		.await
		.expect("Operation should succeed after a refresh.");

	assert_eq!(value, "done");
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	token.assert_calls_async(1).await;

	let reloaded = harness.stored_credential().await;

	assert_eq!(reloaded.access_token.as_ref().map(|token| token.expose()), Some("new"));
}

#[tokio::test]
async fn terminal_refresh_failures_abort_the_loop() {
	let harness = Harness::start().await;
	let _token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;
	let seeded =
		harness.credential("old", Some("refresh-1"), Duration::hours(1), "meeting:read user:read");

	harness.seed(&seeded).await;

	let calls = AtomicU32::new(0);
	let err = harness
		.broker
		.handle_api_errors(&harness.user, &scopes("meeting:read"), || {
			calls.fetch_add(1, Ordering::SeqCst);

			async { Err::<(), _>(api_error(401)) }
		})
		.await
		.expect_err("Revoked refresh token must abort.");

	assert_eq!(err.kind(), ErrorKind::RefreshTokenInvalid);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn insufficient_scopes_abort_before_refreshing() {
	let harness = Harness::start().await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body(token_body("new", None, 3600, None));
		})
		.await;
	let seeded = harness.credential("old", Some("refresh-1"), Duration::hours(1), "meeting:read");

	harness.seed(&seeded).await;

	let err = harness
		.broker
		.handle_api_errors(&harness.user, &scopes("meeting:write"), || async {
			Err::<(), _>(api_error(401))
		})
		.await
		.expect_err("Missing scopes must abort.");

	assert_eq!(err.kind(), ErrorKind::InsufficientScopes);

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn authorized_requests_retry_transient_api_failures() {
	let harness = Harness::start().await;
	let broker = fast_retries(&harness);
	let seeded =
		harness.credential("old", Some("refresh-1"), Duration::hours(1), "meeting:read user:read");

	harness.seed(&seeded).await;

	let mut unavailable = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me/meetings");
			then.status(503).body("Service Unavailable");
		})
		.await;
	let required = scopes("meeting:read");
	let options = RequestOptions::get();
	let err = broker
		.handle_api_errors(&harness.user, &required, || {
			broker.make_authenticated_request(
				&harness.user,
				"users/me/meetings",
				&options,
				&required,
			)
		})
		.await
		.expect_err("Persistent 503 must surface.");

	assert_eq!(err.status(), Some(503));

	unavailable.assert_calls_async(3).await;
	unavailable.delete_async().await;
}
