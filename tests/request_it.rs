mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
use time::Duration;
// self
use common::*;
use meeting_credential_broker::{
	error::{Error, ErrorKind},
	flows::RequestOptions,
};

async fn seed_valid(harness: &Harness, access: &str) {
	let seeded =
		harness.credential(access, Some("refresh-1"), Duration::hours(1), "meeting:read user:read");

	harness.seed(&seeded).await;
}

#[tokio::test]
async fn rejected_tokens_are_refreshed_once_and_the_call_repeated() {
	let harness = Harness::start().await;
	let rejected = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me").header("authorization", "Bearer old");
			then.status(401).body(r#"{"code":124,"message":"Invalid access token."}"#);
		})
		.await;
	let accepted = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me").header("authorization", "Bearer new");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"id":"u-1","email":"host@example.com"}"#);
		})
		.await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("new", None, 3600, None));
		})
		.await;

	seed_valid(&harness, "old").await;

	let response = harness
		.broker
		.make_authenticated_request(
			&harness.user,
			"users/me",
			&RequestOptions::get(),
			&scopes("user:read"),
		)
		.await
		.expect("Call should succeed after one refresh.");
	let body: Value = response.json().expect("Profile body should be JSON.");

	assert_eq!(response.status, 200);
	assert_eq!(body["email"], "host@example.com");

	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn a_second_rejection_is_surfaced_without_further_refreshes() {
	let harness = Harness::start().await;
	let api = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me");
			then.status(401).body("Invalid access token.");
		})
		.await;
	let token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("new", None, 3600, None));
		})
		.await;

	seed_valid(&harness, "old").await;

	let err = harness
		.broker
		.make_authenticated_request(
			&harness.user,
			"/users/me",
			&RequestOptions::get(),
			&scopes("user:read"),
		)
		.await
		.expect_err("Persistent 401 must fail.");

	assert!(matches!(err, Error::Api { status: 401, .. }));

	api.assert_calls_async(2).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn failed_recovery_is_reported_as_refresh_failed() {
	let harness = Harness::start().await;
	let _api = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me");
			then.status(401);
		})
		.await;
	let _token = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;

	seed_valid(&harness, "old").await;

	let err = harness
		.broker
		.make_authenticated_request(
			&harness.user,
			"users/me",
			&RequestOptions::get(),
			&scopes("user:read"),
		)
		.await
		.expect_err("Recovery with a revoked refresh token must fail.");

	assert_eq!(err.kind(), ErrorKind::RefreshFailed);
	assert!(err.requires_reauthentication(), "The wrapped invalid grant is terminal.");
	assert!(matches!(
		err,
		Error::RefreshFailed { ref source } if source.kind() == ErrorKind::RefreshTokenInvalid
	));
}

#[tokio::test]
async fn throttled_calls_carry_retry_hints() {
	let harness = Harness::start().await;
	let _api = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me/meetings");
			then.status(429).header("retry-after", "3").body("Too many requests.");
		})
		.await;

	seed_valid(&harness, "old").await;

	let err = harness
		.broker
		.make_authenticated_request(
			&harness.user,
			"users/me/meetings",
			&RequestOptions::get(),
			&scopes("meeting:read"),
		)
		.await
		.expect_err("429 must fail.");

	assert!(err.is_retryable());
	assert_eq!(err.status(), Some(429));
	assert_eq!(err.retry_after(), Some(Duration::seconds(3)));
}

#[tokio::test]
async fn options_shape_the_outgoing_request() {
	let harness = Harness::start().await;
	let create = harness
		.server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v2/users/me/meetings")
				.query_param("type", "scheduled")
				.header("authorization", "Bearer old")
				.json_body(json!({ "topic": "Standup", "duration": 15 }));
			then.status(201)
				.header("content-type", "application/json")
				.body(r#"{"id":85746065}"#);
		})
		.await;

	seed_valid(&harness, "old").await;

	let options = RequestOptions::post()
		.with_query("type", "scheduled")
		.with_json(json!({ "topic": "Standup", "duration": 15 }));
	let response = harness
		.broker
		.make_authenticated_request(&harness.user, "users/me/meetings", &options, &scopes(""))
		.await
		.expect("Meeting creation should succeed.");

	assert_eq!(response.status, 201);

	create.assert_calls_async(1).await;
}

#[tokio::test]
async fn foreign_absolute_urls_are_rejected() {
	let harness = Harness::start().await;

	seed_valid(&harness, "old").await;

	let err = harness
		.broker
		.make_authenticated_request(
			&harness.user,
			"https://attacker.example.com/v2/users/me",
			&RequestOptions::get(),
			&scopes(""),
		)
		.await
		.expect_err("Tokens must never be sent to another origin.");

	assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn scoped_clients_use_their_bundle() {
	let harness = Harness::start().await;
	let list = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/users/me/meetings").header("authorization", "Bearer old");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"meetings":[]}"#);
		})
		.await;

	seed_valid(&harness, "old").await;

	let client = harness
		.broker
		.client_for(&harness.user, "meeting_read")
		.await
		.expect("Bundle should resolve.");
	let response = client
		.request_with_retries("users/me/meetings", &RequestOptions::get())
		.await
		.expect("Listing meetings should succeed.");

	assert_eq!(response.text(), r#"{"meetings":[]}"#);

	list.assert_calls_async(1).await;
}
