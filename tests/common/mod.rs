//! Fixtures shared by the integration tests: an httpmock provider, an in-memory repository, and a
//! broker wired to both.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use httpmock::MockServer;
// self
use meeting_credential_broker::{
	auth::{Credential, ScopeSet, ServiceKey, UserId},
	config::ServiceConfig,
	flows::CredentialBroker,
	http::ReqwestHttpClient,
	provider::ProviderDescriptor,
	reqwest::Client,
	store::{AesGcmCipher, CredentialStore, MemoryUserRepository, StoredToken, UserRecord},
	url::Url,
};
use time::{Duration, OffsetDateTime};

pub const CLIENT_ID: &str = "client-meeting";
pub const CLIENT_SECRET: &str = "secret-meeting";
pub const CIPHER_KEY: [u8; 32] = [42; 32];

pub struct Harness {
	pub server: MockServer,
	pub broker: CredentialBroker,
	pub repository: MemoryUserRepository,
	pub user: UserId,
}
impl Harness {
	pub async fn start() -> Self {
		let server = MockServer::start_async().await;
		let repository = MemoryUserRepository::default();
		let cipher = Arc::new(AesGcmCipher::new(&CIPHER_KEY));
		let store = CredentialStore::new(Arc::new(repository.clone()), cipher);
		let config =
			ServiceConfig::new(CLIENT_ID, CLIENT_SECRET, "https://app.example.com/callback");
		let broker = CredentialBroker::new(store, descriptor(&server), config)
			.with_http_client(test_http_client());

		Self { server, broker, repository, user: user() }
	}

	/// Persists `credential` through the broker's store, creating the user record first.
	pub async fn seed(&self, credential: &Credential) {
		if self.repository.get(&credential.user_id).is_none() {
			self.repository.insert(UserRecord::new(credential.user_id.clone()));
		}

		self.broker.store.save(credential).await.expect("Seeding the credential should succeed.");
	}

	/// Raw (still encrypted) token sub-record of the default user.
	pub fn stored_token(&self) -> StoredToken {
		self.repository
			.get(&self.user)
			.and_then(|record| record.token(&service()).cloned())
			.expect("Seeded token sub-record should exist.")
	}

	/// Decrypted credential of the default user as currently persisted.
	pub async fn stored_credential(&self) -> Credential {
		self.broker
			.store
			.load(&self.user, &service())
			.await
			.expect("Seeded credential should load.")
	}

	/// Credential for the default user with the given tokens and scopes.
	pub fn credential(
		&self,
		access: &str,
		refresh: Option<&str>,
		expires_in: Duration,
		granted: &str,
	) -> Credential {
		let credential = Credential::new(self.user.clone(), service())
			.with_access_token(access)
			.with_expiry(OffsetDateTime::now_utc() + expires_in)
			.with_scopes(scopes(granted));

		match refresh {
			Some(refresh) => credential.with_refresh_token(refresh),
			None => credential,
		}
	}
}

pub fn user() -> UserId {
	UserId::new("user-1").expect("User fixture should be valid.")
}

pub fn service() -> ServiceKey {
	ServiceKey::new("zoom").expect("Service fixture should be valid.")
}

pub fn scopes(raw: &str) -> ScopeSet {
	raw.parse().expect("Scope fixture should parse.")
}

pub fn basic_auth_header() -> String {
	format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")))
}

pub fn token_body(
	access: &str,
	refresh: Option<&str>,
	expires_in: u32,
	scope: Option<&str>,
) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "bearer",
		"expires_in": expires_in,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}
	if let Some(scope) = scope {
		body["scope"] = scope.into();
	}

	body.to_string()
}

fn descriptor(server: &MockServer) -> ProviderDescriptor {
	let url = |path: &str| Url::parse(&server.url(path)).expect("Mock URL should parse.");

	ProviderDescriptor::builder(service())
		.authorization_endpoint(url("/oauth/authorize"))
		.token_endpoint(url("/oauth/token"))
		.api_base(url("/v2/"))
		.build()
		.expect("Mock provider descriptor should build.")
}

/// Reqwest client that accepts the self-signed certificates httpmock serves over TLS.
fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.build()
		.expect("Failed to build insecure reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}
