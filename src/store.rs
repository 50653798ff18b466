//! Per-user token persistence: the repository contract, the persisted record shape, and the
//! [`CredentialStore`] that encrypts on write and decrypts on read.

pub mod cipher;
pub mod file;
pub mod memory;

pub use cipher::*;
pub use file::FileUserRepository;
pub use memory::MemoryUserRepository;

// crates.io
use serde::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeSet, ServiceKey, TokenSecret, UserId},
};

/// Boxed future returned by [`UserRepository`] implementations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding user records.
pub trait UserRepository
where
	Self: Send + Sync,
{
	/// Fetches the user record, if present.
	fn find_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<UserRecord>>;

	/// Persists the whole user record.
	fn save_user(&self, record: UserRecord) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`UserRepository`] and [`TokenCipher`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Persisted data could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Encryption or decryption of a token secret failed.
	#[error("Cipher failure: {message}.")]
	Cipher {
		/// Human-readable error payload.
		message: String,
	},
	/// The user record disappeared between load and save.
	#[error("User record `{user_id}` no longer exists.")]
	MissingUser {
		/// Identifier of the vanished record.
		user_id: String,
	},
}
impl StoreError {
	/// Returns true when the same operation may succeed if attempted again.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Backend { .. })
	}
}

/// User record as held by the repository.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
	/// Record identifier.
	pub id: UserId,
	/// Token sub-records keyed by service.
	#[serde(default)]
	pub tokens: BTreeMap<ServiceKey, StoredToken>,
	#[serde(skip)]
	modified: BTreeSet<String>,
}
impl UserRecord {
	/// Creates a record without any connected services.
	pub fn new(id: UserId) -> Self {
		Self { id, tokens: BTreeMap::new(), modified: BTreeSet::new() }
	}

	/// Adds a token sub-record; convenient when seeding repositories.
	pub fn with_token(mut self, service: ServiceKey, token: StoredToken) -> Self {
		self.set_token(service, token);

		self
	}

	/// Token sub-record for the service, if the user connected it.
	pub fn token(&self, service: &ServiceKey) -> Option<&StoredToken> {
		self.tokens.get(service)
	}

	/// Replaces the token sub-record and flags it as modified.
	pub fn set_token(&mut self, service: ServiceKey, token: StoredToken) {
		self.mark_modified(format!("tokens.{service}"));
		self.tokens.insert(service, token);
	}

	/// Flags a field path as dirty so repositories can persist it.
	pub fn mark_modified(&mut self, path: impl Into<String>) {
		self.modified.insert(path.into());
	}

	/// Field paths modified since the record was loaded.
	pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
		self.modified.iter().map(String::as_str)
	}

	/// Returns true when any field was modified since the record was loaded.
	pub fn is_modified(&self) -> bool {
		!self.modified.is_empty()
	}

	/// Clears the dirty set after a successful write.
	pub fn clear_modified(&mut self) {
		self.modified.clear();
	}
}

/// Persisted token sub-record: `user.tokens[service]`.
///
/// Both legacy expiry names and both scope names/shapes are accepted on read and folded into
/// the canonical fields, so writes only ever emit `expiry_date` and a space-joined `scope`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStoredToken")]
pub struct StoredToken {
	/// Encrypted access token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	/// Encrypted refresh token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	/// Expiry instant in epoch milliseconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expiry_date: Option<i64>,
	/// Granted scopes.
	#[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_joined")]
	pub scope: Option<ScopeSet>,
}
impl StoredToken {
	/// Granted scopes, empty when none were recorded.
	pub fn scope_set(&self) -> ScopeSet {
		self.scope.clone().unwrap_or_default()
	}
}
impl From<RawStoredToken> for StoredToken {
	fn from(raw: RawStoredToken) -> Self {
		Self {
			access_token: raw.access_token,
			refresh_token: raw.refresh_token,
			expiry_date: raw.expiry_date.or(raw.expires_at),
			scope: raw.scope.or(raw.scopes),
		}
	}
}

#[derive(Deserialize)]
struct RawStoredToken {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expiry_date: Option<i64>,
	#[serde(default)]
	expires_at: Option<i64>,
	#[serde(default)]
	scope: Option<ScopeSet>,
	#[serde(default)]
	scopes: Option<ScopeSet>,
}

/// Loads and saves [`Credential`]s through a [`UserRepository`], encrypting secrets at rest.
#[derive(Clone)]
pub struct CredentialStore {
	repository: Arc<dyn UserRepository>,
	cipher: Arc<dyn TokenCipher>,
}
impl CredentialStore {
	/// Creates a store over the repository and cipher.
	pub fn new(repository: Arc<dyn UserRepository>, cipher: Arc<dyn TokenCipher>) -> Self {
		Self { repository, cipher }
	}

	/// Reads the user's token sub-record for `service` and decrypts it.
	pub async fn load(&self, user_id: &UserId, service: &ServiceKey) -> Result<Credential> {
		let record = self
			.repository
			.find_user(user_id)
			.await?
			.ok_or_else(|| Error::UserNotFound { user_id: user_id.to_string() })?;
		let stored = record.token(service).ok_or_else(|| Error::ServiceNotAuthenticated {
			user_id: user_id.to_string(),
			service: service.to_string(),
		})?;

		self.decode(user_id, service, stored)
	}

	/// Read-modify-write of the credential's sub-record.
	///
	/// The refresh token is only written when the credential holds one, so a missing value
	/// never erases a persisted secret.
	pub async fn save(&self, credential: &Credential) -> Result<()> {
		let save_failed = |source| Error::TokenSaveFailed { source };
		let mut record = self
			.repository
			.find_user(&credential.user_id)
			.await
			.map_err(save_failed)?
			.ok_or_else(|| {
				save_failed(StoreError::MissingUser { user_id: credential.user_id.to_string() })
			})?;
		let mut stored = record.token(&credential.service).cloned().unwrap_or_default();

		stored.access_token = self.encrypt(credential.access_token.as_ref()).map_err(save_failed)?;

		if let Some(refresh) =
			self.encrypt(credential.refresh_token.as_ref()).map_err(save_failed)?
		{
			stored.refresh_token = Some(refresh);
		}

		stored.expiry_date = credential.expiry.map(to_epoch_millis);
		stored.scope = (!credential.scopes.is_empty()).then(|| credential.scopes.clone());

		record.set_token(credential.service.clone(), stored);
		record.mark_modified(format!("tokens.{}.expiry_date", credential.service));

		self.repository.save_user(record).await.map_err(save_failed)
	}

	fn decode(
		&self,
		user_id: &UserId,
		service: &ServiceKey,
		stored: &StoredToken,
	) -> Result<Credential> {
		let expiry = stored.expiry_date.map(from_epoch_millis).transpose()?;

		Ok(Credential {
			user_id: user_id.clone(),
			service: service.clone(),
			access_token: self.decrypt(stored.access_token.as_deref())?,
			refresh_token: self.decrypt(stored.refresh_token.as_deref())?,
			expiry,
			scopes: stored.scope_set(),
		})
	}

	fn encrypt(&self, secret: Option<&TokenSecret>) -> Result<Option<String>, StoreError> {
		secret.map(|secret| self.cipher.encrypt(secret.expose())).transpose()
	}

	fn decrypt(&self, ciphertext: Option<&str>) -> Result<Option<TokenSecret>, StoreError> {
		match ciphertext {
			Some(value) if !value.is_empty() =>
				self.cipher.decrypt(value).map(|plain| Some(TokenSecret::new(plain))),
			_ => Ok(None),
		}
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialStore(..)")
	}
}

/// Converts an instant into epoch milliseconds.
pub fn to_epoch_millis(instant: OffsetDateTime) -> i64 {
	(instant.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Converts epoch milliseconds into an instant.
pub fn from_epoch_millis(millis: i64) -> Result<OffsetDateTime, StoreError> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).map_err(|e| {
		StoreError::Serialization { message: format!("Expiry {millis} is out of range: {e}") }
	})
}

fn serialize_joined<S>(scope: &Option<ScopeSet>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match scope {
		Some(scope) => serializer.serialize_str(&scope.normalized()),
		None => serializer.serialize_none(),
	}
}
