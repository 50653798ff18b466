//! Per-user credential material and the validity rules that drive refresh decisions.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, ServiceKey, UserId, token::secret::TokenSecret},
};

/// Proactive refresh margin subtracted from the expiry instant.
pub const REFRESH_BUFFER: Duration = Duration::minutes(5);

/// Lifecycle position of a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
	/// No access token is held.
	Missing,
	/// Access token is usable and outside the refresh buffer.
	Valid,
	/// Access token has not expired yet but is inside the refresh buffer.
	Expiring,
	/// Expiry instant has passed.
	Expired,
}
impl CredentialStatus {
	/// Returns a stable label suitable for logs and diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Missing => "missing",
			Self::Valid => "valid",
			Self::Expiring => "expiring",
			Self::Expired => "expired",
		}
	}
}
impl Display for CredentialStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Successful token-endpoint payload, already parsed and validated.
#[derive(Clone, Debug)]
pub struct RefreshGrant {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Lifetime reported by the provider.
	pub expires_in: Option<Duration>,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes reported by the provider, when the response carried any.
	pub scope: Option<ScopeSet>,
}

/// What changed when a [`RefreshGrant`] was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
	/// The provider rotated the refresh token.
	pub rotated_refresh_token: bool,
	/// The response omitted scopes and the previous set was kept.
	pub retained_scopes: bool,
}

/// One user's token material for a single external service.
///
/// Built fresh from the persisted record on every resolution; secrets are only ever held
/// decrypted in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Owner of the credential.
	pub user_id: UserId,
	/// External service the tokens were issued by.
	pub service: ServiceKey,
	/// Short-lived bearer secret.
	pub access_token: Option<TokenSecret>,
	/// Long-lived secret used to mint new access tokens.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry of the access token, if known.
	pub expiry: Option<OffsetDateTime>,
	/// Scopes granted to the access token.
	pub scopes: ScopeSet,
}
impl Credential {
	/// Creates an empty credential for the user/service pair.
	pub fn new(user_id: UserId, service: ServiceKey) -> Self {
		Self {
			user_id,
			service,
			access_token: None,
			refresh_token: None,
			expiry: None,
			scopes: ScopeSet::default(),
		}
	}

	/// Sets the access token.
	pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the absolute expiry instant.
	pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.expiry = Some(expiry);

		self
	}

	/// Sets the granted scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Computes the lifecycle status at `now`.
	pub fn status_at(&self, now: OffsetDateTime) -> CredentialStatus {
		if self.access_token.is_none() {
			return CredentialStatus::Missing;
		}

		match self.expiry {
			None => CredentialStatus::Valid,
			Some(expiry) if now >= expiry => CredentialStatus::Expired,
			Some(expiry) if now >= expiry - REFRESH_BUFFER => CredentialStatus::Expiring,
			Some(_) => CredentialStatus::Valid,
		}
	}

	/// Status using the current UTC clock.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Access token present and, when an expiry is known, `now` is before the refresh buffer.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.status_at(now), CredentialStatus::Valid)
	}

	/// [`Credential::is_valid_at`] against the current clock.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Expiry is known and `now` has reached it; independent of the access token.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expiry.is_some_and(|expiry| now >= expiry)
	}

	/// [`Credential::is_expired_at`] against the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns true when a refresh token is available.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|token| !token.is_blank())
	}

	/// Time left until expiry at `now`; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.expiry.map(|expiry| expiry - now)
	}

	/// Scopes from `required` that this credential was not granted.
	pub fn missing_scopes(&self, required: &ScopeSet) -> Vec<String> {
		required.missing_from(&self.scopes)
	}

	/// Applies a refresh response in place.
	///
	/// The refresh token and scopes are only replaced when the response carries new values;
	/// a response without `expires_in` leaves the expiry unknown.
	pub fn apply_refresh(&mut self, grant: RefreshGrant, now: OffsetDateTime) -> RefreshOutcome {
		let RefreshGrant { access_token, expires_in, refresh_token, scope } = grant;
		let rotated_refresh_token = match refresh_token {
			Some(token) if !token.is_blank() => {
				let rotated = self.refresh_token.as_ref() != Some(&token);

				self.refresh_token = Some(token);

				rotated
			},
			_ => false,
		};
		let retained_scopes = match scope {
			Some(scope) if !scope.is_empty() => {
				self.scopes = scope;

				false
			},
			_ => true,
		};

		self.access_token = Some(access_token);
		self.expiry = expires_in.map(|lifetime| now + lifetime);

		RefreshOutcome { rotated_refresh_token, retained_scopes }
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("user_id", &self.user_id)
			.field("service", &self.service)
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expiry", &self.expiry)
			.field("scopes", &self.scopes)
			.finish()
	}
}
