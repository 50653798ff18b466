//! Refresh-token orchestration with per-user singleflight guards and metrics.
//!
//! Concurrent refreshes for the same user and service serialize on one guard. Whoever gets
//! the guard first performs the `grant_type=refresh_token` exchange and persists the result;
//! later holders re-read the record, see that the token they held was already replaced, and
//! return the stored credential without calling the provider again.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeSet},
	flows::{CredentialBroker, CredentialKey, common},
	obs::{self, FlowKind},
};

impl CredentialBroker {
	/// Refreshes `credential` through the token endpoint and persists the result.
	///
	/// If the stored access token no longer matches `credential.access_token` once the guard
	/// is held, another task already refreshed it and the stored credential is returned as is.
	/// A rejected refresh (`RefreshTokenInvalid` or any other failure) leaves the stored record
	/// untouched.
	pub async fn refresh_credential(&self, credential: &Credential) -> Result<Credential> {
		obs::observe(FlowKind::Refresh, "refresh_credential", async move {
			self.refresh_metrics.record_attempt();

			let result = self.refresh_exclusive(credential).await;

			match &result {
				Ok(_) => self.refresh_metrics.record_success(),
				Err(_) => self.refresh_metrics.record_failure(),
			}

			result
		})
		.await
	}

	/// Re-resolves the user's credential after `rejected` was refused by the API and refreshes
	/// it regardless of its expiry.
	///
	/// Scope sufficiency is re-checked first so a refresh is never attempted for a grant that
	/// cannot satisfy `required`.
	pub async fn force_refresh(
		&self,
		rejected: &Credential,
		required: &ScopeSet,
	) -> Result<Credential> {
		let current = self.store.load(&rejected.user_id, &rejected.service).await?;

		ensure_scopes(&current, required)?;

		self.refresh_credential(rejected).await
	}

	async fn refresh_exclusive(&self, held: &Credential) -> Result<Credential> {
		let key = CredentialKey::new(held.user_id.clone(), held.service.clone());
		let guard = common::flow_guard(self, &key);
		let result = {
			let _singleflight = guard.lock().await;

			self.refresh_locked(held, &key).await
		};

		common::release_flow_guard(self, &key, guard);

		result
	}

	async fn refresh_locked(&self, held: &Credential, key: &CredentialKey) -> Result<Credential> {
		let mut current = self.store.load(&held.user_id, &held.service).await?;

		if current.access_token.is_some()
			&& current.access_token != held.access_token
			&& current.is_valid()
		{
			tracing::debug!(
				credential = %key,
				"Reusing credential refreshed by a concurrent caller."
			);
			self.refresh_metrics.record_reuse();

			return Ok(current);
		}

		let Some(refresh_token) = current.refresh_token.clone().filter(|token| !token.is_blank())
		else {
			return Err(Error::InvalidCredentials);
		};

		self.refresh_metrics.record_exchange();

		let grant = self.token_endpoint().refresh(&refresh_token).await.inspect_err(|e| {
			tracing::warn!(
				credential = %key,
				error_kind = %e.kind(),
				retryable = e.is_retryable(),
				"Token refresh failed."
			);
		})?;
		let outcome = current.apply_refresh(grant, OffsetDateTime::now_utc());

		self.store.save(&current).await?;

		tracing::info!(
			credential = %key,
			rotated_refresh_token = outcome.rotated_refresh_token,
			retained_scopes = outcome.retained_scopes,
			"Refreshed access token."
		);

		Ok(current)
	}
}

/// Fails with `InsufficientScopes` when `credential` lacks any scope in `required`.
pub(crate) fn ensure_scopes(credential: &Credential, required: &ScopeSet) -> Result<()> {
	let missing = credential.missing_scopes(required);

	if missing.is_empty() { Ok(()) } else { Err(Error::InsufficientScopes { missing }) }
}
