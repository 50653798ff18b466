//! Credential resolution: load, scope check, validity check, refresh on demand.

// self
use crate::{
	_prelude::*,
	auth::{Credential, ScopeSet, UserId},
	flows::{CredentialBroker, ScopedClient, refresh},
	obs::{self, FlowKind},
};

impl CredentialBroker {
	/// Returns a usable credential for `user_id` that grants every scope in `required`.
	///
	/// The decision order is fixed:
	/// 1. lookup failures (`UserNotFound`, `ServiceNotAuthenticated`) propagate unchanged;
	/// 2. missing scopes fail with `InsufficientScopes` before any network call;
	/// 3. a valid credential is returned as is;
	/// 4. a stale credential with a refresh token is refreshed (errors propagate unchanged);
	/// 5. anything else is `InvalidCredentials`.
	pub async fn get_credentials(
		&self,
		user_id: &UserId,
		required: &ScopeSet,
	) -> Result<Credential> {
		obs::observe(FlowKind::Resolve, "get_credentials", async move {
			let credential = self.store.load(user_id, self.service()).await?;

			refresh::ensure_scopes(&credential, required)?;

			if credential.is_valid() {
				tracing::debug!(user_id = %user_id, "Stored credential is valid.");

				return Ok(credential);
			}
			if credential.can_refresh() {
				return self.refresh_credential(&credential).await;
			}

			Err(Error::InvalidCredentials)
		})
		.await
	}

	/// Resolves the named scope bundle and returns a client bound to the user's credential.
	pub async fn client_for(&self, user_id: &UserId, bundle: &str) -> Result<ScopedClient<'_>> {
		let bundle = self.catalog.bundle(bundle)?.clone();
		let credential = self.get_credentials(user_id, &bundle.scopes).await?;

		Ok(ScopedClient::new(self, user_id.clone(), bundle, credential))
	}
}
