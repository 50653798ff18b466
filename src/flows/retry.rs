//! Bounded retries with exponential backoff around arbitrary authorized operations.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, UserId},
	flows::CredentialBroker,
	obs::{self, FlowKind},
};

/// Default number of attempts made by [`CredentialBroker::handle_api_errors`].
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Attempt budget and backoff shape for [`CredentialBroker::handle_api_errors`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one. Zero behaves like one.
	pub max_retries: u32,
	/// Delay unit; attempt `n` (1-based) sleeps `base_delay * 2^n`.
	pub base_delay: StdDuration,
	/// Upper bound for a single sleep, including server `Retry-After` hints.
	pub max_delay: StdDuration,
}
impl RetryPolicy {
	/// Overrides the attempt budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the delay unit.
	pub fn with_base_delay(mut self, base_delay: StdDuration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Overrides the per-sleep cap.
	pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
		self.max_delay = max_delay;

		self
	}

	/// Sleep after failed attempt `attempt` (1-based), honoring a longer `Retry-After` hint.
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		let backoff = self.base_delay.saturating_mul(2_u32.saturating_pow(attempt));
		let hinted = retry_after.filter(|hint| hint.is_positive()).map(|hint| hint.unsigned_abs());

		backoff.max(hinted.unwrap_or_default()).min(self.max_delay)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			base_delay: StdDuration::from_secs(1),
			max_delay: StdDuration::from_secs(30),
		}
	}
}

impl CredentialBroker {
	/// Runs `operation` until it succeeds or the retry budget is spent.
	///
	/// - Authentication failures (HTTP 401, `InvalidCredentials`) force one credential refresh
	///   and retry. `RefreshTokenInvalid` or `InsufficientScopes` from that refresh abort the
	///   loop as is; other refresh failures abort with `RefreshFailed`.
	/// - Retryable failures sleep according to [`RetryPolicy::delay_for`] and retry.
	/// - Anything else is returned immediately.
	///
	/// Attempts are strictly sequential. Once the budget is spent the last error is returned.
	pub async fn handle_api_errors<T, F, Fut>(
		&self,
		user_id: &UserId,
		required: &ScopeSet,
		operation: F,
	) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		self.handle_api_errors_with(self.retry_policy, user_id, required, operation).await
	}

	/// [`CredentialBroker::handle_api_errors`] with a per-call policy instead of the broker's.
	pub async fn handle_api_errors_with<T, F, Fut>(
		&self,
		policy: RetryPolicy,
		user_id: &UserId,
		required: &ScopeSet,
		mut operation: F,
	) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		obs::observe(FlowKind::Retry, "handle_api_errors", async move {
			let max_attempts = policy.max_retries.max(1);
			let mut attempt = 1;

			loop {
				let err = match operation().await {
					Ok(value) => return Ok(value),
					Err(e) => e,
				};

				if attempt >= max_attempts {
					tracing::warn!(
						user_id = %user_id,
						attempts = attempt,
						error_kind = %err.kind(),
						"Retry budget exhausted."
					);

					return Err(err);
				}

				if err.is_auth_error() {
					tracing::warn!(
						user_id = %user_id,
						attempt,
						"Operation was not authorized; refreshing credentials."
					);

					self.reauthenticate(user_id, required).await?;
				} else if err.is_retryable() {
					let delay = policy.delay_for(attempt, err.retry_after());

					tracing::warn!(
						user_id = %user_id,
						attempt,
						delay_ms = delay.as_millis() as u64,
						error_kind = %err.kind(),
						"Retrying after a transient failure."
					);
					tokio::time::sleep(delay).await;
				} else {
					return Err(err);
				}

				attempt += 1;
			}
		})
		.await
	}

	async fn reauthenticate(&self, user_id: &UserId, required: &ScopeSet) -> Result<()> {
		let refreshed = match self.store.load(user_id, self.service()).await {
			Ok(current) => self.force_refresh(&current, required).await,
			Err(e) => Err(e),
		};

		match refreshed {
			Ok(_) => Ok(()),
			Err(e @ (Error::RefreshTokenInvalid { .. } | Error::InsufficientScopes { .. })) =>
				Err(e),
			Err(e) => Err(Error::refresh_failed(e)),
		}
	}
}
