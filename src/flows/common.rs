//! Shared helpers for flow implementations (credential keys and singleflight guards).

// self
use crate::{
	_prelude::*,
	auth::{ServiceKey, UserId},
	flows::CredentialBroker,
};

/// Identifies one user's credential for one service.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialKey {
	/// Owner of the credential.
	pub user_id: UserId,
	/// Service the credential belongs to.
	pub service: ServiceKey,
}
impl CredentialKey {
	/// Builds a key for the user/service pair.
	pub fn new(user_id: UserId, service: ServiceKey) -> Self {
		Self { user_id, service }
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.user_id, self.service)
	}
}

/// Returns (and creates on demand) the singleflight guard for a credential key.
pub(crate) fn flow_guard(broker: &CredentialBroker, key: &CredentialKey) -> Arc<AsyncMutex<()>> {
	let mut guards = broker.flow_guards.lock();

	guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Drops the guard entry once no other task is waiting on it.
///
/// `guard` must be the caller's clone from [`flow_guard`]; the entry is kept while any other
/// task still holds a clone.
pub(crate) fn release_flow_guard(
	broker: &CredentialBroker,
	key: &CredentialKey,
	guard: Arc<AsyncMutex<()>>,
) {
	let mut guards = broker.flow_guards.lock();
	let idle = guards
		.get(key)
		.is_some_and(|current| Arc::ptr_eq(current, &guard) && Arc::strong_count(&guard) == 2);

	if idle {
		guards.remove(key);
	}
}

impl CredentialBroker {
	/// Number of credential keys with a refresh in flight or queued.
	pub fn refreshes_in_flight(&self) -> usize {
		self.flow_guards.lock().len()
	}
}
