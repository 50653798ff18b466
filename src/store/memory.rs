//! Thread-safe in-memory [`UserRepository`] for local development and tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	store::{StoreError, StoreFuture, UserRecord, UserRepository},
};

type UserMap = Arc<RwLock<HashMap<UserId, UserRecord>>>;

/// Repository that keeps user records in-process.
///
/// Clones share the same map, so a test can keep a handle for assertions while the broker
/// owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserRepository {
	users: UserMap,
	saves: Arc<AtomicUsize>,
	fail_saves: Arc<Mutex<Option<StoreError>>>,
}
impl MemoryUserRepository {
	/// Inserts or replaces a record synchronously.
	pub fn insert(&self, mut record: UserRecord) {
		record.clear_modified();
		self.users.write().insert(record.id.clone(), record);
	}

	/// Snapshot of the stored record.
	pub fn get(&self, user_id: &UserId) -> Option<UserRecord> {
		self.users.read().get(user_id).cloned()
	}

	/// Number of successful `save_user` calls.
	pub fn save_count(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}

	/// Makes every subsequent save fail with `error` until cleared with `None`.
	pub fn fail_saves_with(&self, error: Option<StoreError>) {
		*self.fail_saves.lock() = error;
	}
}
impl UserRepository for MemoryUserRepository {
	fn find_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<UserRecord>> {
		Box::pin(async move { Ok(self.get(user_id)) })
	}

	fn save_user(&self, mut record: UserRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if let Some(error) = self.fail_saves.lock().clone() {
				return Err(error);
			}
			if !record.is_modified() {
				return Ok(());
			}

			record.clear_modified();
			self.users.write().insert(record.id.clone(), record);
			self.saves.fetch_add(1, Ordering::SeqCst);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::ServiceKey, store::StoredToken};

	#[tokio::test]
	async fn saves_are_visible_through_clones() {
		let repository = MemoryUserRepository::default();
		let handle = repository.clone();
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let record = UserRecord::new(user.clone()).with_token(
			ServiceKey::new("zoom").expect("Service fixture should be valid."),
			StoredToken::default(),
		);

		repository.save_user(record).await.expect("Save should succeed.");

		assert_eq!(handle.save_count(), 1);
		assert!(handle.get(&user).is_some());
		assert!(
			repository.find_user(&user).await.expect("Lookup should succeed.").is_some(),
			"Record should be readable after save."
		);
	}

	#[tokio::test]
	async fn unmodified_records_are_not_rewritten() {
		let repository = MemoryUserRepository::default();
		let user = UserId::new("user-1").expect("User fixture should be valid.");

		repository.insert(UserRecord::new(user.clone()));

		let record = repository.get(&user).expect("Seeded record should exist.");

		repository.save_user(record).await.expect("No-op save should succeed.");

		assert_eq!(repository.save_count(), 0);
	}

	#[tokio::test]
	async fn injected_failures_surface() {
		let repository = MemoryUserRepository::default();
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let mut record = UserRecord::new(user);

		record.mark_modified("tokens");
		repository.fail_saves_with(Some(StoreError::Backend { message: "read-only".into() }));

		let err = repository.save_user(record).await.expect_err("Injected failure should surface.");

		assert!(err.is_transient());
		assert_eq!(repository.save_count(), 0);
	}
}
