//! File-backed [`UserRepository`] that keeps a JSON snapshot of every user record.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	store::{StoreError, StoreFuture, UserRecord, UserRepository},
};

/// Persists user records to a JSON file after each modifying save.
#[derive(Clone, Debug)]
pub struct FileUserRepository {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<UserId, UserRecord>>>,
}
impl FileUserRepository {
	/// Opens (or creates) a repository at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist_locked(&self, contents: &BTreeMap<UserId, UserRecord>) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let snapshot = contents.values().collect::<Vec<_>>();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize user snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| backend("create", &tmp_path, e))?;

			file.write_all(&serialized).map_err(|e| backend("write", &tmp_path, e))?;
			file.sync_all().map_err(|e| backend("sync", &tmp_path, e))?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| backend("replace", &self.path, e))
	}
}
impl UserRepository for FileUserRepository {
	fn find_user<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<UserRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(user_id).cloned()) })
	}

	fn save_user(&self, mut record: UserRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if !record.is_modified() {
				return Ok(());
			}

			record.clear_modified();

			let mut guard = self.inner.write();
			let previous = guard.insert(record.id.clone(), record.clone());

			if let Err(e) = self.persist_locked(&guard) {
				match previous {
					Some(previous) => guard.insert(record.id, previous),
					None => guard.remove(&record.id),
				};

				return Err(e);
			}

			Ok(())
		})
	}
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<UserId, UserRecord>, StoreError> {
	if !path.exists() {
		return Ok(BTreeMap::new());
	}

	let bytes = fs::read(path).map_err(|e| backend("read", path, e))?;

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(BTreeMap::new());
	}

	let records: Vec<UserRecord> =
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

	Ok(records.into_iter().map(|record| (record.id.clone(), record)).collect())
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| backend("create directory", parent, e))?;
	}

	Ok(())
}

fn backend(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}
