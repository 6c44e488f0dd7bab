//! Simple file-backed [`RefreshLedger`] for small single-process deployments whose records
//! must survive restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{RecordId, RefreshRecord, SubjectId},
	store::{self, RefreshLedger, RotateOutcome, StoreError, StoreFuture},
};

type Records = HashMap<RecordId, RefreshRecord>;

/// Persists ledger records to a JSON file after each mutation.
///
/// Every mutation rewrites the snapshot through a temporary file and an atomic rename while
/// the write lock is held, so a rotation is durable as a unit or not at all.
///
/// The write is synchronous: it blocks the polling thread and serializes every mutation
/// behind one lock, and its cost grows with the number of live records. Deployments with
/// many sessions or concurrent logins should put a database behind [`RefreshLedger`]
/// instead.
#[derive(Clone, Debug)]
pub struct FileLedger {
	path: PathBuf,
	inner: Arc<RwLock<Records>>,
}
impl FileLedger {
	/// Opens (or creates) a ledger at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<Records, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let records: Vec<RefreshRecord> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(records.into_iter().map(|record| (record.id.clone(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create ledger directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Records) -> Result<(), StoreError> {
		let snapshot: Vec<&RefreshRecord> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize ledger snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `mutate` under the write lock, persisting only if it reports a change and
	/// rolling the in-memory state back if persistence fails.
	fn mutate<T>(
		&self,
		mutate: impl FnOnce(&mut Records) -> Result<(T, bool), StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let before = guard.clone();
		let (value, changed) = mutate(&mut *guard)?;

		if changed && let Err(e) = self.persist_locked(&guard) {
			*guard = before;

			return Err(e);
		}

		Ok(value)
	}
}
impl RefreshLedger for FileLedger {
	fn insert(&self, record: RefreshRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|records| {
				if records.contains_key(&record.id) {
					return Err(StoreError::Duplicate { key: record.id.to_string() });
				}

				records.insert(record.id.clone(), record);

				Ok(((), true))
			})
		})
	}

	fn find<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(id).cloned()) })
	}

	fn rotate<'a>(
		&'a self,
		expected: &'a RecordId,
		replacement: RefreshRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'a, RotateOutcome> {
		Box::pin(async move {
			self.mutate(|records| {
				let outcome = store::apply_rotation(records, None, expected, replacement, now)?;

				Ok((outcome, outcome == RotateOutcome::Rotated))
			})
		})
	}

	fn revoke<'a>(
		&'a self,
		id: &'a RecordId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move {
			self.mutate(|records| match records.get_mut(id) {
				Some(record) => {
					let changed = !record.is_revoked();

					record.revoke(now);

					Ok((Some(record.clone()), changed))
				},
				None => Ok((None, false)),
			})
		})
	}

	fn revoke_owner<'a>(
		&'a self,
		owner: &'a SubjectId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, usize> {
		Box::pin(async move {
			self.mutate(|records| {
				let mut revoked = 0;

				for record in records.values_mut() {
					if &record.owner == owner && !record.is_revoked() {
						record.revoke(now);

						revoked += 1;
					}
				}

				Ok((revoked, revoked > 0))
			})
		})
	}

	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			self.mutate(|records| {
				let before = records.len();

				records.retain(|_, record| now <= record.expires_at);

				let removed = before - records.len();

				Ok((removed, removed > 0))
			})
		})
	}
}
