//! Storage contracts and built-in implementations for credentials and refresh tokens.
//!
//! Both contracts return boxed futures because production backends suspend on I/O. The
//! in-memory implementations resolve immediately.

pub mod credential;
pub mod file;
pub mod memory;

pub use credential::MemoryCredentialStore;
pub use file::FileLedger;
pub use memory::MemoryLedger;

// self
use crate::{
	_prelude::*,
	auth::{Credential, Identity, PasswordHash, RecordId, RefreshRecord, RefreshToken, SubjectId},
};

/// Boxed future returned by storage contracts.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistent record of issued refresh tokens.
///
/// Implementations must make [`RefreshLedger::rotate`] a single critical section: the
/// predecessor is revoked and the successor inserted together, so no reader ever observes
/// both active or neither active.
pub trait RefreshLedger
where
	Self: Send + Sync,
{
	/// Stores a freshly issued record. Fails if the id already exists.
	fn insert(&self, record: RefreshRecord) -> StoreFuture<'_, ()>;

	/// Fetches a record in any state.
	fn find<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<RefreshRecord>>;

	/// Revokes `expected` and inserts `replacement` only if `expected` is still active.
	fn rotate<'a>(
		&'a self,
		expected: &'a RecordId,
		replacement: RefreshRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'a, RotateOutcome>;

	/// Marks a record revoked, returning it if it exists.
	fn revoke<'a>(
		&'a self,
		id: &'a RecordId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshRecord>>;

	/// Revokes every unrevoked record of `owner`, returning how many changed.
	fn revoke_owner<'a>(&'a self, owner: &'a SubjectId, now: OffsetDateTime)
	-> StoreFuture<'a, usize>;

	/// Deletes records past expiry, returning how many were removed.
	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;

	/// Fetches the record `token` points to if it is active and the secret matches.
	fn find_active<'a>(
		&'a self,
		token: &'a RefreshToken,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move {
			let record = self.find(&token.id).await?;

			Ok(record.filter(|r| r.is_active_at(now) && r.secret_matches(&token.secret)))
		})
	}
}

/// Result of a [`RefreshLedger::rotate`] attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotateOutcome {
	/// The predecessor was active; it is now rotated and the successor stored.
	Rotated,
	/// The predecessor exists but was already rotated, revoked, or expired.
	Inactive,
	/// No record matched the expected id.
	Missing,
}

/// Store of registered credentials keyed by identity.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Inserts `credential` unless its identity is taken; the check and insert are atomic.
	fn create(&self, credential: Credential) -> StoreFuture<'_, InsertOutcome>;

	/// Fetches the credential for `identity`.
	fn find<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<Credential>>;

	/// Replaces the password hash, returning the updated credential if it exists.
	fn update_password<'a>(
		&'a self,
		identity: &'a Identity,
		hash: PasswordHash,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<Credential>>;
}

/// Result of an insert-if-absent operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
	/// The value was stored.
	Inserted,
	/// The key already existed; nothing changed.
	Duplicate,
}

/// Error type produced by storage implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
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
	/// A record with the same key already exists.
	#[error("Record `{key}` already exists.")]
	Duplicate {
		/// Conflicting key.
		key: String,
	},
}

/// Applies the rotation rule to the map holding `expected` and the map receiving the
/// successor (`None` when both live in the same map).
pub(crate) fn apply_rotation(
	current: &mut HashMap<RecordId, RefreshRecord>,
	successor: Option<&mut HashMap<RecordId, RefreshRecord>>,
	expected: &RecordId,
	replacement: RefreshRecord,
	now: OffsetDateTime,
) -> Result<RotateOutcome, StoreError> {
	match current.get(expected) {
		None => return Ok(RotateOutcome::Missing),
		Some(existing) if !existing.is_active_at(now) => return Ok(RotateOutcome::Inactive),
		Some(_) => (),
	}

	let successor_id = replacement.id.clone();
	let target = match successor {
		Some(map) => map,
		None => &mut *current,
	};

	if target.contains_key(&successor_id) {
		return Err(StoreError::Duplicate { key: successor_id.to_string() });
	}

	target.insert(successor_id.clone(), replacement);

	if let Some(existing) = current.get_mut(expected) {
		existing.rotate_into(successor_id, now);
	}

	Ok(RotateOutcome::Rotated)
}
