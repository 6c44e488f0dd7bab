//! Thread-safe in-memory [`RefreshLedger`] with per-shard locking.

// self
use crate::{
	_prelude::*,
	auth::{RecordId, RefreshRecord, SubjectId},
	shard::Shards,
	store::{self, RefreshLedger, RotateOutcome, StoreError, StoreFuture},
};

type LedgerShards = Arc<Shards<RecordId, RefreshRecord>>;

/// Ledger that keeps records in-process. Records do not survive a restart; use
/// [`FileLedger`](crate::store::FileLedger) when they must.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger(LedgerShards);
impl MemoryLedger {
	/// Creates a ledger partitioned into `shards` independently locked maps.
	pub fn with_shards(shards: usize) -> Self {
		Self(Arc::new(Shards::new(shards)))
	}

	/// Number of records currently held, in any state.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if the ledger holds no records.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn insert_now(shards: &LedgerShards, record: RefreshRecord) -> Result<(), StoreError> {
		let mut guard = shards.shard(&record.id).write();

		if guard.contains_key(&record.id) {
			return Err(StoreError::Duplicate { key: record.id.to_string() });
		}

		guard.insert(record.id.clone(), record);

		Ok(())
	}

	fn rotate_now(
		shards: &LedgerShards,
		expected: &RecordId,
		replacement: RefreshRecord,
		now: OffsetDateTime,
	) -> Result<RotateOutcome, StoreError> {
		let current = shards.index(expected);
		let successor = shards.index(&replacement.id);

		if current == successor {
			let mut guard = shards.at(current).write();

			return store::apply_rotation(&mut guard, None, expected, replacement, now);
		}

		// Lock in index order so concurrent rotations across the same pair cannot deadlock.
		let (mut low, mut high) =
			(shards.at(current.min(successor)).write(), shards.at(current.max(successor)).write());
		let (current_map, successor_map) =
			if current < successor { (&mut *low, &mut *high) } else { (&mut *high, &mut *low) };

		store::apply_rotation(current_map, Some(successor_map), expected, replacement, now)
	}

	fn revoke_now(
		shards: &LedgerShards,
		id: &RecordId,
		now: OffsetDateTime,
	) -> Option<RefreshRecord> {
		let mut guard = shards.shard(id).write();

		guard.get_mut(id).map(|record| {
			record.revoke(now);

			record.clone()
		})
	}

	fn revoke_owner_now(shards: &LedgerShards, owner: &SubjectId, now: OffsetDateTime) -> usize {
		let mut revoked = 0;

		for shard in shards.iter() {
			for record in shard.write().values_mut() {
				if &record.owner == owner && !record.is_revoked() {
					record.revoke(now);

					revoked += 1;
				}
			}
		}

		revoked
	}

	fn sweep_now(shards: &LedgerShards, now: OffsetDateTime) -> usize {
		shards
			.iter()
			.map(|shard| {
				let mut guard = shard.write();
				let before = guard.len();

				guard.retain(|_, record| now <= record.expires_at);

				before - guard.len()
			})
			.sum()
	}
}
impl RefreshLedger for MemoryLedger {
	fn insert(&self, record: RefreshRecord) -> StoreFuture<'_, ()> {
		let shards = self.0.clone();

		Box::pin(async move { Self::insert_now(&shards, record) })
	}

	fn find<'a>(&'a self, id: &'a RecordId) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move { Ok(self.0.shard(id).read().get(id).cloned()) })
	}

	fn rotate<'a>(
		&'a self,
		expected: &'a RecordId,
		replacement: RefreshRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'a, RotateOutcome> {
		Box::pin(async move { Self::rotate_now(&self.0, expected, replacement, now) })
	}

	fn revoke<'a>(
		&'a self,
		id: &'a RecordId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move { Ok(Self::revoke_now(&self.0, id, now)) })
	}

	fn revoke_owner<'a>(
		&'a self,
		owner: &'a SubjectId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, usize> {
		Box::pin(async move { Ok(Self::revoke_owner_now(&self.0, owner, now)) })
	}

	fn sweep(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move { Ok(Self::sweep_now(&self.0, now)) })
	}
}
