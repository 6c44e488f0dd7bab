//! In-memory [`CredentialStore`] sharded by identity.

// self
use crate::{
	_prelude::*,
	auth::{Credential, Identity, PasswordHash},
	shard::Shards,
	store::{CredentialStore, InsertOutcome, StoreFuture},
};

/// Credential store that keeps registrations in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore(Arc<Shards<Identity, Credential>>);
impl MemoryCredentialStore {
	/// Number of registered identities.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if nobody has registered yet.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn create(&self, credential: Credential) -> StoreFuture<'_, InsertOutcome> {
		Box::pin(async move {
			let mut guard = self.0.shard(&credential.identity).write();

			if guard.contains_key(&credential.identity) {
				return Ok(InsertOutcome::Duplicate);
			}

			guard.insert(credential.identity.clone(), credential);

			Ok(InsertOutcome::Inserted)
		})
	}

	fn find<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move { Ok(self.0.shard(identity).read().get(identity).cloned()) })
	}

	fn update_password<'a>(
		&'a self,
		identity: &'a Identity,
		hash: PasswordHash,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<Credential>> {
		Box::pin(async move {
			let mut guard = self.0.shard(identity).write();

			Ok(guard.get_mut(identity).map(|credential| {
				credential.password_hash = hash;
				credential.password_changed_at = Some(now);

				credential.clone()
			}))
		})
	}
}
