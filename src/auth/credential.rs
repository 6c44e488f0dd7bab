//! Registered credentials owned by the credential store.

// self
use crate::{
	_prelude::*,
	auth::{Identity, PasswordHash, SubjectId},
};

/// A registered user's login identity and password hash.
///
/// `identity` and `subject` never change after creation; the hash changes only through an
/// explicit password change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Unique login identity.
	pub identity: Identity,
	/// Subject identifier embedded in issued tokens.
	pub subject: SubjectId,
	/// Encoded password hash.
	pub password_hash: PasswordHash,
	/// Registration instant.
	pub created_at: OffsetDateTime,
	/// Last password change, if any.
	pub password_changed_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Creates a credential with a freshly generated subject identifier.
	pub fn register(identity: Identity, password_hash: PasswordHash) -> Self {
		Self {
			identity,
			subject: SubjectId::generate(),
			password_hash,
			created_at: OffsetDateTime::now_utc(),
			password_changed_at: None,
		}
	}
}
