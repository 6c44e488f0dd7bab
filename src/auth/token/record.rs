//! Refresh token ledger records and their lifecycle.

// self
use crate::{
	_prelude::*,
	auth::{
		RecordId, SubjectId,
		token::{
			refresh::RefreshToken,
			secret::{SecretDigest, TokenSecret},
		},
	},
};

/// Lifecycle status of a refresh record at a given instant.
///
/// `Active` is the only state from which rotation succeeds; every other state is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshStatus {
	/// Usable for exactly one rotation.
	Active,
	/// Replaced by a successor during rotation.
	Rotated,
	/// Revoked by logout or administrative action.
	Revoked,
	/// Past its expiry instant.
	Expired,
}
impl RefreshStatus {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshStatus::Active => "active",
			RefreshStatus::Rotated => "rotated",
			RefreshStatus::Revoked => "revoked",
			RefreshStatus::Expired => "expired",
		}
	}
}
impl Display for RefreshStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Ledger entry describing one issued refresh token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
	/// Unique record identifier (also the public half of the token).
	pub id: RecordId,
	/// Subject that owns the session.
	pub owner: SubjectId,
	/// Digest of the token secret.
	pub secret_digest: SecretDigest,
	/// Issue instant.
	pub issued_at: OffsetDateTime,
	/// Last instant at which the token can still be rotated.
	pub expires_at: OffsetDateTime,
	/// Revocation instant, if revoked or rotated.
	pub revoked_at: Option<OffsetDateTime>,
	/// Successor record created when this one was rotated.
	pub replaced_by: Option<RecordId>,
}
impl RefreshRecord {
	/// Creates an active record for `token`, valid for `ttl` from `issued_at`.
	pub fn issue(
		owner: SubjectId,
		token: &RefreshToken,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Self {
		Self {
			id: token.id.clone(),
			owner,
			secret_digest: token.secret.digest(),
			issued_at,
			expires_at: issued_at + ttl,
			revoked_at: None,
			replaced_by: None,
		}
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> RefreshStatus {
		if self.revoked_at.is_some() {
			return match self.replaced_by {
				Some(_) => RefreshStatus::Rotated,
				None => RefreshStatus::Revoked,
			};
		}
		if instant > self.expires_at {
			return RefreshStatus::Expired;
		}

		RefreshStatus::Active
	}

	/// Returns `true` if the record can be rotated at `instant`.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), RefreshStatus::Active)
	}

	/// Returns `true` if the record was revoked or rotated.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Returns `true` if `secret` is the secret this record was issued for.
	pub fn secret_matches(&self, secret: &TokenSecret) -> bool {
		self.secret_digest.matches(secret)
	}

	/// Marks the record revoked. Keeps the first revocation instant.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at.get_or_insert(instant);
	}

	/// Marks the record rotated into `successor`.
	pub fn rotate_into(&mut self, successor: RecordId, instant: OffsetDateTime) {
		self.revoke(instant);
		self.replaced_by = Some(successor);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record() -> (RefreshToken, RefreshRecord) {
		let token = RefreshToken::generate();
		let owner = SubjectId::new("owner-1").expect("Owner fixture should be valid.");
		let record = RefreshRecord::issue(
			owner,
			&token,
			macros::datetime!(2025-01-01 00:00 UTC),
			Duration::days(7),
		);

		(token, record)
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let (_, mut record) = record();

		assert_eq!(record.status_at(macros::datetime!(2025-01-03 00:00 UTC)), RefreshStatus::Active);
		assert_eq!(record.status_at(macros::datetime!(2025-01-08 00:00 UTC)), RefreshStatus::Active);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-08 00:00:01 UTC)),
			RefreshStatus::Expired
		);

		record.revoke(macros::datetime!(2025-01-02 00:00 UTC));

		assert_eq!(record.status_at(macros::datetime!(2025-01-03 00:00 UTC)), RefreshStatus::Revoked);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-09 00:00 UTC)),
			RefreshStatus::Revoked,
			"Revocation is terminal and outranks expiry."
		);
	}

	#[test]
	fn rotation_is_distinguished_from_revocation() {
		let (_, mut record) = record();
		let successor = RecordId::generate();

		record.rotate_into(successor.clone(), macros::datetime!(2025-01-02 00:00 UTC));

		assert_eq!(record.status_at(macros::datetime!(2025-01-02 00:00 UTC)), RefreshStatus::Rotated);
		assert_eq!(record.replaced_by, Some(successor));
		assert!(record.is_revoked());
	}

	#[test]
	fn repeated_revocation_keeps_first_instant() {
		let (_, mut record) = record();

		record.revoke(macros::datetime!(2025-01-02 00:00 UTC));
		record.revoke(macros::datetime!(2025-01-05 00:00 UTC));

		assert_eq!(record.revoked_at, Some(macros::datetime!(2025-01-02 00:00 UTC)));
	}

	#[test]
	fn record_verifies_its_own_secret_only() {
		let (token, record) = record();

		assert!(record.secret_matches(&token.secret));
		assert!(!record.secret_matches(&TokenSecret::generate()));
	}
}
