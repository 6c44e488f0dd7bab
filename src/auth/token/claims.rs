//! Claims carried by short-lived access tokens.

// self
use crate::{_prelude::*, auth::SubjectId};

/// Payload of an access token; serialized with JWT-registered claim names.
///
/// Instants are truncated to whole seconds at construction so a signed token decodes to
/// exactly the claims that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
	/// Subject the token was issued to.
	#[serde(rename = "sub")]
	pub subject: SubjectId,
	/// Issue instant.
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Last instant at which the token is still valid.
	#[serde(rename = "exp", with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl AccessClaims {
	/// Builds claims valid from `issued_at` for `ttl`.
	pub fn new(subject: SubjectId, issued_at: OffsetDateTime, ttl: Duration) -> Self {
		let issued_at = truncate_to_seconds(issued_at);

		Self { subject, issued_at, expires_at: issued_at + ttl }
	}

	/// Returns `true` once `instant` is strictly past the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant > self.expires_at
	}
}

fn truncate_to_seconds(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(i64::from(instant.nanosecond()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn subject() -> SubjectId {
		SubjectId::new("subject-1").expect("Subject fixture should be valid.")
	}

	#[test]
	fn claims_serialize_with_registered_names() {
		let claims = AccessClaims::new(
			subject(),
			macros::datetime!(2025-01-01 00:00 UTC),
			Duration::minutes(15),
		);
		let json = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(json["sub"], "subject-1");
		assert_eq!(json["iat"], 1_735_689_600);
		assert_eq!(json["exp"], 1_735_690_500);
	}

	#[test]
	fn expiry_is_exclusive_of_the_boundary() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let claims = AccessClaims::new(subject(), issued, Duration::minutes(15));

		assert!(!claims.is_expired_at(macros::datetime!(2025-01-01 00:15 UTC)));
		assert!(claims.is_expired_at(macros::datetime!(2025-01-01 00:15:01 UTC)));
	}

	#[test]
	fn subsecond_precision_is_dropped() {
		let issued = macros::datetime!(2025-01-01 00:00:00.750 UTC);
		let claims = AccessClaims::new(subject(), issued, Duration::seconds(1));

		assert_eq!(claims.issued_at, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(claims.expires_at, macros::datetime!(2025-01-01 00:00:01 UTC));
	}
}
