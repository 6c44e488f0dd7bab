//! Format rules for login identities chosen at registration.

// self
use crate::_prelude::*;

const LOCAL_MAX_LEN: usize = 64;
const DOMAIN_MAX_LEN: usize = 255;
const TLD_MIN_LEN: usize = 2;

/// Reasons an identity is rejected by [`IdentityPolicy::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentityPolicyError {
	/// The identity is not a plausible email address.
	#[error("Identity must be a valid email address ({reason}).")]
	InvalidEmail {
		/// Which part of the address is wrong.
		reason: &'static str,
	},
}

/// Registration-time identity rules.
///
/// With `require_email` set, identities must look like `local@domain.tld`: the local part
/// uses `A-Z a-z 0-9 . _ % + -` without leading, trailing, or doubled dots, and the domain
/// is dot-separated labels of letters, digits, and hyphens ending in an alphabetic label of
/// at least two characters. Deliverability is not checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPolicy {
	/// Whether identities must be email addresses.
	pub require_email: bool,
}
impl IdentityPolicy {
	/// Accepts any identity that passes generic identifier validation.
	pub fn any() -> Self {
		Self { require_email: false }
	}

	/// Checks `identity` against the policy.
	pub fn validate(&self, identity: &str) -> Result<(), IdentityPolicyError> {
		if self.require_email { validate_email(identity) } else { Ok(()) }
	}
}
impl Default for IdentityPolicy {
	fn default() -> Self {
		Self { require_email: true }
	}
}

fn validate_email(value: &str) -> Result<(), IdentityPolicyError> {
	let invalid = |reason| Err(IdentityPolicyError::InvalidEmail { reason });
	let Some((local, domain)) = value.split_once('@') else {
		return invalid("missing @");
	};

	if domain.contains('@') {
		return invalid("more than one @");
	}
	if local.is_empty() || local.len() > LOCAL_MAX_LEN {
		return invalid("local part length");
	}
	if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
		return invalid("local part dots");
	}
	if !local.chars().all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c)) {
		return invalid("local part characters");
	}
	if domain.is_empty() || domain.len() > DOMAIN_MAX_LEN {
		return invalid("domain length");
	}

	let labels = domain.split('.').collect::<Vec<_>>();

	if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
		return invalid("domain labels");
	}
	if !domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
		return invalid("domain characters");
	}

	let tld = labels[labels.len() - 1];

	if tld.len() < TLD_MIN_LEN || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
		return invalid("top-level domain");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn plausible_addresses_pass() {
		let policy = IdentityPolicy::default();

		for email in ["a@b.com", "first.last+tag@mail.example.org", "x_y%z@sub-domain.io"] {
			assert_eq!(policy.validate(email), Ok(()), "`{email}` should be accepted.");
		}
	}

	#[test]
	fn malformed_addresses_fail() {
		let policy = IdentityPolicy::default();

		for email in [
			"not-an-email",
			"a@b",
			"@b.com",
			"a@@b.com",
			"a@b@c.com",
			".a@b.com",
			"a..b@c.com",
			"a@.com",
			"a@b..com",
			"a@b.c",
			"a@b.c0m",
			"a!@b.com",
			"a@b_c.com",
		] {
			assert!(
				matches!(policy.validate(email), Err(IdentityPolicyError::InvalidEmail { .. })),
				"`{email}` should be rejected."
			);
		}
	}

	#[test]
	fn email_requirement_can_be_lifted() {
		assert_eq!(IdentityPolicy::any().validate("not-an-email"), Ok(()));

		let policy: IdentityPolicy = serde_json::from_str(r#"{"require_email":false}"#)
			.expect("Policy should deserialize.");

		assert_eq!(policy, IdentityPolicy::any());
	}
}
