//! Password strength policy and the opaque hash/verify capability.

// crates.io
use argon2::{
	Argon2, Params, PasswordHash as ParsedHash, PasswordHasher as _, PasswordVerifier as _,
	password_hash::{self, SaltString},
};
// self
use crate::_prelude::*;

/// Character classes a password must draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
	/// Uppercase letters.
	Upper,
	/// Lowercase letters.
	Lower,
	/// Numeric digits.
	Digit,
	/// Punctuation or symbols.
	Symbol,
}
impl CharacterClass {
	/// Returns a stable label suitable for messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			CharacterClass::Upper => "uppercase letter",
			CharacterClass::Lower => "lowercase letter",
			CharacterClass::Digit => "digit",
			CharacterClass::Symbol => "symbol",
		}
	}

	fn matches(self, c: char) -> bool {
		match self {
			CharacterClass::Upper => c.is_uppercase(),
			CharacterClass::Lower => c.is_lowercase(),
			CharacterClass::Digit => c.is_numeric(),
			CharacterClass::Symbol =>
				!c.is_alphanumeric() && !c.is_whitespace() && !c.is_control(),
		}
	}
}
impl Display for CharacterClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reasons a password is rejected by [`PasswordPolicy::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum PasswordPolicyError {
	/// Fewer characters than the policy minimum.
	#[error("Password must be at least {min} characters long.")]
	TooShort {
		/// Minimum character count.
		min: usize,
	},
	/// More characters than the policy maximum.
	#[error("Password must be at most {max} characters long.")]
	TooLong {
		/// Maximum character count.
		max: usize,
	},
	/// A required character class is absent.
	#[error("Password must contain at least one {class}.")]
	MissingCharacterClass {
		/// The absent class.
		class: CharacterClass,
	},
}

/// Strength policy applied at registration and password change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
	/// Minimum character count.
	pub min_length: usize,
	/// Maximum character count.
	pub max_length: usize,
}
impl PasswordPolicy {
	const REQUIRED_CLASSES: [CharacterClass; 4] = [
		CharacterClass::Upper,
		CharacterClass::Lower,
		CharacterClass::Digit,
		CharacterClass::Symbol,
	];

	/// Checks length bounds and that every required character class is present.
	pub fn validate(&self, password: &str) -> Result<(), PasswordPolicyError> {
		let len = password.chars().count();

		if len < self.min_length {
			return Err(PasswordPolicyError::TooShort { min: self.min_length });
		}
		if len > self.max_length {
			return Err(PasswordPolicyError::TooLong { max: self.max_length });
		}

		for class in Self::REQUIRED_CLASSES {
			if !password.chars().any(|c| class.matches(c)) {
				return Err(PasswordPolicyError::MissingCharacterClass { class });
			}
		}

		Ok(())
	}
}
impl Default for PasswordPolicy {
	fn default() -> Self {
		Self { min_length: 8, max_length: 128 }
	}
}

/// Failure raised by a [`PasswordHasher`] backend.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Password hashing failed: {message}.")]
pub struct HashError {
	/// Backend-supplied description.
	pub message: String,
}
impl From<password_hash::Error> for HashError {
	fn from(e: password_hash::Error) -> Self {
		Self { message: e.to_string() }
	}
}

/// Encoded password hash (PHC string for the default hasher); redacted when formatted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);
impl PasswordHash {
	/// Wraps an encoded hash produced by a [`PasswordHasher`].
	pub fn new(encoded: impl Into<String>) -> Self {
		Self(encoded.into())
	}

	/// Returns the encoded hash.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for PasswordHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PasswordHash").field(&"<redacted>").finish()
	}
}

/// Opaque hash/verify capability consumed by the identity service.
pub trait PasswordHasher
where
	Self: Send + Sync,
{
	/// Hashes a plaintext password with a fresh salt.
	fn hash(&self, password: &str) -> Result<PasswordHash, HashError>;

	/// Returns whether `password` matches `hash`. A mismatch is `Ok(false)`, not an error.
	fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, HashError>;
}

/// Argon2id hasher producing PHC-formatted strings.
#[derive(Clone, Debug, Default)]
pub struct Argon2Hasher {
	params: Params,
}
impl Argon2Hasher {
	const SALT_BYTES: usize = 16;

	/// Creates a hasher with explicit cost parameters.
	pub fn with_params(params: Params) -> Self {
		Self { params }
	}

	fn engine(&self) -> Argon2<'static> {
		Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, self.params.clone())
	}
}
impl PasswordHasher for Argon2Hasher {
	fn hash(&self, password: &str) -> Result<PasswordHash, HashError> {
		let salt_bytes: [u8; Self::SALT_BYTES] = rand::random();
		let salt = SaltString::encode_b64(&salt_bytes)?;
		let encoded = self.engine().hash_password(password.as_bytes(), &salt)?;

		Ok(PasswordHash::new(encoded.to_string()))
	}

	fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, HashError> {
		let parsed = ParsedHash::new(hash.expose())?;

		match self.engine().verify_password(password.as_bytes(), &parsed) {
			Ok(()) => Ok(true),
			Err(password_hash::Error::Password) => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fast_hasher() -> Argon2Hasher {
		Argon2Hasher::with_params(
			Params::new(Params::MIN_M_COST, 1, 1, None)
				.expect("Minimal argon2 parameters should be accepted."),
		)
	}

	#[test]
	fn policy_requires_every_character_class() {
		let policy = PasswordPolicy::default();

		assert_eq!(policy.validate("Abcd123!"), Ok(()));
		assert_eq!(policy.validate("Abc12!"), Err(PasswordPolicyError::TooShort { min: 8 }));
		assert_eq!(
			policy.validate("abcd123!"),
			Err(PasswordPolicyError::MissingCharacterClass { class: CharacterClass::Upper })
		);
		assert_eq!(
			policy.validate("ABCD123!"),
			Err(PasswordPolicyError::MissingCharacterClass { class: CharacterClass::Lower })
		);
		assert_eq!(
			policy.validate("Abcdefg!"),
			Err(PasswordPolicyError::MissingCharacterClass { class: CharacterClass::Digit })
		);
		assert_eq!(
			policy.validate("Abcd1234"),
			Err(PasswordPolicyError::MissingCharacterClass { class: CharacterClass::Symbol })
		);
	}

	#[test]
	fn policy_counts_characters_not_bytes() {
		let policy = PasswordPolicy::default();

		assert_eq!(policy.validate("Äb1!"), Err(PasswordPolicyError::TooShort { min: 8 }));
		assert_eq!(policy.validate("Äbcdé12€"), Ok(()));
	}

	#[test]
	fn argon2_hash_verifies_and_rejects() {
		let hasher = fast_hasher();
		let hash = hasher.hash("Abcd123!").expect("Hashing should succeed.");

		assert!(hash.expose().starts_with("$argon2id$"));
		assert!(hasher.verify("Abcd123!", &hash).expect("Verification should run."));
		assert!(!hasher.verify("Abcd123?", &hash).expect("Verification should run."));
	}

	#[test]
	fn salts_differ_between_hashes() {
		let hasher = fast_hasher();
		let a = hasher.hash("Abcd123!").expect("First hash should succeed.");
		let b = hasher.hash("Abcd123!").expect("Second hash should succeed.");

		assert_ne!(a, b);
	}

	#[test]
	fn malformed_hash_is_an_error() {
		let err = fast_hasher()
			.verify("Abcd123!", &PasswordHash::new("not-a-phc-string"))
			.expect_err("Malformed hashes should not verify.");

		assert!(!err.message.is_empty());
		assert_eq!(format!("{:?}", PasswordHash::new("x")), "PasswordHash(\"<redacted>\")");
	}
}
