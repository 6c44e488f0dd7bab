//! Redacting secret wrappers and constant-time digests for refresh token material.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	const GENERATED_BYTES: usize = 32;

	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Draws 256 bits of entropy and encodes them as URL-safe base64.
	pub fn generate() -> Self {
		let bytes: [u8; Self::GENERATED_BYTES] = rand::random();

		Self(URL_SAFE_NO_PAD.encode(bytes))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Hashes the secret for storage; the plaintext never reaches the ledger.
	pub fn digest(&self) -> SecretDigest {
		let mut hasher = Sha256::new();

		hasher.update(self.0.as_bytes());

		SecretDigest(URL_SAFE_NO_PAD.encode(hasher.finalize()))
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// SHA-256 digest of a [`TokenSecret`], compared in constant time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretDigest(String);
impl SecretDigest {
	/// Returns `true` if `secret` hashes to this digest.
	pub fn matches(&self, secret: &TokenSecret) -> bool {
		let candidate = secret.digest();

		bool::from(self.0.as_bytes().ct_eq(candidate.0.as_bytes()))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn digest_matches_only_its_secret() {
		let secret = TokenSecret::generate();
		let digest = secret.digest();

		assert!(digest.matches(&secret));
		assert!(!digest.matches(&TokenSecret::generate()));
		assert!(!digest.0.contains(secret.expose()));
	}

	#[test]
	fn generated_secrets_carry_full_entropy() {
		let secret = TokenSecret::generate();

		assert_eq!(secret.expose().len(), 43);
		assert_ne!(secret, TokenSecret::generate());
	}
}
