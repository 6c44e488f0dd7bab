//! Stateless HMAC signing and verification of access token claims.
//!
//! Tokens are compact JWTs. A signer is bound to exactly one [`SigningAlgorithm`]; the header
//! is inspected before the MAC is checked, so a token minted for another algorithm is refused
//! outright and a header naming `none` or an unknown algorithm does not even parse.
//! Expiry is checked against a caller-supplied instant rather than by the JWT library.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
// self
use crate::{_prelude::*, auth::AccessClaims};

/// HMAC algorithms a signer can be configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
	/// HMAC with SHA-256.
	#[default]
	#[serde(rename = "HS256")]
	Hs256,
	/// HMAC with SHA-384.
	#[serde(rename = "HS384")]
	Hs384,
	/// HMAC with SHA-512.
	#[serde(rename = "HS512")]
	Hs512,
}
impl SigningAlgorithm {
	/// Returns the JOSE `alg` header value.
	pub const fn as_str(self) -> &'static str {
		match self {
			SigningAlgorithm::Hs256 => "HS256",
			SigningAlgorithm::Hs384 => "HS384",
			SigningAlgorithm::Hs512 => "HS512",
		}
	}
}
impl Display for SigningAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<SigningAlgorithm> for Algorithm {
	fn from(value: SigningAlgorithm) -> Self {
		match value {
			SigningAlgorithm::Hs256 => Algorithm::HS256,
			SigningAlgorithm::Hs384 => Algorithm::HS384,
			SigningAlgorithm::Hs512 => Algorithm::HS512,
		}
	}
}

/// Key misconfiguration or encoding failures raised while signing. Never recoverable by the
/// caller.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SigningError {
	/// The key is shorter than the minimum accepted length.
	#[error("Signing key has {len} bytes; at least {min} are required.")]
	WeakKey {
		/// Supplied key length.
		len: usize,
		/// Minimum key length.
		min: usize,
	},
	/// Header or claims could not be encoded.
	#[error("Token could not be encoded: {message}.")]
	Encode {
		/// Encoder-supplied description.
		message: String,
	},
}

/// Reasons a presented access token fails verification.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// The token is not a structurally valid JWT, or its header names no known algorithm.
	#[error("Token is malformed.")]
	MalformedToken(#[source] jsonwebtoken::errors::Error),
	/// The signed payload is not a valid claims object.
	#[error("Token claims are malformed.")]
	MalformedClaims(#[source] serde_path_to_error::Error<serde_json::Error>),
	/// The header names an algorithm other than the configured one.
	#[error("Token uses unsupported algorithm `{alg:?}`.")]
	UnsupportedAlgorithm {
		/// Algorithm named by the token header.
		alg: Algorithm,
	},
	/// The MAC does not match.
	#[error("Token signature is invalid.")]
	InvalidSignature,
	/// The token is past its expiry instant.
	#[error("Token has expired.")]
	Expired,
}
impl TokenError {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(&self) -> &'static str {
		match self {
			TokenError::MalformedToken(_) | TokenError::MalformedClaims(_) => "malformed",
			TokenError::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
			TokenError::InvalidSignature => "invalid_signature",
			TokenError::Expired => "expired",
		}
	}
}
impl From<jsonwebtoken::errors::Error> for TokenError {
	fn from(e: jsonwebtoken::errors::Error) -> Self {
		match e.kind() {
			ErrorKind::InvalidSignature => TokenError::InvalidSignature,
			ErrorKind::ExpiredSignature => TokenError::Expired,
			_ => TokenError::MalformedToken(e),
		}
	}
}

/// Signs and verifies [`AccessClaims`] with a shared HMAC key.
#[derive(Clone)]
pub struct TokenSigner {
	algorithm: SigningAlgorithm,
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	validation: Validation,
}
impl TokenSigner {
	/// Minimum accepted key length in bytes.
	pub const MIN_KEY_LEN: usize = 32;

	/// Creates a signer bound to `algorithm`, rejecting keys shorter than
	/// [`TokenSigner::MIN_KEY_LEN`].
	pub fn new(algorithm: SigningAlgorithm, key: impl AsRef<[u8]>) -> Result<Self, SigningError> {
		let key = key.as_ref();

		if key.len() < Self::MIN_KEY_LEN {
			return Err(SigningError::WeakKey { len: key.len(), min: Self::MIN_KEY_LEN });
		}

		let mut validation = Validation::new(algorithm.into());

		validation.algorithms = vec![algorithm.into()];
		validation.leeway = 0;
		// Expiry is evaluated by `verify_at` against the caller's clock.
		validation.validate_exp = false;

		Ok(Self {
			algorithm,
			encoding_key: EncodingKey::from_secret(key),
			decoding_key: DecodingKey::from_secret(key),
			validation,
		})
	}

	/// Algorithm this signer emits and accepts.
	pub fn algorithm(&self) -> SigningAlgorithm {
		self.algorithm
	}

	/// Encodes and signs `claims`.
	pub fn sign(&self, claims: &AccessClaims) -> Result<String, SigningError> {
		jsonwebtoken::encode(&Header::new(self.algorithm.into()), claims, &self.encoding_key)
			.map_err(|e| SigningError::Encode { message: e.to_string() })
	}

	/// Verifies `token` against the wall clock.
	pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
		self.verify_at(token, OffsetDateTime::now_utc())
	}

	/// Verifies `token` as of `now`: structure, algorithm, MAC, claims, then expiry.
	pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<AccessClaims, TokenError> {
		let header = jsonwebtoken::decode_header(token).map_err(TokenError::MalformedToken)?;

		if header.alg != Algorithm::from(self.algorithm) {
			return Err(TokenError::UnsupportedAlgorithm { alg: header.alg });
		}

		let data = jsonwebtoken::decode::<serde_json::Value>(
			token,
			&self.decoding_key,
			&self.validation,
		)?;
		let claims: AccessClaims =
			serde_path_to_error::deserialize(data.claims).map_err(TokenError::MalformedClaims)?;

		if claims.is_expired_at(now) {
			return Err(TokenError::Expired);
		}

		Ok(claims)
	}
}
impl Debug for TokenSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSigner")
			.field("algorithm", &self.algorithm)
			.field("key", &"<redacted>")
			.finish()
	}
}
