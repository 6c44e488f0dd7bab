//! Service-boundary error types shared by the token service, identity service, and gate.
//!
//! Component errors ([`StoreError`](crate::store::StoreError),
//! [`SigningError`](crate::signer::SigningError), [`HashError`](crate::auth::HashError)) are
//! folded into one of five kinds before they reach a caller. `Unauthorized` and `Internal`
//! never carry detail in their message; `Internal` keeps the original failure reachable via
//! [`std::error::Error::source`] so it can be logged.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{HashError, IdentifierError, IdentityPolicyError, PasswordPolicyError},
	rate_limit::RetryDirective,
	signer::SigningError,
	store::StoreError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public service APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed or missing input the caller can correct.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Credential or token failure. Deliberately carries no detail.
	#[error("Unauthorized.")]
	Unauthorized,
	/// The identity is already registered.
	#[error("Identity is already registered.")]
	Conflict,
	/// The client exhausted its request budget.
	#[error("Rate limit exceeded.")]
	RateLimited(RetryDirective),
	/// Misconfiguration or backend failure; details stay in the source chain.
	#[error("Internal error.")]
	Internal(#[source] InternalError),
}
impl Error {
	/// HTTP status code conventionally associated with this error kind.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::Unauthorized => StatusCode::UNAUTHORIZED,
			Self::Conflict => StatusCode::CONFLICT,
			Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
			Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable machine-readable code for this error kind.
	pub const fn code(&self) -> &'static str {
		match self {
			Self::Validation(_) => "validation_error",
			Self::Unauthorized => "unauthorized",
			Self::Conflict => "conflict",
			Self::RateLimited(_) => "rate_limited",
			Self::Internal(_) => "internal",
		}
	}

	/// Builds the response payload a transport layer should serialize for this error.
	pub fn body(&self) -> ErrorBody {
		let (reason, retry_after_secs) = match self {
			Self::RateLimited(directive) =>
				(directive.reason.clone(), Some(directive.retry_after_secs())),
			_ => (None, None),
		};

		ErrorBody { error: self.code(), message: self.to_string(), reason, retry_after_secs }
	}
}
impl From<InternalError> for Error {
	fn from(e: InternalError) -> Self {
		Self::Internal(e)
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		Self::Internal(e.into())
	}
}
impl From<SigningError> for Error {
	fn from(e: SigningError) -> Self {
		Self::Internal(e.into())
	}
}
impl From<HashError> for Error {
	fn from(e: HashError) -> Self {
		Self::Internal(e.into())
	}
}
impl From<IdentifierError> for Error {
	fn from(e: IdentifierError) -> Self {
		Self::Validation(e.into())
	}
}
impl From<IdentityPolicyError> for Error {
	fn from(e: IdentityPolicyError) -> Self {
		Self::Validation(e.into())
	}
}
impl From<PasswordPolicyError> for Error {
	fn from(e: PasswordPolicyError) -> Self {
		Self::Validation(e.into())
	}
}

/// User-correctable input failures surfaced with detail.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// A required field was empty.
	#[error("The {field} field is required.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// The identity does not satisfy the identity policy.
	#[error(transparent)]
	InvalidIdentity(#[from] IdentityPolicyError),
	/// The password does not satisfy the strength policy.
	#[error(transparent)]
	WeakPassword(#[from] PasswordPolicyError),
}

/// Failures that are logged with detail but surfaced to callers as [`Error::Internal`].
#[derive(Debug, ThisError)]
pub enum InternalError {
	/// Storage backend failure.
	#[error("{0}")]
	Storage(#[from] StoreError),
	/// Signing key misconfiguration.
	#[error("{0}")]
	Signing(#[from] SigningError),
	/// Password hashing backend failure.
	#[error("{0}")]
	Hashing(#[from] HashError),
}

/// A configuration value outside its accepted range, reported while deserializing.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Configuration field `{field}` must be {requirement}.")]
pub struct ConfigError {
	/// Offending field.
	pub field: &'static str,
	/// Accepted range, phrased for the message.
	pub requirement: &'static str,
}
impl ConfigError {
	pub(crate) fn check(
		ok: bool,
		field: &'static str,
		requirement: &'static str,
	) -> Result<(), Self> {
		if ok { Ok(()) } else { Err(Self { field, requirement }) }
	}
}

/// Serializable error payload handed to transport layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
	/// Machine-readable error code.
	pub error: &'static str,
	/// Human-readable message (never contains internal detail).
	pub message: String,
	/// Machine-readable detail for rate-limited responses.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	/// Seconds the client should wait before retrying, for rate-limited responses.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub retry_after_secs: Option<u64>,
}
