//! Opaque refresh token wire form: `<record id>.<secret>`.

// self
use crate::{
	_prelude::*,
	auth::{RecordId, token::secret::TokenSecret},
};

/// Errors raised while parsing a presented refresh token.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshTokenParseError {
	/// The separator between record id and secret is missing.
	#[error("Refresh token is missing its separator.")]
	MissingSeparator,
	/// The record id part is not a valid identifier.
	#[error("Refresh token carries an invalid record id.")]
	InvalidRecordId,
	/// The secret part is empty.
	#[error("Refresh token carries an empty secret.")]
	EmptySecret,
}

/// A refresh token as handed to clients. Only the digest of `secret` is ever persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken {
	/// Ledger record the token points to.
	pub id: RecordId,
	/// Bearer secret proving possession.
	pub secret: TokenSecret,
}
impl RefreshToken {
	const SEPARATOR: char = '.';

	/// Mints a token with a fresh record id and secret.
	pub fn generate() -> Self {
		Self { id: RecordId::generate(), secret: TokenSecret::generate() }
	}

	/// Parses the wire form produced by [`RefreshToken::to_wire`].
	pub fn parse(raw: &str) -> Result<Self, RefreshTokenParseError> {
		let (id, secret) =
			raw.split_once(Self::SEPARATOR).ok_or(RefreshTokenParseError::MissingSeparator)?;
		let id = RecordId::new(id).map_err(|_| RefreshTokenParseError::InvalidRecordId)?;

		if secret.is_empty() {
			return Err(RefreshTokenParseError::EmptySecret);
		}

		Ok(Self { id, secret: TokenSecret::new(secret) })
	}

	/// Encodes the token for delivery to the client.
	pub fn to_wire(&self) -> String {
		format!("{}{}{}", self.id, Self::SEPARATOR, self.secret.expose())
	}
}
impl Debug for RefreshToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshToken")
			.field("id", &self.id)
			.field("secret", &"<redacted>")
			.finish()
	}
}
