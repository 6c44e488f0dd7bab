// self
use crate::{
	_prelude::*,
	error::ConfigError,
	signer::{SigningAlgorithm, SigningError, TokenSigner},
};

/// Lifetimes and algorithm used by [`TokenService`](crate::service::TokenService).
///
/// Deserialization fills absent fields with defaults and rejects non-positive lifetimes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenConfigFields")]
pub struct TokenConfig {
	/// Lifetime of access tokens.
	pub access_ttl: Duration,
	/// Lifetime of refresh tokens.
	pub refresh_ttl: Duration,
	/// HMAC algorithm access tokens are signed with.
	pub algorithm: SigningAlgorithm,
}
impl TokenConfig {
	const DEFAULT_ACCESS_TTL: Duration = Duration::minutes(15);
	const DEFAULT_REFRESH_TTL: Duration = Duration::days(7);

	/// Overrides the access token lifetime. Non-positive values fall back to the default.
	pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
		self.access_ttl = if ttl.is_positive() { ttl } else { Self::DEFAULT_ACCESS_TTL };

		self
	}

	/// Overrides the refresh token lifetime. Non-positive values fall back to the default.
	pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
		self.refresh_ttl = if ttl.is_positive() { ttl } else { Self::DEFAULT_REFRESH_TTL };

		self
	}

	/// Overrides the signing algorithm.
	pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
		self.algorithm = algorithm;

		self
	}

	/// Builds a signer for the configured algorithm over `key`.
	pub fn signer(&self, key: impl AsRef<[u8]>) -> Result<TokenSigner, SigningError> {
		TokenSigner::new(self.algorithm, key)
	}
}
impl Default for TokenConfig {
	fn default() -> Self {
		Self {
			access_ttl: Self::DEFAULT_ACCESS_TTL,
			refresh_ttl: Self::DEFAULT_REFRESH_TTL,
			algorithm: SigningAlgorithm::default(),
		}
	}
}

#[derive(Deserialize)]
#[serde(default)]
struct TokenConfigFields {
	access_ttl: Duration,
	refresh_ttl: Duration,
	algorithm: SigningAlgorithm,
}
impl Default for TokenConfigFields {
	fn default() -> Self {
		let TokenConfig { access_ttl, refresh_ttl, algorithm } = TokenConfig::default();

		Self { access_ttl, refresh_ttl, algorithm }
	}
}
impl TryFrom<TokenConfigFields> for TokenConfig {
	type Error = ConfigError;

	fn try_from(fields: TokenConfigFields) -> Result<Self, Self::Error> {
		let TokenConfigFields { access_ttl, refresh_ttl, algorithm } = fields;

		ConfigError::check(access_ttl.is_positive(), "access_ttl", "positive")?;
		ConfigError::check(refresh_ttl.is_positive(), "refresh_ttl", "positive")?;

		Ok(Self { access_ttl, refresh_ttl, algorithm })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_follow_short_access_long_refresh() {
		let config = TokenConfig::default();

		assert_eq!(config.access_ttl, Duration::minutes(15));
		assert_eq!(config.refresh_ttl, Duration::days(7));
		assert_eq!(config.algorithm, SigningAlgorithm::Hs256);
	}

	#[test]
	fn builders_reject_non_positive_lifetimes() {
		let config = TokenConfig::default()
			.with_access_ttl(Duration::ZERO)
			.with_refresh_ttl(Duration::days(-1))
			.with_algorithm(SigningAlgorithm::Hs512);

		assert_eq!(config, TokenConfig { algorithm: SigningAlgorithm::Hs512, ..Default::default() });
	}

	#[test]
	fn partial_config_deserializes_with_defaults() {
		let config: TokenConfig =
			serde_json::from_str(r#"{"algorithm":"HS384"}"#).expect("Config should deserialize.");

		assert_eq!(config.algorithm, SigningAlgorithm::Hs384);
		assert_eq!(config.access_ttl, Duration::minutes(15));

		let signer = config.signer([7_u8; 32]).expect("A 32-byte key should be accepted.");

		assert_eq!(signer.algorithm(), SigningAlgorithm::Hs384);
	}

	#[test]
	fn deserialization_rejects_non_positive_lifetimes() {
		let zero = serde_json::to_value(Duration::ZERO).expect("Duration should serialize.");
		let negative =
			serde_json::to_value(Duration::minutes(-5)).expect("Duration should serialize.");

		for (field, value) in [("access_ttl", zero), ("refresh_ttl", negative)] {
			let fields = serde_json::Map::from_iter([(field.to_owned(), value)]);
			let err = serde_json::from_value::<TokenConfig>(fields.into())
				.expect_err("Non-positive lifetimes must be rejected.");

			assert!(err.to_string().contains(field), "{err}");
		}

		let round_trip: TokenConfig = serde_json::from_value(
			serde_json::to_value(TokenConfig::default()).expect("Config should serialize."),
		)
		.expect("Serialized defaults should deserialize.");

		assert_eq!(round_trip, TokenConfig::default());
	}
}
