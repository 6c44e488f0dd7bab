//! Access/refresh pair issuance, validation, rotation, and revocation.
//!
//! [`TokenService`] pairs a stateless [`TokenSigner`] for access tokens with a
//! [`RefreshLedger`] for refresh tokens. Rotation is delegated to the ledger's
//! compare-and-swap, so two callers racing on one refresh token produce exactly one new
//! pair; the loser sees [`Error::Unauthorized`]. Every rejection is reported to callers
//! uniformly while its cause goes to [`obs::record_rejection`].

mod config;
mod metrics;

pub use config::TokenConfig;
pub use metrics::TokenMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, RefreshRecord, RefreshStatus, RefreshToken, SubjectId},
	obs::{self, OpKind},
	signer::{SigningError, TokenSigner},
	store::{RefreshLedger, RotateOutcome},
};

/// Tokens handed to a client after login or rotation.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
	/// Subject both tokens belong to.
	pub subject: SubjectId,
	/// Signed access token.
	pub access_token: String,
	/// Last instant the access token is accepted.
	#[serde(with = "time::serde::timestamp")]
	pub access_expires_at: OffsetDateTime,
	/// Opaque refresh token.
	pub refresh_token: String,
	/// Last instant the refresh token can be rotated.
	#[serde(with = "time::serde::timestamp")]
	pub refresh_expires_at: OffsetDateTime,
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("subject", &self.subject)
			.field("access_token", &"<redacted>")
			.field("access_expires_at", &self.access_expires_at)
			.field("refresh_token", &"<redacted>")
			.field("refresh_expires_at", &self.refresh_expires_at)
			.finish()
	}
}

/// Orchestrates the token lifecycle. Cloning is cheap; clones share the ledger and metrics.
#[derive(Clone)]
pub struct TokenService {
	signer: TokenSigner,
	ledger: Arc<dyn RefreshLedger>,
	config: TokenConfig,
	metrics: Arc<TokenMetrics>,
}
impl TokenService {
	/// Creates a service around an existing signer. `config.algorithm` is not consulted;
	/// the signer's own algorithm applies.
	pub fn new(signer: TokenSigner, ledger: Arc<dyn RefreshLedger>, config: TokenConfig) -> Self {
		Self { signer, ledger, config, metrics: Default::default() }
	}

	/// Creates a service whose signer uses `config.algorithm` over `key`.
	pub fn from_key(
		key: impl AsRef<[u8]>,
		ledger: Arc<dyn RefreshLedger>,
		config: TokenConfig,
	) -> Result<Self, SigningError> {
		let signer = config.signer(key)?;

		Ok(Self::new(signer, ledger, config))
	}

	/// Active configuration.
	pub fn config(&self) -> &TokenConfig {
		&self.config
	}

	/// Outcome counters.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Issues a new access/refresh pair for `owner`.
	pub async fn issue_pair(&self, owner: &SubjectId) -> Result<TokenPair> {
		self.issue_pair_at(owner, OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenService::issue_pair`] with an explicit clock.
	pub async fn issue_pair_at(&self, owner: &SubjectId, now: OffsetDateTime) -> Result<TokenPair> {
		const KIND: OpKind = OpKind::Issue;

		obs::observe(KIND, "issue_pair", async move {
			let (pair, record) = self.mint(KIND, owner, now)?;

			self.ledger.insert(record).await.map_err(obs::internal(KIND))?;
			self.metrics.record_issued();

			Ok(pair)
		})
		.await
	}

	/// Verifies `token` against the wall clock and returns its subject.
	pub fn validate_access(&self, token: &str) -> Result<SubjectId> {
		self.validate_access_at(token, OffsetDateTime::now_utc())
	}

	/// Verifies `token` as of `now`. Every failure is [`Error::Unauthorized`].
	pub fn validate_access_at(&self, token: &str, now: OffsetDateTime) -> Result<SubjectId> {
		self.claims_at(token, now).map(|claims| claims.subject)
	}

	/// Verifies `token` as of `now` and returns all of its claims.
	pub fn claims_at(&self, token: &str, now: OffsetDateTime) -> Result<AccessClaims> {
		const KIND: OpKind = OpKind::Validate;

		obs::observe_sync(KIND, "claims_at", || {
			self.signer.verify_at(token, now).map_err(|e| self.reject(KIND, &e.as_str()))
		})
	}

	/// Exchanges an active refresh token for a new pair, retiring the presented one.
	pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair> {
		self.rotate_at(refresh_token, OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenService::rotate`] with an explicit clock.
	pub async fn rotate_at(&self, refresh_token: &str, now: OffsetDateTime) -> Result<TokenPair> {
		const KIND: OpKind = OpKind::Rotate;

		obs::observe(KIND, "rotate", async move {
			let presented = RefreshToken::parse(refresh_token).map_err(|e| self.reject(KIND, &e))?;
			let current = self.ledger.find(&presented.id).await.map_err(obs::internal(KIND))?;
			let current = match current {
				Some(record) if !record.secret_matches(&presented.secret) =>
					return Err(self.reject(KIND, &"secret_mismatch")),
				Some(record) => record,
				None => return Err(self.reject(KIND, &"unknown_record")),
			};
			let status = current.status_at(now);

			if status != RefreshStatus::Active {
				return Err(self.reject(KIND, &status));
			}

			let (pair, successor) = self.mint(KIND, &current.owner, now)?;
			let outcome = self
				.ledger
				.rotate(&presented.id, successor, now)
				.await
				.map_err(obs::internal(KIND))?;

			match outcome {
				RotateOutcome::Rotated => {
					self.metrics.record_rotated();

					Ok(pair)
				},
				RotateOutcome::Inactive => Err(self.reject(KIND, &"lost_rotation_race")),
				RotateOutcome::Missing => Err(self.reject(KIND, &"swept_during_rotation")),
			}
		})
		.await
	}

	/// Revokes a refresh token. Malformed, unknown, and already revoked tokens are ignored.
	pub async fn revoke(&self, refresh_token: &str) -> Result<()> {
		self.revoke_at(refresh_token, OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenService::revoke`] with an explicit clock.
	pub async fn revoke_at(&self, refresh_token: &str, now: OffsetDateTime) -> Result<()> {
		const KIND: OpKind = OpKind::Revoke;

		obs::observe(KIND, "revoke", async move {
			let Ok(presented) = RefreshToken::parse(refresh_token) else {
				obs::record_rejection(KIND, &"malformed");

				return Ok(());
			};
			let Some(record) =
				self.ledger.find(&presented.id).await.map_err(obs::internal(KIND))?
			else {
				obs::record_rejection(KIND, &"unknown_record");

				return Ok(());
			};

			// Knowing a record id alone must not be enough to end someone's session.
			if !record.secret_matches(&presented.secret) {
				obs::record_rejection(KIND, &"secret_mismatch");

				return Ok(());
			}
			if record.is_revoked() {
				return Ok(());
			}

			self.ledger.revoke(&presented.id, now).await.map_err(obs::internal(KIND))?;
			self.metrics.record_revoked(1);

			Ok(())
		})
		.await
	}

	/// Revokes every refresh token `owner` holds, returning how many were not yet revoked.
	pub async fn revoke_all(&self, owner: &SubjectId) -> Result<usize> {
		self.revoke_all_at(owner, OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenService::revoke_all`] with an explicit clock.
	pub async fn revoke_all_at(&self, owner: &SubjectId, now: OffsetDateTime) -> Result<usize> {
		const KIND: OpKind = OpKind::Revoke;

		obs::observe(KIND, "revoke_all", async move {
			let revoked =
				self.ledger.revoke_owner(owner, now).await.map_err(obs::internal(KIND))?;

			self.metrics.record_revoked(revoked);

			Ok(revoked)
		})
		.await
	}

	/// Deletes ledger records that expired before `now`, returning how many were removed.
	///
	/// Purely advisory: expired records are already rejected whether or not they were swept.
	pub async fn sweep(&self, now: OffsetDateTime) -> Result<usize> {
		const KIND: OpKind = OpKind::Sweep;

		obs::observe(KIND, "sweep_ledger", async move {
			self.ledger.sweep(now).await.map_err(obs::internal(KIND))
		})
		.await
	}

	fn mint(
		&self,
		kind: OpKind,
		owner: &SubjectId,
		now: OffsetDateTime,
	) -> Result<(TokenPair, RefreshRecord)> {
		let claims = AccessClaims::new(owner.clone(), now, self.config.access_ttl);
		let access_token = self.signer.sign(&claims).map_err(obs::internal(kind))?;
		let refresh = RefreshToken::generate();
		let record = RefreshRecord::issue(owner.clone(), &refresh, now, self.config.refresh_ttl);
		let pair = TokenPair {
			subject: owner.clone(),
			access_token,
			access_expires_at: claims.expires_at,
			refresh_token: refresh.to_wire(),
			refresh_expires_at: record.expires_at,
		};

		Ok((pair, record))
	}

	fn reject(&self, kind: OpKind, cause: &dyn Display) -> Error {
		obs::record_rejection(kind, cause);
		self.metrics.record_rejected();

		Error::Unauthorized
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService")
			.field("algorithm", &self.signer.algorithm())
			.field("config", &self.config)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::*;

	const T0: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn owner() -> SubjectId {
		SubjectId::new("subject-1").expect("Subject fixture should be valid.")
	}

	#[tokio::test]
	async fn issued_access_token_validates_until_expiry() {
		let (service, _) = build_test_token_service();
		let pair = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");

		assert_eq!(pair.access_expires_at, T0 + Duration::minutes(15));
		assert_eq!(pair.refresh_expires_at, T0 + Duration::days(7));
		assert_eq!(
			service
				.validate_access_at(&pair.access_token, pair.access_expires_at)
				.expect("Token should be valid at its expiry instant."),
			owner()
		);
		assert!(matches!(
			service.validate_access_at(
				&pair.access_token,
				pair.access_expires_at + Duration::seconds(1)
			),
			Err(Error::Unauthorized)
		));
		assert_eq!(service.metrics().rejected(), 1);
	}

	#[tokio::test]
	async fn rotation_retires_the_presented_token() {
		let (service, ledger) = build_test_token_service();
		let first = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		let now = T0 + Duration::hours(1);
		let second =
			service.rotate_at(&first.refresh_token, now).await.expect("Rotation should succeed.");

		assert_ne!(first.refresh_token, second.refresh_token);
		assert_eq!(second.subject, owner());
		assert_eq!(second.refresh_expires_at, now + Duration::days(7));
		assert!(matches!(
			service.rotate_at(&first.refresh_token, now).await,
			Err(Error::Unauthorized)
		));
		assert_eq!(ledger.len(), 2);
		assert_eq!(service.metrics().rotated(), 1);
	}

	#[tokio::test]
	async fn rotation_rejects_forged_secrets_and_expired_records() {
		let (service, _) = build_test_token_service();
		let pair = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		let presented =
			RefreshToken::parse(&pair.refresh_token).expect("Issued token should parse.");
		let forged = format!("{}.not-the-secret", presented.id);

		assert!(matches!(service.rotate_at(&forged, T0).await, Err(Error::Unauthorized)));
		assert!(matches!(service.rotate_at("garbage", T0).await, Err(Error::Unauthorized)));
		assert!(matches!(
			service.rotate_at(&pair.refresh_token, T0 + Duration::days(8)).await,
			Err(Error::Unauthorized)
		));

		// None of the failures above consumed the token.
		service.rotate_at(&pair.refresh_token, T0).await.expect("Token should still rotate.");
	}

	#[tokio::test]
	async fn revoke_is_idempotent_and_ignores_forgeries() {
		let (service, ledger) = build_test_token_service();
		let pair = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		let presented =
			RefreshToken::parse(&pair.refresh_token).expect("Issued token should parse.");

		service
			.revoke_at(&format!("{}.forged", presented.id), T0)
			.await
			.expect("Forged revocations should be ignored.");

		let record = ledger
			.find(&presented.id)
			.await
			.expect("Lookup should succeed.")
			.expect("Record should exist.");

		assert!(!record.is_revoked());

		service.revoke_at(&pair.refresh_token, T0).await.expect("First revoke should succeed.");
		service.revoke_at(&pair.refresh_token, T0).await.expect("Second revoke should succeed.");
		service.revoke_at("unknown.token", T0).await.expect("Unknown tokens should be ignored.");

		assert!(matches!(
			service.rotate_at(&pair.refresh_token, T0).await,
			Err(Error::Unauthorized)
		));
		assert_eq!(service.metrics().revoked(), 1);
	}

	#[tokio::test]
	async fn revoke_all_ends_every_session_of_an_owner() {
		let (service, _) = build_test_token_service();
		let other = SubjectId::new("subject-2").expect("Subject fixture should be valid.");
		let a = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		let b = service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		let c = service.issue_pair_at(&other, T0).await.expect("Issue should succeed.");

		assert_eq!(service.revoke_all_at(&owner(), T0).await.expect("Revoke all failed."), 2);
		assert!(service.rotate_at(&a.refresh_token, T0).await.is_err());
		assert!(service.rotate_at(&b.refresh_token, T0).await.is_err());
		assert!(service.rotate_at(&c.refresh_token, T0).await.is_ok());
	}

	#[tokio::test]
	async fn sweep_removes_only_expired_records() {
		let (service, ledger) = build_test_token_service();

		service.issue_pair_at(&owner(), T0).await.expect("Issue should succeed.");
		service.issue_pair_at(&owner(), T0 + Duration::days(3)).await.expect("Issue failed.");

		assert_eq!(service.sweep(T0 + Duration::days(8)).await.expect("Sweep failed."), 1);
		assert_eq!(ledger.len(), 1);
	}

	#[test]
	fn token_pair_debug_redacts_tokens() {
		let pair = TokenPair {
			subject: owner(),
			access_token: "access-secret".into(),
			access_expires_at: T0,
			refresh_token: "refresh-secret".into(),
			refresh_expires_at: T0,
		};
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}
}
