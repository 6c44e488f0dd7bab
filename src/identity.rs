//! Account-facing operations: register, login, refresh, logout, and password change.
//!
//! Each operation maps onto one endpoint of a host application. Outcomes are expressed
//! through [`Error`], whose [`Error::status`] yields the conventional HTTP status code;
//! successful calls correspond to `201` for registration and `200` otherwise.

// std
use std::sync::OnceLock;
// self
use crate::{
	_prelude::*,
	auth::{
		Credential, HashError, Identity, IdentityPolicy, PasswordHash, PasswordHasher,
		PasswordPolicy, SubjectId,
	},
	error::ValidationError,
	obs::{self, OpKind},
	service::{TokenPair, TokenService},
	store::{CredentialStore, InsertOutcome},
};

/// Registration payload.
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
	/// Desired login identity.
	#[serde(alias = "email")]
	pub identity: String,
	/// Plaintext password.
	pub password: String,
}
impl Debug for RegisterRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegisterRequest")
			.field("identity", &self.identity)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Login payload; same shape as registration.
pub type LoginRequest = RegisterRequest;

/// Password change payload.
#[derive(Clone, Deserialize)]
pub struct ChangePasswordRequest {
	/// Identity whose password changes.
	#[serde(alias = "email")]
	pub identity: String,
	/// Current password.
	pub old_password: String,
	/// Replacement password.
	pub new_password: String,
}
impl Debug for ChangePasswordRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ChangePasswordRequest")
			.field("identity", &self.identity)
			.finish_non_exhaustive()
	}
}

/// Body returned after a successful registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Registered {
	/// Registered identity.
	pub identity: Identity,
	/// Subject identifier assigned to it.
	pub subject: SubjectId,
}

const DECOY_PASSWORD: &str = "decoy-password-for-unknown-identities";

/// Credential-backed front door to the token lifecycle.
#[derive(Clone)]
pub struct IdentityService {
	credentials: Arc<dyn CredentialStore>,
	hasher: Arc<dyn PasswordHasher>,
	tokens: Arc<TokenService>,
	policy: PasswordPolicy,
	identity_policy: IdentityPolicy,
	// Verified against when the identity is unknown so both login failures cost one hash.
	decoy: Arc<OnceLock<PasswordHash>>,
}
impl IdentityService {
	/// Creates a service using the default [`PasswordPolicy`] and [`IdentityPolicy`].
	pub fn new(
		credentials: Arc<dyn CredentialStore>,
		hasher: Arc<dyn PasswordHasher>,
		tokens: Arc<TokenService>,
	) -> Self {
		Self {
			credentials,
			hasher,
			tokens,
			policy: PasswordPolicy::default(),
			identity_policy: IdentityPolicy::default(),
			decoy: Default::default(),
		}
	}

	/// Overrides the password policy.
	pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the identity policy applied at registration.
	pub fn with_identity_policy(mut self, policy: IdentityPolicy) -> Self {
		self.identity_policy = policy;

		self
	}

	/// Token service used for issuance and rotation.
	pub fn tokens(&self) -> &Arc<TokenService> {
		&self.tokens
	}

	/// Registers a new identity. Fails with [`Error::Validation`] on empty fields, an
	/// identity rejected by the [`IdentityPolicy`], or a weak password, and with
	/// [`Error::Conflict`] when the identity is taken.
	pub async fn register(&self, request: RegisterRequest) -> Result<Registered> {
		const KIND: OpKind = OpKind::Register;

		obs::observe(KIND, "register", async move {
			let identity = required_identity(&request.identity)?;

			self.identity_policy.validate(&identity)?;
			required(&request.password, "password")?;
			self.policy.validate(&request.password)?;

			let hash = self.hasher.hash(&request.password).map_err(obs::internal(KIND))?;
			let credential = Credential::register(identity, hash);
			let registered = Registered {
				identity: credential.identity.clone(),
				subject: credential.subject.clone(),
			};

			match self.credentials.create(credential).await.map_err(obs::internal(KIND))? {
				InsertOutcome::Inserted => Ok(registered),
				InsertOutcome::Duplicate => Err(Error::Conflict),
			}
		})
		.await
	}

	/// Verifies a password and issues a token pair.
	pub async fn login(&self, request: LoginRequest) -> Result<TokenPair> {
		self.login_at(request, OffsetDateTime::now_utc()).await
	}

	/// Same as [`IdentityService::login`] with an explicit clock.
	///
	/// Unknown identities and wrong passwords both yield [`Error::Unauthorized`].
	pub async fn login_at(&self, request: LoginRequest, now: OffsetDateTime) -> Result<TokenPair> {
		const KIND: OpKind = OpKind::Login;

		let credential = obs::observe(KIND, "login", async move {
			required(&request.identity, "identity")?;
			required(&request.password, "password")?;

			self.verify(KIND, &request.identity, &request.password).await
		})
		.await?;

		self.tokens.issue_pair_at(&credential.subject, now).await
	}

	/// Exchanges a refresh token for a new pair.
	pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
		self.refresh_at(refresh_token, OffsetDateTime::now_utc()).await
	}

	/// Same as [`IdentityService::refresh`] with an explicit clock.
	pub async fn refresh_at(&self, refresh_token: &str, now: OffsetDateTime) -> Result<TokenPair> {
		required(refresh_token, "refresh_token")?;

		self.tokens.rotate_at(refresh_token, now).await
	}

	/// Ends the session a refresh token belongs to. Never fails for unknown tokens.
	pub async fn logout(&self, refresh_token: &str) -> Result<()> {
		self.logout_at(refresh_token, OffsetDateTime::now_utc()).await
	}

	/// Same as [`IdentityService::logout`] with an explicit clock.
	pub async fn logout_at(&self, refresh_token: &str, now: OffsetDateTime) -> Result<()> {
		self.tokens.revoke_at(refresh_token, now).await
	}

	/// Replaces the password of the authenticated `subject` and revokes all of its refresh
	/// tokens.
	///
	/// Fails with [`Error::Unauthorized`] if `request.identity` does not belong to `subject`
	/// or the old password is wrong, and with [`Error::Validation`] if the new password
	/// fails the policy.
	pub async fn change_password(
		&self,
		subject: &SubjectId,
		request: ChangePasswordRequest,
	) -> Result<()> {
		self.change_password_at(subject, request, OffsetDateTime::now_utc()).await
	}

	/// Same as [`IdentityService::change_password`] with an explicit clock.
	pub async fn change_password_at(
		&self,
		subject: &SubjectId,
		request: ChangePasswordRequest,
		now: OffsetDateTime,
	) -> Result<()> {
		const KIND: OpKind = OpKind::ChangePassword;

		obs::observe(KIND, "change_password", async move {
			required(&request.identity, "identity")?;
			required(&request.old_password, "old_password")?;
			required(&request.new_password, "new_password")?;

			let credential = self.verify(KIND, &request.identity, &request.old_password).await?;

			if &credential.subject != subject {
				obs::record_rejection(KIND, &"subject_mismatch");

				return Err(Error::Unauthorized);
			}

			self.policy.validate(&request.new_password)?;

			let hash = self.hasher.hash(&request.new_password).map_err(obs::internal(KIND))?;

			self.credentials
				.update_password(&credential.identity, hash, now)
				.await
				.map_err(obs::internal(KIND))?
				.ok_or(Error::Unauthorized)?;
			self.tokens.revoke_all_at(subject, now).await?;

			Ok(())
		})
		.await
	}

	async fn verify(&self, kind: OpKind, identity: &str, password: &str) -> Result<Credential> {
		let credential = match Identity::new(identity) {
			Ok(identity) => self.credentials.find(&identity).await.map_err(obs::internal(kind))?,
			Err(_) => None,
		};
		let Some(credential) = credential else {
			let decoy = self.decoy_hash().map_err(obs::internal(kind))?;

			// Unknown identities pay for one verification like known ones.
			let _ = self.hasher.verify(password, decoy);

			obs::record_rejection(kind, &"unknown_identity");

			return Err(Error::Unauthorized);
		};

		if !self
			.hasher
			.verify(password, &credential.password_hash)
			.map_err(obs::internal(kind))?
		{
			obs::record_rejection(kind, &"password_mismatch");

			return Err(Error::Unauthorized);
		}

		Ok(credential)
	}

	fn decoy_hash(&self) -> Result<&PasswordHash, HashError> {
		if let Some(hash) = self.decoy.get() {
			return Ok(hash);
		}

		let hash = self.hasher.hash(DECOY_PASSWORD)?;

		Ok(self.decoy.get_or_init(|| hash))
	}
}
impl Debug for IdentityService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityService")
			.field("tokens", &self.tokens)
			.field("policy", &self.policy)
			.field("identity_policy", &self.identity_policy)
			.finish_non_exhaustive()
	}
}

fn required(value: &str, field: &'static str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(ValidationError::MissingField { field }.into());
	}

	Ok(())
}

fn required_identity(value: &str) -> Result<Identity> {
	required(value, "identity")?;

	Ok(Identity::new(value)?)
}
