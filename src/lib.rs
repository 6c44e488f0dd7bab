//! Session token lifecycle and request admission: signed access tokens, CAS-rotated refresh
//! tokens, and per-client token buckets in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod gate;
pub mod identity;
pub mod obs;
pub mod rate_limit;
pub mod service;
pub mod signer;
pub mod store;
pub mod sweep;

mod shard;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Argon2Hasher, PasswordHasher},
		gate::AuthGate,
		identity::IdentityService,
		rate_limit::{RateLimitConfig, RateLimiter},
		service::{TokenConfig, TokenService},
		signer::{SigningAlgorithm, TokenSigner},
		store::{CredentialStore, MemoryCredentialStore, MemoryLedger, RefreshLedger},
	};

	/// Fixed 32-byte key used by every test signer.
	pub const TEST_SIGNING_KEY: &[u8] = b"test-signing-key-0123456789abcdef";

	/// Builds an HS256 signer over [`TEST_SIGNING_KEY`].
	pub fn test_signer() -> TokenSigner {
		TokenSigner::new(SigningAlgorithm::Hs256, TEST_SIGNING_KEY)
			.expect("Test signing key should satisfy the minimum key length.")
	}

	/// Argon2 hasher with the smallest parameters argon2 accepts, keeping tests fast.
	pub fn test_hasher() -> Argon2Hasher {
		let params = argon2::Params::new(argon2::Params::MIN_M_COST, 1, 1, None)
			.expect("Minimal argon2 parameters should be accepted.");

		Argon2Hasher::with_params(params)
	}

	/// Constructs a [`TokenService`] backed by an in-memory ledger with default TTLs.
	pub fn build_test_token_service() -> (TokenService, Arc<MemoryLedger>) {
		let ledger_backend = Arc::new(MemoryLedger::default());
		let ledger: Arc<dyn RefreshLedger> = ledger_backend.clone();
		let service = TokenService::new(test_signer(), ledger, TokenConfig::default());

		(service, ledger_backend)
	}

	/// Constructs an [`IdentityService`] and an [`AuthGate`] sharing one token service, wired
	/// to in-memory stores, the test signer, a fast hasher, and a limiter built from `limits`.
	pub fn build_test_identity_stack(
		limits: RateLimitConfig,
	) -> (IdentityService, AuthGate, Arc<MemoryLedger>) {
		let (tokens, ledger) = build_test_token_service();
		let tokens = Arc::new(tokens);
		let credentials: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
		let hasher: Arc<dyn PasswordHasher> = Arc::new(test_hasher());
		let identity = IdentityService::new(credentials, hasher, tokens.clone());
		let gate = AuthGate::new(tokens, RateLimiter::new(limits));

		(identity, gate, ledger)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{DefaultHasher, Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(test)] use color_eyre as _;
