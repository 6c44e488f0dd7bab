// std
use std::sync::Arc;
// crates.io
use http::{HeaderValue, Request, StatusCode, header::AUTHORIZATION};
use time::{Duration, OffsetDateTime};
// self
use session_gate::{
	auth::{Argon2Hasher, PasswordHasher},
	error::Error,
	gate::{AuthGate, AuthenticatedSubject},
	identity::{IdentityService, RegisterRequest},
	rate_limit::{RateLimitConfig, RateLimiter},
	service::{TokenConfig, TokenService},
	store::{CredentialStore, MemoryCredentialStore, MemoryLedger, RefreshLedger},
};

const KEY: &[u8] = b"integration-signing-key-0123456789";
const CLIENT: &str = "198.51.100.4";

fn fast_hasher() -> Argon2Hasher {
	let params = argon2::Params::new(argon2::Params::MIN_M_COST, 1, 1, None)
		.expect("Minimal argon2 parameters should be accepted.");

	Argon2Hasher::with_params(params)
}

fn build_stack(limits: RateLimitConfig) -> (IdentityService, AuthGate) {
	let ledger: Arc<dyn RefreshLedger> = Arc::new(MemoryLedger::default());
	let tokens = Arc::new(
		TokenService::from_key(KEY, ledger, TokenConfig::default())
			.expect("Integration key should be long enough."),
	);
	let credentials: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
	let hasher: Arc<dyn PasswordHasher> = Arc::new(fast_hasher());
	let identity = IdentityService::new(credentials, hasher, tokens.clone());
	let gate = AuthGate::new(tokens, RateLimiter::new(limits));

	(identity, gate)
}

fn credentials(identity: &str, password: &str) -> RegisterRequest {
	RegisterRequest { identity: identity.into(), password: password.into() }
}

fn protected(token: Option<&str>) -> Request<()> {
	let mut request = Request::get("/api/profile").body(()).expect("Request should build.");

	if let Some(token) = token {
		request.headers_mut().insert(
			AUTHORIZATION,
			HeaderValue::from_str(&format!("Bearer {token}")).expect("Header should be valid."),
		);
	}

	request
}

/// Admits the request the way a handler wrapper would and reports the resulting status.
fn call_protected(gate: &AuthGate, token: Option<&str>, now: OffsetDateTime) -> StatusCode {
	let mut request = protected(token);

	match gate.authorize_at(CLIENT, &mut request, now) {
		Ok(subject) => {
			assert_eq!(request.extensions().get::<AuthenticatedSubject>(), Some(&subject));

			StatusCode::OK
		},
		Err(e) => e.status(),
	}
}

#[tokio::test]
async fn register_login_refresh_scenario() {
	let (identity, gate) = build_stack(RateLimitConfig::default().with_capacity(100));

	identity
		.register(credentials("a@b.com", "Abcd123!"))
		.await
		.expect("Registration should return 201.");

	let wrong = identity.login(credentials("a@b.com", "Wrong999!")).await;

	assert_eq!(wrong.map_err(|e| e.status()).err(), Some(StatusCode::UNAUTHORIZED));

	let now = OffsetDateTime::now_utc();
	let pair = identity
		.login_at(credentials("a@b.com", "Abcd123!"), now)
		.await
		.expect("Login with the right password should return 200.");

	assert!(!pair.access_token.is_empty());
	assert!(!pair.refresh_token.is_empty());
	assert_eq!(call_protected(&gate, Some(&pair.access_token), now), StatusCode::OK);

	let past_ttl = pair.access_expires_at + Duration::seconds(1);

	assert_eq!(
		call_protected(&gate, Some(&pair.access_token), past_ttl),
		StatusCode::UNAUTHORIZED
	);

	let renewed = identity
		.refresh_at(&pair.refresh_token, past_ttl)
		.await
		.expect("Refresh should return 200 with a new pair.");

	assert_ne!(renewed.refresh_token, pair.refresh_token);
	assert_eq!(call_protected(&gate, Some(&renewed.access_token), past_ttl), StatusCode::OK);

	let reuse = identity.refresh_at(&pair.refresh_token, past_ttl).await;

	assert_eq!(reuse.map_err(|e| e.status()).err(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn missing_or_malformed_headers_are_unauthorized() {
	let (_, gate) = build_stack(RateLimitConfig::default());
	let now = OffsetDateTime::now_utc();

	assert_eq!(call_protected(&gate, None, now), StatusCode::UNAUTHORIZED);
	assert_eq!(call_protected(&gate, Some("not.a.jwt"), now), StatusCode::UNAUTHORIZED);

	let mut request = protected(None);

	request.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));

	assert!(matches!(gate.authorize_at(CLIENT, &mut request, now), Err(Error::Unauthorized)));
	assert!(request.extensions().get::<AuthenticatedSubject>().is_none());
}

#[tokio::test]
async fn rate_limiting_runs_before_authentication() {
	let (identity, gate) = build_stack(RateLimitConfig::default().with_capacity(2));

	identity.register(credentials("a@b.com", "Abcd123!")).await.expect("Registration failed.");

	let now = OffsetDateTime::now_utc();
	let pair =
		identity.login_at(credentials("a@b.com", "Abcd123!"), now).await.expect("Login failed.");

	assert_eq!(call_protected(&gate, Some(&pair.access_token), now), StatusCode::OK);
	assert_eq!(call_protected(&gate, None, now), StatusCode::UNAUTHORIZED);

	// The bucket is empty now, so even a valid token is turned away with 429.
	let mut request = protected(Some(&pair.access_token));
	let err = gate
		.authorize_at(CLIENT, &mut request, now)
		.expect_err("A drained bucket must reject the request.");

	assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

	let body = err.body();

	assert_eq!(body.error, "rate_limited");
	assert_eq!(body.retry_after_secs, Some(6));
	assert!(body.reason.is_some());
	assert!(gate.admit_at("another-client", now).is_ok());
}

#[tokio::test]
async fn waiting_the_hinted_retry_after_is_enough() {
	let (_, gate) = build_stack(RateLimitConfig::default().with_capacity(1));
	let t0 = OffsetDateTime::now_utc();
	let denied_at = t0 + Duration::milliseconds(500);

	gate.admit_at(CLIENT, t0).expect("The first request fits the bucket.");

	let hint = gate
		.admit_at(CLIENT, denied_at)
		.expect_err("The drained bucket must reject the second request.")
		.body()
		.retry_after_secs
		.expect("Rate-limited bodies carry a retry hint.");

	assert_eq!(hint, 6);

	let hint = Duration::seconds(i64::try_from(hint).expect("Hint should fit in i64."));

	assert!(gate.admit_at(CLIENT, denied_at + hint).is_ok());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
	let (identity, _) = build_stack(RateLimitConfig::default());

	identity.register(credentials("a@b.com", "Abcd123!")).await.expect("Registration failed.");

	let again = identity.register(credentials("a@b.com", "Abcd123!")).await;

	assert!(matches!(again, Err(Error::Conflict)));
	assert_eq!(Error::Conflict.status(), StatusCode::CONFLICT);
}
