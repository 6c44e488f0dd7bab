//! Request admission: rate limiting first, bearer authentication second.

// crates.io
use http::{HeaderMap, Request, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	obs::{self, OpKind},
	rate_limit::{RateLimitDecision, RateLimiter},
	service::TokenService,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity of the caller, attached to request extensions once the gate admits it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedSubject {
	/// Subject the access token was issued to.
	pub subject: SubjectId,
	/// Last instant the presented access token is accepted.
	pub expires_at: OffsetDateTime,
}

/// Guards protected handlers.
///
/// Rejections terminate the request before any handler logic runs: [`Error::RateLimited`]
/// when the client's bucket is empty, otherwise [`Error::Unauthorized`] for a missing,
/// malformed, or invalid bearer token.
#[derive(Clone, Debug)]
pub struct AuthGate {
	tokens: Arc<TokenService>,
	limiter: RateLimiter,
}
impl AuthGate {
	/// Creates a gate over the provided token service and limiter.
	pub fn new(tokens: Arc<TokenService>, limiter: RateLimiter) -> Self {
		Self { tokens, limiter }
	}

	/// Limiter consulted by [`AuthGate::admit`].
	pub fn limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Charges one request to `client_key`. Public endpoints call this alone.
	pub fn admit(&self, client_key: &str) -> Result<()> {
		self.admit_at(client_key, OffsetDateTime::now_utc())
	}

	/// Same as [`AuthGate::admit`] with an explicit clock.
	pub fn admit_at(&self, client_key: &str, now: OffsetDateTime) -> Result<()> {
		match self.limiter.check_at(client_key, now) {
			RateLimitDecision::Allow => Ok(()),
			RateLimitDecision::Delay(directive) => {
				obs::record_rejection(OpKind::Admit, &"rate_limited");

				Err(Error::RateLimited(directive))
			},
		}
	}

	/// Validates the bearer token carried by `headers`.
	pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedSubject> {
		self.authenticate_at(headers, OffsetDateTime::now_utc())
	}

	/// Same as [`AuthGate::authenticate`] with an explicit clock.
	pub fn authenticate_at(
		&self,
		headers: &HeaderMap,
		now: OffsetDateTime,
	) -> Result<AuthenticatedSubject> {
		let token = bearer_token(headers).inspect_err(|_| {
			obs::record_rejection(OpKind::Admit, &"missing_or_malformed_authorization");
		})?;
		let claims = self.tokens.claims_at(token, now)?;

		Ok(AuthenticatedSubject { subject: claims.subject, expires_at: claims.expires_at })
	}

	/// Admits `request` from `client_key` and attaches its [`AuthenticatedSubject`] to the
	/// request extensions.
	pub fn authorize<B>(
		&self,
		client_key: &str,
		request: &mut Request<B>,
	) -> Result<AuthenticatedSubject> {
		self.authorize_at(client_key, request, OffsetDateTime::now_utc())
	}

	/// Same as [`AuthGate::authorize`] with an explicit clock.
	pub fn authorize_at<B>(
		&self,
		client_key: &str,
		request: &mut Request<B>,
		now: OffsetDateTime,
	) -> Result<AuthenticatedSubject> {
		const KIND: OpKind = OpKind::Admit;

		obs::observe_sync(KIND, "authorize", || {
			self.admit_at(client_key, now)?;

			let subject = self.authenticate_at(request.headers(), now)?;

			request.extensions_mut().insert(subject.clone());

			Ok(subject)
		})
	}
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme must be exactly `Bearer` followed by a single space and a non-empty token
/// without further whitespace; anything else is [`Error::Unauthorized`].
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
	let mut values = headers.get_all(AUTHORIZATION).iter();
	let (Some(value), None) = (values.next(), values.next()) else {
		return Err(Error::Unauthorized);
	};
	let value = value.to_str().map_err(|_| Error::Unauthorized)?;
	let token = value.strip_prefix(BEARER_PREFIX).ok_or(Error::Unauthorized)?;

	if token.is_empty() || token.contains(char::is_whitespace) {
		return Err(Error::Unauthorized);
	}

	Ok(token)
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::HeaderValue;
	// self
	use super::*;

	fn headers(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(
			AUTHORIZATION,
			HeaderValue::from_str(value).expect("Header fixture should be valid."),
		);

		headers
	}

	#[test]
	fn bearer_token_requires_exact_scheme() {
		assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).ok(), Some("abc.def.ghi"));

		for malformed in ["bearer abc", "Bearer", "Bearer ", "Bearer  abc", "Basic abc", "abc"] {
			assert!(
				matches!(bearer_token(&headers(malformed)), Err(Error::Unauthorized)),
				"`{malformed}` should be rejected."
			);
		}

		assert!(matches!(bearer_token(&HeaderMap::new()), Err(Error::Unauthorized)));
	}

	#[test]
	fn duplicate_authorization_headers_are_rejected() {
		let mut headers = headers("Bearer one");

		headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer two"));

		assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized)));
	}
}
