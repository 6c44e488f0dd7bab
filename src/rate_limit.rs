//! Per-client token-bucket admission control.
//!
//! Buckets refill continuously: a bucket that last refilled `t` ago gains
//! `t / refill_interval` tokens, capped at `capacity`. Buckets are created lazily on a
//! client's first request and dropped by [`RateLimiter::evict_idle`] once unused for
//! `idle_timeout`. A key evicted between two requests simply starts over with a full
//! bucket; that relaxation is accepted.

// self
use crate::{_prelude::*, error::ConfigError, shard::Shards};

/// Reason attached to every delay produced by the limiter.
pub const REASON_BUCKET_EMPTY: &str = "client_bucket_empty";

/// Tunables for [`RateLimiter`].
///
/// Deserialization fills absent fields with defaults and rejects a zero capacity, a
/// non-positive refill interval, or a negative idle timeout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RateLimitConfigFields")]
pub struct RateLimitConfig {
	/// Maximum burst size.
	pub capacity: u32,
	/// Time it takes to regain a single token.
	pub refill_interval: Duration,
	/// Buckets unused for this long are evicted.
	pub idle_timeout: Duration,
}
impl RateLimitConfig {
	const DEFAULT_CAPACITY: u32 = 10;
	const DEFAULT_IDLE_TIMEOUT: Duration = Duration::minutes(10);
	const DEFAULT_REFILL_INTERVAL: Duration = Duration::seconds(6);

	/// Overrides the burst capacity (at least one).
	pub fn with_capacity(mut self, capacity: u32) -> Self {
		self.capacity = capacity.max(1);

		self
	}

	/// Overrides the per-token refill interval. Non-positive values fall back to the default.
	pub fn with_refill_interval(mut self, interval: Duration) -> Self {
		self.refill_interval =
			if interval.is_positive() { interval } else { Self::DEFAULT_REFILL_INTERVAL };

		self
	}

	/// Overrides the idle window after which buckets are evicted.
	pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
		self.idle_timeout = if timeout.is_negative() { Duration::ZERO } else { timeout };

		self
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			capacity: Self::DEFAULT_CAPACITY,
			refill_interval: Self::DEFAULT_REFILL_INTERVAL,
			idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
		}
	}
}

#[derive(Deserialize)]
#[serde(default)]
struct RateLimitConfigFields {
	capacity: u32,
	refill_interval: Duration,
	idle_timeout: Duration,
}
impl Default for RateLimitConfigFields {
	fn default() -> Self {
		let RateLimitConfig { capacity, refill_interval, idle_timeout } =
			RateLimitConfig::default();

		Self { capacity, refill_interval, idle_timeout }
	}
}
impl TryFrom<RateLimitConfigFields> for RateLimitConfig {
	type Error = ConfigError;

	fn try_from(fields: RateLimitConfigFields) -> Result<Self, Self::Error> {
		let RateLimitConfigFields { capacity, refill_interval, idle_timeout } = fields;

		ConfigError::check(capacity > 0, "capacity", "at least 1")?;
		ConfigError::check(refill_interval.is_positive(), "refill_interval", "positive")?;
		ConfigError::check(!idle_timeout.is_negative(), "idle_timeout", "non-negative")?;

		Ok(Self { capacity, refill_interval, idle_timeout })
	}
}

/// Outcome of [`RateLimiter::check`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed; one token was consumed.
	Allow,
	/// The bucket is empty; nothing was consumed.
	Delay(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}
}

/// Advises callers when to retry after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the next token becomes available.
	pub earliest_retry_at: OffsetDateTime,
	/// Time remaining until `earliest_retry_at`, measured from the check.
	pub recommended_backoff: Duration,
	/// Machine-readable reason.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Backoff in whole seconds, rounded up so a retry at the hinted time is admitted.
	pub fn retry_after_secs(&self) -> u64 {
		let backoff = self.recommended_backoff;
		let secs = backoff.whole_seconds() + i64::from(backoff.subsec_nanoseconds() > 0);

		secs.max(1).unsigned_abs()
	}
}

#[derive(Clone, Debug)]
struct Bucket {
	tokens: f64,
	last_refill: OffsetDateTime,
	last_seen: OffsetDateTime,
}
impl Bucket {
	fn full(capacity: f64, now: OffsetDateTime) -> Self {
		Self { tokens: capacity, last_refill: now, last_seen: now }
	}

	fn refill(&mut self, config: &RateLimitConfig, now: OffsetDateTime) {
		// A clock that steps backwards neither adds nor removes tokens.
		if now > self.last_refill {
			let gained = (now - self.last_refill) / config.refill_interval;

			self.tokens = (self.tokens + gained).min(f64::from(config.capacity));
			self.last_refill = now;
		}
		if now > self.last_seen {
			self.last_seen = now;
		}
	}

	fn take(&mut self, config: &RateLimitConfig, now: OffsetDateTime) -> RateLimitDecision {
		self.refill(config, now);

		if self.tokens >= 1.0 {
			self.tokens -= 1.0;

			return RateLimitDecision::Allow;
		}

		let wait = config.refill_interval * (1.0 - self.tokens);

		RateLimitDecision::Delay(
			RetryDirective::new(self.last_refill + wait, wait).with_reason(REASON_BUCKET_EMPTY),
		)
	}
}

/// Token-bucket limiter keyed by client identity (source address, API key, ...).
///
/// Cloning is cheap; clones share buckets. Each key's bucket is only touched under its
/// shard's lock, so refill and consume never race and unrelated clients rarely contend.
#[derive(Clone, Debug)]
pub struct RateLimiter {
	config: Arc<RateLimitConfig>,
	buckets: Arc<Shards<String, Bucket>>,
}
impl RateLimiter {
	/// Creates a limiter with the provided configuration.
	pub fn new(config: RateLimitConfig) -> Self {
		Self { config: Arc::new(config), buckets: Default::default() }
	}

	/// Active configuration.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Consumes a token for `client_key` if one is available.
	pub fn allow(&self, client_key: &str) -> bool {
		self.allow_at(client_key, OffsetDateTime::now_utc())
	}

	/// Same as [`RateLimiter::allow`] with an explicit clock.
	pub fn allow_at(&self, client_key: &str, now: OffsetDateTime) -> bool {
		self.check_at(client_key, now).is_allowed()
	}

	/// Consumes a token for `client_key` or reports when the next one becomes available.
	pub fn check(&self, client_key: &str) -> RateLimitDecision {
		self.check_at(client_key, OffsetDateTime::now_utc())
	}

	/// Same as [`RateLimiter::check`] with an explicit clock.
	pub fn check_at(&self, client_key: &str, now: OffsetDateTime) -> RateLimitDecision {
		let mut guard = self.buckets.shard(client_key).write();

		if let Some(bucket) = guard.get_mut(client_key) {
			return bucket.take(&self.config, now);
		}

		let mut bucket = Bucket::full(f64::from(self.config.capacity), now);
		let decision = bucket.take(&self.config, now);

		guard.insert(client_key.to_owned(), bucket);

		decision
	}

	/// Drops buckets idle for at least `idle_timeout`, returning how many were removed.
	pub fn evict_idle(&self, now: OffsetDateTime) -> usize {
		let idle_timeout = self.config.idle_timeout;

		self.buckets
			.iter()
			.map(|shard| {
				let mut guard = shard.write();
				let before = guard.len();

				guard.retain(|_, bucket| now - bucket.last_seen < idle_timeout);

				before - guard.len()
			})
			.sum()
	}

	/// Number of buckets currently tracked.
	pub fn len(&self) -> usize {
		self.buckets.len()
	}

	/// Returns `true` when no bucket is tracked.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(RateLimitConfig::default())
	}
}
