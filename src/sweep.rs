//! Background cleanup of expired ledger records and idle rate-limit buckets.
//!
//! Cleanup is advisory: expired records are rejected and idle buckets behave like fresh
//! ones whether or not a sweep ran, so ticks that are delayed or skipped are harmless.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	task::JoinHandle,
	time::{MissedTickBehavior, interval},
};
// self
use crate::{_prelude::*, rate_limit::RateLimiter, service::TokenService};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(5);

const MIN_PERIOD: StdDuration = StdDuration::from_millis(1);

/// What one sweep removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Expired refresh records deleted from the ledger.
	pub records_removed: usize,
	/// Idle rate-limit buckets evicted.
	pub buckets_evicted: usize,
}

/// Runs one sweep as of `now`.
pub async fn sweep_once(
	tokens: &TokenService,
	limiter: &RateLimiter,
	now: OffsetDateTime,
) -> Result<SweepReport> {
	let buckets_evicted = limiter.evict_idle(now);
	let records_removed = tokens.sweep(now).await?;

	Ok(SweepReport { records_removed, buckets_evicted })
}

/// Owns a running sweeper task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
	task: JoinHandle<()>,
}
impl SweeperHandle {
	/// Returns `true` once the task has stopped.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}
impl Drop for SweeperHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// Spawns a task on the current Tokio runtime that sweeps every `every`.
///
/// The first sweep happens one period after spawning. Failed sweeps are logged and the
/// task keeps running.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_sweeper(
	tokens: Arc<TokenService>,
	limiter: RateLimiter,
	every: Duration,
) -> SweeperHandle {
	let period = every.unsigned_abs().max(MIN_PERIOD);
	let task = tokio::spawn(async move {
		let mut ticker = interval(period);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		// The first tick completes immediately.
		ticker.tick().await;

		loop {
			ticker.tick().await;

			// Failures are logged where they occur; the next tick retries.
			if let Ok(report) = sweep_once(&tokens, &limiter, OffsetDateTime::now_utc()).await {
				record_report(report);
			}
		}
	});

	SweeperHandle { task }
}

fn record_report(report: SweepReport) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			records_removed = report.records_removed,
			buckets_evicted = report.buckets_evicted,
			"Sweep completed."
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = report;
	}
}
