// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token service outcomes.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	issued: AtomicU64,
	rotated: AtomicU64,
	revoked: AtomicU64,
	rejected: AtomicU64,
}
impl TokenMetrics {
	/// Returns the number of pairs issued at login.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Returns the number of successful rotations.
	pub fn rotated(&self) -> u64 {
		self.rotated.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh records revoked by logout calls.
	pub fn revoked(&self) -> u64 {
		self.revoked.load(Ordering::Relaxed)
	}

	/// Returns the number of presented tokens rejected as unauthorized.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_issued(&self) {
		self.issued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rotated(&self) {
		self.rotated.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revoked(&self, count: usize) {
		self.revoked.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}
}
