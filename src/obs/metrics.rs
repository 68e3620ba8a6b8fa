// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{GuardKind, GuardOutcome};

/// Records a guard outcome via the global metrics recorder (when enabled).
pub fn record_guard_outcome(kind: GuardKind, outcome: GuardOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"redis_guard_outcome_total",
			"guard" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Thread-safe counters for one guard instance.
#[derive(Debug, Default)]
pub struct GuardMetrics {
	attempts: AtomicU64,
	acquired: AtomicU64,
	denied: AtomicU64,
	failures: AtomicU64,
}
impl GuardMetrics {
	/// Returns the total number of guard attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that acquired the lock or were admitted.
	pub fn acquired(&self) -> u64 {
		self.acquired.load(Ordering::Relaxed)
	}

	/// Returns the number of lock timeouts or admission rejections.
	pub fn denied(&self) -> u64 {
		self.denied.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that surfaced an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, kind: GuardKind, outcome: GuardOutcome) {
		let counter = match outcome {
			GuardOutcome::Attempt => &self.attempts,
			GuardOutcome::Acquired => &self.acquired,
			GuardOutcome::TimedOut | GuardOutcome::Rejected => &self.denied,
			GuardOutcome::Failure => &self.failures,
			GuardOutcome::Success => {
				record_guard_outcome(kind, outcome);

				return;
			},
		};

		counter.fetch_add(1, Ordering::Relaxed);
		record_guard_outcome(kind, outcome);
	}
}
