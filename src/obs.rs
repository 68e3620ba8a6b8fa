//! Observability helpers for guarded execution.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `redis_guard.guard` with the `guard` (lock or
//!   rate limit) and `stage` (call site) fields, and `warn` events for releases that could not be
//!   reported to the caller.
//! - Enable `metrics` to increment the `redis_guard_outcome_total` counter for every attempt and
//!   outcome, labeled by `guard` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Guard kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardKind {
	/// Distributed lock guard.
	Lock,
	/// Fixed-window admission guard.
	RateLimit,
}
impl GuardKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardKind::Lock => "lock",
			GuardKind::RateLimit => "rate_limit",
		}
	}
}
impl Display for GuardKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each guarded call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardOutcome {
	/// Entry to a guard.
	Attempt,
	/// Lock acquired or admission granted.
	Acquired,
	/// Lock wait budget exhausted.
	TimedOut,
	/// Admission refused for the current window.
	Rejected,
	/// Guarded work completed successfully.
	Success,
	/// Guarded work or the guard itself failed.
	Failure,
}
impl GuardOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardOutcome::Attempt => "attempt",
			GuardOutcome::Acquired => "acquired",
			GuardOutcome::TimedOut => "timed_out",
			GuardOutcome::Rejected => "rejected",
			GuardOutcome::Success => "success",
			GuardOutcome::Failure => "failure",
		}
	}
}
impl Display for GuardOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
