//! Time units accepted by the lock and limiter entry points.

// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Unit applied to the integer wait/lease/TTL arguments of the public API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
	/// 1/1_000_000_000 second.
	Nanoseconds,
	/// 1/1_000_000 second.
	Microseconds,
	/// 1/1_000 second.
	Milliseconds,
	#[default]
	/// One second.
	Seconds,
	/// Sixty seconds.
	Minutes,
	/// Sixty minutes.
	Hours,
	/// Twenty-four hours.
	Days,
}
impl TimeUnit {
	/// Converts `amount` of this unit into a [`Duration`], saturating on overflow.
	pub fn duration(self, amount: u64) -> Duration {
		match self {
			TimeUnit::Nanoseconds => Duration::from_nanos(amount),
			TimeUnit::Microseconds => Duration::from_micros(amount),
			TimeUnit::Milliseconds => Duration::from_millis(amount),
			TimeUnit::Seconds => Duration::from_secs(amount),
			TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
			TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
			TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
		}
	}

	/// Returns a stable label suitable for messages and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TimeUnit::Nanoseconds => "nanoseconds",
			TimeUnit::Microseconds => "microseconds",
			TimeUnit::Milliseconds => "milliseconds",
			TimeUnit::Seconds => "seconds",
			TimeUnit::Minutes => "minutes",
			TimeUnit::Hours => "hours",
			TimeUnit::Days => "days",
		}
	}
}
impl Display for TimeUnit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Whole milliseconds of `duration`, rounded up so sub-millisecond spans never become zero.
pub(crate) fn millis_ceil(duration: Duration) -> u64 {
	let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

	if Duration::from_millis(millis) < duration { millis.saturating_add(1) } else { millis }
}

/// `now + span`, clamped to one year ahead when the sum is not representable.
pub(crate) fn instant_after(now: Instant, span: Duration) -> Instant {
	const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

	now.checked_add(span).unwrap_or_else(|| now + FAR_FUTURE)
}
