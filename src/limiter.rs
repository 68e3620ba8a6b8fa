//! Fixed-window admission control over a shared counter.
//!
//! Every call increments the window counter for its key, including calls that end up rejected,
//! so a burst of rejected calls keeps consuming the window's quota. The window opens at the
//! first increment and the counter disappears when its TTL elapses; windows are not aligned to
//! the calendar.

// self
use crate::{
	_prelude::*,
	id::LimiterKey,
	obs::{GuardKind, GuardMetrics, GuardOutcome, GuardSpan},
	store::CoordinationStore,
	unit::TimeUnit,
	work::WorkError,
};

/// Evaluates and enforces per-key admission limits against a shared [`CoordinationStore`].
#[derive(Clone)]
pub struct RateLimiter {
	/// Store shared with the rest of the process.
	pub store: Arc<dyn CoordinationStore>,
	/// Outcome counters for calls issued through this limiter.
	pub metrics: Arc<GuardMetrics>,
}
impl RateLimiter {
	/// Creates a limiter over `store`.
	pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
		Self { store, metrics: Default::default() }
	}

	/// Consumes one unit of `key`'s window and reports whether it fits within `max`.
	///
	/// The window lasts `ttl` in `unit`, starting at the first increment.
	pub async fn is_allowed(
		&self,
		key: &LimiterKey,
		max: u64,
		ttl: u64,
		unit: TimeUnit,
	) -> Result<bool> {
		let window = unit.duration(ttl);

		if window.is_zero() {
			return Err(Error::InvalidArgument {
				source: "rate limit window must be positive".into(),
			});
		}

		let count = self.store.increment(key, window).await?;

		Ok(count <= max)
	}

	/// [`RateLimiter::is_allowed`] with `ttl` in seconds.
	pub async fn is_allowed_secs(&self, key: &LimiterKey, max: u64, ttl: u64) -> Result<bool> {
		self.is_allowed(key, max, ttl, TimeUnit::Seconds).await
	}

	/// Runs `work` if `key` admits one more unit in the current window.
	///
	/// A refused admission fails with [`Error::RateLimitExceeded`] carrying the arguments
	/// exactly as supplied, and `work` is not invoked. Failures from `work` are remapped
	/// through [`WorkError::into_error`].
	pub async fn allow<T, F, Fut>(
		&self,
		key: &LimiterKey,
		max: u64,
		ttl: u64,
		unit: TimeUnit,
		work: F,
	) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, WorkError>>,
	{
		const KIND: GuardKind = GuardKind::RateLimit;

		let span = GuardSpan::new(KIND, "allow", key);

		self.metrics.record(KIND, GuardOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !self.is_allowed(key, max, ttl, unit).await? {
					self.metrics.record(KIND, GuardOutcome::Rejected);

					return Err(Error::RateLimitExceeded { key: key.to_string(), max, ttl, unit });
				}

				self.metrics.record(KIND, GuardOutcome::Acquired);

				work().await.map_err(WorkError::into_error)
			})
			.await;

		let outcome = match &result {
			Ok(_) => GuardOutcome::Success,
			Err(e) if e.is_rate_limited() => GuardOutcome::Rejected,
			Err(_) => GuardOutcome::Failure,
		};

		// Rejections were already counted inside the span.
		if outcome != GuardOutcome::Rejected {
			self.metrics.record(KIND, outcome);
		}

		span.record_outcome(outcome);

		result
	}

	/// [`RateLimiter::allow`] with `ttl` in seconds.
	pub async fn allow_secs<T, F, Fut>(
		&self,
		key: &LimiterKey,
		max: u64,
		ttl: u64,
		work: F,
	) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, WorkError>>,
	{
		self.allow(key, max, ttl, TimeUnit::Seconds, work).await
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("metrics", &self.metrics).finish()
	}
}
