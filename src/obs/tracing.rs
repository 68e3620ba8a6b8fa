//! Span and event helpers for guarded calls.
//!
//! Every `with_lock` or `allow` call runs inside one `redis_guard.guard` span keyed by the lock
//! name or limiter key. The span's `outcome` field is filled in once the call settles, so a
//! single span answers whether the guard admitted the work and whether the work succeeded.

// self
use crate::{
	_prelude::*,
	obs::{GuardKind, GuardOutcome},
};

/// Future returned by [`GuardSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(feature = "tracing")]
pub type InstrumentedGuard<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`GuardSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedGuard<F> = F;

/// Span covering one guarded call, from acquisition or admission through the caller's work.
#[derive(Clone, Debug)]
pub struct GuardSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GuardSpan {
	/// Opens the span for a `kind` guard on `key`; `stage` names the entry point.
	pub fn new(kind: GuardKind, stage: &'static str, key: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"redis_guard.guard",
				guard = kind.as_str(),
				stage,
				key,
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, key);

			Self {}
		}
	}

	/// Runs the guarded body inside the span.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedGuard<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Stamps how the call settled: success, failure, timed out, or rejected.
	pub fn record_outcome(&self, outcome: GuardOutcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}
}

/// Reports a release failure that cannot be returned to the caller.
pub fn release_failed(lock: &dyn Display, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(%lock, %error, "failed to release lock");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (lock, error);
	}
}

/// Reports a guard that released a lock on behalf of a dropped or panicking call.
pub fn released_on_drop(lock: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(%lock, "released lock from drop guard");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = lock;
	}
}

/// Reports a freshly connected store.
pub fn store_connected(mode: &str, pool_size: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(mode, pool_size, "connected to coordination store");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (mode, pool_size);
	}
}

/// Reports an explicit store shutdown.
pub fn store_closed() {
	#[cfg(feature = "tracing")]
	{
		tracing::info!("closed coordination store");
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn guard_span_wraps_work_and_takes_an_outcome() {
		let span = GuardSpan::new(GuardKind::Lock, "with_lock", "job:1");
		let value = span.instrument(async { 42 }).await;

		span.record_outcome(GuardOutcome::Success);

		assert_eq!(value, 42);
	}

	#[test]
	fn logging_helpers_accept_any_display() {
		release_failed(&"lock(job:1)", &"connection reset");
		released_on_drop(&"lock(job:1)");
		store_connected("single", 20);
		store_closed();
	}
}
