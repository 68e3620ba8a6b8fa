//! Guarded execution under a distributed lock.
//!
//! [`LockManager::with_lock`] runs caller work only while the lock is held and always attempts
//! the release afterwards, including when the work fails, panics, or the call is dropped
//! mid-flight. An exhausted wait budget is reported as `Ok(None)`, not as an error.

// self
use crate::{
	_prelude::*,
	id::{LockName, LockOwner},
	lock::{self, LockManager, LockMode, LockRequest},
	obs::{self, GuardKind, GuardOutcome, GuardSpan},
	store::{CoordinationStore, LockKey, StoreError},
	unit::TimeUnit,
	work::WorkError,
};

impl LockManager {
	/// Runs `work` while holding the requested lock.
	///
	/// - `Ok(None)`: the wait budget ran out; `work` was not invoked.
	/// - `Ok(Some(value))`: `work` succeeded and the lock was released.
	/// - `Err(_)`: acquisition or release failed, or `work` failed (remapped through
	///   [`WorkError::into_error`]).
	pub async fn with_lock<T, F, Fut>(
		&self,
		owner: &LockOwner,
		request: &LockRequest,
		work: F,
	) -> Result<Option<T>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, WorkError>>,
	{
		const KIND: GuardKind = GuardKind::Lock;

		let span = GuardSpan::new(KIND, "with_lock", &request.name);

		self.metrics.record(KIND, GuardOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !self.try_lock(owner, request).await? {
					self.metrics.record(KIND, GuardOutcome::TimedOut);

					return Ok(None);
				}

				self.metrics.record(KIND, GuardOutcome::Acquired);

				let key = request.key();
				let guard = ReleaseGuard::new(self.store.clone(), key.clone(), owner.clone());
				let outcome = work().await;
				let released = guard.release().await;

				match outcome {
					Ok(value) => {
						released?;

						Ok(Some(value))
					},
					Err(e) => {
						if let Err(release_error) = released {
							obs::release_failed(&key, &release_error);
						}

						Err(e.into_error())
					},
				}
			})
			.await;

		let outcome = match &result {
			Ok(Some(_)) => GuardOutcome::Success,
			Ok(None) => GuardOutcome::TimedOut,
			Err(_) => GuardOutcome::Failure,
		};

		// Timeouts were already counted inside the span.
		if outcome != GuardOutcome::TimedOut {
			self.metrics.record(KIND, outcome);
		}

		span.record_outcome(outcome);

		result
	}

	/// [`LockManager::with_lock`] on a fair lock.
	pub async fn with_fair_lock<T, F, Fut>(
		&self,
		owner: &LockOwner,
		name: LockName,
		wait_time: u64,
		lease_time: u64,
		unit: TimeUnit,
		work: F,
	) -> Result<Option<T>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, WorkError>>,
	{
		let request =
			LockRequest::new(name, LockMode::Fair).with_timing(wait_time, lease_time, unit);

		self.with_lock(owner, &request, work).await
	}

	/// [`LockManager::with_lock`] on a reentrant lock.
	pub async fn with_reentrant_lock<T, F, Fut>(
		&self,
		owner: &LockOwner,
		name: LockName,
		wait_time: u64,
		lease_time: u64,
		unit: TimeUnit,
		work: F,
	) -> Result<Option<T>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, WorkError>>,
	{
		let request =
			LockRequest::new(name, LockMode::Reentrant).with_timing(wait_time, lease_time, unit);

		self.with_lock(owner, &request, work).await
	}
}

/// Releases the held lock when dropped unless [`ReleaseGuard::release`] already did.
struct ReleaseGuard {
	store: Arc<dyn CoordinationStore>,
	key: LockKey,
	owner: LockOwner,
	armed: bool,
}
impl ReleaseGuard {
	fn new(store: Arc<dyn CoordinationStore>, key: LockKey, owner: LockOwner) -> Self {
		Self { store, key, owner, armed: true }
	}

	async fn release(mut self) -> Result<(), StoreError> {
		self.armed = false;

		lock::release(self.store.as_ref(), &self.key, &self.owner).await.map(|_| ())
	}
}
impl Drop for ReleaseGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		// Work panicked or the call was dropped; finish the release on the runtime.
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			obs::release_failed(&self.key, &"no async runtime available");

			return;
		};
		let store = self.store.clone();
		let key = self.key.clone();
		let owner = self.owner.clone();

		runtime.spawn(async move {
			match lock::release(store.as_ref(), &key, &owner).await {
				Ok(_) => obs::released_on_drop(&key),
				Err(e) => obs::release_failed(&key, &e),
			}
		});
	}
}
