//! Named distributed locks with bounded-wait acquisition and explicit release.
//!
//! [`LockManager`] derives the remote lock purely from `(name, mode)`, so two managers in two
//! processes that ask for the same pair contend for the same lock. Acquisition polls the store
//! until the wait budget runs out; leases are fixed at acquisition and never extended in the
//! background.

pub mod guarded;
pub mod request;

pub use request::*;

// crates.io
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	id::{LockName, LockOwner},
	obs::GuardMetrics,
	store::{CoordinationStore, LockAttempt, LockKey, StoreError, UnlockOutcome},
	unit,
};

/// Lock flavor requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
	#[default]
	/// The holding owner may re-enter; contenders race with no ordering guarantee.
	Reentrant,
	/// Ownership is granted in request order across contenders.
	Fair,
}
impl LockMode {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LockMode::Reentrant => "reentrant",
			LockMode::Fair => "fair",
		}
	}
}
impl Display for LockMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Tuning knobs for the acquisition loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
	/// Longest pause between two acquisition attempts.
	#[serde(with = "crate::config::duration")]
	pub retry_interval: Duration,
	/// Wait budget applied by [`LockManager::request`].
	#[serde(with = "crate::config::duration")]
	pub wait_time: Duration,
	/// Lease applied by [`LockManager::request`].
	#[serde(with = "crate::config::duration")]
	pub lease_time: Duration,
}
impl Default for LockSettings {
	fn default() -> Self {
		Self {
			retry_interval: Duration::from_millis(100),
			wait_time: Duration::from_secs(30),
			lease_time: Duration::from_secs(60),
		}
	}
}

/// Acquires and releases named locks against a shared [`CoordinationStore`].
#[derive(Clone)]
pub struct LockManager {
	/// Store shared with the rest of the process.
	pub store: Arc<dyn CoordinationStore>,
	/// Acquisition loop tuning and request defaults.
	pub settings: LockSettings,
	/// Outcome counters for calls issued through this manager.
	pub metrics: Arc<GuardMetrics>,
}
impl LockManager {
	/// Creates a manager over `store` with default settings.
	pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
		Self { store, settings: LockSettings::default(), metrics: Default::default() }
	}

	/// Overrides the acquisition settings.
	pub fn with_settings(mut self, settings: LockSettings) -> Self {
		self.settings = settings;

		self
	}

	/// Derives the remote lock identity for `(name, mode)`.
	///
	/// Nothing is cached locally; the same pair always maps to the same remote lock.
	pub fn handle(name: &LockName, mode: LockMode) -> LockKey {
		LockKey::new(name.clone(), mode)
	}

	/// Builds a request for `(name, mode)` using the configured wait and lease defaults.
	pub fn request(&self, name: LockName, mode: LockMode) -> LockRequest {
		LockRequest::new(name, mode)
			.with_wait_time(self.settings.wait_time)
			.with_lease_time(self.settings.lease_time)
	}

	/// Waits up to the request's wait budget for the lock.
	///
	/// Returns `true` iff the lock was obtained; it is then held for the request's lease.
	/// Dropping the returned future abandons the wait without taking the lock.
	pub async fn try_lock(&self, owner: &LockOwner, request: &LockRequest) -> Result<bool> {
		if request.lease_time.is_zero() {
			return Err(Error::InvalidArgument { source: "lease time must be positive".into() });
		}

		let key = request.key();
		let deadline = deadline_after(request.wait_time);

		loop {
			let retry_in = match self.store.try_lock(&key, owner, request.lease_time).await? {
				LockAttempt::Acquired => return Ok(true),
				LockAttempt::Held { retry_in } => retry_in,
			};
			let now = Instant::now();

			if now >= deadline {
				if key.mode == LockMode::Fair {
					self.store.abandon(&key, owner).await?;
				}

				return Ok(false);
			}

			let pause = retry_in
				.filter(|hint| !hint.is_zero())
				.map_or(self.settings.retry_interval, |hint| hint.min(self.settings.retry_interval))
				.min(deadline - now);

			time::sleep(pause).await;
		}
	}

	/// Releases one hold of `owner` on `(name, mode)`.
	///
	/// Fails with [`StoreError::NotHeld`] when `owner` does not hold the lock.
	pub async fn unlock(&self, owner: &LockOwner, name: &LockName, mode: LockMode) -> Result<()> {
		let key = Self::handle(name, mode);

		release(self.store.as_ref(), &key, owner).await?;

		Ok(())
	}
}
impl Debug for LockManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockManager").field("settings", &self.settings).finish()
	}
}

pub(crate) async fn release(
	store: &dyn CoordinationStore,
	key: &LockKey,
	owner: &LockOwner,
) -> Result<UnlockOutcome, StoreError> {
	match store.unlock(key, owner).await? {
		UnlockOutcome::NotHeld => Err(StoreError::NotHeld { name: key.name.to_string() }),
		outcome => Ok(outcome),
	}
}

fn deadline_after(wait: Duration) -> Instant {
	unit::instant_after(Instant::now(), wait)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{store::MemoryStore, unit::TimeUnit};

	fn manager() -> (LockManager, MemoryStore) {
		let store = MemoryStore::default();

		(LockManager::new(Arc::new(store.clone())), store)
	}

	fn name(value: &str) -> LockName {
		LockName::new(value).expect("Lock fixture should be valid.")
	}

	#[tokio::test(start_paused = true)]
	async fn try_lock_waits_for_release() {
		let (locks, _) = manager();
		let (a, b) = (LockOwner::random(), LockOwner::random());
		let request = LockRequest::new(name("job:1"), LockMode::Reentrant)
			.with_timing(5, 10, TimeUnit::Seconds);

		assert!(locks.try_lock(&a, &request).await.expect("First acquisition should succeed."));

		let contender = {
			let locks = locks.clone();
			let request = request.clone();

			tokio::spawn(async move { locks.try_lock(&b, &request).await })
		};

		time::sleep(Duration::from_secs(1)).await;
		locks
			.unlock(&a, &name("job:1"), LockMode::Reentrant)
			.await
			.expect("Release should succeed.");

		assert!(
			contender
				.await
				.expect("Contender task should not panic.")
				.expect("Contender acquisition should not error.")
		);
	}

	#[tokio::test(start_paused = true)]
	async fn zero_wait_returns_immediately() {
		let (locks, store) = manager();
		let (a, b) = (LockOwner::random(), LockOwner::random());
		let request = LockRequest::new(name("job:2"), LockMode::Fair)
			.with_timing(0, 10, TimeUnit::Seconds);
		let started = Instant::now();

		assert!(locks.try_lock(&a, &request).await.expect("First acquisition should succeed."));
		assert!(!locks.try_lock(&b, &request).await.expect("Second attempt should not error."));
		assert_eq!(started.elapsed(), Duration::ZERO);
		assert!(store.queued("job:2").is_empty(), "Timed-out fair waiters must leave the queue.");
	}

	#[tokio::test]
	async fn unlock_without_holding_is_an_error() {
		let (locks, _) = manager();
		let err = locks
			.unlock(&LockOwner::random(), &name("job:3"), LockMode::Reentrant)
			.await
			.expect_err("Releasing an unheld lock should fail.");

		assert!(matches!(err, Error::Store(StoreError::NotHeld { .. })));
	}

	#[tokio::test]
	async fn zero_lease_is_rejected() {
		let (locks, _) = manager();
		let request = LockRequest::new(name("job:4"), LockMode::Reentrant)
			.with_timing(1, 0, TimeUnit::Seconds);
		let err = locks
			.try_lock(&LockOwner::random(), &request)
			.await
			.expect_err("A zero lease should be rejected.");

		assert!(matches!(err, Error::InvalidArgument { .. }));
	}

	#[tokio::test(start_paused = true)]
	async fn saturated_lease_is_held_not_overflowed() {
		let (locks, store) = manager();
		let owner = LockOwner::random();
		let request = LockRequest::new(name("job:7"), LockMode::Reentrant)
			.with_timing(0, u64::MAX, TimeUnit::Days);

		assert!(locks.try_lock(&owner, &request).await.expect("Acquisition should succeed."));
		assert_eq!(store.hold_count("job:7", &owner), Some(1));
	}

	#[test]
	fn handles_depend_only_on_name_and_mode() {
		let a = LockManager::handle(&name("job:5"), LockMode::Fair);
		let b = LockManager::handle(&name("job:5"), LockMode::Fair);

		assert_eq!(a, b);
		assert_ne!(a, LockManager::handle(&name("job:5"), LockMode::Reentrant));
	}

	#[test]
	fn requests_pick_up_configured_defaults() {
		let (locks, _) = manager();
		let locks = locks.with_settings(LockSettings {
			wait_time: Duration::from_secs(3),
			lease_time: Duration::from_secs(9),
			..Default::default()
		});
		let request = locks.request(name("job:6"), LockMode::Fair);

		assert_eq!(request.wait_time, Duration::from_secs(3));
		assert_eq!(request.lease_time, Duration::from_secs(9));
	}
}
