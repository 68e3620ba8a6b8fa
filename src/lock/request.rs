//! Lock acquisition requests.

// self
use crate::{_prelude::*, id::LockName, lock::LockMode, store::LockKey, unit::TimeUnit};

/// Parameters of one acquisition: which lock, how long to wait, and how long to hold it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
	/// Lock name.
	pub name: LockName,
	/// Lock flavor.
	pub mode: LockMode,
	/// Longest time to wait for the lock; zero makes a single attempt.
	pub wait_time: Duration,
	/// Lease granted on acquisition; the store frees the lock after it elapses.
	pub lease_time: Duration,
}
impl LockRequest {
	const DEFAULT_LEASE: Duration = Duration::from_secs(60);

	/// Creates a single-attempt request for `(name, mode)` with a 60 second lease.
	pub fn new(name: LockName, mode: LockMode) -> Self {
		Self { name, mode, wait_time: Duration::ZERO, lease_time: Self::DEFAULT_LEASE }
	}

	/// Sets wait and lease from integer amounts sharing one unit.
	pub fn with_timing(mut self, wait_time: u64, lease_time: u64, unit: TimeUnit) -> Self {
		self.wait_time = unit.duration(wait_time);
		self.lease_time = unit.duration(lease_time);

		self
	}

	/// Overrides the wait budget.
	pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
		self.wait_time = wait_time;

		self
	}

	/// Overrides the lease.
	pub fn with_lease_time(mut self, lease_time: Duration) -> Self {
		self.lease_time = lease_time;

		self
	}

	/// Returns the remote lock identity targeted by this request.
	pub fn key(&self) -> LockKey {
		LockKey::new(self.name.clone(), self.mode)
	}
}
