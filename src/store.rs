//! Coordination store contract and its built-in backends.
//!
//! A store exposes exactly the two remote primitives the guards rely on: a named lock with
//! reentrant and fair flavors (bounded single attempt + lease, explicit release), and an
//! atomic increment that arms the counter's expiry on the first write of a window.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::RedisStore;

// self
use crate::{
	_prelude::*,
	id::{LimiterKey, LockName, LockOwner},
	lock::LockMode,
};

/// Boxed future returned by [`CoordinationStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Backend contract shared by the lock manager and the rate limiter.
pub trait CoordinationStore
where
	Self: Send + Sync,
{
	/// Makes one acquisition attempt for `owner`; never waits.
	///
	/// On success the lock is held with an expiry of `lease` from now. A reentrant lock already
	/// held by `owner` increments its hold count and re-arms the lease. Fair locks enqueue
	/// `owner` on a failed attempt and only grant the lock to the head of the queue.
	fn try_lock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
		lease: Duration,
	) -> StoreFuture<'a, LockAttempt>;

	/// Releases one hold of `owner` on the lock.
	fn unlock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
	) -> StoreFuture<'a, UnlockOutcome>;

	/// Withdraws `owner` from a fair lock's wait queue after giving up.
	fn abandon<'a>(&'a self, key: &'a LockKey, owner: &'a LockOwner) -> StoreFuture<'a, ()>;

	/// Atomically increments the window counter, arming `window` as its expiry on first write.
	///
	/// Returns the post-increment value.
	fn increment<'a>(&'a self, key: &'a LimiterKey, window: Duration) -> StoreFuture<'a, u64>;

	/// Releases backend resources; later calls fail with [`StoreError::Closed`].
	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

/// Identity of a remote lock: the caller's name plus the lock flavor.
///
/// Both flavors share the same remote hold record, so a reentrant and a fair lock with the
/// same name still exclude each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
	/// Caller-supplied lock name.
	pub name: LockName,
	/// Lock flavor.
	pub mode: LockMode,
}
impl LockKey {
	/// Builds the key for `name` under `mode`.
	pub fn new(name: LockName, mode: LockMode) -> Self {
		Self { name, mode }
	}
}
impl Display for LockKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", self.mode, self.name)
	}
}

/// Result of a single acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockAttempt {
	/// The lock is now held by the caller.
	Acquired,
	/// Another owner holds the lock (or is ahead in the fair queue).
	Held {
		/// Remaining lease of the current holder, when known.
		retry_in: Option<Duration>,
	},
}

/// Result of a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockOutcome {
	/// The last hold was released; the lock is free.
	Released,
	/// A reentrant hold was released but the owner still holds the lock.
	StillHeld {
		/// Holds remaining after this release.
		remaining: u32,
	},
	/// The caller did not hold the lock (never acquired, or the lease expired).
	NotHeld,
}

/// Error type produced by [`CoordinationStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Reply did not match the expected shape.
	#[error("Unexpected reply: {message}.")]
	Protocol {
		/// Human-readable error payload.
		message: String,
	},
	/// Operation exceeded the configured timeout.
	#[error("Operation `{operation}` timed out after {timeout:?}.")]
	Timeout {
		/// Operation label.
		operation: String,
		/// Configured timeout.
		timeout: Duration,
	},
	/// Release attempted by an owner that does not hold the lock.
	#[error("Lock `{name}` is not held by the releasing owner.")]
	NotHeld {
		/// Lock name.
		name: String,
	},
	/// The store was closed.
	#[error("The coordination store has been closed.")]
	Closed,
}
