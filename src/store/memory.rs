//! Thread-safe in-memory [`CoordinationStore`] for local development and tests.
//!
//! Expiry uses [`tokio::time::Instant`], so tests running with a paused clock can advance past
//! leases and windows deterministically.

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	id::{LimiterKey, LockOwner},
	lock::LockMode,
	store::{CoordinationStore, LockAttempt, LockKey, StoreError, StoreFuture, UnlockOutcome},
	unit,
};

type SharedState = Arc<Mutex<State>>;

// Expired entries of keys that are never touched again are swept once this many are tracked.
const SWEEP_THRESHOLD: usize = 1_024;

#[derive(Debug, Default)]
struct State {
	closed: bool,
	holds: HashMap<String, Hold>,
	queues: HashMap<String, VecDeque<Waiter>>,
	counters: HashMap<String, Counter>,
	sweep_floor: usize,
}
impl State {
	fn tracked(&self) -> usize {
		self.holds.len() + self.queues.len() + self.counters.len()
	}

	fn sweep_expired(&mut self, now: Instant) {
		if self.tracked() < self.sweep_floor.max(SWEEP_THRESHOLD) {
			return;
		}

		self.holds.retain(|_, hold| hold.expires_at > now);
		self.counters.retain(|_, counter| counter.expires_at > now);
		self.queues.retain(|_, queue| {
			queue.retain(|w| w.stale_at > now);

			!queue.is_empty()
		});
		// Live keys alone must double before the next full pass.
		self.sweep_floor = self.tracked().saturating_mul(2);
	}
}

#[derive(Debug)]
struct Hold {
	owner: LockOwner,
	count: u32,
	expires_at: Instant,
}

#[derive(Debug)]
struct Waiter {
	owner: LockOwner,
	stale_at: Instant,
}

#[derive(Debug)]
struct Counter {
	value: u64,
	expires_at: Instant,
}

/// In-process backend mirroring the remote lock and counter semantics.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	state: SharedState,
	waiter_timeout: Duration,
}
impl MemoryStore {
	/// Default time a fair-queue waiter stays enqueued without polling.
	pub const DEFAULT_WAITER_TIMEOUT: Duration = Duration::from_secs(5);

	/// Overrides how long a silent fair-queue waiter keeps its place.
	pub fn with_waiter_timeout(mut self, timeout: Duration) -> Self {
		self.waiter_timeout = timeout;

		self
	}

	/// Returns the hold count `owner` has on `name`, if it currently holds the lock.
	pub fn hold_count(&self, name: &str, owner: &LockOwner) -> Option<u32> {
		let mut state = self.state.lock();

		Self::live_hold(&mut state, name, Instant::now())
			.filter(|hold| &hold.owner == owner)
			.map(|hold| hold.count)
	}

	/// Returns the owners currently waiting in the fair queue of `name`, head first.
	pub fn queued(&self, name: &str) -> Vec<LockOwner> {
		let mut state = self.state.lock();
		let now = Instant::now();

		Self::prune_queue(&mut state, name, now);

		state
			.queues
			.get(name)
			.map(|queue| queue.iter().map(|w| w.owner.clone()).collect())
			.unwrap_or_default()
	}

	fn live_hold<'s>(state: &'s mut State, name: &str, now: Instant) -> Option<&'s mut Hold> {
		if state.holds.get(name).is_some_and(|hold| hold.expires_at <= now) {
			state.holds.remove(name);
		}

		state.holds.get_mut(name)
	}

	fn prune_queue(state: &mut State, name: &str, now: Instant) {
		if let Some(queue) = state.queues.get_mut(name) {
			while queue.front().is_some_and(|w| w.stale_at <= now) {
				queue.pop_front();
			}
			if queue.is_empty() {
				state.queues.remove(name);
			}
		}
	}

	fn try_lock_now(
		state: SharedState,
		key: &LockKey,
		owner: &LockOwner,
		lease: Duration,
		waiter_timeout: Duration,
	) -> Result<LockAttempt, StoreError> {
		let mut state = state.lock();

		if state.closed {
			return Err(StoreError::Closed);
		}

		let name = key.name.as_str();
		let now = Instant::now();
		let expires_at = unit::instant_after(now, lease);
		let stale_at = unit::instant_after(now, waiter_timeout);

		state.sweep_expired(now);

		if key.mode == LockMode::Fair {
			Self::prune_queue(&mut state, name, now);
		}

		if let Some(hold) = Self::live_hold(&mut state, name, now) {
			if &hold.owner == owner {
				hold.count = hold.count.saturating_add(1);
				hold.expires_at = expires_at;

				return Ok(LockAttempt::Acquired);
			}

			let retry_in = Some(hold.expires_at.saturating_duration_since(now));

			if key.mode == LockMode::Fair {
				Self::enqueue(&mut state, name, owner, stale_at);
			}

			return Ok(LockAttempt::Held { retry_in });
		}

		if key.mode == LockMode::Fair {
			let head = state.queues.get(name).and_then(|queue| queue.front());

			if head.is_some_and(|w| &w.owner != owner) {
				Self::enqueue(&mut state, name, owner, stale_at);

				return Ok(LockAttempt::Held { retry_in: None });
			}

			Self::dequeue(&mut state, name, owner);
		}

		let hold = Hold { owner: owner.clone(), count: 1, expires_at };

		state.holds.insert(name.to_owned(), hold);

		Ok(LockAttempt::Acquired)
	}

	fn enqueue(state: &mut State, name: &str, owner: &LockOwner, stale_at: Instant) {
		let queue = state.queues.entry(name.to_owned()).or_default();

		match queue.iter_mut().find(|w| &w.owner == owner) {
			Some(waiter) => waiter.stale_at = stale_at,
			None => queue.push_back(Waiter { owner: owner.clone(), stale_at }),
		}
	}

	fn dequeue(state: &mut State, name: &str, owner: &LockOwner) {
		if let Some(queue) = state.queues.get_mut(name) {
			queue.retain(|w| &w.owner != owner);

			if queue.is_empty() {
				state.queues.remove(name);
			}
		}
	}

	fn unlock_now(
		state: SharedState,
		key: &LockKey,
		owner: &LockOwner,
	) -> Result<UnlockOutcome, StoreError> {
		let mut state = state.lock();

		if state.closed {
			return Err(StoreError::Closed);
		}

		let name = key.name.as_str();
		let outcome = match Self::live_hold(&mut state, name, Instant::now()) {
			Some(hold) if &hold.owner == owner => {
				hold.count -= 1;

				if hold.count == 0 {
					UnlockOutcome::Released
				} else {
					UnlockOutcome::StillHeld { remaining: hold.count }
				}
			},
			_ => UnlockOutcome::NotHeld,
		};

		if outcome == UnlockOutcome::Released {
			state.holds.remove(name);
		}

		Ok(outcome)
	}

	fn increment_now(
		state: SharedState,
		key: &LimiterKey,
		window: Duration,
	) -> Result<u64, StoreError> {
		let mut state = state.lock();

		if state.closed {
			return Err(StoreError::Closed);
		}

		let now = Instant::now();

		state.sweep_expired(now);

		let expires_at = unit::instant_after(now, window);
		let counter =
			state.counters.entry(key.to_string()).or_insert(Counter { value: 0, expires_at });

		if counter.expires_at <= now {
			*counter = Counter { value: 0, expires_at };
		}

		counter.value = counter.value.saturating_add(1);

		Ok(counter.value)
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self { state: Default::default(), waiter_timeout: Self::DEFAULT_WAITER_TIMEOUT }
	}
}
impl CoordinationStore for MemoryStore {
	fn try_lock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
		lease: Duration,
	) -> StoreFuture<'a, LockAttempt> {
		let state = self.state.clone();
		let waiter_timeout = self.waiter_timeout;

		Box::pin(async move { Self::try_lock_now(state, key, owner, lease, waiter_timeout) })
	}

	fn unlock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
	) -> StoreFuture<'a, UnlockOutcome> {
		let state = self.state.clone();

		Box::pin(async move { Self::unlock_now(state, key, owner) })
	}

	fn abandon<'a>(&'a self, key: &'a LockKey, owner: &'a LockOwner) -> StoreFuture<'a, ()> {
		let state = self.state.clone();

		Box::pin(async move {
			Self::dequeue(&mut state.lock(), key.name.as_str(), owner);

			Ok(())
		})
	}

	fn increment<'a>(&'a self, key: &'a LimiterKey, window: Duration) -> StoreFuture<'a, u64> {
		let state = self.state.clone();

		Box::pin(async move { Self::increment_now(state, key, window) })
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		let state = self.state.clone();

		Box::pin(async move {
			let mut state = state.lock();

			state.closed = true;
			state.holds.clear();
			state.queues.clear();
			state.counters.clear();

			Ok(())
		})
	}
}
