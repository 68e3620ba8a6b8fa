//! Redis-backed [`CoordinationStore`].
//!
//! Every state transition runs as one Lua script, so contenders on different processes see
//! each transition atomically. Key layout, with an optional `{namespace}:` prefix:
//!
//! - `lock:{name}`: hash of owner to hold count, expiring with the lease.
//! - `lock:{name}:queue` / `lock:{name}:timeout`: fair-lock wait queue (list) and each waiter's
//!   staleness deadline (sorted set).
//! - `rate:{key}`: fixed-window counter.
//!
//! The braces are cluster hash tags, so a lock's hold and queue keys share one slot.

mod script;

// crates.io
use redis::{RedisError, Script, ScriptInvocation, from_redis_value};
use tokio::time;
// self
use crate::{
	_prelude::*,
	id::{LimiterKey, LockName, LockOwner},
	lock::LockMode,
	store::{CoordinationStore, LockAttempt, LockKey, StoreError, StoreFuture, UnlockOutcome},
	topology::ConnectedClient,
	unit,
};

/// [`CoordinationStore`] over a pooled [`ConnectedClient`].
pub struct RedisStore {
	client: Arc<ConnectedClient>,
	keys: KeySpace,
	waiter_timeout: Duration,
	scripts: Scripts,
}
impl RedisStore {
	/// Default time a fair-queue waiter stays enqueued without polling.
	pub const DEFAULT_WAITER_TIMEOUT: Duration = Duration::from_secs(5);

	/// Wraps `client`, prefixing every key with `namespace` when one is given.
	pub fn new(client: Arc<ConnectedClient>, namespace: Option<&str>) -> Self {
		Self {
			client,
			keys: KeySpace::new(namespace),
			waiter_timeout: Self::DEFAULT_WAITER_TIMEOUT,
			scripts: Scripts::default(),
		}
	}

	/// Overrides how long a silent fair-queue waiter keeps its place.
	pub fn with_waiter_timeout(mut self, timeout: Duration) -> Self {
		self.waiter_timeout = timeout;

		self
	}

	/// Returns the underlying client.
	pub fn client(&self) -> &Arc<ConnectedClient> {
		&self.client
	}

	async fn invoke<T>(
		&self,
		operation: &'static str,
		invocation: ScriptInvocation<'_>,
	) -> Result<T, StoreError>
	where
		T: redis::FromRedisValue,
	{
		let timeout = self.client.timeout();
		let call = async {
			let mut conn = self.client.checkout().await?;
			let reply: Result<redis::Value, RedisError> = invocation.invoke_async(&mut conn).await;

			match reply {
				Ok(value) => Ok::<_, StoreError>(value),
				Err(e) => {
					if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
						conn.discard();
					}

					Err(backend(e))
				},
			}
		};
		let value = time::timeout(timeout, call)
			.await
			.map_err(|_| StoreError::Timeout { operation: operation.into(), timeout })??;

		from_redis_value(&value).map_err(|e| StoreError::Protocol { message: e.to_string() })
	}
}
impl CoordinationStore for RedisStore {
	fn try_lock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
		lease: Duration,
	) -> StoreFuture<'a, LockAttempt> {
		Box::pin(async move {
			let lease_ms = unit::millis_ceil(lease);
			let hold = self.keys.hold(&key.name);
			let reply: Option<i64> = match key.mode {
				LockMode::Reentrant => {
					let mut invocation = self.scripts.reentrant_lock.key(&hold);

					invocation.arg(lease_ms).arg(owner.as_str());

					self.invoke("try_lock", invocation).await?
				},
				LockMode::Fair => {
					let mut invocation = self.scripts.fair_lock.key(&hold);

					invocation
						.key(self.keys.queue(&key.name))
						.key(self.keys.timeout(&key.name))
						.arg(lease_ms)
						.arg(owner.as_str())
						.arg(unit::millis_ceil(self.waiter_timeout));

					self.invoke("try_lock", invocation).await?
				},
			};

			Ok(match reply {
				None => LockAttempt::Acquired,
				Some(ttl) => LockAttempt::Held {
					retry_in: u64::try_from(ttl).ok().map(Duration::from_millis),
				},
			})
		})
	}

	fn unlock<'a>(
		&'a self,
		key: &'a LockKey,
		owner: &'a LockOwner,
	) -> StoreFuture<'a, UnlockOutcome> {
		Box::pin(async move {
			let hold = self.keys.hold(&key.name);
			let mut invocation = self.scripts.unlock.key(&hold);

			invocation.arg(owner.as_str());

			let reply: Option<i64> = self.invoke("unlock", invocation).await?;

			decode_unlock(reply)
		})
	}

	fn abandon<'a>(&'a self, key: &'a LockKey, owner: &'a LockOwner) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let queue = self.keys.queue(&key.name);
			let mut invocation = self.scripts.abandon.key(&queue);

			invocation.key(self.keys.timeout(&key.name)).arg(owner.as_str());

			let _: i64 = self.invoke("abandon", invocation).await?;

			Ok(())
		})
	}

	fn increment<'a>(&'a self, key: &'a LimiterKey, window: Duration) -> StoreFuture<'a, u64> {
		Box::pin(async move {
			let counter = self.keys.counter(key);
			let mut invocation = self.scripts.increment.key(&counter);

			invocation.arg(unit::millis_ceil(window));

			self.invoke("increment", invocation).await
		})
	}

	fn close(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.client.close();

			Ok(())
		})
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisStore")
			.field("client", &self.client)
			.field("keys", &self.keys)
			.field("waiter_timeout", &self.waiter_timeout)
			.finish()
	}
}

struct Scripts {
	reentrant_lock: Script,
	fair_lock: Script,
	unlock: Script,
	abandon: Script,
	increment: Script,
}
impl Default for Scripts {
	fn default() -> Self {
		Self {
			reentrant_lock: Script::new(script::REENTRANT_LOCK),
			fair_lock: Script::new(script::FAIR_LOCK),
			unlock: Script::new(script::UNLOCK),
			abandon: Script::new(script::ABANDON),
			increment: Script::new(script::INCREMENT),
		}
	}
}

/// Remote key naming, optionally namespaced.
#[derive(Clone, Debug, PartialEq, Eq)]
struct KeySpace {
	prefix: String,
}
impl KeySpace {
	fn new(namespace: Option<&str>) -> Self {
		let prefix = match namespace.map(str::trim).filter(|ns| !ns.is_empty()) {
			Some(ns) => format!("{ns}:"),
			None => String::new(),
		};

		Self { prefix }
	}

	fn hold(&self, name: &LockName) -> String {
		format!("{}lock:{{{name}}}", self.prefix)
	}

	fn queue(&self, name: &LockName) -> String {
		format!("{}:queue", self.hold(name))
	}

	fn timeout(&self, name: &LockName) -> String {
		format!("{}:timeout", self.hold(name))
	}

	fn counter(&self, key: &LimiterKey) -> String {
		format!("{}rate:{{{key}}}", self.prefix)
	}
}

fn decode_unlock(reply: Option<i64>) -> Result<UnlockOutcome, StoreError> {
	match reply {
		None => Ok(UnlockOutcome::NotHeld),
		Some(0) => Ok(UnlockOutcome::Released),
		Some(remaining) => u32::try_from(remaining)
			.map(|remaining| UnlockOutcome::StillHeld { remaining })
			.map_err(|_| StoreError::Protocol {
				message: format!("unlock returned an invalid hold count {remaining}"),
			}),
	}
}

fn backend(e: RedisError) -> StoreError {
	StoreError::Backend { message: e.to_string() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn name(value: &str) -> LockName {
		LockName::new(value).expect("Lock fixture should be valid.")
	}

	#[test]
	fn lock_keys_share_one_hash_tag() {
		let keys = KeySpace::new(None);
		let name = name("job:42");

		assert_eq!(keys.hold(&name), "lock:{job:42}");
		assert_eq!(keys.queue(&name), "lock:{job:42}:queue");
		assert_eq!(keys.timeout(&name), "lock:{job:42}:timeout");
	}

	#[test]
	fn namespace_prefixes_every_key() {
		let keys = KeySpace::new(Some("billing"));
		let limiter = LimiterKey::new("api:login").expect("Limiter fixture should be valid.");

		assert_eq!(keys.hold(&name("job:42")), "billing:lock:{job:42}");
		assert_eq!(keys.counter(&limiter), "billing:rate:{api:login}");
		assert_eq!(KeySpace::new(Some("  ")), KeySpace::new(None));
	}

	#[test]
	fn unlock_replies_decode_to_outcomes() {
		assert_eq!(decode_unlock(None), Ok(UnlockOutcome::NotHeld));
		assert_eq!(decode_unlock(Some(0)), Ok(UnlockOutcome::Released));
		assert_eq!(decode_unlock(Some(2)), Ok(UnlockOutcome::StillHeld { remaining: 2 }));
		assert!(matches!(decode_unlock(Some(-1)), Err(StoreError::Protocol { .. })));
	}

	#[test]
	fn scripts_only_touch_declared_keys() {
		for source in [
			script::REENTRANT_LOCK,
			script::FAIR_LOCK,
			script::UNLOCK,
			script::ABANDON,
			script::INCREMENT,
		] {
			assert!(source.contains("KEYS[1]"));
			assert!(!source.contains("redis.call('keys'"));
		}
	}
}
