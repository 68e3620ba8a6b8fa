//! Runs the Lua-backed store against a live server.
//!
//! Set `REDIS_URL` (e.g. `redis://127.0.0.1:6379`) to enable; every test is a no-op otherwise.
//! Each test writes under its own random namespace.

#![cfg(feature = "redis")]

// std
use std::{env, sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use tokio::time;
// self
use redis_guard::{
	id::{LimiterKey, LockName, LockOwner},
	limiter::RateLimiter,
	lock::LockMode,
	store::{CoordinationStore, LockAttempt, LockKey, RedisStore, UnlockOutcome},
	topology::{ConnectedClient, ConnectionPlan, ConnectionSettings, TopologyDescriptor},
	unit::TimeUnit,
};

const WAITER_TIMEOUT: Duration = Duration::from_secs(5);
const LEASE: Duration = Duration::from_secs(30);

async fn live_store() -> Result<Option<Arc<RedisStore>>> {
	let Ok(address) = env::var("REDIS_URL") else {
		return Ok(None);
	};
	let settings = ConnectionSettings { pool_size: 4, idle_size: 1, ..Default::default() };
	let plan = ConnectionPlan::resolve(&TopologyDescriptor::Single { address }, &settings)?;
	let client = ConnectedClient::connect(&plan).await?;
	let namespace = format!("redis-guard-it:{}", LockOwner::random());
	let store = RedisStore::new(Arc::new(client), Some(&namespace))
		.with_waiter_timeout(WAITER_TIMEOUT);

	Ok(Some(Arc::new(store)))
}

fn lock_key(name: &str, mode: LockMode) -> Result<LockKey> {
	Ok(LockKey::new(LockName::new(name)?, mode))
}

#[tokio::test]
async fn login_window_admits_three_then_resets() -> Result<()> {
	let Some(store) = live_store().await? else {
		return Ok(());
	};
	let limiter = RateLimiter::new(store.clone());
	let key = LimiterKey::new("api:login")?;
	let mut decisions = Vec::new();

	for _ in 0..4 {
		decisions.push(limiter.is_allowed(&key, 3, 1, TimeUnit::Seconds).await?);
	}

	assert_eq!(decisions, [true, true, true, false]);

	time::sleep(Duration::from_millis(1_200)).await;

	assert!(limiter.is_allowed(&key, 3, 1, TimeUnit::Seconds).await?, "The window expired.");

	store.close().await?;

	Ok(())
}

#[tokio::test]
async fn reentrant_holds_count_up_and_down() -> Result<()> {
	let Some(store) = live_store().await? else {
		return Ok(());
	};
	let key = lock_key("job:reentrant", LockMode::Reentrant)?;
	let (a, b) = (LockOwner::random(), LockOwner::random());

	assert_eq!(store.try_lock(&key, &a, LEASE).await?, LockAttempt::Acquired);
	assert_eq!(store.try_lock(&key, &a, LEASE).await?, LockAttempt::Acquired);

	match store.try_lock(&key, &b, LEASE).await? {
		LockAttempt::Held { retry_in: Some(retry_in) } => assert!(retry_in <= LEASE),
		other => panic!("Unexpected attempt: {other:?}"),
	}

	assert_eq!(store.unlock(&key, &a).await?, UnlockOutcome::StillHeld { remaining: 1 });
	assert_eq!(store.unlock(&key, &a).await?, UnlockOutcome::Released);
	assert_eq!(store.try_lock(&key, &b, LEASE).await?, LockAttempt::Acquired);

	store.close().await?;

	Ok(())
}

#[tokio::test]
async fn foreign_unlock_leaves_the_holder_in_place() -> Result<()> {
	let Some(store) = live_store().await? else {
		return Ok(());
	};
	let key = lock_key("job:foreign", LockMode::Reentrant)?;
	let (holder, stranger) = (LockOwner::random(), LockOwner::random());

	assert_eq!(store.try_lock(&key, &holder, LEASE).await?, LockAttempt::Acquired);
	assert_eq!(store.unlock(&key, &stranger).await?, UnlockOutcome::NotHeld);
	assert!(matches!(store.try_lock(&key, &stranger, LEASE).await?, LockAttempt::Held { .. }));
	assert_eq!(store.unlock(&key, &holder).await?, UnlockOutcome::Released);

	store.close().await?;

	Ok(())
}

#[tokio::test]
async fn fair_waiters_are_granted_in_arrival_order() -> Result<()> {
	let Some(store) = live_store().await? else {
		return Ok(());
	};
	let key = lock_key("job:fifo", LockMode::Fair)?;
	let (holder, first, second) = (LockOwner::random(), LockOwner::random(), LockOwner::random());

	assert_eq!(store.try_lock(&key, &holder, LEASE).await?, LockAttempt::Acquired);
	assert!(matches!(store.try_lock(&key, &first, LEASE).await?, LockAttempt::Held { .. }));
	assert!(matches!(store.try_lock(&key, &second, LEASE).await?, LockAttempt::Held { .. }));
	assert_eq!(store.unlock(&key, &holder).await?, UnlockOutcome::Released);
	// Free, but `first` is ahead in the queue.
	assert_eq!(store.try_lock(&key, &second, LEASE).await?, LockAttempt::Held { retry_in: None });
	assert_eq!(store.try_lock(&key, &first, LEASE).await?, LockAttempt::Acquired);
	assert_eq!(store.unlock(&key, &first).await?, UnlockOutcome::Released);
	assert_eq!(store.try_lock(&key, &second, LEASE).await?, LockAttempt::Acquired);

	store.close().await?;

	Ok(())
}

#[tokio::test]
async fn abandoned_waiters_leave_the_queue() -> Result<()> {
	let Some(store) = live_store().await? else {
		return Ok(());
	};
	let key = lock_key("job:abandon", LockMode::Fair)?;
	let (holder, quitter, next) = (LockOwner::random(), LockOwner::random(), LockOwner::random());

	assert_eq!(store.try_lock(&key, &holder, LEASE).await?, LockAttempt::Acquired);
	assert!(matches!(store.try_lock(&key, &quitter, LEASE).await?, LockAttempt::Held { .. }));

	store.abandon(&key, &quitter).await?;

	assert_eq!(store.unlock(&key, &holder).await?, UnlockOutcome::Released);
	assert_eq!(store.try_lock(&key, &next, LEASE).await?, LockAttempt::Acquired);

	store.close().await?;

	Ok(())
}
