//! Process-wide entry point: one store, shared by the lock manager and the rate limiter.

// self
use crate::{
	_prelude::*,
	config::CoordinatorConfig,
	error::ConfigError,
	limiter::RateLimiter,
	lock::LockManager,
	obs,
	store::{CoordinationStore, MemoryStore},
};
#[cfg(feature = "redis")]
use crate::{
	store::RedisStore,
	topology::{ConnectedClient, ConnectionPlan},
};

/// Owns the connected store and hands out the guards configured on it.
///
/// Build one per process and share it by reference (or clone the cheap handles it returns).
/// Call [`Coordinator::shutdown`] to release the store's connections.
pub struct Coordinator {
	config: CoordinatorConfig,
	store: Arc<dyn CoordinationStore>,
	locks: LockManager,
	limiter: RateLimiter,
}
impl Coordinator {
	/// Resolves the configured topology and opens the pooled Redis connections.
	#[cfg(feature = "redis")]
	pub async fn connect(config: CoordinatorConfig) -> Result<Self> {
		let plan = ConnectionPlan::resolve(&config.topology, &config.connection)?;
		let client = ConnectedClient::connect(&plan).await?;
		let store = RedisStore::new(Arc::new(client), config.namespace())
			.with_waiter_timeout(config.lock.fair_waiter_timeout);

		obs::store_connected(config.topology.mode(), plan.pool_size);

		Ok(Self::with_store(Arc::new(store), config))
	}

	/// Always fails: this build has no Redis backend.
	#[cfg(not(feature = "redis"))]
	pub async fn connect(config: CoordinatorConfig) -> Result<Self> {
		let _ = config;

		Err(ConfigError::RedisUnavailable.into())
	}

	/// Builds a coordinator over an in-process store, for tests and single-process deployments.
	pub fn in_memory(config: CoordinatorConfig) -> Self {
		let store = MemoryStore::default().with_waiter_timeout(config.lock.fair_waiter_timeout);

		Self::with_store(Arc::new(store), config)
	}

	/// Builds a coordinator over an existing store.
	pub fn with_store(store: Arc<dyn CoordinationStore>, config: CoordinatorConfig) -> Self {
		let locks = LockManager::new(store.clone()).with_settings(config.lock.settings);
		let limiter = RateLimiter::new(store.clone());

		Self { config, store, locks, limiter }
	}

	/// Active configuration.
	pub fn config(&self) -> &CoordinatorConfig {
		&self.config
	}

	/// Shared store.
	pub fn store(&self) -> &Arc<dyn CoordinationStore> {
		&self.store
	}

	/// Lock manager, unless locks are disabled.
	pub fn locks(&self) -> Result<&LockManager, ConfigError> {
		if !self.config.lock.enabled {
			return Err(ConfigError::Disabled { facility: "lock" });
		}

		Ok(&self.locks)
	}

	/// Rate limiter, unless rate limiting is disabled.
	pub fn limiter(&self) -> Result<&RateLimiter, ConfigError> {
		if !self.config.rate_limit.enabled {
			return Err(ConfigError::Disabled { facility: "rate limit" });
		}

		Ok(&self.limiter)
	}

	/// Closes the store; every later operation fails with [`crate::store::StoreError::Closed`].
	pub async fn shutdown(&self) -> Result<()> {
		self.store.close().await?;

		obs::store_closed();

		Ok(())
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("config", &self.config)
			.field("locks", &self.locks)
			.field("limiter", &self.limiter)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{id::LimiterKey, store::StoreError};

	#[tokio::test]
	async fn disabled_facilities_are_reported() {
		let mut config = CoordinatorConfig::default();

		config.lock.enabled = false;

		let coordinator = Coordinator::in_memory(config);

		assert!(matches!(coordinator.locks(), Err(ConfigError::Disabled { facility: "lock" })));
		assert!(coordinator.limiter().is_ok());
	}

	#[tokio::test]
	async fn lock_settings_flow_into_the_manager() {
		let mut config = CoordinatorConfig::default();

		config.lock.settings.lease_time = Duration::from_secs(7);

		let coordinator = Coordinator::in_memory(config);
		let locks = coordinator.locks().expect("Locks are enabled by default.");

		assert_eq!(locks.settings.lease_time, Duration::from_secs(7));
	}

	#[tokio::test]
	async fn shutdown_closes_the_store() {
		let coordinator = Coordinator::in_memory(CoordinatorConfig::default());
		let key = LimiterKey::new("api:shutdown").expect("Limiter fixture should be valid.");

		coordinator.shutdown().await.expect("Shutdown should succeed.");

		let err = coordinator
			.limiter()
			.expect("Limiter is enabled by default.")
			.is_allowed_secs(&key, 1, 1)
			.await
			.expect_err("A closed store should refuse work.");

		assert!(matches!(err, Error::Store(StoreError::Closed)));
	}
}
