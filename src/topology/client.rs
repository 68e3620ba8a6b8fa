//! Pooled Redis connections for a resolved [`ConnectionPlan`].

// crates.io
use deadpool_redis::{
	Config as NodeConfig, Connection as NodeConnection, Pool as NodePool, PoolConfig, PoolError,
	RedisConnectionInfo, Runtime, Timeouts,
	cluster::{Config as ClusterConfig, Connection as ClusterConnection, Pool as ClusterPool},
	sentinel::{
		Config as SentinelConfig, Connection as SentinelConnection, Pool as SentinelPool,
		SentinelNodeConnectionInfo, SentinelServerType,
	},
};
use redis::{Cmd, Pipeline, RedisFuture, Value, aio::ConnectionLike};
// self
use crate::{
	_prelude::*,
	error::ConnectionError,
	store::StoreError,
	topology::{ConnectionPlan, Endpoints},
};

/// One checked-out connection; it returns to its pool on drop.
pub enum StoreConnection {
	/// Multiplexed connection to one node (single or master).
	Node(NodeConnection),
	/// Connection to the master currently elected by the sentinels.
	Sentinel(SentinelConnection),
	/// Cluster connection routing each command by key slot.
	Cluster(ClusterConnection),
}
impl StoreConnection {
	/// Removes the connection from its pool, e.g. after a failed or timed-out command.
	pub fn discard(self) {
		match self {
			Self::Node(conn) => drop(NodeConnection::take(conn)),
			Self::Sentinel(conn) => drop(SentinelConnection::take(conn)),
			Self::Cluster(conn) => drop(ClusterConnection::take(conn)),
		}
	}
}
impl ConnectionLike for StoreConnection {
	fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
		match self {
			Self::Node(conn) => conn.req_packed_command(cmd),
			Self::Sentinel(conn) => conn.req_packed_command(cmd),
			Self::Cluster(conn) => conn.req_packed_command(cmd),
		}
	}

	fn req_packed_commands<'a>(
		&'a mut self,
		cmd: &'a Pipeline,
		offset: usize,
		count: usize,
	) -> RedisFuture<'a, Vec<Value>> {
		match self {
			Self::Node(conn) => conn.req_packed_commands(cmd, offset, count),
			Self::Sentinel(conn) => conn.req_packed_commands(cmd, offset, count),
			Self::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
		}
	}

	fn get_db(&self) -> i64 {
		match self {
			Self::Node(conn) => conn.get_db(),
			Self::Sentinel(conn) => conn.get_db(),
			Self::Cluster(conn) => conn.get_db(),
		}
	}
}
impl Debug for StoreConnection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Node(_) => f.write_str("StoreConnection::Node"),
			Self::Sentinel(_) => f.write_str("StoreConnection::Sentinel"),
			Self::Cluster(_) => f.write_str("StoreConnection::Cluster"),
		}
	}
}

enum StorePool {
	Node(NodePool),
	Sentinel(SentinelPool),
	Cluster(ClusterPool),
}
impl StorePool {
	fn new(plan: &ConnectionPlan) -> Result<Self, ConnectionError> {
		let mut pool_config = PoolConfig::new(plan.pool_size);

		pool_config.timeouts = Timeouts {
			wait: Some(plan.timeout),
			create: Some(plan.connect_timeout),
			recycle: Some(plan.connect_timeout),
		};

		let pool = match &plan.endpoints {
			Endpoints::Single(url) | Endpoints::Master { master: url, .. } => {
				let mut config = NodeConfig::from_url(url.as_str());

				config.pool = Some(pool_config);

				Self::Node(
					config.create_pool(Some(Runtime::Tokio1)).map_err(ConnectionError::connect)?,
				)
			},
			Endpoints::Sentinel { master_name, sentinels } => {
				let node = SentinelNodeConnectionInfo {
					tls_mode: None,
					redis_connection_info: Some(RedisConnectionInfo {
						db: plan.database.unwrap_or_default(),
						password: plan.password.clone(),
						..Default::default()
					}),
				};
				let mut config = SentinelConfig::from_urls(
					sentinels.iter().map(ToString::to_string).collect::<Vec<_>>(),
					master_name.clone(),
					SentinelServerType::Master,
				)
				.with_node_connection_info(Some(node));

				config.pool = Some(pool_config);

				Self::Sentinel(
					config.create_pool(Some(Runtime::Tokio1)).map_err(ConnectionError::connect)?,
				)
			},
			Endpoints::Cluster(nodes) => {
				let mut config =
					ClusterConfig::from_urls(nodes.iter().map(ToString::to_string).collect::<Vec<_>>());

				config.pool = Some(pool_config);

				Self::Cluster(
					config.create_pool(Some(Runtime::Tokio1)).map_err(ConnectionError::connect)?,
				)
			},
		};

		Ok(pool)
	}

	async fn get(&self) -> Result<StoreConnection, PoolError> {
		match self {
			Self::Node(pool) => pool.get().await.map(StoreConnection::Node),
			Self::Sentinel(pool) => pool.get().await.map(StoreConnection::Sentinel),
			Self::Cluster(pool) => pool.get().await.map(StoreConnection::Cluster),
		}
	}

	fn available(&self) -> usize {
		match self {
			Self::Node(pool) => pool.status().available,
			Self::Sentinel(pool) => pool.status().available,
			Self::Cluster(pool) => pool.status().available,
		}
	}

	// Drops idle connections unused for `idle_timeout`, keeping at least `keep` of them.
	fn evict_idle(&self, keep: usize, idle_timeout: Duration) {
		let mut surplus = self.available().saturating_sub(keep);

		if surplus == 0 {
			return;
		}

		let mut keep_alive = |last_used: Duration| {
			if surplus > 0 && last_used >= idle_timeout {
				surplus -= 1;

				return false;
			}

			true
		};

		match self {
			Self::Node(pool) => drop(pool.retain(|_, metrics| keep_alive(metrics.last_used()))),
			Self::Sentinel(pool) =>
				drop(pool.retain(|_, metrics| keep_alive(metrics.last_used()))),
			Self::Cluster(pool) => drop(pool.retain(|_, metrics| keep_alive(metrics.last_used()))),
		}
	}

	fn close(&self) {
		match self {
			Self::Node(pool) => pool.close(),
			Self::Sentinel(pool) => pool.close(),
			Self::Cluster(pool) => pool.close(),
		}
	}

	fn is_closed(&self) -> bool {
		match self {
			Self::Node(pool) => pool.is_closed(),
			Self::Sentinel(pool) => pool.is_closed(),
			Self::Cluster(pool) => pool.is_closed(),
		}
	}
}

/// Connected, pooled client shared by every store operation.
///
/// At most `pool_size` connections are checked out at once; further callers wait up to the
/// command timeout for one. `idle_size` connections are opened eagerly and kept; surplus
/// connections idle for longer than `idle_timeout` are dropped.
pub struct ConnectedClient {
	pool: StorePool,
	idle_size: usize,
	idle_timeout: Duration,
	connect_timeout: Duration,
	timeout: Duration,
}
impl ConnectedClient {
	/// Opens the eager connections described by `plan`.
	pub async fn connect(plan: &ConnectionPlan) -> Result<Self, ConnectionError> {
		let client = Self {
			pool: StorePool::new(plan)?,
			idle_size: plan.idle_size,
			idle_timeout: plan.idle_timeout,
			connect_timeout: plan.connect_timeout,
			timeout: plan.timeout,
		};
		let mut eager = Vec::with_capacity(plan.idle_size.max(1));

		// Held together so each one is a fresh connection; the first also proves reachability.
		for _ in 0..plan.idle_size.max(1) {
			eager.push(client.pool.get().await.map_err(|e| client.connect_error(e))?);
		}

		drop(eager);

		Ok(client)
	}

	/// Bound applied to each store command.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Checks out a connection, waiting for a free slot.
	pub async fn checkout(&self) -> Result<StoreConnection, StoreError> {
		if self.is_closed() {
			return Err(StoreError::Closed);
		}

		self.pool.evict_idle(self.idle_size, self.idle_timeout);
		self.pool.get().await.map_err(|e| match e {
			PoolError::Closed => StoreError::Closed,
			PoolError::Timeout(_) =>
				StoreError::Timeout { operation: "checkout".into(), timeout: self.timeout },
			e => StoreError::Backend { message: e.to_string() },
		})
	}

	/// Drops every pooled connection; later checkouts fail with [`StoreError::Closed`].
	pub fn close(&self) {
		self.pool.close();
	}

	/// Returns `true` once [`ConnectedClient::close`] ran.
	pub fn is_closed(&self) -> bool {
		self.pool.is_closed()
	}

	/// Number of connections currently parked in the pool.
	pub fn idle_count(&self) -> usize {
		self.pool.available()
	}

	fn connect_error(&self, e: PoolError) -> ConnectionError {
		match e {
			PoolError::Timeout(_) =>
				ConnectionError::ConnectTimeout { timeout: self.connect_timeout },
			e => ConnectionError::connect(e),
		}
	}
}
impl Debug for ConnectedClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectedClient")
			.field("idle", &self.idle_count())
			.field("idle_size", &self.idle_size)
			.field("timeout", &self.timeout)
			.field("closed", &self.is_closed())
			.finish()
	}
}
