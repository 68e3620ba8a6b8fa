//! Deployment shapes of the coordination store and how a client reaches them.
//!
//! Resolution happens in two steps: [`ConnectionPlan::resolve`] turns a descriptor plus
//! [`ConnectionSettings`] into concrete endpoint URLs (pure, no I/O), and
//! [`ConnectedClient::connect`] opens the pooled connections described by the plan.

#[cfg(feature = "redis")] mod client;
#[cfg(feature = "redis")] pub use client::*;

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ConnectionError},
};

/// Address used when a topology does not name one.
pub const DEFAULT_ADDRESS: &str = "redis://127.0.0.1:6379";

/// Deployment shape of the store, tagged by `mode`.
///
/// Each variant carries only the endpoints meaningful to it. An unrecognized `mode` parses as
/// [`TopologyDescriptor::Unspecified`], which resolves to a single node at [`DEFAULT_ADDRESS`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopologyDescriptor {
	/// One standalone node.
	Single {
		/// Node address.
		#[serde(default = "default_address")]
		address: String,
	},
	/// A master with read replicas; every coordination command is routed to the master.
	Master {
		/// Master address.
		master_address: String,
		/// Replica addresses.
		#[serde(default)]
		replica_addresses: Vec<String>,
	},
	/// A sentinel-monitored set; the current master is looked up through the sentinels.
	Sentinel {
		/// Name of the monitored master.
		master_name: String,
		/// Sentinel addresses.
		#[serde(default)]
		sentinel_addresses: Vec<String>,
	},
	/// A sharded cluster.
	Cluster {
		/// Seed node addresses.
		#[serde(default)]
		node_addresses: Vec<String>,
	},
	/// Unknown mode; falls back to a default single node.
	#[serde(other)]
	Unspecified,
}
impl TopologyDescriptor {
	/// Returns the `mode` label.
	pub const fn mode(&self) -> &'static str {
		match self {
			Self::Single { .. } => "single",
			Self::Master { .. } => "master",
			Self::Sentinel { .. } => "sentinel",
			Self::Cluster { .. } => "cluster",
			Self::Unspecified => "unspecified",
		}
	}

	/// Checks that the variant names the endpoints it needs.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let missing = |field| Err(ConfigError::MissingEndpoint { mode: self.mode(), field });

		match self {
			Self::Single { address } if address.trim().is_empty() => missing("address"),
			Self::Master { master_address, .. } if master_address.trim().is_empty() =>
				missing("master address"),
			Self::Sentinel { master_name, .. } if master_name.trim().is_empty() =>
				missing("master name"),
			Self::Sentinel { sentinel_addresses, .. } if sentinel_addresses.is_empty() =>
				missing("sentinel address"),
			Self::Cluster { node_addresses } if node_addresses.is_empty() =>
				missing("node address"),
			_ => Ok(()),
		}
	}
}
impl Default for TopologyDescriptor {
	fn default() -> Self {
		Self::Single { address: default_address() }
	}
}

/// Credentials, database, pool sizing, and timeouts shared by every topology.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
	/// Password; blank values are never sent.
	pub password: Option<String>,
	/// Logical database index; ignored by clusters.
	pub database: i64,
	/// Upper bound on concurrently checked-out connections.
	pub pool_size: usize,
	/// Connections opened eagerly and kept regardless of idleness.
	pub idle_size: usize,
	/// Bound on establishing one connection.
	#[serde(with = "crate::config::duration")]
	pub connect_timeout: Duration,
	/// Idle time after which connections above `idle_size` are dropped.
	#[serde(with = "crate::config::duration")]
	pub idle_timeout: Duration,
	/// Bound on each command, including the wait for a pooled connection.
	#[serde(with = "crate::config::duration")]
	pub timeout: Duration,
}
impl ConnectionSettings {
	/// Checks pool sizing.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.pool_size == 0 || self.pool_size < self.idle_size {
			return Err(ConfigError::InvalidPoolSize { idle_size: self.idle_size });
		}

		Ok(())
	}

	/// Returns the password when it is present and not blank.
	pub fn password(&self) -> Option<&str> {
		self.password.as_deref().filter(|password| !password.trim().is_empty())
	}
}
impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			password: None,
			database: 0,
			pool_size: 20,
			idle_size: 5,
			connect_timeout: Duration::from_secs(3),
			idle_timeout: Duration::from_secs(60),
			timeout: Duration::from_secs(10),
		}
	}
}
impl Debug for ConnectionSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionSettings")
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("database", &self.database)
			.field("pool_size", &self.pool_size)
			.field("idle_size", &self.idle_size)
			.field("connect_timeout", &self.connect_timeout)
			.field("idle_timeout", &self.idle_timeout)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Endpoint URLs of a resolved topology.
#[derive(Clone, PartialEq, Eq)]
pub enum Endpoints {
	/// One standalone node.
	Single(Url),
	/// Master plus replicas.
	Master {
		/// Master URL; receives every command.
		master: Url,
		/// Replica URLs.
		replicas: Vec<Url>,
	},
	/// Sentinels monitoring `master_name`.
	Sentinel {
		/// Monitored master name.
		master_name: String,
		/// Sentinel URLs; carry no credentials or database.
		sentinels: Vec<Url>,
	},
	/// Cluster seed nodes.
	Cluster(Vec<Url>),
}
impl Debug for Endpoints {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Single(url) => f.debug_tuple("Single").field(&Redacted(url)).finish(),
			Self::Master { master, replicas } => f
				.debug_struct("Master")
				.field("master", &Redacted(master))
				.field("replicas", &replicas.iter().map(Redacted).collect::<Vec<_>>())
				.finish(),
			Self::Sentinel { master_name, sentinels } => f
				.debug_struct("Sentinel")
				.field("master_name", master_name)
				.field("sentinels", &sentinels.iter().map(Redacted).collect::<Vec<_>>())
				.finish(),
			Self::Cluster(nodes) => f
				.debug_tuple("Cluster")
				.field(&nodes.iter().map(Redacted).collect::<Vec<_>>())
				.finish(),
		}
	}
}

/// Everything needed to open connections for one topology, with no I/O performed yet.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionPlan {
	/// Endpoint URLs; node URLs embed the password and database where they apply.
	pub endpoints: Endpoints,
	/// Database selected on the master behind a sentinel set.
	pub database: Option<i64>,
	/// Password sent to the master behind a sentinel set.
	pub password: Option<String>,
	/// Upper bound on concurrently checked-out connections.
	pub pool_size: usize,
	/// Connections opened eagerly.
	pub idle_size: usize,
	/// Bound on establishing one connection.
	pub connect_timeout: Duration,
	/// Idle time after which surplus connections are dropped.
	pub idle_timeout: Duration,
	/// Bound on each command.
	pub timeout: Duration,
}
impl ConnectionPlan {
	/// Resolves `topology` and `settings` into endpoint URLs.
	///
	/// Only the fields of the selected variant are read. The password is attached only when it
	/// is not blank, and the database index is never attached to cluster nodes. An unknown mode
	/// ignores `settings` entirely and resolves the default single node with default settings.
	pub fn resolve(
		topology: &TopologyDescriptor,
		settings: &ConnectionSettings,
	) -> Result<Self, Error> {
		if let TopologyDescriptor::Unspecified = topology {
			return Self::resolve(&TopologyDescriptor::default(), &ConnectionSettings::default());
		}

		topology.validate()?;
		settings.validate()?;

		let password = settings.password();
		let database = settings.database;
		let node = |address: &str| node_url(address, password, Some(database));
		let (endpoints, database, password) = match topology {
			TopologyDescriptor::Single { address } =>
				(Endpoints::Single(node(address)?), None, None),
			TopologyDescriptor::Unspecified =>
				(Endpoints::Single(node_url(DEFAULT_ADDRESS, None, Some(0))?), None, None),
			TopologyDescriptor::Master { master_address, replica_addresses } => {
				let master = node(master_address)?;
				let replicas = replica_addresses
					.iter()
					.map(|address| node(address))
					.collect::<Result<_, _>>()?;

				(Endpoints::Master { master, replicas }, None, None)
			},
			TopologyDescriptor::Sentinel { master_name, sentinel_addresses } => {
				let sentinels = sentinel_addresses
					.iter()
					.map(|address| node_url(address, None, None))
					.collect::<Result<_, _>>()?;

				(
					Endpoints::Sentinel { master_name: master_name.trim().to_owned(), sentinels },
					Some(database),
					password.map(ToOwned::to_owned),
				)
			},
			TopologyDescriptor::Cluster { node_addresses } => {
				let nodes = node_addresses
					.iter()
					.map(|address| node_url(address, password, None))
					.collect::<Result<_, _>>()?;

				(Endpoints::Cluster(nodes), None, None)
			},
		};

		Ok(Self {
			endpoints,
			database,
			password,
			pool_size: settings.pool_size,
			idle_size: settings.idle_size,
			connect_timeout: settings.connect_timeout,
			idle_timeout: settings.idle_timeout,
			timeout: settings.timeout,
		})
	}
}

impl Debug for ConnectionPlan {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionPlan")
			.field("endpoints", &self.endpoints)
			.field("database", &self.database)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("pool_size", &self.pool_size)
			.field("idle_size", &self.idle_size)
			.field("connect_timeout", &self.connect_timeout)
			.field("idle_timeout", &self.idle_timeout)
			.field("timeout", &self.timeout)
			.finish()
	}
}

struct Redacted<'a>(&'a Url);
impl Debug for Redacted<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut url = self.0.clone();

		if url.password().is_some() {
			let _ = url.set_password(Some("redacted"));
		}

		write!(f, "{url}")
	}
}

fn default_address() -> String {
	DEFAULT_ADDRESS.into()
}

/// Normalizes `host:port` or `redis[s]://host:port` into a URL carrying the given credentials.
fn node_url(
	address: &str,
	password: Option<&str>,
	database: Option<i64>,
) -> Result<Url, ConnectionError> {
	let invalid = || ConnectionError::InvalidAddress { address: address.to_owned() };
	let trimmed = address.trim();
	let mut url = if trimmed.contains("://") {
		Url::parse(trimmed)
	} else {
		Url::parse(&format!("redis://{trimmed}"))
	}
	.map_err(|_| invalid())?;

	if !matches!(url.scheme(), "redis" | "rediss") || url.host_str().is_none_or(str::is_empty) {
		return Err(invalid());
	}
	if let Some(password) = password {
		url.set_password(Some(password)).map_err(|_| invalid())?;
	}
	if let Some(database) = database {
		url.set_path(&format!("/{database}"));
	}

	Ok(url)
}
