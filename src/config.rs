//! Coordinator configuration document.
//!
//! Every section has defaults, so `{}` is a complete configuration that talks to a single
//! local node. Durations accept humantime strings (`"3s"`, `"250ms"`) or integer milliseconds.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	lock::LockSettings,
	topology::{ConnectionSettings, TopologyDescriptor},
};

/// Serde adapter for [`Duration`] fields: humantime text or integer milliseconds on input,
/// humantime text on output.
pub mod duration {
	// crates.io
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use crate::_prelude::*;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Repr {
		Millis(u64),
		Text(String),
	}

	/// Writes `value` as humantime text.
	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(&humantime::format_duration(*value))
	}

	/// Reads humantime text or integer milliseconds.
	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Repr::deserialize(deserializer)? {
			Repr::Millis(millis) => Ok(Duration::from_millis(millis)),
			Repr::Text(text) => humantime::parse_duration(text.trim()).map_err(D::Error::custom),
		}
	}
}

/// Lock facility section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
	/// Whether [`crate::Coordinator::locks`] hands out a manager.
	pub enabled: bool,
	/// Acquisition loop tuning and request defaults.
	#[serde(flatten)]
	pub settings: LockSettings,
	/// How long a fair-queue waiter keeps its place without polling.
	#[serde(with = "duration")]
	pub fair_waiter_timeout: Duration,
}
impl LockConfig {
	/// Checks that fair waiters poll before their queue slot goes stale.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.settings.retry_interval >= self.fair_waiter_timeout {
			return Err(ConfigError::RetryOutlivesWaiter {
				retry_interval: self.settings.retry_interval,
				fair_waiter_timeout: self.fair_waiter_timeout,
			});
		}

		Ok(())
	}
}
impl Default for LockConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			settings: LockSettings::default(),
			fair_waiter_timeout: Duration::from_secs(5),
		}
	}
}

/// Rate limiter facility section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Whether [`crate::Coordinator::limiter`] hands out a limiter.
	pub enabled: bool,
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { enabled: true }
	}
}

/// Complete configuration consumed by [`crate::Coordinator`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
	/// Deployment shape of the store.
	pub topology: TopologyDescriptor,
	/// Credentials, database, pool sizing, and timeouts.
	pub connection: ConnectionSettings,
	/// Prefix applied to every remote key, so several applications can share one deployment.
	pub namespace: Option<String>,
	/// Lock facility section.
	pub lock: LockConfig,
	/// Rate limiter facility section.
	pub rate_limit: RateLimitConfig,
}
impl CoordinatorConfig {
	/// Parses and validates a JSON document, reporting the failing field path on error.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(ConfigError::parse)?;

		config.validate()?;

		Ok(config)
	}

	/// Checks the topology, pool, and lock settings for internal consistency.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.topology.validate()?;
		self.connection.validate()?;
		self.lock.validate()
	}

	/// Returns the key namespace, ignoring a blank value.
	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref().map(str::trim).filter(|ns| !ns.is_empty())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let config = CoordinatorConfig::from_json("{}").expect("Empty config should parse.");

		assert_eq!(config, CoordinatorConfig::default());
		assert_eq!(config.lock.settings.wait_time, Duration::from_secs(30));
		assert_eq!(config.lock.settings.lease_time, Duration::from_secs(60));
		assert_eq!(config.lock.settings.retry_interval, Duration::from_millis(100));
		assert_eq!(config.lock.fair_waiter_timeout, Duration::from_secs(5));
		assert!(config.lock.enabled && config.rate_limit.enabled);
		assert_eq!(config.namespace(), None);
	}

	#[test]
	fn durations_accept_text_and_millis() {
		let config = CoordinatorConfig::from_json(
			r#"{"lock":{"wait_time":"5s","lease_time":10000,"fair_waiter_timeout":"1m 30s"}}"#,
		)
		.expect("Config should parse.");

		assert_eq!(config.lock.settings.wait_time, Duration::from_secs(5));
		assert_eq!(config.lock.settings.lease_time, Duration::from_secs(10));
		assert_eq!(config.lock.fair_waiter_timeout, Duration::from_secs(90));
	}

	#[test]
	fn parse_errors_carry_the_field_path() {
		let err = CoordinatorConfig::from_json(r#"{"connection":{"connect_timeout":"soon"}}"#)
			.expect_err("Bad duration should fail.");

		match err {
			ConfigError::Parse { path, .. } => assert_eq!(path, "connection.connect_timeout"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn validation_runs_after_parsing() {
		let err = CoordinatorConfig::from_json(r#"{"connection":{"pool_size":2,"idle_size":4}}"#)
			.expect_err("Idle size above pool size should fail.");

		assert!(matches!(err, ConfigError::InvalidPoolSize { idle_size: 4 }));

		let err = CoordinatorConfig::from_json(r#"{"topology":{"mode":"cluster"}}"#)
			.expect_err("A cluster without nodes should fail.");

		assert!(matches!(err, ConfigError::MissingEndpoint { mode: "cluster", .. }));
	}

	#[test]
	fn fair_waiters_must_outlive_the_retry_interval() {
		let err = CoordinatorConfig::from_json(
			r#"{"lock":{"retry_interval":"10s","fair_waiter_timeout":"5s"}}"#,
		)
		.expect_err("A retry interval above the waiter timeout should fail.");

		assert!(matches!(
			err,
			ConfigError::RetryOutlivesWaiter { retry_interval, fair_waiter_timeout }
				if retry_interval == Duration::from_secs(10)
					&& fair_waiter_timeout == Duration::from_secs(5)
		));
		assert!(
			CoordinatorConfig::from_json(r#"{"lock":{"retry_interval":"1s"}}"#).is_ok(),
			"Defaults leave room for a one second retry interval."
		);
	}

	#[test]
	fn blank_namespace_is_ignored() {
		let mut config = CoordinatorConfig { namespace: Some("  ".into()), ..Default::default() };

		assert_eq!(config.namespace(), None);

		config.namespace = Some("billing".into());

		assert_eq!(config.namespace(), Some("billing"));
	}

	#[test]
	fn durations_serialize_as_text() {
		let json = serde_json::to_value(LockConfig::default()).expect("Config should serialize.");

		assert_eq!(json["wait_time"], "30s");
		assert_eq!(json["retry_interval"], "100ms");
	}
}
