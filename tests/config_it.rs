// std
use std::time::Duration;
// crates.io
use color_eyre::Result;
// self
use redis_guard::{
	cache::CacheSpec,
	config::CoordinatorConfig,
	error::ConfigError,
	topology::{ConnectionPlan, Endpoints, TopologyDescriptor},
};

#[test]
fn sentinel_document_resolves_to_a_plan() -> Result<()> {
	let config = CoordinatorConfig::from_json(
		r#"{
			"topology": {
				"mode": "sentinel",
				"master_name": "coordination",
				"sentinel_addresses": ["10.0.0.1:26379", "redis://10.0.0.2:26379"]
			},
			"connection": {
				"password": "pw",
				"database": 4,
				"pool_size": 8,
				"idle_size": 2,
				"connect_timeout": "500ms",
				"timeout": 2000
			},
			"namespace": "billing",
			"lock": { "wait_time": "2s", "lease_time": "15s" }
		}"#,
	)?;
	let plan = ConnectionPlan::resolve(&config.topology, &config.connection)?;

	assert_eq!(config.namespace(), Some("billing"));
	assert_eq!(config.lock.settings.lease_time, Duration::from_secs(15));
	assert_eq!(plan.pool_size, 8);
	assert_eq!(plan.idle_size, 2);
	assert_eq!(plan.connect_timeout, Duration::from_millis(500));
	assert_eq!(plan.timeout, Duration::from_secs(2));
	assert_eq!(plan.idle_timeout, Duration::from_secs(60));
	assert_eq!(plan.database, Some(4));

	let Endpoints::Sentinel { master_name, sentinels } = plan.endpoints else {
		panic!("Sentinel topology should resolve to sentinel endpoints.");
	};

	assert_eq!(master_name, "coordination");
	assert_eq!(sentinels.len(), 2);

	Ok(())
}

#[test]
fn unknown_mode_is_permissive() -> Result<()> {
	let config = CoordinatorConfig::from_json(r#"{"topology":{"mode":"replicated"}}"#)?;

	assert_eq!(config.topology, TopologyDescriptor::Unspecified);
	assert!(matches!(
		ConnectionPlan::resolve(&config.topology, &config.connection)?.endpoints,
		Endpoints::Single(_)
	));

	Ok(())
}

#[test]
fn missing_endpoints_are_rejected() {
	let err = CoordinatorConfig::from_json(r#"{"topology":{"mode":"sentinel","master_name":"m"}}"#)
		.expect_err("Sentinel without sentinels should fail.");

	assert!(matches!(err, ConfigError::MissingEndpoint { mode: "sentinel", .. }));
}

#[test]
fn cache_identifiers_follow_the_name_ttl_convention() -> Result<()> {
	let default_ttl = Duration::from_secs(300);
	let orders = CacheSpec::parse("orders#30s", default_ttl)?;
	let plain = CacheSpec::parse("orders", default_ttl)?;
	let blank = CacheSpec::parse("#30s", default_ttl)?;

	assert_eq!((orders.name.as_str(), orders.ttl), ("orders", Duration::from_secs(30)));
	assert_eq!((plain.name.as_str(), plain.ttl), ("orders", default_ttl));
	assert_eq!(blank.ttl, default_ttl);
	assert!(matches!(
		CacheSpec::parse("orders#soon", default_ttl),
		Err(ConfigError::InvalidCacheTtl { .. })
	));

	Ok(())
}
