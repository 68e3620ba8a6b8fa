//! `name#duration` cache identifiers.
//!
//! The part before the first `#` names the cache; the part after it overrides the default TTL
//! for that cache only. A bare integer counts seconds; anything else is read as humantime
//! (`30s`, `5m`, `1h 30m`).

// self
use crate::{_prelude::*, error::ConfigError};

/// A cache name paired with the TTL its entries should use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
	/// Logical cache name.
	pub name: String,
	/// TTL applied to this cache's entries.
	#[serde(with = "crate::config::duration")]
	pub ttl: Duration,
}
impl CacheSpec {
	/// Parses `identifier`, falling back to `default_ttl` when no override applies.
	///
	/// Identifiers without `#`, with a blank name, or with a blank duration are used verbatim
	/// with `default_ttl`. A non-blank duration that cannot be parsed is an error.
	pub fn parse(identifier: &str, default_ttl: Duration) -> Result<Self, ConfigError> {
		let verbatim = || Self { name: identifier.to_owned(), ttl: default_ttl };
		let Some((name, ttl)) = identifier.split_once('#') else {
			return Ok(verbatim());
		};
		let (name, ttl) = (name.trim(), ttl.trim());

		if name.is_empty() || ttl.is_empty() {
			return Ok(verbatim());
		}

		let ttl = parse_ttl(ttl).ok_or_else(|| ConfigError::InvalidCacheTtl {
			name: name.to_owned(),
			ttl: ttl.to_owned(),
		})?;

		Ok(Self { name: name.to_owned(), ttl })
	}
}
impl FromStr for CacheSpec {
	type Err = ConfigError;

	/// Parses with a zero default TTL, meaning "no expiry override".
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s, Duration::ZERO)
	}
}

fn parse_ttl(raw: &str) -> Option<Duration> {
	match raw.parse::<u64>() {
		Ok(secs) => Some(Duration::from_secs(secs)),
		Err(_) => humantime::parse_duration(raw).ok(),
	}
}
