//! Crate-level error types shared by the lock manager, rate limiter, stores, and resolver.

// self
use crate::{_prelude::*, unit::TimeUnit};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The last four variants form the closed taxonomy that guarded execution maps caller failures
/// into (see [`crate::work::WorkError`]); [`Error::RateLimitExceeded`] is deliberately kept
/// apart from it so callers can tell "denied" from "my code broke".
#[derive(Debug, ThisError)]
pub enum Error {
	/// Coordination store failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The store could not be reached while building the connected client.
	#[error(transparent)]
	Connection(#[from] ConnectionError),

	/// Admission was refused for the current window.
	#[error("Rate limit exceeded for `{key}`: at most {max} per {ttl} {unit}.")]
	RateLimitExceeded {
		/// Limiter key that was evaluated.
		key: String,
		/// Maximum admissions per window.
		max: u64,
		/// Window length expressed in `unit`.
		ttl: u64,
		/// Unit applied to `ttl`.
		unit: TimeUnit,
	},
	/// Unrecoverable failure reported by guarded work; never wrapped further.
	#[error("Guarded work failed fatally: {source}")]
	Fatal {
		/// Original failure.
		#[source]
		source: BoxError,
	},
	/// Guarded work was invoked with bad arguments or missing capabilities.
	#[error("Invalid argument: {source}")]
	InvalidArgument {
		/// Original failure.
		#[source]
		source: BoxError,
	},
	/// Generic runtime failure raised by guarded work.
	#[error("{source}")]
	Runtime {
		/// Underlying cause.
		#[source]
		source: BoxError,
	},
	/// Guarded work observed a cancellation request.
	#[error("Guarded work was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the error is an admission rejection.
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimitExceeded { .. })
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid at `{path}`.")]
	Parse {
		/// Path to the offending field.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::id::IdentifierError),
	/// Cache identifier carries a TTL suffix that cannot be parsed.
	#[error("Cache `{name}` declares an invalid TTL `{ttl}`.")]
	InvalidCacheTtl {
		/// Logical cache name.
		name: String,
		/// Raw duration text.
		ttl: String,
	},
	/// Topology lacks the endpoints its mode requires.
	#[error("The {mode} topology requires at least one {field}.")]
	MissingEndpoint {
		/// Topology mode label.
		mode: &'static str,
		/// Missing field label.
		field: &'static str,
	},
	/// Pool sizing is inconsistent.
	#[error("Pool size must be positive and not smaller than the idle size ({idle_size}).")]
	InvalidPoolSize {
		/// Configured minimum idle size.
		idle_size: usize,
	},
	/// Fair waiters would be pruned as stale between two of their own polls.
	#[error(
		"Lock retry interval {retry_interval:?} must be shorter than the fair waiter timeout \
		 {fair_waiter_timeout:?}."
	)]
	RetryOutlivesWaiter {
		/// Configured pause between acquisition attempts.
		retry_interval: Duration,
		/// Configured fair-queue waiter timeout.
		fair_waiter_timeout: Duration,
	},
	/// Facility was disabled in configuration.
	#[error("The {facility} facility is disabled.")]
	Disabled {
		/// Facility label.
		facility: &'static str,
	},
	/// This build does not include the Redis backend.
	#[error("Redis support is not compiled in; enable the `redis` feature.")]
	RedisUnavailable,
}
impl ConfigError {
	/// Wraps a `serde_path_to_error` failure, keeping the field path.
	pub fn parse(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}

/// Failures raised while resolving a topology into a connected client.
#[derive(Debug, ThisError)]
pub enum ConnectionError {
	/// Endpoint could not be turned into a connection URL.
	#[error("Endpoint `{address}` is not a valid Redis address.")]
	InvalidAddress {
		/// Offending address as configured.
		address: String,
	},
	/// The store refused or dropped the connection attempt.
	#[error("Failed to connect to the coordination store.")]
	Connect {
		/// Client-specific failure.
		#[source]
		source: BoxError,
	},
	/// Connection establishment exceeded the configured timeout.
	#[error("Connecting to the coordination store timed out after {timeout:?}.")]
	ConnectTimeout {
		/// Configured connect timeout.
		timeout: Duration,
	},
}
impl ConnectionError {
	/// Wraps a client-specific connection failure.
	pub fn connect(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Connect { source: Box::new(src) }
	}
}
