//! Fleet-wide coordination primitives on top of a shared Redis deployment—named distributed
//! locks (reentrant or fair) and fixed-window admission limits, each wrapped in a guarded
//! execution helper with a small, stable failure surface.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod id;
pub mod limiter;
pub mod lock;
pub mod obs;
pub mod store;
pub mod topology;
pub mod unit;
pub mod work;

pub use coordinator::Coordinator;
pub use error::{Error, Result};

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "redis")] pub use redis;
pub use url;
#[cfg(test)] use color_eyre as _;
