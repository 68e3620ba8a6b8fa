//! Failure classification for caller-supplied work executed under a guard.
//!
//! Guarded work returns `Result<T, WorkError>`. The caller classifies its own failure when
//! constructing the [`WorkError`]; the guard then remaps it into the closed [`Error`] taxonomy
//! with [`WorkError::into_error`]:
//!
//! | Work reports            | Caller observes                                   |
//! |-------------------------|---------------------------------------------------|
//! | `Fatal`                 | [`Error::Fatal`], unchanged                       |
//! | `InvalidUsage`          | [`Error::InvalidArgument`] wrapping the original  |
//! | `Wrapped`               | [`Error::Runtime`] carrying the *inner* cause     |
//! | `Runtime`               | [`Error::Runtime`], unchanged                     |
//! | `Cancelled`             | [`Error::Cancelled`], never remapped              |
//! | `Other`                 | [`Error::Runtime`] carrying the original          |

// self
use crate::{_prelude::*, error::BoxError};

/// Failure raised by caller-supplied work, classified by the caller.
#[derive(Debug, ThisError)]
pub enum WorkError {
	/// Unrecoverable condition; surfaced unchanged.
	#[error("{0}")]
	Fatal(BoxError),
	/// Bad argument, missing capability, or dispatch setup failure.
	#[error("{0}")]
	InvalidUsage(BoxError),
	/// Failure that only wraps a deeper cause; the cause is surfaced.
	#[error("{wrapper}")]
	Wrapped {
		/// Outer failure, e.g. from a dispatch layer.
		wrapper: BoxError,
		/// Underlying failure handed to the caller.
		#[source]
		cause: BoxError,
	},
	/// Already a runtime failure; surfaced unchanged.
	#[error("{0}")]
	Runtime(BoxError),
	/// The work observed a cancellation request and stopped.
	#[error("Work was cancelled.")]
	Cancelled,
	/// Anything else; wrapped into a runtime failure.
	#[error("{0}")]
	Other(BoxError),
}
impl WorkError {
	/// Classifies `e` as fatal.
	pub fn fatal(e: impl Into<BoxError>) -> Self {
		Self::Fatal(e.into())
	}

	/// Classifies `e` as an invalid-usage failure.
	pub fn invalid_usage(e: impl Into<BoxError>) -> Self {
		Self::InvalidUsage(e.into())
	}

	/// Classifies `wrapper` as a failure that only carries `cause`; the cause is surfaced.
	pub fn wrapped(wrapper: impl Into<BoxError>, cause: impl Into<BoxError>) -> Self {
		Self::Wrapped { wrapper: wrapper.into(), cause: cause.into() }
	}

	/// Classifies `e` as a runtime failure.
	pub fn runtime(e: impl Into<BoxError>) -> Self {
		Self::Runtime(e.into())
	}

	/// Classifies `e` as an unspecified failure.
	pub fn other(e: impl Into<BoxError>) -> Self {
		Self::Other(e.into())
	}

	/// Remaps the failure into the closed [`Error`] taxonomy.
	pub fn into_error(self) -> Error {
		match self {
			Self::Fatal(source) => Error::Fatal { source },
			Self::InvalidUsage(source) => Error::InvalidArgument { source },
			Self::Wrapped { cause, .. } => Error::Runtime { source: cause },
			Self::Runtime(source) | Self::Other(source) => Error::Runtime { source },
			Self::Cancelled => Error::Cancelled,
		}
	}
}
impl From<Error> for WorkError {
	fn from(e: Error) -> Self {
		match e {
			Error::Fatal { source } => Self::Fatal(source),
			Error::InvalidArgument { source } => Self::InvalidUsage(source),
			Error::Cancelled => Self::Cancelled,
			Error::Runtime { source } => Self::Runtime(source),
			other => Self::Runtime(Box::new(other)),
		}
	}
}
impl From<std::io::Error> for WorkError {
	fn from(e: std::io::Error) -> Self {
		match e.kind() {
			std::io::ErrorKind::InvalidInput | std::io::ErrorKind::Unsupported =>
				Self::invalid_usage(e),
			std::io::ErrorKind::Interrupted => Self::Cancelled,
			_ => Self::other(e),
		}
	}
}
