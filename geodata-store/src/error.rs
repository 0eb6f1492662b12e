//! Error taxonomy for the driver and store layers.

use geodata_core::{GeometryError, RecordError};
use thiserror::Error;

use crate::driver::ConnectionError;

/// Errors raised by store and driver operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Caller-supplied data had the wrong shape. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The payload could not be turned into a record.
    #[error(transparent)]
    Record(#[from] RecordError),
    /// Geometry text could not be interpreted.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// A capability-gated operation was invoked on a driver that lacks the
    /// capability. DDL-style calls degrade to `Ok(false)` instead.
    #[error("driver does not support {capability}")]
    UnsupportedCapability {
        /// Human-readable name of the missing capability.
        capability: &'static str,
    },
    /// The configured platform name has no dialect table entry.
    #[error("unknown database platform {0:?}")]
    UnknownPlatform(String),
    /// The backend rejected or failed a statement.
    #[error("{operation} failed: {source}")]
    Persistence {
        /// Store operation that was executing.
        operation: &'static str,
        /// Opaque backend failure.
        #[source]
        source: ConnectionError,
    },
}

impl StoreError {
    pub(crate) fn persistence(operation: &'static str) -> impl FnOnce(ConnectionError) -> Self {
        move |source| Self::Persistence { operation, source }
    }
}
