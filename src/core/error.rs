//! Core library errors.

use std::fmt::Display;
use std::time::Duration;

use group_service::{GroupServiceError, SessionError};
use thiserror::Error;

use crate::core::state_machine::Lifecycle;

/// Remote call a lifecycle operation was making when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Allocate,
    Fetch,
    Attach,
    Detach,
    Remove,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Operation::Allocate => "allocate",
            Operation::Fetch => "fetch",
            Operation::Attach => "attach",
            Operation::Detach => "detach",
            Operation::Remove => "remove",
        };
        write!(f, "{op}")
    }
}

/// Errors that can occur while managing a cluster group.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or empty identity field, or malformed membership input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session provider could not supply an account.
    #[error("Authentication error: {0}")]
    Authentication(#[from] SessionError),

    /// The remote service has no group with this name.
    #[error("Cluster group {name} not found")]
    NotFound { name: String },

    #[error("Failed to {operation} cluster group {name}: {source}")]
    RemoteOperation {
        operation: Operation,
        name: String,
        #[source]
        source: GroupServiceError,
    },

    #[error("{operation} of cluster group {name} timed out after {after:?}")]
    Timeout {
        operation: Lifecycle,
        name: String,
        after: Duration,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl CoreError {
    /// Wrap a remote failure. A by-name lookup or removal that finds nothing
    /// becomes `NotFound`; a miss on attach/detach stays a remote failure.
    pub(crate) fn remote(operation: Operation, name: &str, source: GroupServiceError) -> Self {
        let by_name = matches!(operation, Operation::Fetch | Operation::Remove);
        if by_name && source.is_not_found() {
            CoreError::NotFound {
                name: name.to_string(),
            }
        } else {
            CoreError::remote_failure(operation, name, source)
        }
    }

    /// Wrap a remote failure without the by-name NotFound mapping.
    pub(crate) fn remote_failure(
        operation: Operation,
        name: &str,
        source: GroupServiceError,
    ) -> Self {
        CoreError::RemoteOperation {
            operation,
            name: name.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}
