//! Error types for the Volume Restore Operator

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Error while waiting on an object condition
    #[error("Wait error: {0}")]
    Wait(#[from] kube::runtime::wait::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Snapshot not found
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// Snapshot exists but never reached a ready state within the poll window
    #[error("Snapshot '{snapshot}' is not ready: {reason}")]
    SnapshotNotReady { snapshot: String, reason: String },

    /// PVC not found
    #[error("PVC not found: {0}")]
    PvcNotFound(String),

    /// Pod bound to an affected claim was not placed by the expected scheduler
    #[error("Pod '{pod}' was not placed by the expected scheduler (found '{scheduler}')")]
    UnexpectedScheduler { pod: String, scheduler: String },

    /// Data-plane restore failed in the driver
    #[error("Restore driver error: {0}")]
    DriverFailed(String),

    /// One or more pod evictions failed, merged into a single error
    #[error("Failed to evict {} pod(s): {}", .failures.len(), .failures.join("; "))]
    PodEviction { failures: Vec<String> },

    /// Pod still present after the bounded deletion wait
    #[error("Timed out waiting for pod '{0}' to be deleted")]
    PodDeletionTimeout(String),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a driver failure error
    pub fn driver(msg: impl Into<String>) -> Self {
        Error::DriverFailed(msg.into())
    }
}
