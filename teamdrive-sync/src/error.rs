//! Error types for the reconciliation layer.

use teamdrive_directory::DirectoryError;
use thiserror::Error;

/// Result type for reconciliation operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Error from the directory layer (vendor API).
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Local store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Error from the project-system collaborator.
    #[error("project system error: {0}")]
    Project(String),

    /// Admin reconciliation could not determine an acting admin.
    #[error("admin reconciliation failed: {0}")]
    Admin(String),

    /// Lock or queue I/O failure.
    #[error("lock error: {0}")]
    Lock(String),

    /// The cycle was cooperatively cancelled.
    #[error("operation cancelled")]
    Cancelled,
}
