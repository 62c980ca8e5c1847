//! Error types for the directory layer.

use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur while talking to the team-management API.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Network-level failure (connect, timeout, malformed body).
    #[error("network error: {0}")]
    Network(String),

    /// Structured error returned by the vendor API.
    #[error("api error {code}: {message}")]
    Api { code: String, message: String },

    /// Authentication failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// An asynchronous membership job reported failure.
    #[error("membership job failed: {0}")]
    JobFailed(String),

    /// An asynchronous membership job never completed.
    #[error("membership job {job_id} still running after {attempts} polls")]
    JobTimeout { job_id: String, attempts: u32 },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Property value could not be encoded or reassembled.
    #[error("property error: {0}")]
    Property(String),
}

impl DirectoryError {
    /// True for membership-mutation outcomes that are already the desired
    /// end state ("duplicate user" on add, "user not found" on remove).
    #[must_use]
    pub fn is_idempotent_membership_outcome(&self) -> bool {
        matches!(
            self,
            DirectoryError::Api { code, .. }
                if code == "duplicate_member" || code == "member_not_found"
        )
    }
}
