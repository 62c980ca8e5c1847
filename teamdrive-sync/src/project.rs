//! Contracts with the surrounding project system.
//!
//! The reconciliation core owns no user accounts, file metadata, or
//! timestamp authority; it consumes them through [`ProjectSystem`].
//! Implementations live in the host platform; tests use an in-memory fake.

use crate::error::SyncResult;
use async_trait::async_trait;
use teamdrive_types::ProjectId;

/// Attributes of one file as reported by the project system's metadata API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path relative to the project's base folder.
    pub path: String,
    pub size: u64,
    pub content_hash: Option<String>,
}

/// Capabilities the local project system provides to the reconciler.
#[async_trait]
pub trait ProjectSystem: Send + Sync {
    /// Fetches current attributes of a file within a project.
    async fn file_info(&self, project: &ProjectId, path: &str) -> SyncResult<FileInfo>;

    /// True when a valid, unexpired timestamp token already covers this
    /// exact content for this project.
    async fn has_valid_timestamp(
        &self,
        user_id: &str,
        project: &ProjectId,
        info: &FileInfo,
    ) -> SyncResult<bool>;

    /// Mints a timestamp token binding the content hash to trusted time,
    /// attributed to `user_id`.
    async fn mint_timestamp_token(
        &self,
        user_id: &str,
        project: &ProjectId,
        info: &FileInfo,
    ) -> SyncResult<()>;

    /// Resolves a vendor account id to a local user id, when known.
    async fn resolve_user(&self, account_id: &str) -> SyncResult<Option<String>>;

    /// Local identity changes are attributed to when the modifying user
    /// cannot be resolved.
    async fn fallback_user(&self, project: &ProjectId) -> SyncResult<String>;

    /// The project's current title.
    async fn project_title(&self, project: &ProjectId) -> SyncResult<String>;

    /// Email addresses of the project's current contributors.
    async fn contributors(&self, project: &ProjectId) -> SyncResult<Vec<String>>;
}
