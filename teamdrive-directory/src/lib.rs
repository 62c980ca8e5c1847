//! Directory layer for the teamdrive synchronization engine.
//!
//! Wraps the storage vendor's team-management and file APIs:
//!
//! - **Client**: paginated listings, group CRUD with async membership
//!   jobs, team-folder CRUD, sharing ACLs, the delta feed, and per-file
//!   property storage with transparent split/reassembly of oversized
//!   values.
//! - **Snapshot**: a per-cycle cache of one team's membership, roles,
//!   groups, and team-folder inventory.
//!
//! Admin-scoped calls are impersonated by member id; the credential itself
//! comes from an external store and is handed to [`DirectoryClient::new`]
//! as an opaque bearer token.

mod client;
mod config;
mod error;
pub mod properties;
mod snapshot;

pub use client::{
    AccessLevel, ChangeEntry, ChangeFeed, DirectoryClient, EntryTag, FileChange, FolderEntry,
    FolderMember, GroupMember, GroupSummary, PropertyTemplate, TeamFolderSummary, TeamInfo,
    TemplateField,
};
pub use config::DirectoryConfig;
pub use error::{DirectoryError, DirectoryResult};
pub use snapshot::{SnapshotOptions, TeamSnapshot, PROPERTY_TEMPLATE_NAME};
