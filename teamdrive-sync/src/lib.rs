//! Team reconciliation engine for institutional storage.
//!
//! Keeps a research-data platform's project bindings consistent with a
//! storage vendor's team service: remote group and team-folder
//! provisioning with rollback, acting-admin election, membership sync,
//! and change-feed-driven timestamp verification.
//!
//! # Components
//!
//! - **Store**: SQLite-backed bindings, cursors, file nodes, audit log
//! - **Lock**: directory-create mutex plus the durable pending-work queue
//! - **Admin**: majority-vote acting-admin reconciliation
//! - **Provision**: the group/folder/share transaction with compensation
//! - **Reconciler**: delta-feed walk with per-file timestamp tokens
//! - **Job**: the orchestrator composing one full cycle per team
//!
//! # Cycle
//!
//! 1. **Snapshot**: drain the member/group/folder listings once
//! 2. **Admin**: repair the admin group, elect the acting admin
//! 3. **Changes**: walk the delta feed, verify or mint timestamp tokens
//! 4. **Persist**: save the new cursor only after the batch completes

pub mod admin;
mod cancel;
mod error;
pub mod job;
pub mod lock;
pub mod ops;
pub mod project;
pub mod provision;
pub mod reconciler;
mod store;

pub use admin::{
    reconcile_admin, sync_group_members, AdminReconciliation, ADMIN_GROUP_NAME,
    SHARE_CHECK_CONCURRENCY,
};
pub use cancel::CancelFlag;
pub use error::{SyncError, SyncResult};
pub use job::{
    ClientProvider, CycleReport, MaintenanceReport, RunOutcome, StaticClients, SyncJob,
    SyncJobConfig,
};
pub use lock::{CycleLock, PendingQueue, LOCK_PREFIX, PLAN_LOCK, QUEUE_FILE, RUN_LOCK};
pub use ops::{StorageOps, TeamStorage};
pub use project::{FileInfo, ProjectSystem};
pub use provision::{
    copy_folder_tree, folder_name_for, group_name_for, provision_project,
    rename_team_folder_if_needed,
};
pub use reconciler::{reconcile_changes, ReconcileStats};
pub use store::{AuditAction, AuditEntry, BindingStore};
