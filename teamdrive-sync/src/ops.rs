//! Per-binding callback surface exposed to the project system.
//!
//! Every institutional storage adapter implements [`StorageOps`]; the
//! vendor-backed implementation here drives the directory client with the
//! binding's acting-admin identity. Access failures are explicit `Result`s
//! rather than documented-only panics.

use crate::admin::sync_group_members;
use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult};
use crate::project::ProjectSystem;
use crate::provision::{copy_folder_tree, folder_name_for};
use crate::store::BindingStore;
use async_trait::async_trait;
use std::sync::Arc;
use teamdrive_directory::DirectoryClient;
use teamdrive_types::{MemberId, ProjectStorageBinding};

/// The capability set every storage adapter exposes to the project system.
#[async_trait]
pub trait StorageOps: Send + Sync {
    /// Creates a folder under the binding's base folder.
    async fn create_folder(&self, name: &str) -> SyncResult<()>;

    /// Removes a folder under the binding's base folder.
    async fn remove_folder(&self, name: &str) -> SyncResult<()>;

    /// Renames a folder under the binding's base folder.
    async fn rename_folder(&self, old_name: &str, new_name: &str) -> SyncResult<()>;

    /// Errs when the base folder cannot be accessed.
    async fn can_access(&self) -> SyncResult<()>;

    /// Copies this binding's folder structure under `dest`'s team folder.
    /// Returns the number of folders created.
    async fn copy_folders(&self, dest: &ProjectStorageBinding) -> SyncResult<usize>;

    /// Aligns the project group's membership with the current contributors.
    async fn sync_contributors(&self) -> SyncResult<()>;

    /// Renames the team folder after a project title change.
    async fn sync_title(&self) -> SyncResult<()>;
}

/// Vendor-backed [`StorageOps`] for one provisioned binding.
pub struct TeamStorage {
    client: Arc<DirectoryClient>,
    store: Arc<BindingStore>,
    projects: Arc<dyn ProjectSystem>,
    binding: ProjectStorageBinding,
    folder_name: String,
    cancel: CancelFlag,
}

impl TeamStorage {
    /// Wraps a provisioned binding. Errs when the binding has no acting
    /// admin yet (reconciliation has not run).
    pub fn new(
        client: Arc<DirectoryClient>,
        store: Arc<BindingStore>,
        projects: Arc<dyn ProjectSystem>,
        binding: ProjectStorageBinding,
        folder_name: impl Into<String>,
        cancel: CancelFlag,
    ) -> SyncResult<Self> {
        if binding.admin_identity.is_none() {
            return Err(SyncError::Admin(format!(
                "binding for project {} has no acting admin",
                binding.project_id
            )));
        }
        Ok(Self {
            client,
            store,
            projects,
            binding,
            folder_name: folder_name.into(),
            cancel,
        })
    }

    fn acting_admin(&self) -> &MemberId {
        // Checked at construction.
        self.binding
            .admin_identity
            .as_ref()
            .expect("binding has acting admin")
    }

    fn sub_path(&self, name: &str) -> String {
        format!("/{}/{name}", self.folder_name)
    }

    /// The binding this surface operates on.
    pub fn binding(&self) -> &ProjectStorageBinding {
        &self.binding
    }

    /// The local store backing this adapter.
    pub fn store(&self) -> &Arc<BindingStore> {
        &self.store
    }
}

#[async_trait]
impl StorageOps for TeamStorage {
    async fn create_folder(&self, name: &str) -> SyncResult<()> {
        self.client
            .create_folder(self.acting_admin(), &self.sub_path(name))
            .await?;
        Ok(())
    }

    async fn remove_folder(&self, name: &str) -> SyncResult<()> {
        self.client
            .delete_folder(self.acting_admin(), &self.sub_path(name))
            .await?;
        Ok(())
    }

    async fn rename_folder(&self, old_name: &str, new_name: &str) -> SyncResult<()> {
        self.client
            .move_folder(
                self.acting_admin(),
                &self.sub_path(old_name),
                &self.sub_path(new_name),
            )
            .await?;
        Ok(())
    }

    async fn can_access(&self) -> SyncResult<()> {
        self.client
            .list_folder_entries(self.acting_admin(), &format!("/{}", self.folder_name))
            .await?;
        Ok(())
    }

    async fn copy_folders(&self, dest: &ProjectStorageBinding) -> SyncResult<usize> {
        let Some(dest_folder) = &dest.team_folder_id else {
            return Err(SyncError::Project(format!(
                "destination project {} is not provisioned",
                dest.project_id
            )));
        };
        let folders = self.client.list_team_folders().await?;
        let dest_name = folders
            .iter()
            .find(|f| &f.team_folder_id == dest_folder)
            .map(|f| f.name.clone())
            .ok_or_else(|| {
                SyncError::Project(format!("destination folder {dest_folder} not found"))
            })?;
        copy_folder_tree(
            &self.client,
            self.acting_admin(),
            &self.binding,
            dest,
            &self.folder_name,
            &dest_name,
            &self.cancel,
        )
        .await
    }

    async fn sync_contributors(&self) -> SyncResult<()> {
        let Some(group) = &self.binding.group_id else {
            return Err(SyncError::Project(format!(
                "project {} is not provisioned",
                self.binding.project_id
            )));
        };
        let contributors = self.projects.contributors(&self.binding.project_id).await?;
        sync_group_members(&self.client, group, &contributors).await
    }

    async fn sync_title(&self) -> SyncResult<()> {
        let Some(folder) = &self.binding.team_folder_id else {
            return Err(SyncError::Project(format!(
                "project {} is not provisioned",
                self.binding.project_id
            )));
        };
        let title = self.projects.project_title(&self.binding.project_id).await?;
        let computed = folder_name_for(&title, &self.binding.project_id);
        if computed != self.folder_name {
            self.client.rename_team_folder(folder, &computed).await?;
        }
        Ok(())
    }
}
