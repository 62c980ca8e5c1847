//! Provisioning transaction for a project's remote resources.
//!
//! Brings a team folder and its access-control group into existence in
//! three steps (group, then folder, then shares), compensating in reverse order
//! when any step fails so no orphaned remote resource stays referenced. A
//! failure inside a compensation itself is logged rather than re-raised,
//! to avoid masking the original error; the orphan it may leave is caught
//! by periodic audit.

use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult};
use crate::store::BindingStore;
use teamdrive_directory::{AccessLevel, DirectoryClient, EntryTag, TeamSnapshot};
use teamdrive_types::{GroupId, MemberId, ProjectId, ProjectStorageBinding, TeamFolderId};
use tracing::{info, warn};

/// Deterministic group name for a project.
#[must_use]
pub fn group_name_for(project: &ProjectId) -> String {
    format!("teamdrive-project-{project}")
}

/// Deterministic team-folder name for a project. Includes the project id
/// so two projects with identical titles never collide.
#[must_use]
pub fn folder_name_for(title: &str, project: &ProjectId) -> String {
    format!("{title} ({project})")
}

async fn rollback_group(client: &DirectoryClient, group: &GroupId) {
    if let Err(e) = client.delete_group(group).await {
        warn!(group = %group, "compensation failed, group orphaned: {e}");
    }
}

async fn rollback_folder(client: &DirectoryClient, folder: &TeamFolderId) {
    if let Err(e) = client.archive_team_folder(folder).await {
        warn!(folder = %folder, "compensation failed, folder orphaned: {e}");
        return;
    }
    if let Err(e) = client.permanently_delete_team_folder(folder).await {
        warn!(folder = %folder, "compensation failed, archived folder orphaned: {e}");
    }
}

/// Provisions a project's remote group and team folder.
///
/// Only on full success is the binding marked complete. A cancellation
/// observed between steps still rolls back what was created.
pub async fn provision_project(
    client: &DirectoryClient,
    store: &BindingStore,
    binding: &ProjectStorageBinding,
    title: &str,
    member_emails: &[String],
    acting_admin: &MemberId,
    admin_group: &GroupId,
    cancel: &CancelFlag,
) -> SyncResult<ProjectStorageBinding> {
    let project = &binding.project_id;
    let group_name = group_name_for(project);
    let folder_name = folder_name_for(title, project);

    // Step A: group plus initial members.
    let group = client.create_group(&group_name).await?;
    if let Err(e) = client.add_group_members(&group.group_id, member_emails).await {
        rollback_group(client, &group.group_id).await;
        return Err(e.into());
    }
    if cancel.is_cancelled() {
        rollback_group(client, &group.group_id).await;
        return Err(SyncError::Cancelled);
    }

    // Step B: team folder.
    let folder = match client.create_team_folder(&folder_name).await {
        Ok(folder) => folder,
        Err(e) => {
            rollback_group(client, &group.group_id).await;
            return Err(e.into());
        }
    };
    if cancel.is_cancelled() {
        rollback_folder(client, &folder.team_folder_id).await;
        rollback_group(client, &group.group_id).await;
        return Err(SyncError::Cancelled);
    }

    // Step C: share onto the folder, project group and admin group alike.
    for share_group in [&group.group_id, admin_group] {
        if let Err(e) = client
            .share_folder(
                acting_admin,
                &folder.team_folder_id,
                share_group,
                AccessLevel::Editor,
            )
            .await
        {
            rollback_folder(client, &folder.team_folder_id).await;
            rollback_group(client, &group.group_id).await;
            return Err(e.into());
        }
    }

    store.mark_provisioned(
        project,
        &binding.team_id,
        &folder.team_folder_id,
        &group.group_id,
    )?;
    info!(
        project = %project,
        folder = %folder.team_folder_id,
        group = %group.group_id,
        "project provisioned"
    );

    let mut completed = binding.clone();
    completed.team_folder_id = Some(folder.team_folder_id);
    completed.group_id = Some(group.group_id);
    Ok(completed)
}

/// Renames the bound team folder when the deterministic name computed from
/// the current title differs from the remote name. Best-effort: failures
/// are logged and swallowed.
pub async fn rename_team_folder_if_needed(
    client: &DirectoryClient,
    snapshot: &TeamSnapshot,
    binding: &ProjectStorageBinding,
    title: &str,
) -> bool {
    let Some(folder) = &binding.team_folder_id else {
        return false;
    };
    let computed = folder_name_for(title, &binding.project_id);
    match snapshot.folder_name(folder) {
        Some(current) if current != computed => {
            match client.rename_team_folder(folder, &computed).await {
                Ok(()) => {
                    info!(folder = %folder, name = %computed, "team folder renamed");
                    true
                }
                Err(e) => {
                    warn!(project = %binding.project_id, folder = %folder, "rename failed: {e}");
                    false
                }
            }
        }
        _ => false,
    }
}

/// Copies the folder structure of `src`'s team folder under `dst`'s.
///
/// The vendor API has no recursive folder-only listing, so the subtree is
/// expanded one level at a time from an explicit worklist; depth never
/// grows the call stack and cancellation lands on a level boundary. The
/// copy is a no-op when the two bindings belong to different teams.
/// Returns the number of folders created.
pub async fn copy_folder_tree(
    client: &DirectoryClient,
    acting_admin: &MemberId,
    src: &ProjectStorageBinding,
    dst: &ProjectStorageBinding,
    src_folder_name: &str,
    dst_folder_name: &str,
    cancel: &CancelFlag,
) -> SyncResult<usize> {
    if src.team_id != dst.team_id {
        return Ok(0);
    }

    let mut worklist = vec![(format!("/{src_folder_name}"), format!("/{dst_folder_name}"))];
    let mut created = 0;
    while let Some((src_path, dst_path)) = worklist.pop() {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        for entry in client.list_folder_entries(acting_admin, &src_path).await? {
            if entry.tag != EntryTag::Folder {
                continue;
            }
            let dst_child = format!("{dst_path}/{}", entry.name);
            client.create_folder(acting_admin, &dst_child).await?;
            created += 1;
            worklist.push((entry.path, dst_child));
        }
    }
    info!(
        src = %src.project_id,
        dst = %dst.project_id,
        folders = created,
        "folder tree copied"
    );
    Ok(created)
}
