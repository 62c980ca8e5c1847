//! Acting-admin reconciliation.
//!
//! Impersonated API calls need an admin member id, but the remote admin
//! group is the authority and can drift at any time. Each cycle repairs
//! the dedicated admin group, then picks a canonical acting admin by
//! majority vote across the team's bindings, falling back to any current
//! admin when the majority choice went stale.

use crate::error::{SyncError, SyncResult};
use crate::store::BindingStore;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use teamdrive_directory::{AccessLevel, DirectoryClient, DirectoryError, TeamSnapshot};
use teamdrive_types::{GroupId, MemberId};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Name of the dedicated admin group on every team.
pub const ADMIN_GROUP_NAME: &str = "teamdrive-admins";

/// Parallelism bound for per-binding share verification.
pub const SHARE_CHECK_CONCURRENCY: usize = 10;

/// Outcome of one admin reconciliation pass.
#[derive(Debug, Clone)]
pub struct AdminReconciliation {
    /// The canonical identity for impersonated calls this cycle.
    pub acting_admin: MemberId,
    /// The dedicated admin group.
    pub admin_group: GroupId,
    /// Whether the group's membership was rewritten.
    pub membership_synced: bool,
    /// Bindings whose acting admin changed (cursors were reset).
    pub bindings_updated: usize,
    /// Folders whose admin-group share was re-established.
    pub shares_repaired: usize,
    /// Folders whose share check failed (isolated, non-fatal).
    pub share_failures: usize,
}

/// Aligns a group's remote membership with `target_emails`.
///
/// Computes the add/remove diff against the current membership so a
/// second invocation with the same target issues no job calls at all.
pub async fn sync_group_members(
    client: &DirectoryClient,
    group: &GroupId,
    target_emails: &[String],
) -> SyncResult<()> {
    let current = client.list_group_members(group).await?;
    let current_emails: HashSet<&str> = current.iter().map(|m| m.email.as_str()).collect();
    let target: HashSet<&str> = target_emails.iter().map(String::as_str).collect();

    let to_add: Vec<String> = target
        .difference(&current_emails)
        .map(|e| (*e).to_string())
        .collect();
    let to_remove: Vec<String> = current_emails
        .difference(&target)
        .map(|e| (*e).to_string())
        .collect();

    client.add_group_members(group, &to_add).await?;
    client.remove_group_members(group, &to_remove).await?;
    Ok(())
}

/// Runs the admin reconciliation pass for one team.
///
/// Group repair (steps 1–2) is fatal for the cycle on failure; per-binding
/// share verification failures are isolated and reported in the result.
pub async fn reconcile_admin(
    client: &DirectoryClient,
    snapshot: &mut TeamSnapshot,
    store: &BindingStore,
) -> SyncResult<AdminReconciliation> {
    let team = snapshot.team_id().clone();

    // Step 1: ensure the dedicated admin group exists. A create that loses
    // the race to a concurrent process is resolved by re-fetching groups.
    let (admin_group, created) = match snapshot.group_id(ADMIN_GROUP_NAME) {
        Some(id) => (id.clone(), false),
        None => match client.create_group(ADMIN_GROUP_NAME).await {
            Ok(group) => (group.group_id, true),
            Err(create_err) => {
                snapshot.refresh_groups(client).await?;
                match snapshot.group_id(ADMIN_GROUP_NAME) {
                    Some(id) => (id.clone(), false),
                    None => return Err(create_err.into()),
                }
            }
        },
    };

    // Step 2: sync the group's membership when it was just created, is
    // empty, or carries members who are no longer admins.
    let admin_ids: HashSet<MemberId> = snapshot.admin_ids().into_iter().collect();
    let current = client.list_group_members(&admin_group).await?;
    let needs_sync = created
        || current.is_empty()
        || current.iter().any(|m| !admin_ids.contains(&m.member_id));

    let valid: HashSet<MemberId> = if needs_sync {
        sync_group_members(client, &admin_group, &snapshot.admin_emails()).await?;
        info!(team = %team, group = %admin_group, "admin group membership synced");
        admin_ids
    } else {
        current.into_iter().map(|m| m.member_id).collect()
    };

    // Step 3: majority vote across binding admin identities, restricted to
    // members still in the admin group.
    let bindings = store.bindings_for_team(&team)?;
    let mut counts: HashMap<&MemberId, usize> = HashMap::new();
    for binding in &bindings {
        if let Some(admin) = &binding.admin_identity {
            *counts.entry(admin).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&MemberId, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut valid_sorted: Vec<&MemberId> = valid.iter().collect();
    valid_sorted.sort();

    let acting_admin = ranked
        .iter()
        .map(|(id, _)| *id)
        .find(|id| valid.contains(*id))
        .or_else(|| valid_sorted.first().copied())
        .cloned()
        .ok_or_else(|| SyncError::Admin(format!("team {team} has no admins")))?;

    // Step 4: propagate the chosen admin and reset stale cursors. File
    // listings are scoped to the calling identity, so a new acting admin
    // forces a rescan from the beginning.
    let mut bindings_updated = 0;
    for binding in &bindings {
        if binding.admin_identity.as_ref() != Some(&acting_admin) {
            store.set_admin_identity(&binding.project_id, &team, &acting_admin)?;
            store.clear_change_cursor(&binding.project_id, &team)?;
            bindings_updated += 1;
        }
    }
    if bindings_updated > 0 {
        store.clear_team_cursor(&team)?;
        info!(
            team = %team,
            admin = %acting_admin,
            bindings = bindings_updated,
            "acting admin changed, cursors reset"
        );
    }

    // Step 5: verify the admin group is still shared onto every binding's
    // team folder with edit access. Folders are independent, so checks run
    // in a bounded pool; one failure never blocks the others.
    let semaphore = Arc::new(Semaphore::new(SHARE_CHECK_CONCURRENCY));
    let checks = bindings.iter().filter_map(|binding| {
        let folder = binding.team_folder_id.clone()?;
        let project = binding.project_id;
        let semaphore = semaphore.clone();
        let acting = acting_admin.clone();
        let group = admin_group.clone();
        Some(async move {
            let _permit = semaphore.acquire().await;
            let repaired = async {
                let members = client.list_folder_members(&acting, &folder).await?;
                let shared = members
                    .iter()
                    .any(|m| m.group_id == group && m.access_level == AccessLevel::Editor);
                if shared {
                    Ok::<bool, DirectoryError>(false)
                } else {
                    client
                        .share_folder(&acting, &folder, &group, AccessLevel::Editor)
                        .await?;
                    Ok(true)
                }
            }
            .await;
            match repaired {
                Ok(repaired) => (repaired, false),
                Err(e) => {
                    warn!(project = %project, folder = %folder, "share check failed: {e}");
                    (false, true)
                }
            }
        })
    });
    let outcomes = join_all(checks).await;
    let shares_repaired = outcomes.iter().filter(|(repaired, _)| *repaired).count();
    let share_failures = outcomes.iter().filter(|(_, failed)| *failed).count();

    Ok(AdminReconciliation {
        acting_admin,
        admin_group,
        membership_synced: needs_sync,
        bindings_updated,
        shares_repaired,
        share_failures,
    })
}
