//! The local record linking a project to its provisioned remote resources.

use crate::ids::{GroupId, MemberId, ProjectId, TeamFolderId, TeamId};
use serde::{Deserialize, Serialize};

/// One local project's link to a remote team folder.
///
/// `team_folder_id` and `group_id` are populated only after a provisioning
/// transaction completes in full; while either is absent the binding is
/// pending (or a previous attempt failed and was rolled back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStorageBinding {
    /// The owning local project.
    pub project_id: ProjectId,
    /// The remote team this binding belongs to.
    pub team_id: TeamId,
    /// The provisioned team folder, once provisioning succeeded.
    pub team_folder_id: Option<TeamFolderId>,
    /// The provisioned access-control group, once provisioning succeeded.
    pub group_id: Option<GroupId>,
    /// The acting-admin identity used for impersonated calls.
    pub admin_identity: Option<MemberId>,
    /// Opaque delta-API token marking reconciliation progress.
    pub change_cursor: Option<String>,
}

impl ProjectStorageBinding {
    /// Creates a pending binding with no remote resources yet.
    #[must_use]
    pub fn pending(project_id: ProjectId, team_id: TeamId) -> Self {
        Self {
            project_id,
            team_id,
            team_folder_id: None,
            group_id: None,
            admin_identity: None,
            change_cursor: None,
        }
    }

    /// True once both remote resources exist.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.team_folder_id.is_some() && self.group_id.is_some()
    }
}
