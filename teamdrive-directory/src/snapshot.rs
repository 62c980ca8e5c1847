//! Per-cycle cache of a remote team's membership, groups, and folders.
//!
//! A snapshot is built fresh at the start of a synchronization cycle and
//! discarded at the end. Construction options control which listings are
//! drained eagerly so callers only pay for the API calls they need.

use crate::client::DirectoryClient;
use crate::error::DirectoryResult;
use crate::properties;
use std::collections::HashMap;
use teamdrive_types::{GroupId, MemberId, TeamFolderId, TeamId, TeamMember, TemplateId};
use tracing::debug;

/// Name of the property template holding per-file provenance data.
pub const PROPERTY_TEMPLATE_NAME: &str = "teamdrive provenance";

/// Which listings to drain while building a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    pub members: bool,
    pub groups: bool,
    pub team_folders: bool,
    pub properties: bool,
}

impl SnapshotOptions {
    /// Everything: members, groups, team folders, property template.
    #[must_use]
    pub fn all() -> Self {
        Self {
            members: true,
            groups: true,
            team_folders: true,
            properties: true,
        }
    }

    /// Members and groups, as needed by admin reconciliation.
    #[must_use]
    pub fn membership() -> Self {
        Self {
            members: true,
            groups: true,
            ..Self::default()
        }
    }
}

/// One full scrape of a remote team at a point in time.
#[derive(Debug)]
pub struct TeamSnapshot {
    team_id: TeamId,
    team_name: String,
    members: HashMap<MemberId, TeamMember>,
    groups_by_name: HashMap<String, GroupId>,
    group_names: HashMap<GroupId, String>,
    folder_names: HashMap<TeamFolderId, String>,
    folder_ids: HashMap<String, TeamFolderId>,
    property_template: Option<TemplateId>,
}

impl TeamSnapshot {
    /// Builds a snapshot, draining only the listings `options` request.
    pub async fn build(
        client: &DirectoryClient,
        options: SnapshotOptions,
    ) -> DirectoryResult<Self> {
        let info = client.team_info().await?;
        let mut snapshot = Self {
            team_id: info.team_id,
            team_name: info.name,
            members: HashMap::new(),
            groups_by_name: HashMap::new(),
            group_names: HashMap::new(),
            folder_names: HashMap::new(),
            folder_ids: HashMap::new(),
            property_template: None,
        };

        if options.members {
            snapshot.refresh_members(client).await?;
        }
        if options.groups {
            snapshot.refresh_groups(client).await?;
        }
        if options.team_folders {
            snapshot.refresh_team_folders(client).await?;
        }
        if options.properties {
            snapshot.refresh_property_template(client).await?;
        }
        Ok(snapshot)
    }

    /// Re-drains the member listing, replacing the member index.
    pub async fn refresh_members(&mut self, client: &DirectoryClient) -> DirectoryResult<()> {
        let members = client.list_members().await?;
        debug!(team = %self.team_id, count = members.len(), "refreshed members");
        self.members = members
            .into_iter()
            .map(|m| (m.member_id.clone(), m))
            .collect();
        Ok(())
    }

    /// Re-drains the group listing, replacing both direction indices.
    pub async fn refresh_groups(&mut self, client: &DirectoryClient) -> DirectoryResult<()> {
        let groups = client.list_groups().await?;
        debug!(team = %self.team_id, count = groups.len(), "refreshed groups");
        self.groups_by_name.clear();
        self.group_names.clear();
        for group in groups {
            self.groups_by_name
                .insert(group.name.clone(), group.group_id.clone());
            self.group_names.insert(group.group_id, group.name);
        }
        Ok(())
    }

    /// Re-drains the team-folder listing. Existing entries are updated in
    /// place rather than duplicated, so repeated calls within one snapshot
    /// support change detection between polls.
    pub async fn refresh_team_folders(&mut self, client: &DirectoryClient) -> DirectoryResult<()> {
        let folders = client.list_team_folders().await?;
        debug!(team = %self.team_id, count = folders.len(), "refreshed team folders");
        for folder in folders {
            self.folder_names.insert(folder.team_folder_id, folder.name);
        }
        self.folder_ids = self
            .folder_names
            .iter()
            .map(|(id, name)| (name.clone(), id.clone()))
            .collect();
        Ok(())
    }

    /// Ensures the provenance property template exists remotely, creating
    /// it or extending it when the locally expected field set has grown.
    pub async fn refresh_property_template(
        &mut self,
        client: &DirectoryClient,
    ) -> DirectoryResult<()> {
        let mut expected = properties::template_fields("token");
        expected.push("hash".to_string());

        for template_id in client.list_property_templates().await? {
            let template = client.get_property_template(&template_id).await?;
            if template.name != PROPERTY_TEMPLATE_NAME {
                continue;
            }
            let present: Vec<String> = template.fields.into_iter().map(|f| f.name).collect();
            let missing: Vec<String> = expected
                .iter()
                .filter(|f| !present.contains(f))
                .cloned()
                .collect();
            client.update_property_template(&template_id, &missing).await?;
            self.property_template = Some(template_id);
            return Ok(());
        }

        let created = client
            .create_property_template(PROPERTY_TEMPLATE_NAME, &expected)
            .await?;
        self.property_template = Some(created);
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn member(&self, id: &MemberId) -> Option<&TeamMember> {
        self.members.get(id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member ids holding the admin role, sorted for determinism.
    #[must_use]
    pub fn admin_ids(&self) -> Vec<MemberId> {
        let mut ids: Vec<MemberId> = self
            .members
            .values()
            .filter(|m| m.role.is_admin())
            .map(|m| m.member_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Emails of admin members, sorted for determinism.
    #[must_use]
    pub fn admin_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .members
            .values()
            .filter(|m| m.role.is_admin())
            .map(|m| m.email.clone())
            .collect();
        emails.sort();
        emails
    }

    pub fn group_id(&self, name: &str) -> Option<&GroupId> {
        self.groups_by_name.get(name)
    }

    pub fn group_name(&self, id: &GroupId) -> Option<&str> {
        self.group_names.get(id).map(String::as_str)
    }

    pub fn folder_name(&self, id: &TeamFolderId) -> Option<&str> {
        self.folder_names.get(id).map(String::as_str)
    }

    pub fn folder_id(&self, name: &str) -> Option<&TeamFolderId> {
        self.folder_ids.get(name)
    }

    /// The provenance template id, when `properties` was requested.
    pub fn property_template(&self) -> Option<&TemplateId> {
        self.property_template.as_ref()
    }

    /// Resolves a changed path to its team folder by top-level segment,
    /// returning the folder id and the path relative to it. Paths whose
    /// top segment is not a known team folder return `None`.
    #[must_use]
    pub fn resolve_top_folder(&self, path: &str) -> Option<(TeamFolderId, String)> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let (top, rest) = match trimmed.split_once('/') {
            Some((top, rest)) => (top, rest),
            None => (trimmed, ""),
        };
        let id = self.folder_ids.get(top)?;
        Some((id.clone(), rest.to_string()))
    }
}
