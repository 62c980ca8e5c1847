//! HTTP client for the vendor's team-management and file APIs.
//!
//! All endpoints are JSON-over-POST with bearer authentication. Calls that
//! require administrative privilege are impersonated by setting the
//! `X-Act-As-Admin` header to a team admin's member id.

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::properties::{decode_value, encode_value};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use teamdrive_types::{GroupId, MemberId, TeamFolderId, TeamId, TeamMember, TemplateId};
use tracing::{debug, info, warn};

const ADMIN_HEADER: &str = "X-Act-As-Admin";

/// Access level granted when sharing a folder with a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Editor,
    Viewer,
}

/// Identity of the remote team.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamInfo {
    pub team_id: TeamId,
    pub name: String,
}

/// One group as reported by the group listing.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSummary {
    pub group_id: GroupId,
    pub name: String,
}

/// One member of a group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMember {
    pub member_id: MemberId,
    pub email: String,
}

/// One team folder as reported by the folder listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamFolderSummary {
    pub team_folder_id: TeamFolderId,
    pub name: String,
}

/// A group's membership in a shared folder's ACL.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderMember {
    pub group_id: GroupId,
    pub access_level: AccessLevel,
}

/// One entry of a non-recursive folder listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderEntry {
    pub tag: EntryTag,
    pub name: String,
    pub path: String,
}

/// Entry kind in folder listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryTag {
    File,
    Folder,
}

/// A classified entry from the delta feed.
#[derive(Debug, Clone)]
pub enum ChangeEntry {
    /// File content added or changed.
    File(FileChange),
    /// Folder created.
    Folder { path: String },
    /// Entry deleted.
    Deleted { path: String },
}

/// Detail carried by a file change.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: String,
    pub size: u64,
    pub content_hash: Option<String>,
    /// Account id of the user who made the change, when the vendor knows it.
    pub modified_by: Option<String>,
    pub server_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// A fully drained walk of the delta feed.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    pub entries: Vec<ChangeEntry>,
    /// Token to resume from on the next poll.
    pub next_cursor: String,
}

/// A property template's declared fields.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyTemplate {
    pub name: String,
    pub fields: Vec<TemplateField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(alias = "members", alias = "groups", alias = "team_folders", alias = "entries")]
    items: Vec<T>,
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct JobHandle {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CursorResponse {
    cursor: String,
}

#[derive(Debug, Deserialize)]
struct ChangePage {
    entries: Vec<ChangeEntryWire>,
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ChangeEntryWire {
    tag: String,
    path: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    modified_by: Option<String>,
    #[serde(default)]
    server_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateList {
    template_ids: Vec<TemplateId>,
}

#[derive(Debug, Deserialize)]
struct TemplateCreated {
    template_id: TemplateId,
}

#[derive(Debug, Deserialize)]
struct PropertyFields {
    fields: Vec<PropertyFieldWire>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropertyFieldWire {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

/// Client for the team-management API.
pub struct DirectoryClient {
    config: DirectoryConfig,
    http: Client,
    access_token: String,
}

impl DirectoryClient {
    /// Creates a client from a config and a bearer token.
    pub fn new(config: DirectoryConfig, access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");
        Self {
            config,
            http,
            access_token: access_token.into(),
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
        admin: Option<&MemberId>,
    ) -> DirectoryResult<T> {
        let mut request = self
            .http
            .post(format!("{}{endpoint}", self.config.api_base_url))
            .bearer_auth(&self.access_token)
            .json(&body);
        if let Some(admin) = admin {
            request = request.header(ADMIN_HEADER, admin.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Network(format!("{endpoint} failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let text = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Auth(format!("{endpoint}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) {
                return Err(DirectoryError::Api {
                    code: body.error.code,
                    message: body.error.message,
                });
            }
            return Err(DirectoryError::Network(format!(
                "{endpoint} returned {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::Network(format!("{endpoint}: invalid response: {e}")))
    }

    /// Drains a paginated listing into a flat vector.
    async fn drain<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        mut body: serde_json::Value,
        admin: Option<&MemberId>,
    ) -> DirectoryResult<Vec<T>> {
        let mut items = Vec::new();
        loop {
            let page: Page<T> = self.post(endpoint, body.clone(), admin).await?;
            items.extend(page.items);
            if !page.has_more {
                break;
            }
            let Some(cursor) = page.cursor else { break };
            body["cursor"] = serde_json::Value::String(cursor);
        }
        Ok(items)
    }

    /// Polls an async membership job until completion, backing off
    /// exponentially from the configured base delay.
    async fn wait_for_job(&self, job_id: &str) -> DirectoryResult<()> {
        let mut delay = Duration::from_millis(self.config.job_poll_base_ms);
        for attempt in 0..self.config.job_poll_max_attempts {
            let status: JobStatus = self
                .post(
                    "/2/team/jobs/status",
                    serde_json::json!({ "job_id": job_id }),
                    None,
                )
                .await?;
            match status.status.as_str() {
                "complete" => {
                    debug!(job_id, attempts = attempt + 1, "membership job complete");
                    return Ok(());
                }
                "failed" => return Err(DirectoryError::JobFailed(status.message)),
                _ => {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
        Err(DirectoryError::JobTimeout {
            job_id: job_id.to_string(),
            attempts: self.config.job_poll_max_attempts,
        })
    }

    // ── Team and membership ──────────────────────────────────────

    /// Fetches the team's identity.
    pub async fn team_info(&self) -> DirectoryResult<TeamInfo> {
        self.post("/2/team/info", serde_json::json!({}), None).await
    }

    /// Lists every member of the team.
    pub async fn list_members(&self) -> DirectoryResult<Vec<TeamMember>> {
        self.drain(
            "/2/team/members/list",
            serde_json::json!({ "limit": self.config.page_size }),
            None,
        )
        .await
    }

    // ── Groups ───────────────────────────────────────────────────

    /// Lists every group in the team.
    pub async fn list_groups(&self) -> DirectoryResult<Vec<GroupSummary>> {
        self.drain(
            "/2/team/groups/list",
            serde_json::json!({ "limit": self.config.page_size }),
            None,
        )
        .await
    }

    /// Lists the members of one group.
    pub async fn list_group_members(&self, group: &GroupId) -> DirectoryResult<Vec<GroupMember>> {
        self.drain(
            "/2/team/groups/members/list",
            serde_json::json!({ "group_id": group.as_str(), "limit": self.config.page_size }),
            None,
        )
        .await
    }

    /// Creates a group.
    pub async fn create_group(&self, name: &str) -> DirectoryResult<GroupSummary> {
        info!(name, "creating group");
        self.post(
            "/2/team/groups/create",
            serde_json::json!({ "name": name }),
            None,
        )
        .await
    }

    /// Deletes a group.
    pub async fn delete_group(&self, group: &GroupId) -> DirectoryResult<()> {
        info!(group = %group, "deleting group");
        let _: Empty = self
            .post(
                "/2/team/groups/delete",
                serde_json::json!({ "group_id": group.as_str() }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Adds members to a group by email and waits for the async job.
    ///
    /// "Already a member" outcomes are treated as success.
    pub async fn add_group_members(
        &self,
        group: &GroupId,
        emails: &[String],
    ) -> DirectoryResult<()> {
        if emails.is_empty() {
            return Ok(());
        }
        info!(group = %group, count = emails.len(), "adding group members");
        let job: JobHandle = match self
            .post(
                "/2/team/groups/members/add",
                serde_json::json!({ "group_id": group.as_str(), "emails": emails }),
                None,
            )
            .await
        {
            Ok(job) => job,
            Err(e) if e.is_idempotent_membership_outcome() => {
                debug!(group = %group, "members already present");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.wait_for_job(&job.job_id).await
    }

    /// Removes members from a group by email and waits for the async job.
    ///
    /// "Not a member" outcomes are treated as success.
    pub async fn remove_group_members(
        &self,
        group: &GroupId,
        emails: &[String],
    ) -> DirectoryResult<()> {
        if emails.is_empty() {
            return Ok(());
        }
        info!(group = %group, count = emails.len(), "removing group members");
        let job: JobHandle = match self
            .post(
                "/2/team/groups/members/remove",
                serde_json::json!({ "group_id": group.as_str(), "emails": emails }),
                None,
            )
            .await
        {
            Ok(job) => job,
            Err(e) if e.is_idempotent_membership_outcome() => {
                debug!(group = %group, "members already absent");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.wait_for_job(&job.job_id).await
    }

    // ── Team folders ─────────────────────────────────────────────

    /// Lists every team folder.
    pub async fn list_team_folders(&self) -> DirectoryResult<Vec<TeamFolderSummary>> {
        self.drain(
            "/2/team/folders/list",
            serde_json::json!({ "limit": self.config.page_size }),
            None,
        )
        .await
    }

    /// Creates a team folder.
    pub async fn create_team_folder(&self, name: &str) -> DirectoryResult<TeamFolderSummary> {
        info!(name, "creating team folder");
        self.post(
            "/2/team/folders/create",
            serde_json::json!({ "name": name }),
            None,
        )
        .await
    }

    /// Renames a team folder.
    pub async fn rename_team_folder(
        &self,
        folder: &TeamFolderId,
        name: &str,
    ) -> DirectoryResult<()> {
        info!(folder = %folder, name, "renaming team folder");
        let _: Empty = self
            .post(
                "/2/team/folders/rename",
                serde_json::json!({ "team_folder_id": folder.as_str(), "name": name }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Archives a team folder; required before permanent deletion.
    pub async fn archive_team_folder(&self, folder: &TeamFolderId) -> DirectoryResult<()> {
        info!(folder = %folder, "archiving team folder");
        let _: Empty = self
            .post(
                "/2/team/folders/archive",
                serde_json::json!({ "team_folder_id": folder.as_str() }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Permanently deletes an archived team folder.
    pub async fn permanently_delete_team_folder(
        &self,
        folder: &TeamFolderId,
    ) -> DirectoryResult<()> {
        info!(folder = %folder, "permanently deleting team folder");
        let _: Empty = self
            .post(
                "/2/team/folders/permanently_delete",
                serde_json::json!({ "team_folder_id": folder.as_str() }),
                None,
            )
            .await?;
        Ok(())
    }

    // ── Sharing and folder contents (admin-scoped) ───────────────

    /// Shares a folder with a group at the given access level.
    pub async fn share_folder(
        &self,
        admin: &MemberId,
        folder: &TeamFolderId,
        group: &GroupId,
        level: AccessLevel,
    ) -> DirectoryResult<()> {
        info!(folder = %folder, group = %group, ?level, "sharing folder");
        let _: Empty = self
            .post(
                "/2/files/share_folder",
                serde_json::json!({
                    "folder_id": folder.as_str(),
                    "group_id": group.as_str(),
                    "access_level": level,
                }),
                Some(admin),
            )
            .await?;
        Ok(())
    }

    /// Lists the groups on a folder's ACL.
    pub async fn list_folder_members(
        &self,
        admin: &MemberId,
        folder: &TeamFolderId,
    ) -> DirectoryResult<Vec<FolderMember>> {
        self.drain(
            "/2/files/list_folder_members",
            serde_json::json!({ "folder_id": folder.as_str() }),
            Some(admin),
        )
        .await
    }

    /// Lists one level of a folder (the vendor has no folder-only
    /// recursive listing; callers expand levels themselves).
    pub async fn list_folder_entries(
        &self,
        admin: &MemberId,
        path: &str,
    ) -> DirectoryResult<Vec<FolderEntry>> {
        self.drain(
            "/2/files/list_folder",
            serde_json::json!({ "path": path, "recursive": false, "limit": self.config.page_size }),
            Some(admin),
        )
        .await
    }

    /// Creates a plain folder at a path inside a team folder.
    pub async fn create_folder(&self, admin: &MemberId, path: &str) -> DirectoryResult<()> {
        debug!(path, "creating folder");
        let _: Empty = self
            .post(
                "/2/files/create_folder",
                serde_json::json!({ "path": path }),
                Some(admin),
            )
            .await?;
        Ok(())
    }

    /// Moves a folder (or file) to a new path, renaming in place when only
    /// the final segment differs.
    pub async fn move_folder(
        &self,
        admin: &MemberId,
        from_path: &str,
        to_path: &str,
    ) -> DirectoryResult<()> {
        debug!(from_path, to_path, "moving folder");
        let _: Empty = self
            .post(
                "/2/files/move",
                serde_json::json!({ "from_path": from_path, "to_path": to_path }),
                Some(admin),
            )
            .await?;
        Ok(())
    }

    /// Deletes a folder at a path.
    pub async fn delete_folder(&self, admin: &MemberId, path: &str) -> DirectoryResult<()> {
        debug!(path, "deleting folder");
        let _: Empty = self
            .post(
                "/2/files/delete_folder",
                serde_json::json!({ "path": path }),
                Some(admin),
            )
            .await?;
        Ok(())
    }

    // ── Delta feed (admin-scoped) ────────────────────────────────

    /// Returns a cursor positioned at the current end of the change feed.
    pub async fn latest_cursor(&self, admin: &MemberId) -> DirectoryResult<String> {
        let response: CursorResponse = self
            .post(
                "/2/files/changes/latest_cursor",
                serde_json::json!({}),
                Some(admin),
            )
            .await?;
        Ok(response.cursor)
    }

    /// Walks the change feed from `cursor` (or from the beginning when
    /// absent), draining continuation pages and classifying entries.
    pub async fn list_folder_changes(
        &self,
        admin: &MemberId,
        cursor: Option<&str>,
    ) -> DirectoryResult<ChangeFeed> {
        let mut body = match cursor {
            Some(c) => serde_json::json!({ "cursor": c }),
            None => serde_json::json!({}),
        };

        let mut entries = Vec::new();
        let next_cursor = loop {
            let page: ChangePage = self
                .post("/2/files/changes/list", body.clone(), Some(admin))
                .await?;
            for wire in page.entries {
                entries.push(classify_change(wire));
            }
            if !page.has_more {
                break page.cursor;
            }
            body = serde_json::json!({ "cursor": page.cursor });
        };

        Ok(ChangeFeed {
            entries,
            next_cursor,
        })
    }

    // ── File properties ──────────────────────────────────────────

    /// Lists the ids of every property template on the team.
    pub async fn list_property_templates(&self) -> DirectoryResult<Vec<TemplateId>> {
        let list: TemplateList = self
            .post(
                "/2/files/properties/templates/list",
                serde_json::json!({}),
                None,
            )
            .await?;
        Ok(list.template_ids)
    }

    /// Fetches one property template.
    pub async fn get_property_template(
        &self,
        template: &TemplateId,
    ) -> DirectoryResult<PropertyTemplate> {
        self.post(
            "/2/files/properties/templates/get",
            serde_json::json!({ "template_id": template.as_str() }),
            None,
        )
        .await
    }

    /// Creates a property template with the given field names.
    pub async fn create_property_template(
        &self,
        name: &str,
        fields: &[String],
    ) -> DirectoryResult<TemplateId> {
        info!(name, field_count = fields.len(), "creating property template");
        let wire: Vec<TemplateField> = fields
            .iter()
            .map(|f| TemplateField { name: f.clone() })
            .collect();
        let created: TemplateCreated = self
            .post(
                "/2/files/properties/templates/create",
                serde_json::json!({ "name": name, "fields": wire }),
                None,
            )
            .await?;
        Ok(created.template_id)
    }

    /// Adds fields to an existing property template.
    pub async fn update_property_template(
        &self,
        template: &TemplateId,
        add_fields: &[String],
    ) -> DirectoryResult<()> {
        if add_fields.is_empty() {
            return Ok(());
        }
        info!(template = %template, added = add_fields.len(), "extending property template");
        let wire: Vec<TemplateField> = add_fields
            .iter()
            .map(|f| TemplateField { name: f.clone() })
            .collect();
        let _: Empty = self
            .post(
                "/2/files/properties/templates/update",
                serde_json::json!({ "template_id": template.as_str(), "add_fields": wire }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Fetches the raw property fields stored on a file.
    pub async fn get_file_properties(
        &self,
        admin: &MemberId,
        path: &str,
        template: &TemplateId,
    ) -> DirectoryResult<HashMap<String, String>> {
        let response: PropertyFields = self
            .post(
                "/2/files/properties/get",
                serde_json::json!({ "path": path, "template_id": template.as_str() }),
                Some(admin),
            )
            .await?;
        Ok(response
            .fields
            .into_iter()
            .map(|f| (f.name, f.value))
            .collect())
    }

    /// Overwrites property fields on a file.
    pub async fn set_file_properties(
        &self,
        admin: &MemberId,
        path: &str,
        template: &TemplateId,
        fields: Vec<(String, String)>,
    ) -> DirectoryResult<()> {
        let wire: Vec<PropertyFieldWire> = fields
            .into_iter()
            .map(|(name, value)| PropertyFieldWire { name, value })
            .collect();
        let _: Empty = self
            .post(
                "/2/files/properties/set",
                serde_json::json!({ "path": path, "template_id": template.as_str(), "fields": wire }),
                Some(admin),
            )
            .await?;
        Ok(())
    }

    /// Reads one logical property value, reassembling split fields.
    pub async fn get_property_value(
        &self,
        admin: &MemberId,
        path: &str,
        template: &TemplateId,
        name: &str,
    ) -> DirectoryResult<Option<Vec<u8>>> {
        let fields = self.get_file_properties(admin, path, template).await?;
        decode_value(name, &fields)
    }

    /// Writes one logical property value, splitting oversized values
    /// across numbered fields.
    pub async fn set_property_value(
        &self,
        admin: &MemberId,
        path: &str,
        template: &TemplateId,
        name: &str,
        value: &[u8],
    ) -> DirectoryResult<()> {
        let fields = encode_value(name, value, self.config.property_field_ceiling)?;
        self.set_file_properties(admin, path, template, fields).await
    }
}

fn classify_change(wire: ChangeEntryWire) -> ChangeEntry {
    match wire.tag.as_str() {
        "folder" => ChangeEntry::Folder { path: wire.path },
        "deleted" => ChangeEntry::Deleted { path: wire.path },
        _ => {
            let server_modified = wire.server_modified.as_deref().and_then(|t| {
                chrono::DateTime::parse_from_rfc3339(t)
                    .ok()
                    .map(|dt| dt.with_timezone(&chrono::Utc))
            });
            if wire.server_modified.is_some() && server_modified.is_none() {
                warn!(path = %wire.path, "unparseable server_modified timestamp");
            }
            ChangeEntry::File(FileChange {
                path: wire.path,
                size: wire.size.unwrap_or(0),
                content_hash: wire.content_hash,
                modified_by: wire.modified_by,
                server_modified,
            })
        }
    }
}
