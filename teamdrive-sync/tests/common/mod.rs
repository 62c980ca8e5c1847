//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use teamdrive_sync::SyncError;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use teamdrive_directory::{DirectoryClient, DirectoryConfig};
use teamdrive_sync::{FileInfo, ProjectSystem, SyncResult};
use teamdrive_types::ProjectId;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_config(server: &MockServer) -> DirectoryConfig {
    DirectoryConfig {
        api_base_url: server.uri(),
        job_poll_base_ms: 1,
        job_poll_max_attempts: 5,
        ..Default::default()
    }
}

pub fn test_client(server: &MockServer) -> DirectoryClient {
    DirectoryClient::new(test_config(server), "test_token")
}

/// Mounts a POST endpoint returning a fixed JSON body.
pub async fn mount_json(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// In-memory stand-in for the project-system collaborator.
#[derive(Default)]
pub struct FakeProjectSystem {
    pub titles: Mutex<HashMap<ProjectId, String>>,
    pub contributor_lists: Mutex<HashMap<ProjectId, Vec<String>>>,
    /// account_id -> local user id
    pub users: Mutex<HashMap<String, String>>,
    /// (project, path) pairs already covered by a valid token
    pub valid_timestamps: Mutex<HashSet<(ProjectId, String)>>,
    /// (user, project, path) tokens minted during the test
    pub minted: Mutex<Vec<(String, ProjectId, String)>>,
    /// Projects whose metadata fetches fail, for isolation tests
    pub failing_projects: Mutex<HashSet<ProjectId>>,
}

impl FakeProjectSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minted_tokens(&self) -> Vec<(String, ProjectId, String)> {
        self.minted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectSystem for FakeProjectSystem {
    async fn file_info(&self, project: &ProjectId, path: &str) -> SyncResult<FileInfo> {
        if self.failing_projects.lock().unwrap().contains(project) {
            return Err(SyncError::Project(format!(
                "metadata unavailable for {project}"
            )));
        }
        Ok(FileInfo {
            path: path.to_string(),
            size: path.len() as u64,
            content_hash: Some(format!("hash:{path}")),
        })
    }

    async fn has_valid_timestamp(
        &self,
        _user_id: &str,
        project: &ProjectId,
        info: &FileInfo,
    ) -> SyncResult<bool> {
        Ok(self
            .valid_timestamps
            .lock()
            .unwrap()
            .contains(&(*project, info.path.clone())))
    }

    async fn mint_timestamp_token(
        &self,
        user_id: &str,
        project: &ProjectId,
        info: &FileInfo,
    ) -> SyncResult<()> {
        self.minted
            .lock()
            .unwrap()
            .push((user_id.to_string(), *project, info.path.clone()));
        Ok(())
    }

    async fn resolve_user(&self, account_id: &str) -> SyncResult<Option<String>> {
        Ok(self.users.lock().unwrap().get(account_id).cloned())
    }

    async fn fallback_user(&self, _project: &ProjectId) -> SyncResult<String> {
        Ok("admin-fallback".to_string())
    }

    async fn project_title(&self, project: &ProjectId) -> SyncResult<String> {
        if self.failing_projects.lock().unwrap().contains(project) {
            return Err(SyncError::Project(format!(
                "metadata unavailable for {project}"
            )));
        }
        Ok(self
            .titles
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_else(|| "Untitled".to_string()))
    }

    async fn contributors(&self, project: &ProjectId) -> SyncResult<Vec<String>> {
        Ok(self
            .contributor_lists
            .lock()
            .unwrap()
            .get(project)
            .cloned()
            .unwrap_or_default())
    }
}
