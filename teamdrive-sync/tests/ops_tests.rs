mod common;

use common::{mount_json, FakeProjectSystem};
use std::sync::Arc;
use teamdrive_directory::{DirectoryClient, DirectoryConfig};
use teamdrive_sync::{
    BindingStore, CancelFlag, ProjectSystem, StorageOps, SyncError, TeamStorage,
};
use teamdrive_types::{GroupId, MemberId, ProjectId, ProjectStorageBinding, TeamFolderId, TeamId};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provisioned_binding() -> ProjectStorageBinding {
    let mut binding = ProjectStorageBinding::pending(ProjectId::new(), TeamId::new("t-1"));
    binding.team_folder_id = Some(TeamFolderId::new("tf-1"));
    binding.group_id = Some(GroupId::new("g-proj"));
    binding.admin_identity = Some(MemberId::new("m-admin"));
    binding
}

fn storage_for(server: &MockServer, binding: ProjectStorageBinding) -> TeamStorage {
    storage_with_projects(server, binding, Arc::new(FakeProjectSystem::new()))
}

fn storage_with_projects(
    server: &MockServer,
    binding: ProjectStorageBinding,
    projects: Arc<dyn ProjectSystem>,
) -> TeamStorage {
    let client = Arc::new(DirectoryClient::new(
        DirectoryConfig {
            api_base_url: server.uri(),
            job_poll_base_ms: 1,
            ..Default::default()
        },
        "test_token",
    ));
    let store = Arc::new(BindingStore::open_in_memory().unwrap());
    TeamStorage::new(client, store, projects, binding, "Base Folder", CancelFlag::new()).unwrap()
}

#[tokio::test]
async fn construction_requires_acting_admin() {
    let server = MockServer::start().await;
    let client = Arc::new(DirectoryClient::new(
        DirectoryConfig {
            api_base_url: server.uri(),
            ..Default::default()
        },
        "test_token",
    ));
    let store = Arc::new(BindingStore::open_in_memory().unwrap());
    let binding = ProjectStorageBinding::pending(ProjectId::new(), TeamId::new("t-1"));

    let result = TeamStorage::new(
        client,
        store,
        Arc::new(FakeProjectSystem::new()),
        binding,
        "Base Folder",
        CancelFlag::new(),
    );
    assert!(matches!(result, Err(SyncError::Admin(_))));
}

#[tokio::test]
async fn folder_ops_target_paths_under_the_base_folder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/create_folder"))
        .and(header("X-Act-As-Admin", "m-admin"))
        .and(body_partial_json(serde_json::json!({"path": "/Base Folder/data"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/delete_folder"))
        .and(body_partial_json(serde_json::json!({"path": "/Base Folder/data"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/move"))
        .and(body_partial_json(serde_json::json!({
            "from_path": "/Base Folder/data",
            "to_path": "/Base Folder/archive"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_for(&server, provisioned_binding());
    storage.create_folder("data").await.unwrap();
    storage.rename_folder("data", "archive").await.unwrap();
    storage.remove_folder("data").await.unwrap();
}

#[tokio::test]
async fn can_access_reflects_listing_outcome() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/2/files/list_folder",
        serde_json::json!({"entries": [], "cursor": "end", "has_more": false}),
    )
    .await;

    let storage = storage_for(&server, provisioned_binding());
    storage.can_access().await.unwrap();
}

#[tokio::test]
async fn can_access_errs_when_base_folder_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": {"code": "path_not_found", "message": "gone"}
        })))
        .mount(&server)
        .await;

    let storage = storage_for(&server, provisioned_binding());
    assert!(storage.can_access().await.is_err());
}

#[tokio::test]
async fn sync_contributors_diffs_group_membership() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/2/team/groups/members/list",
        serde_json::json!({
            "members": [{"member_id": "m-old", "email": "old@example.edu"}],
            "cursor": "end",
            "has_more": false
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/2/team/groups/members/add"))
        .and(body_partial_json(serde_json::json!({"emails": ["new@example.edu"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "j-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/team/groups/members/remove"))
        .and(body_partial_json(serde_json::json!({"emails": ["old@example.edu"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "j-2"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(&server, "/2/team/jobs/status", serde_json::json!({"status": "complete"})).await;

    let binding = provisioned_binding();
    let projects = FakeProjectSystem::new();
    projects
        .contributor_lists
        .lock()
        .unwrap()
        .insert(binding.project_id, vec!["new@example.edu".to_string()]);

    let storage = storage_with_projects(&server, binding, Arc::new(projects));
    storage.sync_contributors().await.unwrap();
}

#[tokio::test]
async fn sync_title_renames_when_name_differs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/team/folders/rename"))
        .and(body_partial_json(serde_json::json!({"team_folder_id": "tf-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let binding = provisioned_binding();
    let projects = FakeProjectSystem::new();
    projects
        .titles
        .lock()
        .unwrap()
        .insert(binding.project_id, "Renamed Project".to_string());

    let storage = storage_with_projects(&server, binding, Arc::new(projects));
    // Computed name "Renamed Project (<id>)" differs from "Base Folder".
    storage.sync_title().await.unwrap();
}

#[tokio::test]
async fn copy_folders_resolves_destination_name() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "/2/team/folders/list",
        serde_json::json!({
            "team_folders": [{"team_folder_id": "tf-dst", "name": "Dest Folder"}],
            "cursor": "end",
            "has_more": false
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_partial_json(serde_json::json!({"path": "/Base Folder"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [{"tag": "folder", "name": "data", "path": "/Base Folder/data"}],
            "cursor": "end",
            "has_more": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_partial_json(serde_json::json!({"path": "/Base Folder/data"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [], "cursor": "end", "has_more": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/create_folder"))
        .and(body_partial_json(serde_json::json!({"path": "/Dest Folder/data"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut dest = ProjectStorageBinding::pending(ProjectId::new(), TeamId::new("t-1"));
    dest.team_folder_id = Some(TeamFolderId::new("tf-dst"));

    let storage = storage_for(&server, provisioned_binding());
    let created = storage.copy_folders(&dest).await.unwrap();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn copy_folders_requires_provisioned_destination() {
    let server = MockServer::start().await;
    let dest = ProjectStorageBinding::pending(ProjectId::new(), TeamId::new("t-1"));

    let storage = storage_for(&server, provisioned_binding());
    let err = storage.copy_folders(&dest).await.unwrap_err();
    assert!(matches!(err, SyncError::Project(_)));
}
