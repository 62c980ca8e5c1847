use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use teamdrive_directory::{
    DirectoryClient, DirectoryConfig, SnapshotOptions, TeamSnapshot, PROPERTY_TEMPLATE_NAME,
};
use teamdrive_types::{GroupId, MemberId, TeamFolderId, TeamId};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> DirectoryClient {
    let config = DirectoryConfig {
        api_base_url: server.uri(),
        job_poll_base_ms: 1,
        ..Default::default()
    };
    DirectoryClient::new(config, "test_token")
}

async fn mount_team_info(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/2/team/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "team_id": "t-1", "name": "Research Lab"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn membership_snapshot_derives_admins() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    Mock::given(method("POST"))
        .and(path("/2/team/members/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "members": [
                {"member_id": "m-1", "email": "alice@example.edu", "role": "admin", "account_id": "acct-1"},
                {"member_id": "m-2", "email": "bob@example.edu", "role": "member", "account_id": "acct-2"},
                {"member_id": "m-3", "email": "carol@example.edu", "role": "admin", "account_id": "acct-3"}
            ],
            "cursor": "end",
            "has_more": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/team/groups/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "groups": [{"group_id": "g-1", "name": "staff"}],
            "cursor": "end",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let snapshot = TeamSnapshot::build(&client, SnapshotOptions::membership())
        .await
        .unwrap();

    assert_eq!(snapshot.team_id(), &TeamId::new("t-1"));
    assert_eq!(snapshot.team_name(), "Research Lab");
    assert_eq!(snapshot.member_count(), 3);
    assert_eq!(
        snapshot.admin_ids(),
        vec![MemberId::new("m-1"), MemberId::new("m-3")]
    );
    assert_eq!(
        snapshot.admin_emails(),
        vec!["alice@example.edu".to_string(), "carol@example.edu".to_string()]
    );
    assert_eq!(snapshot.group_id("staff"), Some(&GroupId::new("g-1")));
    assert_eq!(snapshot.group_name(&GroupId::new("g-1")), Some("staff"));
}

#[tokio::test]
async fn refresh_members_replaces_rather_than_appends() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    Mock::given(method("POST"))
        .and(path("/2/team/members/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "members": [
                {"member_id": "m-1", "email": "alice@example.edu", "role": "admin", "account_id": "acct-1"}
            ],
            "cursor": "end",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            members: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    snapshot.refresh_members(&client).await.unwrap();
    snapshot.refresh_members(&client).await.unwrap();
    assert_eq!(snapshot.member_count(), 1);
}

#[tokio::test]
async fn refresh_team_folders_updates_in_place() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    let call_counter = Arc::new(AtomicU32::new(0));
    let counter = call_counter.clone();
    Mock::given(method("POST"))
        .and(path("/2/team/folders/list"))
        .respond_with(move |_req: &wiremock::Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "team_folders": [{"team_folder_id": "tf-1", "name": "Project X"}],
                    "cursor": "end",
                    "has_more": false
                }))
            } else {
                // Same folder renamed between polls.
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "team_folders": [{"team_folder_id": "tf-1", "name": "Project X v2"}],
                    "cursor": "end",
                    "has_more": false
                }))
            }
        })
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            team_folders: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let id = TeamFolderId::new("tf-1");
    assert_eq!(snapshot.folder_name(&id), Some("Project X"));

    snapshot.refresh_team_folders(&client).await.unwrap();
    assert_eq!(snapshot.folder_name(&id), Some("Project X v2"));
    assert_eq!(snapshot.folder_id("Project X v2"), Some(&id));
}

#[tokio::test]
async fn resolve_top_folder_splits_path() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    Mock::given(method("POST"))
        .and(path("/2/team/folders/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "team_folders": [{"team_folder_id": "tf-1", "name": "Project X"}],
            "cursor": "end",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            team_folders: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (id, rest) = snapshot
        .resolve_top_folder("/Project X/data/run1.csv")
        .unwrap();
    assert_eq!(id, TeamFolderId::new("tf-1"));
    assert_eq!(rest, "data/run1.csv");

    let (_, rest) = snapshot.resolve_top_folder("/Project X").unwrap();
    assert_eq!(rest, "");

    assert!(snapshot.resolve_top_folder("/Untracked/file.txt").is_none());
}

#[tokio::test]
async fn property_template_created_when_absent() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "template_ids": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/create"))
        .and(body_partial_json(serde_json::json!({"name": PROPERTY_TEMPLATE_NAME})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "template_id": "tmpl-new"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            properties: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(snapshot.property_template().unwrap().as_str(), "tmpl-new");
}

#[tokio::test]
async fn property_template_extended_when_fields_missing() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "template_ids": ["tmpl-old"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": PROPERTY_TEMPLATE_NAME,
            "fields": [{"name": "token"}, {"name": "hash"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/update"))
        .and(body_partial_json(serde_json::json!({"template_id": "tmpl-old"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            properties: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(snapshot.property_template().unwrap().as_str(), "tmpl-old");
}

#[tokio::test]
async fn property_template_untouched_when_complete() {
    let server = MockServer::start().await;
    mount_team_info(&server).await;

    let mut fields: Vec<serde_json::Value> =
        teamdrive_directory::properties::template_fields("token")
            .into_iter()
            .map(|f| serde_json::json!({"name": f}))
            .collect();
    fields.push(serde_json::json!({"name": "hash"}));

    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "template_ids": ["tmpl-full"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/properties/templates/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": PROPERTY_TEMPLATE_NAME,
            "fields": fields
        })))
        .mount(&server)
        .await;
    // templates/update must not be called: no mock mounted for it.

    let client = test_client(&server);
    let snapshot = TeamSnapshot::build(
        &client,
        SnapshotOptions {
            properties: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(snapshot.property_template().unwrap().as_str(), "tmpl-full");
}
