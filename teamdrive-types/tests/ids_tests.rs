use teamdrive_types::{GroupId, MemberId, ProjectId, TeamFolderId, TeamId};

#[test]
fn remote_ids_wrap_raw_strings() {
    let team = TeamId::new("dbtid:AAAA");
    assert_eq!(team.as_str(), "dbtid:AAAA");
    assert_eq!(team.to_string(), "dbtid:AAAA");

    let member: MemberId = "dbmid:BBBB".into();
    assert_eq!(member.as_str(), "dbmid:BBBB");
}

#[test]
fn remote_ids_are_distinct_types() {
    // Equality only within a type; the compiler enforces the rest.
    assert_eq!(GroupId::new("g-1"), GroupId::from("g-1"));
    assert_ne!(TeamFolderId::new("tf-1"), TeamFolderId::new("tf-2"));
}

#[test]
fn remote_ids_serde_transparent() {
    let group = GroupId::new("g-42");
    let json = serde_json::to_string(&group).unwrap();
    assert_eq!(json, "\"g-42\"");
    let back: GroupId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, group);
}

#[test]
fn member_ids_order_deterministically() {
    let mut ids = vec![MemberId::new("m-c"), MemberId::new("m-a"), MemberId::new("m-b")];
    ids.sort();
    assert_eq!(ids[0], MemberId::new("m-a"));
    assert_eq!(ids[2], MemberId::new("m-c"));
}

#[test]
fn project_id_parse_roundtrip() {
    let id = ProjectId::new();
    let parsed = ProjectId::parse(&id.to_string()).unwrap();
    assert_eq!(parsed, id);
    assert_eq!(parsed.as_uuid(), id.as_uuid());
}

#[test]
fn project_id_parse_rejects_garbage() {
    assert!(ProjectId::parse("not-a-uuid").is_err());
}

#[test]
fn project_ids_are_time_ordered() {
    let a = ProjectId::new();
    let b = ProjectId::new();
    // UUID v7 embeds the timestamp; later ids never sort before earlier ones.
    assert!(a.as_uuid() <= b.as_uuid());
}
