use super::*;
use crate::migration::Schema;
use chrono::TimeZone;

fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    Schema::builtin().ensure(&conn).unwrap();
    conn
}

fn member(name: &str, address: &str, role: &str) -> ClusterMember {
    let extensions = ExtensionSet::new().unwrap();
    ClusterMember::new(
        name,
        address,
        "cert",
        2,
        &extensions,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        Role::new(role),
    )
}

#[test]
fn test_create_and_get_round_trip() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let mut node = member("node1", "10.0.0.1:8443", "voter");
    node.heartbeat = Utc::now().trunc_subsecs(6);

    let id = store.create(&node).unwrap();
    node.id = id;

    let stored = store.get("10.0.0.1:8443").unwrap();
    assert_eq!(stored, node);
    assert!(store.exists("10.0.0.1:8443").unwrap());
    assert!(!store.exists("10.0.0.9:8443").unwrap());
}

#[test]
fn test_ids_are_assigned_by_sequence() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let a = store.create(&member("a", "a:1", "voter")).unwrap();
    let b = store.create(&member("b", "b:1", "voter")).unwrap();
    assert!(b > a);
}

#[test]
fn test_get_missing_member() {
    let conn = conn();
    let err = MemberStore::new(&conn).get("nowhere:1").unwrap_err();
    assert!(matches!(err, SchemaError::NotFound { .. }));
    assert!(err.to_string().contains("[S006]"));
}

#[test]
fn test_list_with_filters() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    store.create(&member("a", "a:1", "voter")).unwrap();
    store.create(&member("b", "b:1", "spare")).unwrap();

    assert_eq!(store.list(&MemberFilter::default()).unwrap().len(), 2);

    let by_name = store.list(&MemberFilter::by_name("b")).unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].address, "b:1");

    let both = MemberFilter {
        address: Some("a:1".to_string()),
        name: Some("b".to_string()),
    };
    assert!(store.list(&both).unwrap().is_empty());
}

#[test]
fn test_update_rewrites_mutable_columns() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let mut node = member("a", "a:1", "voter");
    node.id = store.create(&node).unwrap();

    node.role = Role::new("spare");
    node.certificate = "rotated".to_string();
    store.update(&node).unwrap();

    let stored = store.get("a:1").unwrap();
    assert_eq!(stored.role.as_str(), "spare");
    assert_eq!(stored.certificate, "rotated");
}

#[test]
fn test_update_unknown_id_is_row_count_error() {
    let conn = conn();
    let mut ghost = member("ghost", "ghost:1", "voter");
    ghost.id = 42;
    let err = MemberStore::new(&conn).update(&ghost).unwrap_err();
    assert!(matches!(err, SchemaError::RowCount { affected: 0, .. }));
}

#[test]
fn test_delete_by_address() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    store.create(&member("a", "a:1", "voter")).unwrap();

    store.delete_by_address("a:1").unwrap();
    assert!(!store.exists("a:1").unwrap());
    assert!(matches!(
        store.delete_by_address("a:1"),
        Err(SchemaError::RowCount { affected: 0, .. })
    ));
}

#[test]
fn test_update_versioning_info_requires_existing_row() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let extensions = ExtensionSet::new().unwrap();

    let err = store
        .update_versioning_info("missing:1", 2, &extensions)
        .unwrap_err();
    assert!(matches!(err, SchemaError::RowCount { affected: 0, .. }));
}

#[test]
fn test_update_versioning_info_writes_extensions() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    store.create(&member("a", "a:1", "voter")).unwrap();

    let mut extensions = ExtensionSet::new().unwrap();
    extensions.register(["storage_buckets"]).unwrap();
    store.update_versioning_info("a:1", 3, &extensions).unwrap();

    let stored = store.get("a:1").unwrap();
    assert_eq!(stored.schema_version, 3);
    assert_eq!(stored.extensions().unwrap(), extensions);
}

#[test]
fn test_update_schema_version_only() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    store.create(&member("a", "a:1", "voter")).unwrap();

    store.update_schema_version("a:1", 1).unwrap();
    let stored = store.get("a:1").unwrap();
    assert_eq!(stored.schema_version, 1);
    assert!(stored.internal_api_extensions.is_some());
}

#[test]
fn test_list_versioning_info_skips_pending() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    store.create(&member("a", "a:1", "voter")).unwrap();
    store.create(&member("b", "b:1", Role::PENDING)).unwrap();
    store.create(&member("c", "c:1", "spare")).unwrap();

    let infos = store.list_versioning_info().unwrap();
    let addresses: Vec<&str> = infos.iter().map(|m| m.address.as_str()).collect();
    assert_eq!(addresses, ["a:1", "c:1"]);
    assert_eq!(infos[0].info.schema_version, 2);
    assert_eq!(infos[0].info.extensions, ExtensionSet::new().unwrap());
}

#[test]
fn test_null_extension_columns_read_as_empty() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let mut legacy = member("old", "old:1", "voter");
    legacy.internal_api_extensions = None;
    legacy.external_api_extensions = None;
    store.create(&legacy).unwrap();

    let infos = store.list_versioning_info().unwrap();
    assert_eq!(infos[0].info.extensions, ExtensionSet::empty());
}

#[test]
fn test_corrupt_extension_column_is_reported_with_address() {
    let conn = conn();
    let store = MemberStore::new(&conn);
    let mut bad = member("bad", "bad:1", "voter");
    bad.external_api_extensions = Some("Not Valid".to_string());
    store.create(&bad).unwrap();

    let err = store.list_versioning_info().unwrap_err();
    match err {
        SchemaError::InvalidExtensions { address, .. } => assert_eq!(address, "bad:1"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_to_api_merges_extension_columns() {
    let mut extensions = ExtensionSet::new().unwrap();
    extensions.register(["instances"]).unwrap();
    let node = ClusterMember::new(
        "a",
        "a:1",
        "cert",
        2,
        &extensions,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        Role::new("voter"),
    );

    let info = node.to_api().unwrap();
    assert_eq!(
        info.extensions,
        vec!["internal:runtime_extension_v1".to_string(), "instances".to_string()]
    );

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["schema_version"], 2);
    assert_eq!(json["role"], "voter");
    assert_eq!(json["extensions"][1], "instances");
}
