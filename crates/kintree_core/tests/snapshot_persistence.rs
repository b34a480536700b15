use kintree_core::{
    AttributeChanges, BlobStore, CapturingView, PersonField, PersonId, SessionMode,
    SnapshotService, SnapshotSource, SqliteBlobStore, TreeSession, TreeSnapshot,
    SNAPSHOT_BLOB_KEY,
};

#[test]
fn sqlite_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.sqlite3");

    let mut service = SnapshotService::new(SqliteBlobStore::open(&path).unwrap());
    let snapshot = TreeSnapshot::bundled_default();
    service.persist(&snapshot).unwrap();
    drop(service);

    let reopened = SnapshotService::new(SqliteBlobStore::open(&path).unwrap());
    assert_eq!(reopened.restore(), Some(snapshot));
}

#[test]
fn session_over_sqlite_reloads_committed_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.sqlite3");

    let mut session = TreeSession::start(
        SessionMode::Admin,
        SqliteBlobStore::open(&path).unwrap(),
        CapturingView::new(),
    )
    .unwrap();
    session
        .submit_edit(
            &PersonId::new("10"),
            &AttributeChanges::new().set(PersonField::Nickname, "  AJ  "),
        )
        .unwrap();
    drop(session);

    let reloaded = TreeSession::start(
        SessionMode::RestrictedViewer,
        SqliteBlobStore::open(&path).unwrap(),
        CapturingView::new(),
    )
    .unwrap();
    assert_eq!(reloaded.source(), SnapshotSource::Restored);
    let person = reloaded.store().get_person(&PersonId::new("10")).unwrap();
    assert_eq!(person.attributes.get(PersonField::Nickname), Some("AJ"));
}

#[test]
fn legacy_bare_array_blob_is_loaded_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");

    let mut blobs = SqliteBlobStore::open(&path).unwrap();
    blobs
        .put(
            SNAPSHOT_BLOB_KEY,
            r#"[
                {"id":"a","data":{"first name":"Sita"},"rels":{"spouses":[{"id":"b"}]}},
                {"id":"b","data":{"first name":"Ram"},"rels":{"spouses":[{"id":"a"}]}}
            ]"#,
        )
        .unwrap();

    let session = TreeSession::start(SessionMode::Admin, blobs, CapturingView::new()).unwrap();
    assert_eq!(session.source(), SnapshotSource::Restored);
    assert_eq!(session.store().len(), 2);
}

#[test]
fn charting_engine_blob_with_plain_spouse_ids_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.sqlite3");

    let mut blobs = SqliteBlobStore::open(&path).unwrap();
    blobs
        .put(
            SNAPSHOT_BLOB_KEY,
            r#"[
                {"id":"10","data":{"first name":"Arjun","UNID":"10"},"rels":{"spouses":["13"],"children":["14"]}},
                {"id":"13","data":{"first name":"Priya","UNID":"13"},"rels":{"spouses":["10"],"children":["14"]}},
                {"id":"14","data":{"first name":"Ishaan","UNID":"14"},"rels":{"parents":["10","13"]}}
            ]"#,
        )
        .unwrap();

    let session = TreeSession::start(SessionMode::Admin, blobs, CapturingView::new()).unwrap();
    assert_eq!(session.source(), SnapshotSource::Restored);
    assert_eq!(session.store().len(), 3);

    let arjun = session.store().get_person(&PersonId::new("10")).unwrap();
    assert_eq!(arjun.attributes.get(PersonField::FirstName), Some("Arjun"));
    assert!(arjun
        .relationships
        .partner(&PersonId::new("13"))
        .is_some());
}
