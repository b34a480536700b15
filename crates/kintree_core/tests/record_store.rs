use kintree_core::{
    find_by_name, immediate_family, PersonId, PersonStore, StoreError, TreeSnapshot,
    ValidationError,
};

fn reversed_default() -> TreeSnapshot {
    let mut persons = TreeSnapshot::bundled_default().into_persons();
    persons.reverse();
    TreeSnapshot::new(persons)
}

#[test]
fn load_then_snapshot_round_trips_up_to_ordering() {
    let dataset = reversed_default();
    let store = PersonStore::from_snapshot(dataset.clone()).unwrap();

    assert_eq!(store.snapshot().sorted(), dataset.sorted());
}

#[test]
fn invalid_load_keeps_previous_dataset() {
    let mut store = PersonStore::from_snapshot(TreeSnapshot::bundled_default()).unwrap();
    let before = store.snapshot();

    let broken: TreeSnapshot = serde_json::from_value(serde_json::json!([
        {"id": "x", "rels": {"children": ["y"]}},
        {"id": "y"}
    ]))
    .unwrap();
    let err = store.load(broken).unwrap_err();

    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::AsymmetricEdge { .. })
    ));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn self_reference_is_rejected_on_load() {
    let dataset: TreeSnapshot = serde_json::from_value(serde_json::json!([
        {"id": "solo", "rels": {"spouses": [{"id": "solo"}]}}
    ]))
    .unwrap();

    let err = PersonStore::from_snapshot(dataset).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::SelfReference { .. })
    ));
}

#[test]
fn queries_read_from_store_snapshot() {
    let store = PersonStore::from_snapshot(TreeSnapshot::bundled_default()).unwrap();
    let snapshot = store.snapshot();

    let family = immediate_family(&snapshot, &PersonId::new("10"));
    let ids = family
        .iter()
        .map(|person| person.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["10", "14"]);

    let hits = find_by_name(&snapshot, "ishu");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, PersonId::new("14"));
}
