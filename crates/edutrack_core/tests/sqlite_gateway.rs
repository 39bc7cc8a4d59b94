use edutrack_core::{
    CollectionPath, CollectionSnapshot, DocumentGateway, GatewayError, SnapshotListener,
    SqliteDocumentGateway,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn recorder() -> (Arc<Mutex<Vec<CollectionSnapshot>>>, SnapshotListener) {
    let seen: Arc<Mutex<Vec<CollectionSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: SnapshotListener =
        Arc::new(move |snapshot: CollectionSnapshot| sink.lock().unwrap().push(snapshot));
    (seen, listener)
}

#[test]
fn documents_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("documents.sqlite3");
    let path = CollectionPath::user_subjects("u1")
        .unwrap()
        .doc("s1")
        .unwrap();

    let gateway = SqliteDocumentGateway::open(&db_path).unwrap();
    gateway
        .set(&path, json!({"id": "s1", "name": "Physics", "papers": []}))
        .unwrap();
    drop(gateway);

    let reopened = SqliteDocumentGateway::open(&db_path).unwrap();
    assert_eq!(
        reopened.document(&path).unwrap(),
        Some(json!({"id": "s1", "name": "Physics", "papers": []}))
    );
}

#[test]
fn subscribers_see_initial_and_committed_snapshots_in_id_order() {
    let gateway = SqliteDocumentGateway::open_in_memory().unwrap();
    let exams = CollectionPath::user_exams("u1").unwrap();
    let (seen, listener) = recorder();

    gateway.subscribe(&exams, listener).unwrap();
    gateway
        .set(&exams.doc("b").unwrap(), json!({"id": "b", "date": 2}))
        .unwrap();
    gateway
        .set(&exams.doc("a").unwrap(), json!({"id": "a", "date": 1}))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].documents.is_empty());
    let ids: Vec<&str> = seen[2].documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn other_users_collections_are_isolated() {
    let gateway = SqliteDocumentGateway::open_in_memory().unwrap();
    let mine = CollectionPath::user_exams("u1").unwrap();
    let theirs = CollectionPath::user_exams("u2").unwrap();
    let (seen, listener) = recorder();
    gateway.subscribe(&mine, listener).unwrap();

    gateway
        .set(&theirs.doc("e1").unwrap(), json!({"id": "e1"}))
        .unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn update_merges_and_delete_tolerates_absent() {
    let gateway = SqliteDocumentGateway::open_in_memory().unwrap();
    let path = CollectionPath::user_exams("u1")
        .unwrap()
        .doc("e1")
        .unwrap();

    let missing = gateway.update(&path, json!({"isCompleted": true}).as_object().unwrap().clone());
    assert!(matches!(missing, Err(GatewayError::NotFound(_))));

    gateway
        .set(&path, json!({"id": "e1", "name": "Mock", "isCompleted": false}))
        .unwrap();
    gateway
        .update(&path, json!({"isCompleted": true}).as_object().unwrap().clone())
        .unwrap();
    assert_eq!(
        gateway.document(&path).unwrap(),
        Some(json!({"id": "e1", "name": "Mock", "isCompleted": true}))
    );

    gateway.delete(&path).unwrap();
    gateway.delete(&path).unwrap();
    assert_eq!(gateway.document(&path).unwrap(), None);
}

#[test]
fn transaction_requires_existing_document_and_rolls_back_on_failure() {
    let gateway = SqliteDocumentGateway::open_in_memory().unwrap();
    let path = CollectionPath::user_subjects("u1")
        .unwrap()
        .doc("s1")
        .unwrap();

    let err = gateway.transact(&path, &mut |doc| Ok(doc)).unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    gateway.set(&path, json!({"id": "s1", "papers": []})).unwrap();
    let err = gateway
        .transact(&path, &mut |_| Ok(json!(["not", "an", "object"])))
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidDocument { .. }));
    assert_eq!(
        gateway.document(&path).unwrap(),
        Some(json!({"id": "s1", "papers": []}))
    );

    gateway
        .transact(&path, &mut |mut doc| {
            doc["papers"] = json!([{"id": "p1", "name": "Paper 1", "chapters": []}]);
            Ok(doc)
        })
        .unwrap();
    assert_eq!(
        gateway.document(&path).unwrap().unwrap()["papers"][0]["id"],
        "p1"
    );
}
