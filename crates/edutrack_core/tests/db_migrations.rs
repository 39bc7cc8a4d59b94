use edutrack_core::db::migrations::latest_version;
use edutrack_core::db::{open_db, open_db_in_memory, DbError};
use edutrack_core::{GatewayError, SqliteDocumentGateway};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_creates_documents_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_eq!(
        column_names(&conn, "documents"),
        vec!["collection", "doc_id", "body", "updated_at"]
    );
}

#[test]
fn reopening_file_database_keeps_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edutrack.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3);",
        ["users/u1/exams", "e1", r#"{"id":"e1"}"#],
    )
    .unwrap();
    drop(conn);

    let reopened = open_db(&path).unwrap();
    assert_eq!(schema_version(&reopened), latest_version());
    let count: i64 = reopened
        .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn body_must_be_valid_json() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO documents (collection, doc_id, body) VALUES ('c', 'd', 'not json');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn gateway_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteDocumentGateway::try_new(conn).err().unwrap();
    assert!(matches!(
        err,
        GatewayError::Db(DbError::SchemaNotReady {
            actual_version: 0,
            ..
        })
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}
