//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist JSON documents keyed by `(collection, doc_id)`.
//! - Run read-modify-write transactions under an immediate SQLite lock.
//! - Push fresh collection snapshots to listeners after each commit.
//!
//! # Invariants
//! - `body` always holds a JSON object.
//! - Listeners are notified only after the write transaction committed.
//! - A committed write reports success even if the follow-up snapshot read
//!   fails; that failure is logged and listeners catch up on the next commit.
//! - Snapshot order is `doc_id ASC`.

use super::path::{CollectionPath, DocumentPath};
use super::{
    into_object, CollectionSnapshot, DocumentGateway, DocumentSnapshot, GatewayError,
    GatewayResult, ListenerRegistry, SnapshotListener, SubscriptionId,
};
use crate::db::migrations::ensure_schema_ready;
use crate::db::{open_db, open_db_in_memory};
use log::error;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `DocumentGateway` persisting documents in one SQLite table.
pub struct SqliteDocumentGateway {
    conn: Mutex<Connection>,
    listeners: ListenerRegistry,
}

impl SqliteDocumentGateway {
    /// Wraps an already migrated connection.
    pub fn try_new(conn: Connection) -> GatewayResult<Self> {
        ensure_schema_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            listeners: ListenerRegistry::default(),
        })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> GatewayResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> GatewayResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Returns one stored document, if present.
    pub fn document(&self, path: &DocumentPath) -> GatewayResult<Option<Value>> {
        let conn = self.lock_conn();
        read_document(&conn, path)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `write` in an immediate transaction, then notifies listeners of
    /// the touched collection while still holding the connection.
    fn commit<F>(&self, path: &DocumentPath, write: F) -> GatewayResult<()>
    where
        F: FnOnce(&Transaction<'_>) -> GatewayResult<()>,
    {
        let mut conn = self.lock_conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write(&tx)?;
        tx.commit()?;

        if self.listeners.has_listeners(path.collection()) {
            match load_collection(&conn, path.collection()) {
                Ok(snapshot) => self.listeners.notify(&snapshot),
                Err(err) => error!(
                    "event=snapshot_notify module=gateway status=error collection={} error={}",
                    path.collection(),
                    err
                ),
            }
        }
        Ok(())
    }
}

impl DocumentGateway for SqliteDocumentGateway {
    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: SnapshotListener,
    ) -> GatewayResult<SubscriptionId> {
        let conn = self.lock_conn();
        let snapshot = load_collection(&conn, collection)?;
        let id = self.listeners.register(collection, listener.clone());
        listener(snapshot);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }

    fn set(&self, path: &DocumentPath, document: Value) -> GatewayResult<()> {
        let fields = into_object(path, document)?;
        self.commit(path, |tx| write_document(tx, path, &fields))
    }

    fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> GatewayResult<()> {
        self.commit(path, |tx| {
            let current = read_document(tx, path)?
                .ok_or_else(|| GatewayError::NotFound(path.clone()))?;
            let mut merged = into_object(path, current)?;
            merged.extend(fields);
            write_document(tx, path, &merged)
        })
    }

    fn delete(&self, path: &DocumentPath) -> GatewayResult<()> {
        self.commit(path, |tx| {
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
                params![path.collection().as_str(), path.doc_id()],
            )?;
            Ok(())
        })
    }

    fn transact(
        &self,
        path: &DocumentPath,
        apply: &mut dyn FnMut(Value) -> GatewayResult<Value>,
    ) -> GatewayResult<()> {
        self.commit(path, |tx| {
            let current = read_document(tx, path)?
                .ok_or_else(|| GatewayError::NotFound(path.clone()))?;
            let next = into_object(path, apply(current)?)?;
            write_document(tx, path, &next)
        })
    }
}

fn read_document(conn: &Connection, path: &DocumentPath) -> GatewayResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body
             FROM documents
             WHERE collection = ?1
               AND doc_id = ?2;",
            params![path.collection().as_str(), path.doc_id()],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|text| serde_json::from_str(&text).map_err(GatewayError::from))
        .transpose()
}

fn write_document(
    conn: &Connection,
    path: &DocumentPath,
    fields: &Map<String, Value>,
) -> GatewayResult<()> {
    let body = serde_json::to_string(fields)?;
    conn.execute(
        "INSERT INTO documents (collection, doc_id, body)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (collection, doc_id) DO UPDATE
         SET body = excluded.body,
             updated_at = (strftime('%s', 'now') * 1000);",
        params![path.collection().as_str(), path.doc_id(), body],
    )?;
    Ok(())
}

fn load_collection(
    conn: &Connection,
    collection: &CollectionPath,
) -> GatewayResult<CollectionSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, body
         FROM documents
         WHERE collection = ?1
         ORDER BY doc_id ASC;",
    )?;
    let mut rows = stmt.query([collection.as_str()])?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let body: String = row.get(1)?;
        documents.push(DocumentSnapshot {
            id,
            data: serde_json::from_str(&body)?,
        });
    }
    Ok(CollectionSnapshot {
        collection: collection.clone(),
        documents,
    })
}
