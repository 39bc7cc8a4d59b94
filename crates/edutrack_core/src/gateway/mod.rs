//! Document store gateway contract and implementations.
//!
//! # Responsibility
//! - Define the narrow document-database interface the sync layer consumes:
//!   subscribe, set, update, delete and transactional read-modify-write.
//! - Keep storage/transport details behind `DocumentGateway`.
//!
//! # Invariants
//! - Documents are JSON objects addressed by `DocumentPath`.
//! - A subscription delivers the full current collection once on subscribe
//!   and again after every committed change to that collection.
//! - Snapshots for one collection are delivered in commit order.
//!
//! # See also
//! - `crate::sync::writer` for how writes are issued fire-and-forget.

pub mod memory;
pub mod path;
pub mod sqlite;

use crate::db::DbError;
use path::{CollectionPath, DocumentPath};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Callback receiving full collection snapshots.
pub type SnapshotListener = Arc<dyn Fn(CollectionSnapshot) + Send + Sync>;

/// Errors raised by document gateway operations.
#[derive(Debug)]
pub enum GatewayError {
    /// Target document does not exist.
    NotFound(DocumentPath),
    /// Stored or supplied body is not a usable document.
    InvalidDocument { path: DocumentPath, message: String },
    /// Transaction body rejected the current document.
    Aborted { path: DocumentPath, message: String },
    /// Backend is not reachable or refused the write.
    Unavailable(String),
    /// Document body (de)serialization failure.
    Serialization(serde_json::Error),
    /// Underlying SQLite failure.
    Db(DbError),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::InvalidDocument { path, message } => {
                write!(f, "invalid document at {path}: {message}")
            }
            Self::Aborted { path, message } => {
                write!(f, "transaction aborted at {path}: {message}")
            }
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::Serialization(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Handle returned by `DocumentGateway::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a gateway-assigned raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// One stored document as seen by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Value,
}

/// Full current content of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: CollectionPath,
    /// Ordered by document id.
    pub documents: Vec<DocumentSnapshot>,
}

/// Remote document database operations consumed by the sync layer.
pub trait DocumentGateway: Send + Sync {
    /// Registers a live listener; the current collection is delivered before
    /// this call returns.
    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: SnapshotListener,
    ) -> GatewayResult<SubscriptionId>;
    /// Stops delivery to one listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
    /// Creates or overwrites one document.
    fn set(&self, path: &DocumentPath, document: Value) -> GatewayResult<()>;
    /// Merges top-level fields into an existing document.
    fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> GatewayResult<()>;
    /// Deletes one document. Deleting an absent document succeeds.
    fn delete(&self, path: &DocumentPath) -> GatewayResult<()>;
    /// Atomically rewrites one existing document.
    fn transact(
        &self,
        path: &DocumentPath,
        apply: &mut dyn FnMut(Value) -> GatewayResult<Value>,
    ) -> GatewayResult<()>;
}

/// Listener bookkeeping shared by gateway implementations.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<SubscriptionId, (CollectionPath, SnapshotListener)>>,
}

impl ListenerRegistry {
    pub(crate) fn register(
        &self,
        collection: &CollectionPath,
        listener: SnapshotListener,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (collection.clone(), listener));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub(crate) fn has_listeners(&self, collection: &CollectionPath) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|(path, _)| path == collection)
    }

    /// Delivers `snapshot` to every listener of its collection.
    pub(crate) fn notify(&self, snapshot: &CollectionSnapshot) {
        let targets: Vec<SnapshotListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(path, _)| *path == snapshot.collection)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in targets {
            listener(snapshot.clone());
        }
    }
}

/// Requires `value` to be a JSON object and returns its fields.
pub(crate) fn into_object(path: &DocumentPath, value: Value) -> GatewayResult<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(GatewayError::InvalidDocument {
            path: path.clone(),
            message: format!("expected object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
