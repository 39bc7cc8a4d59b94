//! In-process document store.
//!
//! # Responsibility
//! - Provide a complete `DocumentGateway` without any backend, for tests and
//!   embedding.
//! - Simulate an unreachable backend via `set_offline`.
//!
//! # Invariants
//! - Listener delivery happens while the store lock is held, so snapshots of
//!   one collection are observed in commit order.
//! - Listeners must not call back into the same gateway.

use super::path::{CollectionPath, DocumentPath};
use super::{
    into_object, CollectionSnapshot, DocumentGateway, DocumentSnapshot, GatewayError,
    GatewayResult, ListenerRegistry, SnapshotListener, SubscriptionId,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Collection = BTreeMap<String, Map<String, Value>>;

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<CollectionPath, Collection>,
    offline: bool,
    committed_writes: u64,
}

/// `DocumentGateway` backed by in-memory maps.
#[derive(Default)]
pub struct MemoryDocumentGateway {
    state: Mutex<MemoryState>,
    listeners: ListenerRegistry,
}

impl MemoryDocumentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `GatewayError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock_state().offline = offline;
    }

    /// Returns one stored document, if present.
    pub fn document(&self, path: &DocumentPath) -> Option<Value> {
        self.lock_state()
            .collections
            .get(path.collection())
            .and_then(|collection| collection.get(path.doc_id()))
            .cloned()
            .map(Value::Object)
    }

    /// Number of writes that reached the store.
    pub fn committed_writes(&self) -> u64 {
        self.lock_state().committed_writes
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit<F>(&self, path: &DocumentPath, mutate: F) -> GatewayResult<()>
    where
        F: FnOnce(&mut Collection) -> GatewayResult<()>,
    {
        let mut state = self.lock_state();
        if state.offline {
            return Err(GatewayError::Unavailable(format!(
                "offline; write to {path} rejected"
            )));
        }

        let collection = state
            .collections
            .entry(path.collection().clone())
            .or_default();
        mutate(collection)?;
        state.committed_writes += 1;

        if self.listeners.has_listeners(path.collection()) {
            let snapshot = snapshot_of(&state, path.collection());
            self.listeners.notify(&snapshot);
        }
        Ok(())
    }
}

impl DocumentGateway for MemoryDocumentGateway {
    fn subscribe(
        &self,
        collection: &CollectionPath,
        listener: SnapshotListener,
    ) -> GatewayResult<SubscriptionId> {
        let state = self.lock_state();
        let id = self.listeners.register(collection, listener.clone());
        listener(snapshot_of(&state, collection));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }

    fn set(&self, path: &DocumentPath, document: Value) -> GatewayResult<()> {
        let fields = into_object(path, document)?;
        self.commit(path, |collection| {
            collection.insert(path.doc_id().to_string(), fields);
            Ok(())
        })
    }

    fn update(&self, path: &DocumentPath, fields: Map<String, Value>) -> GatewayResult<()> {
        self.commit(path, |collection| {
            let current = collection
                .get_mut(path.doc_id())
                .ok_or_else(|| GatewayError::NotFound(path.clone()))?;
            current.extend(fields);
            Ok(())
        })
    }

    fn delete(&self, path: &DocumentPath) -> GatewayResult<()> {
        self.commit(path, |collection| {
            collection.remove(path.doc_id());
            Ok(())
        })
    }

    fn transact(
        &self,
        path: &DocumentPath,
        apply: &mut dyn FnMut(Value) -> GatewayResult<Value>,
    ) -> GatewayResult<()> {
        self.commit(path, |collection| {
            let current = collection
                .get(path.doc_id())
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(path.clone()))?;
            let next = into_object(path, apply(Value::Object(current))?)?;
            collection.insert(path.doc_id().to_string(), next);
            Ok(())
        })
    }
}

fn snapshot_of(state: &MemoryState, collection: &CollectionPath) -> CollectionSnapshot {
    let documents = state
        .collections
        .get(collection)
        .map(|docs| {
            docs.iter()
                .map(|(id, fields)| DocumentSnapshot {
                    id: id.clone(),
                    data: Value::Object(fields.clone()),
                })
                .collect()
        })
        .unwrap_or_default();
    CollectionSnapshot {
        collection: collection.clone(),
        documents,
    }
}
