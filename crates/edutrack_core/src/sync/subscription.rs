//! Typed live subscriptions over one document collection.
//!
//! # Responsibility
//! - Decode raw collection snapshots into domain values.
//! - Track the loading flag until the first snapshot arrives.
//!
//! # Invariants
//! - Every decoded value carries its document id in `id`, even when the
//!   stored body omits it.
//! - Malformed documents are skipped and logged; they never poison the rest of
//!   the snapshot.
//! - Dropping a subscription unsubscribes from the gateway.

use crate::gateway::path::CollectionPath;
use crate::gateway::{
    CollectionSnapshot, DocumentGateway, GatewayResult, SnapshotListener, SubscriptionId,
};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

const ID_FIELD: &str = "id";

/// Observable state of one collection subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState<T> {
    Loading,
    Ready(Vec<Arc<T>>),
}

impl<T> SnapshotState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Decodes every document of `snapshot` into `T`.
///
/// The document id overrides any `id` stored in the body.
pub fn decode_snapshot<T: DeserializeOwned>(snapshot: &CollectionSnapshot) -> Vec<T> {
    snapshot
        .documents
        .iter()
        .filter_map(|document| {
            let mut data = document.data.clone();
            if let Value::Object(fields) = &mut data {
                fields.insert(ID_FIELD.to_string(), Value::String(document.id.clone()));
            }
            match serde_json::from_value::<T>(data) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(
                        "event=snapshot_decode module=sync status=skip collection={} doc_id={} error={}",
                        snapshot.collection, document.id, err
                    );
                    None
                }
            }
        })
        .collect()
}

/// Live, typed view of one gateway collection.
pub struct CollectionSubscription<T> {
    gateway: Arc<dyn DocumentGateway>,
    id: SubscriptionId,
    state: Arc<Mutex<SnapshotState<T>>>,
}

impl<T> CollectionSubscription<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Subscribes to `collection`; `on_change` runs after every decoded
    /// snapshot, including the initial one delivered during this call.
    ///
    /// `on_change` runs on whichever thread the gateway delivers from and must
    /// not call back into the gateway.
    pub fn open<F>(
        gateway: Arc<dyn DocumentGateway>,
        collection: &CollectionPath,
        on_change: F,
    ) -> GatewayResult<Self>
    where
        F: Fn(&[Arc<T>]) + Send + Sync + 'static,
    {
        let state = Arc::new(Mutex::new(SnapshotState::Loading));
        let sink = Arc::clone(&state);
        let listener: SnapshotListener = Arc::new(move |snapshot: CollectionSnapshot| {
            let values: Vec<Arc<T>> = decode_snapshot::<T>(&snapshot)
                .into_iter()
                .map(Arc::new)
                .collect();
            on_change(&values);
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = SnapshotState::Ready(values);
        });

        let id = gateway.subscribe(collection, listener)?;
        Ok(Self { gateway, id, state })
    }

    pub fn is_loading(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading()
    }

    /// Latest decoded documents; empty while loading.
    pub fn data(&self) -> Vec<Arc<T>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SnapshotState::Loading => Vec::new(),
            SnapshotState::Ready(values) => values.clone(),
        }
    }
}

impl<T> Drop for CollectionSubscription<T> {
    fn drop(&mut self) {
        self.gateway.unsubscribe(self.id);
    }
}
