//! Fire-and-forget propagation of local intents to the document store.
//!
//! # Responsibility
//! - Describe the single remote write produced by one applied intent.
//! - Execute writes off the caller's path; the only continuation of a write
//!   is a log event and a counter bump.
//!
//! # Invariants
//! - Writes execute in submission order.
//! - Write failures never reach the dispatcher and never roll back local
//!   state.

use crate::gateway::path::DocumentPath;
use crate::gateway::{DocumentGateway, GatewayResult};
use crate::sync::engine::SubjectEdit;
use log::{debug, error};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

const WORKER_THREAD_NAME: &str = "edutrack-writer";

/// Remote counterpart of one applied intent.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteWrite {
    /// Create-or-overwrite a root document.
    Set { path: DocumentPath, document: Value },
    /// Merge top-level fields into an existing root document.
    Update {
        path: DocumentPath,
        fields: Map<String, Value>,
    },
    Delete { path: DocumentPath },
    /// Read-modify-write of a subject's nested `papers` array.
    EditSubject { path: DocumentPath, edit: SubjectEdit },
}

impl RemoteWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Set { .. } => "set",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::EditSubject { .. } => "transact",
        }
    }

    pub fn path(&self) -> &DocumentPath {
        match self {
            Self::Set { path, .. }
            | Self::Update { path, .. }
            | Self::Delete { path }
            | Self::EditSubject { path, .. } => path,
        }
    }

    /// Performs the write against `gateway`.
    pub fn execute(&self, gateway: &dyn DocumentGateway) -> GatewayResult<()> {
        match self {
            Self::Set { path, document } => gateway.set(path, document.clone()),
            Self::Update { path, fields } => gateway.update(path, fields.clone()),
            Self::Delete { path } => gateway.delete(path),
            Self::EditSubject { path, edit } => {
                gateway.transact(path, &mut |current| edit.apply_to_document(path, current))
            }
        }
    }
}

/// Counters describing settled writes.
#[derive(Debug, Default)]
pub struct WriteStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl WriteStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

enum Mode {
    /// Executes on the submitting thread once the caller released its locks.
    Inline,
    /// Executes on a dedicated worker thread fed by a channel.
    Background {
        sender: Mutex<Option<Sender<RemoteWrite>>>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Ordered, non-blocking write pipeline in front of a `DocumentGateway`.
pub struct WriteQueue {
    gateway: Arc<dyn DocumentGateway>,
    stats: Arc<WriteStats>,
    mode: Mode,
}

impl WriteQueue {
    /// Starts a queue whose writes run on a background worker thread.
    ///
    /// # Errors
    /// - Returns an error when the worker thread cannot be spawned.
    pub fn background(gateway: Arc<dyn DocumentGateway>) -> std::io::Result<Self> {
        let stats = Arc::new(WriteStats::default());
        let (sender, receiver) = mpsc::channel::<RemoteWrite>();

        let worker_gateway = Arc::clone(&gateway);
        let worker_stats = Arc::clone(&stats);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                for write in receiver {
                    execute_and_log(worker_gateway.as_ref(), &worker_stats, &write);
                }
            })?;

        Ok(Self {
            gateway,
            stats,
            mode: Mode::Background {
                sender: Mutex::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
            },
        })
    }

    /// Creates a queue that runs each write synchronously inside `submit`.
    ///
    /// Local state is always updated before `submit` is called, so ordering
    /// guarantees are the same as the background mode.
    pub fn inline(gateway: Arc<dyn DocumentGateway>) -> Self {
        Self {
            gateway,
            stats: Arc::new(WriteStats::default()),
            mode: Mode::Inline,
        }
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    /// Hands one write over without waiting for it to settle.
    pub fn submit(&self, write: RemoteWrite) {
        self.stats.submitted.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            Mode::Inline => execute_and_log(self.gateway.as_ref(), &self.stats, &write),
            Mode::Background { sender, .. } => {
                let guard = sender.lock().unwrap_or_else(PoisonError::into_inner);
                let delivered = guard
                    .as_ref()
                    .map(|sender| sender.send(write.clone()).is_ok())
                    .unwrap_or(false);
                if !delivered {
                    self.stats.failed.fetch_add(1, Ordering::SeqCst);
                    error!(
                        "event=remote_write module=sync status=error kind={} path={} error_code=queue_closed",
                        write.kind(),
                        write.path()
                    );
                }
            }
        }
    }

    /// Stops accepting writes and waits for queued ones to settle.
    ///
    /// Idempotent; inline queues have nothing to drain.
    pub fn shutdown(&self) {
        if let Mode::Background { sender, worker } = &self.mode {
            drop(
                sender
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take(),
            );
            let handle = worker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!("event=write_queue_shutdown module=sync status=error error_code=worker_panicked");
                }
            }
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn execute_and_log(gateway: &dyn DocumentGateway, stats: &WriteStats, write: &RemoteWrite) {
    let started_at = Instant::now();
    match write.execute(gateway) {
        Ok(()) => {
            stats.succeeded.fetch_add(1, Ordering::SeqCst);
            debug!(
                "event=remote_write module=sync status=ok kind={} path={} duration_ms={}",
                write.kind(),
                write.path(),
                started_at.elapsed().as_millis()
            );
        }
        Err(err) => {
            stats.failed.fetch_add(1, Ordering::SeqCst);
            error!(
                "event=remote_write module=sync status=error kind={} path={} duration_ms={} error={}",
                write.kind(),
                write.path(),
                started_at.elapsed().as_millis(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteWrite, WriteQueue};
    use crate::gateway::memory::MemoryDocumentGateway;
    use crate::gateway::path::CollectionPath;
    use crate::gateway::DocumentGateway;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn background_queue_preserves_submission_order() {
        let gateway = Arc::new(MemoryDocumentGateway::new());
        let queue = WriteQueue::background(gateway.clone()).unwrap();
        let path = CollectionPath::user_exams("u1")
            .unwrap()
            .doc("e1")
            .unwrap();

        queue.submit(RemoteWrite::Set {
            path: path.clone(),
            document: json!({"id": "e1", "name": "First"}),
        });
        for name in ["Second", "Third"] {
            queue.submit(RemoteWrite::Update {
                path: path.clone(),
                fields: json!({"name": name}).as_object().unwrap().clone(),
            });
        }
        queue.shutdown();

        assert_eq!(queue.stats().succeeded(), 3);
        assert_eq!(gateway.document(&path).unwrap()["name"], "Third");
    }

    #[test]
    fn failures_are_counted_not_returned() {
        let gateway = Arc::new(MemoryDocumentGateway::new());
        let queue = WriteQueue::inline(gateway.clone());
        let path = CollectionPath::user_exams("u1")
            .unwrap()
            .doc("missing")
            .unwrap();

        queue.submit(RemoteWrite::Update {
            path,
            fields: json!({"name": "x"}).as_object().unwrap().clone(),
        });

        assert_eq!(queue.stats().submitted(), 1);
        assert_eq!(queue.stats().failed(), 1);
        assert_eq!(gateway.committed_writes(), 0);
    }

    #[test]
    fn submit_after_shutdown_is_dropped_and_counted() {
        let gateway: Arc<dyn DocumentGateway> = Arc::new(MemoryDocumentGateway::new());
        let queue = WriteQueue::background(gateway).unwrap();
        queue.shutdown();

        queue.submit(RemoteWrite::Delete {
            path: CollectionPath::user_exams("u1")
                .unwrap()
                .doc("e1")
                .unwrap(),
        });
        assert_eq!(queue.stats().failed(), 1);
    }
}
