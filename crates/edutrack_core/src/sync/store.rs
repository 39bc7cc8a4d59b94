//! Session-scoped optimistic state store.
//!
//! # Responsibility
//! - Own the in-memory subjects/exams of the signed-in user.
//! - Apply intents locally first, then hand the mirrored write to the queue.
//! - Replace collections wholesale when snapshots arrive.
//!
//! # Invariants
//! - Intents are applied one at a time, in dispatch order.
//! - No store lock is held while the gateway is called; gateways deliver
//!   snapshots from inside their own locks.
//! - Snapshots of an ended session are ignored.
//! - Snapshot replacement reuses the existing `Arc` of every unchanged
//!   document, so repeated snapshots keep identity stable.

use crate::gateway::path::{CollectionPath, PathError};
use crate::gateway::{DocumentGateway, GatewayError, GatewayResult};
use crate::model::exam::Exam;
use crate::model::subject::Subject;
use crate::sync::engine::{reduce, Collections, RootDocument, SessionPaths};
use crate::sync::intent::Intent;
use crate::sync::subscription::CollectionSubscription;
use crate::sync::writer::WriteQueue;
use crate::view::exams::next_exam;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle phase of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePhase {
    /// No session; collections are empty.
    #[default]
    Uninitialized,
    /// Session open, waiting for the first subjects and exams snapshots.
    Loading,
    Ready,
}

impl StorePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
        }
    }
}

/// Point-in-time copy of the store for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSnapshot {
    pub phase: StorePhase,
    pub subjects: Vec<Arc<Subject>>,
    pub exams: Vec<Arc<Exam>>,
}

impl AppSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == StorePhase::Loading
    }
}

/// Result of one `OptimisticStore::dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Local state changed and a remote write was queued.
    Applied,
    /// Intent targeted something absent or was out of range; nothing changed.
    Skipped,
    /// No signed-in user; nothing changed.
    NoSession,
}

/// Session lifecycle errors.
#[derive(Debug)]
pub enum SessionError {
    InvalidUser(PathError),
    Gateway(GatewayError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUser(err) => write!(f, "invalid user id: {err}"),
            Self::Gateway(err) => write!(f, "subscription failed: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidUser(err) => Some(err),
            Self::Gateway(err) => Some(err),
        }
    }
}

impl From<PathError> for SessionError {
    fn from(value: PathError) -> Self {
        Self::InvalidUser(value)
    }
}

impl From<GatewayError> for SessionError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

struct Session {
    user_id: String,
    paths: SessionPaths,
}

#[derive(Default)]
struct StoreState {
    /// Bumped on every sign-in/sign-out; listeners carry the value they were
    /// opened with.
    generation: u64,
    session: Option<Session>,
    phase: StorePhase,
    collections: Collections,
    pending_subjects: Option<Vec<Arc<Subject>>>,
    pending_exams: Option<Vec<Arc<Exam>>>,
}

impl StoreState {
    fn is_current(&self, generation: u64) -> bool {
        self.session.is_some() && self.generation == generation
    }

    fn receive_subjects(&mut self, incoming: &[Arc<Subject>]) {
        if self.phase == StorePhase::Ready {
            self.collections.subjects = reconcile(&self.collections.subjects, incoming);
            log_snapshot_applied("subjects", incoming.len());
        } else {
            self.pending_subjects = Some(incoming.to_vec());
            self.promote_if_complete();
        }
    }

    fn receive_exams(&mut self, incoming: &[Arc<Exam>]) {
        if self.phase == StorePhase::Ready {
            self.collections.exams = reconcile(&self.collections.exams, incoming);
            log_snapshot_applied("exams", incoming.len());
        } else {
            self.pending_exams = Some(incoming.to_vec());
            self.promote_if_complete();
        }
    }

    /// Adopts both first snapshots as the baseline once they are present.
    fn promote_if_complete(&mut self) {
        if self.pending_subjects.is_none() || self.pending_exams.is_none() {
            return;
        }
        let subjects = self.pending_subjects.take().unwrap_or_default();
        let exams = self.pending_exams.take().unwrap_or_default();
        info!(
            "event=store_ready module=sync status=ok generation={} subjects={} exams={}",
            self.generation,
            subjects.len(),
            exams.len()
        );
        self.collections = Collections { subjects, exams };
        self.phase = StorePhase::Ready;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.session = None;
        self.phase = StorePhase::Uninitialized;
        self.collections = Collections::default();
        self.pending_subjects = None;
        self.pending_exams = None;
    }
}

struct SessionSubscriptions {
    _subjects: CollectionSubscription<Subject>,
    _exams: CollectionSubscription<Exam>,
}

/// Single source of truth for one user's subjects and exams.
///
/// # Contract
/// - `dispatch` returns after the local mutation; the remote write runs
///   through the `WriteQueue` and its outcome is only logged.
/// - Snapshots replace collections without merging pending local edits.
pub struct OptimisticStore {
    gateway: Arc<dyn DocumentGateway>,
    writer: WriteQueue,
    /// Serializes dispatch and session changes.
    command_lock: Mutex<()>,
    state: Arc<Mutex<StoreState>>,
    subscriptions: Mutex<Option<SessionSubscriptions>>,
}

impl OptimisticStore {
    /// Creates an uninitialized store writing through `writer`.
    pub fn new(gateway: Arc<dyn DocumentGateway>, writer: WriteQueue) -> Self {
        Self {
            gateway,
            writer,
            command_lock: Mutex::new(()),
            state: Arc::new(Mutex::new(StoreState::default())),
            subscriptions: Mutex::new(None),
        }
    }

    /// Opens a session for `user_id`, replacing any previous one.
    ///
    /// The gateway delivers initial snapshots during this call, so with a
    /// synchronous gateway the store is usually `Ready` on return.
    ///
    /// # Errors
    /// - `SessionError::InvalidUser` when `user_id` is not a valid path segment.
    /// - `SessionError::Gateway` when a subscription cannot be opened; the
    ///   store is left `Uninitialized`.
    pub fn sign_in(&self, user_id: &str) -> Result<(), SessionError> {
        let paths = SessionPaths::for_user(user_id)?;
        let _command = self.lock_command();
        self.end_session();

        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            state.session = Some(Session {
                user_id: user_id.to_string(),
                paths: paths.clone(),
            });
            state.phase = StorePhase::Loading;
            state.generation
        };

        let opened = self
            .open_feed(&paths.subjects, generation, StoreState::receive_subjects)
            .and_then(|subjects| {
                let exams = self.open_feed(&paths.exams, generation, StoreState::receive_exams)?;
                Ok(SessionSubscriptions {
                    _subjects: subjects,
                    _exams: exams,
                })
            });

        match opened {
            Ok(subscriptions) => {
                *self.lock_subscriptions() = Some(subscriptions);
                info!(
                    "event=session_sign_in module=sync status=ok generation={} phase={}",
                    generation,
                    self.phase().as_str()
                );
                Ok(())
            }
            Err(err) => {
                self.lock_state().reset();
                warn!(
                    "event=session_sign_in module=sync status=error generation={} error={}",
                    generation, err
                );
                Err(err.into())
            }
        }
    }

    /// Ends the current session and discards all local state.
    ///
    /// Idempotent. Queued writes still settle.
    pub fn sign_out(&self) {
        let _command = self.lock_command();
        self.end_session();
    }

    /// Applies one intent locally and queues its remote write.
    ///
    /// # Contract
    /// - Intents are applied strictly in call order.
    /// - The local change is visible before this returns; the remote write is
    ///   not awaited and its failure never rolls the change back.
    pub fn dispatch(&self, intent: Intent) -> DispatchOutcome {
        let _command = self.lock_command();
        let kind = intent.kind();

        let write = {
            let mut state = self.lock_state();
            let Some(paths) = state.session.as_ref().map(|session| session.paths.clone()) else {
                warn!(
                    "event=intent_skipped module=sync status=error kind={} reason=no_session",
                    kind
                );
                return DispatchOutcome::NoSession;
            };
            match reduce(&mut state.collections, &paths, intent) {
                Ok(write) => write,
                Err(err) => {
                    info!(
                        "event=intent_skipped module=sync status=skip kind={} reason={}",
                        kind, err
                    );
                    return DispatchOutcome::Skipped;
                }
            }
        };

        debug!(
            "event=intent_applied module=sync status=ok kind={} write={} path={}",
            kind,
            write.kind(),
            write.path()
        );
        self.writer.submit(write);
        DispatchOutcome::Applied
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let state = self.lock_state();
        AppSnapshot {
            phase: state.phase,
            subjects: state.collections.subjects.clone(),
            exams: state.collections.exams.clone(),
        }
    }

    pub fn phase(&self) -> StorePhase {
        self.lock_state().phase
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock_state()
            .session
            .as_ref()
            .map(|session| session.user_id.clone())
    }

    pub fn subjects(&self) -> Vec<Arc<Subject>> {
        self.lock_state().collections.subjects.clone()
    }

    pub fn exams(&self) -> Vec<Arc<Exam>> {
        self.lock_state().collections.exams.clone()
    }

    pub fn subject(&self, subject_id: &str) -> Option<Arc<Subject>> {
        find_by_id(&self.lock_state().collections.subjects, subject_id)
    }

    pub fn exam(&self, exam_id: &str) -> Option<Arc<Exam>> {
        find_by_id(&self.lock_state().collections.exams, exam_id)
    }

    /// Earliest open exam at or after `now_ms`.
    pub fn next_exam(&self, now_ms: i64) -> Option<Arc<Exam>> {
        let state = self.lock_state();
        next_exam(&state.collections.exams, now_ms).cloned()
    }

    /// Write pipeline used for remote propagation.
    pub fn writer(&self) -> &WriteQueue {
        &self.writer
    }

    /// Ends the session and waits for queued writes to settle.
    pub fn shutdown(&self) {
        self.sign_out();
        self.writer.shutdown();
    }

    fn open_feed<T>(
        &self,
        collection: &CollectionPath,
        generation: u64,
        apply: fn(&mut StoreState, &[Arc<T>]),
    ) -> GatewayResult<CollectionSubscription<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let state = Arc::clone(&self.state);
        let label = collection.to_string();
        CollectionSubscription::open(
            Arc::clone(&self.gateway),
            collection,
            move |values: &[Arc<T>]| {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if !state.is_current(generation) {
                    debug!(
                        "event=snapshot_applied module=sync status=skip collection={} reason=stale_session",
                        label
                    );
                    return;
                }
                apply(&mut *state, values);
            },
        )
    }

    fn end_session(&self) {
        let subscriptions = self.lock_subscriptions().take();
        drop(subscriptions);

        let mut state = self.lock_state();
        if state.session.is_none() {
            return;
        }
        state.reset();
        info!(
            "event=session_sign_out module=sync status=ok generation={}",
            state.generation
        );
    }

    fn lock_command(&self) -> MutexGuard<'_, ()> {
        self.command_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Option<SessionSubscriptions>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for OptimisticStore {
    fn drop(&mut self) {
        self.end_session();
    }
}

/// Builds the next collection from `incoming`, keeping the current `Arc` of
/// every document that did not change.
fn reconcile<T: RootDocument + PartialEq>(current: &[Arc<T>], incoming: &[Arc<T>]) -> Vec<Arc<T>> {
    incoming
        .iter()
        .map(|next| {
            current
                .iter()
                .find(|kept| kept.doc_id() == next.doc_id() && kept.as_ref() == next.as_ref())
                .map(Arc::clone)
                .unwrap_or_else(|| Arc::clone(next))
        })
        .collect()
}

fn find_by_id<T: RootDocument>(items: &[Arc<T>], id: &str) -> Option<Arc<T>> {
    items.iter().find(|item| item.doc_id() == id).map(Arc::clone)
}

fn log_snapshot_applied(collection: &str, documents: usize) {
    debug!(
        "event=snapshot_applied module=sync status=ok collection={} documents={}",
        collection, documents
    );
}
