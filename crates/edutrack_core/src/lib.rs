//! Client-side data-synchronization core for EduTrack.
//! This crate owns the optimistic subject/exam state of one signed-in user.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod sync;
pub mod view;

pub use config::{ConfigError, CoreConfig, LoggingConfig};
pub use gateway::memory::MemoryDocumentGateway;
pub use gateway::path::{CollectionPath, DocumentPath, PathError};
pub use gateway::sqlite::SqliteDocumentGateway;
pub use gateway::{
    CollectionSnapshot, DocumentGateway, DocumentSnapshot, GatewayError, GatewayResult,
    SnapshotListener, SubscriptionId,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::exam::Exam;
pub use model::subject::{Chapter, Paper, ProgressItem, ResourceLink, Subject};
pub use model::{new_entity_id, EntityId};
pub use sync::intent::Intent;
pub use sync::store::{AppSnapshot, DispatchOutcome, OptimisticStore, SessionError, StorePhase};
pub use sync::writer::{RemoteWrite, WriteQueue};
pub use view::exams::{
    countdown, exam_chapter_details, next_exam, partition_exams, Countdown, ExamChapterDetail,
    ExamTimeline,
};
pub use view::progress::{chapter_percent, progress_percent};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
