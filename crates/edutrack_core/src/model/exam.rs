//! Exam document model.
//!
//! # Invariants
//! - `date` is Unix epoch milliseconds.
//! - `chapter_ids` may reference chapters that no longer exist; readers drop
//!   unresolved ids instead of failing.

use super::{new_entity_id, EntityId};
use serde::{Deserialize, Serialize};

/// Scheduled exam, stored as a root document next to subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: EntityId,
    pub name: String,
    /// Unix epoch milliseconds.
    pub date: i64,
    #[serde(default)]
    pub subject_ids: Vec<EntityId>,
    #[serde(default)]
    pub chapter_ids: Vec<EntityId>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Exam {
    /// Creates an open exam with a generated id and no syllabus.
    pub fn new(name: impl Into<String>, date: i64) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            date,
            subject_ids: Vec::new(),
            chapter_ids: Vec::new(),
            is_completed: false,
        }
    }

    /// Returns whether the exam syllabus includes the given subject.
    pub fn covers_subject(&self, subject_id: &str) -> bool {
        self.subject_ids.iter().any(|id| id == subject_id)
    }

    /// Returns whether the exam date lies strictly before `now_ms`.
    pub fn is_past(&self, now_ms: i64) -> bool {
        self.date < now_ms
    }
}
