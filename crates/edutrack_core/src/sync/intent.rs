//! Closed set of user mutation intents.

use crate::model::exam::Exam;
use crate::model::subject::{Chapter, Paper, Subject};
use crate::model::EntityId;

/// One user-initiated mutation, dispatched into `OptimisticStore`.
///
/// Nested variants are scoped by the ids of their containing documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AddSubject(Subject),
    UpdateSubject(Subject),
    DeleteSubject {
        subject_id: EntityId,
    },
    AddPaper {
        subject_id: EntityId,
        paper: Paper,
    },
    UpdatePaper {
        subject_id: EntityId,
        paper: Paper,
    },
    DeletePaper {
        subject_id: EntityId,
        paper_id: EntityId,
    },
    AddChapter {
        subject_id: EntityId,
        paper_id: EntityId,
        chapter: Chapter,
    },
    UpdateChapter {
        subject_id: EntityId,
        paper_id: EntityId,
        chapter: Chapter,
    },
    DeleteChapter {
        subject_id: EntityId,
        paper_id: EntityId,
        chapter_id: EntityId,
    },
    /// Copies `chapter` under a new id, right after the source position.
    DuplicateChapter {
        subject_id: EntityId,
        paper_id: EntityId,
        chapter: Chapter,
    },
    /// List-move of one chapter from `start_index` to `end_index`.
    ReorderChapters {
        subject_id: EntityId,
        paper_id: EntityId,
        start_index: usize,
        end_index: usize,
    },
    AddExam(Exam),
    UpdateExam(Exam),
    DeleteExam {
        exam_id: EntityId,
    },
}

impl Intent {
    /// Stable snake_case label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddSubject(_) => "add_subject",
            Self::UpdateSubject(_) => "update_subject",
            Self::DeleteSubject { .. } => "delete_subject",
            Self::AddPaper { .. } => "add_paper",
            Self::UpdatePaper { .. } => "update_paper",
            Self::DeletePaper { .. } => "delete_paper",
            Self::AddChapter { .. } => "add_chapter",
            Self::UpdateChapter { .. } => "update_chapter",
            Self::DeleteChapter { .. } => "delete_chapter",
            Self::DuplicateChapter { .. } => "duplicate_chapter",
            Self::ReorderChapters { .. } => "reorder_chapters",
            Self::AddExam(_) => "add_exam",
            Self::UpdateExam(_) => "update_exam",
            Self::DeleteExam { .. } => "delete_exam",
        }
    }
}
