//! Nested-collection mutation engine.
//!
//! # Responsibility
//! - Map `(collections, intent)` to the next in-memory collections plus the
//!   single remote write that mirrors the change.
//! - Rewrite papers/chapters embedded inside one subject document.
//!
//! # Invariants
//! - Only the affected subject is rebuilt; every other subject keeps its
//!   `Arc` identity.
//! - Nested edits against a missing subject, paper or chapter change nothing
//!   and issue no remote write.
//! - Reorder indices are bounds-checked before any element moves.
//! - The same resolved edit is replayed against the remote document, so a
//!   duplicated chapter carries one id locally and remotely.

use crate::gateway::path::{CollectionPath, DocumentPath, PathError};
use crate::gateway::{into_object, GatewayError, GatewayResult};
use crate::model::exam::Exam;
use crate::model::subject::{Chapter, Paper, Subject};
use crate::model::EntityId;
use crate::sync::intent::Intent;
use crate::sync::writer::RemoteWrite;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const PAPERS_FIELD: &str = "papers";

/// In-memory materialized view owned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collections {
    pub subjects: Vec<Arc<Subject>>,
    pub exams: Vec<Arc<Exam>>,
}

/// Collection addresses of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub subjects: CollectionPath,
    pub exams: CollectionPath,
}

impl SessionPaths {
    pub fn for_user(uid: &str) -> Result<Self, PathError> {
        Ok(Self {
            subjects: CollectionPath::user_subjects(uid)?,
            exams: CollectionPath::user_exams(uid)?,
        })
    }
}

/// Reasons an intent leaves local state untouched.
#[derive(Debug)]
pub enum IntentError {
    SubjectNotFound(EntityId),
    PaperNotFound {
        subject_id: EntityId,
        paper_id: EntityId,
    },
    ChapterNotFound {
        subject_id: EntityId,
        paper_id: EntityId,
        chapter_id: EntityId,
    },
    IndexOutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },
    InvalidPath(PathError),
    Encoding(serde_json::Error),
}

impl Display for IntentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubjectNotFound(id) => write!(f, "subject not found: {id}"),
            Self::PaperNotFound {
                subject_id,
                paper_id,
            } => write!(f, "paper {paper_id} not found in subject {subject_id}"),
            Self::ChapterNotFound {
                subject_id,
                paper_id,
                chapter_id,
            } => write!(
                f,
                "chapter {chapter_id} not found in paper {paper_id} of subject {subject_id}"
            ),
            Self::IndexOutOfRange { start, end, len } => write!(
                f,
                "reorder {start} -> {end} out of range for {len} chapters"
            ),
            Self::InvalidPath(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IntentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPath(err) => Some(err),
            Self::Encoding(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PathError> for IntentError {
    fn from(value: PathError) -> Self {
        Self::InvalidPath(value)
    }
}

impl From<serde_json::Error> for IntentError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

/// Resolved rewrite of a subject's `papers` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperEdit {
    Append(Paper),
    Replace(Paper),
    Remove(EntityId),
}

/// Resolved rewrite of one paper's `chapters` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterEdit {
    Append(Chapter),
    Replace(Chapter),
    Remove(EntityId),
    /// Inserts `chapter` right after `source_id`.
    InsertAfter {
        source_id: EntityId,
        chapter: Chapter,
    },
    Move {
        from: usize,
        to: usize,
    },
}

/// Edit targeting the nested structure of one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectEdit {
    Papers(PaperEdit),
    Chapters { paper_id: EntityId, edit: ChapterEdit },
}

impl PaperEdit {
    fn target_id(&self) -> Option<&str> {
        match self {
            Self::Append(_) => None,
            Self::Replace(paper) => Some(paper.id.as_str()),
            Self::Remove(id) => Some(id.as_str()),
        }
    }

    pub fn apply(&self, papers: &[Paper]) -> Vec<Paper> {
        match self {
            Self::Append(paper) => {
                let mut next = papers.to_vec();
                next.push(paper.clone());
                next
            }
            Self::Replace(paper) => papers
                .iter()
                .map(|current| {
                    if current.id == paper.id {
                        paper.clone()
                    } else {
                        current.clone()
                    }
                })
                .collect(),
            Self::Remove(paper_id) => papers
                .iter()
                .filter(|current| current.id != *paper_id)
                .cloned()
                .collect(),
        }
    }
}

impl ChapterEdit {
    /// Rebuilds the chapters of `paper`, which belongs to `subject_id`.
    ///
    /// # Errors
    /// - `ChapterNotFound` when a replace, remove or duplicate names a chapter
    ///   the paper does not hold.
    /// - `IndexOutOfRange` when a move index is past the end.
    pub fn apply(&self, subject_id: &str, paper: &Paper) -> Result<Vec<Chapter>, IntentError> {
        let mut next = paper.chapters.clone();
        let locate = |chapter_id: &str| {
            paper
                .chapters
                .iter()
                .position(|current| current.id == chapter_id)
                .ok_or_else(|| IntentError::ChapterNotFound {
                    subject_id: subject_id.to_string(),
                    paper_id: paper.id.clone(),
                    chapter_id: chapter_id.to_string(),
                })
        };
        match self {
            Self::Append(chapter) => next.push(chapter.clone()),
            Self::Replace(chapter) => {
                let index = locate(chapter.id.as_str())?;
                next[index] = chapter.clone();
            }
            Self::Remove(chapter_id) => {
                let index = locate(chapter_id.as_str())?;
                next.remove(index);
            }
            Self::InsertAfter { source_id, chapter } => {
                let index = locate(source_id.as_str())?;
                next.insert(index + 1, chapter.clone());
            }
            Self::Move { from, to } => {
                let len = next.len();
                if *from >= len || *to >= len {
                    return Err(IntentError::IndexOutOfRange {
                        start: *from,
                        end: *to,
                        len,
                    });
                }
                let moved = next.remove(*from);
                next.insert(*to, moved);
            }
        }
        Ok(next)
    }
}

impl SubjectEdit {
    /// Rebuilds `papers` of subject `subject_id`.
    pub fn apply_to_papers(
        &self,
        subject_id: &str,
        papers: &[Paper],
    ) -> Result<Vec<Paper>, IntentError> {
        match self {
            Self::Papers(edit) => {
                if let Some(paper_id) = edit.target_id() {
                    ensure_paper(subject_id, papers, paper_id)?;
                }
                Ok(edit.apply(papers))
            }
            Self::Chapters { paper_id, edit } => {
                let index = ensure_paper(subject_id, papers, paper_id)?;
                let mut next = papers.to_vec();
                next[index].chapters = edit.apply(subject_id, &papers[index])?;
                Ok(next)
            }
        }
    }

    pub fn apply(&self, subject: &Subject) -> Result<Subject, IntentError> {
        Ok(Subject {
            id: subject.id.clone(),
            name: subject.name.clone(),
            papers: self.apply_to_papers(&subject.id, &subject.papers)?,
        })
    }

    /// Replays the edit against the stored subject document.
    ///
    /// Fields other than `papers` are left as stored.
    pub fn apply_to_document(&self, path: &DocumentPath, document: Value) -> GatewayResult<Value> {
        let mut fields = into_object(path, document)?;
        let papers: Vec<Paper> = match fields.remove(PAPERS_FIELD) {
            Some(value) => {
                serde_json::from_value(value).map_err(|err| GatewayError::InvalidDocument {
                    path: path.clone(),
                    message: format!("malformed papers: {err}"),
                })?
            }
            None => Vec::new(),
        };
        let next = self
            .apply_to_papers(path.doc_id(), &papers)
            .map_err(|err| GatewayError::Aborted {
                path: path.clone(),
                message: err.to_string(),
            })?;
        fields.insert(PAPERS_FIELD.to_string(), serde_json::to_value(next)?);
        Ok(Value::Object(fields))
    }
}

fn ensure_paper(subject_id: &str, papers: &[Paper], paper_id: &str) -> Result<usize, IntentError> {
    papers
        .iter()
        .position(|paper| paper.id == paper_id)
        .ok_or_else(|| IntentError::PaperNotFound {
            subject_id: subject_id.to_string(),
            paper_id: paper_id.to_string(),
        })
}

/// Applies `intent` to `collections` and returns the remote write to issue.
///
/// On `Err`, `collections` is unchanged and nothing must be written.
pub fn reduce(
    collections: &mut Collections,
    paths: &SessionPaths,
    intent: Intent,
) -> Result<RemoteWrite, IntentError> {
    match intent {
        Intent::AddSubject(subject) => {
            let path = paths.subjects.doc(&subject.id)?;
            let document = Value::Object(to_fields(&subject)?);
            upsert(&mut collections.subjects, subject);
            Ok(RemoteWrite::Set { path, document })
        }
        Intent::UpdateSubject(subject) => {
            let path = paths.subjects.doc(&subject.id)?;
            let fields = to_fields(&subject)?;
            replace(&mut collections.subjects, subject);
            Ok(RemoteWrite::Update { path, fields })
        }
        Intent::DeleteSubject { subject_id } => {
            let path = paths.subjects.doc(&subject_id)?;
            collections.subjects.retain(|s| s.id != subject_id);
            Ok(RemoteWrite::Delete { path })
        }
        Intent::AddPaper { subject_id, paper } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Papers(PaperEdit::Append(paper)),
        ),
        Intent::UpdatePaper { subject_id, paper } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Papers(PaperEdit::Replace(paper)),
        ),
        Intent::DeletePaper {
            subject_id,
            paper_id,
        } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Papers(PaperEdit::Remove(paper_id)),
        ),
        Intent::AddChapter {
            subject_id,
            paper_id,
            chapter,
        } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Chapters {
                paper_id,
                edit: ChapterEdit::Append(chapter),
            },
        ),
        Intent::UpdateChapter {
            subject_id,
            paper_id,
            chapter,
        } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Chapters {
                paper_id,
                edit: ChapterEdit::Replace(chapter),
            },
        ),
        Intent::DeleteChapter {
            subject_id,
            paper_id,
            chapter_id,
        } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Chapters {
                paper_id,
                edit: ChapterEdit::Remove(chapter_id),
            },
        ),
        Intent::DuplicateChapter {
            subject_id,
            paper_id,
            chapter,
        } => {
            let copy = chapter.duplicate();
            edit_subject(
                collections,
                paths,
                subject_id,
                SubjectEdit::Chapters {
                    paper_id,
                    edit: ChapterEdit::InsertAfter {
                        source_id: chapter.id,
                        chapter: copy,
                    },
                },
            )
        }
        Intent::ReorderChapters {
            subject_id,
            paper_id,
            start_index,
            end_index,
        } => edit_subject(
            collections,
            paths,
            subject_id,
            SubjectEdit::Chapters {
                paper_id,
                edit: ChapterEdit::Move {
                    from: start_index,
                    to: end_index,
                },
            },
        ),
        Intent::AddExam(exam) => {
            let path = paths.exams.doc(&exam.id)?;
            let document = Value::Object(to_fields(&exam)?);
            upsert(&mut collections.exams, exam);
            Ok(RemoteWrite::Set { path, document })
        }
        Intent::UpdateExam(exam) => {
            let path = paths.exams.doc(&exam.id)?;
            let fields = to_fields(&exam)?;
            replace(&mut collections.exams, exam);
            Ok(RemoteWrite::Update { path, fields })
        }
        Intent::DeleteExam { exam_id } => {
            let path = paths.exams.doc(&exam_id)?;
            collections.exams.retain(|e| e.id != exam_id);
            Ok(RemoteWrite::Delete { path })
        }
    }
}

fn edit_subject(
    collections: &mut Collections,
    paths: &SessionPaths,
    subject_id: EntityId,
    edit: SubjectEdit,
) -> Result<RemoteWrite, IntentError> {
    let path = paths.subjects.doc(&subject_id)?;
    let index = collections
        .subjects
        .iter()
        .position(|subject| subject.id == subject_id)
        .ok_or(IntentError::SubjectNotFound(subject_id))?;

    let rebuilt = edit.apply(&collections.subjects[index])?;
    collections.subjects[index] = Arc::new(rebuilt);
    Ok(RemoteWrite::EditSubject { path, edit })
}

/// Root documents addressed by their own id.
pub(crate) trait RootDocument {
    fn doc_id(&self) -> &str;
}

impl RootDocument for Subject {
    fn doc_id(&self) -> &str {
        &self.id
    }
}

impl RootDocument for Exam {
    fn doc_id(&self) -> &str {
        &self.id
    }
}

fn upsert<T: RootDocument>(items: &mut Vec<Arc<T>>, item: T) {
    match items
        .iter()
        .position(|current| current.doc_id() == item.doc_id())
    {
        Some(index) => items[index] = Arc::new(item),
        None => items.push(Arc::new(item)),
    }
}

fn replace<T: RootDocument>(items: &mut [Arc<T>], item: T) {
    if let Some(slot) = items
        .iter_mut()
        .find(|current| current.doc_id() == item.doc_id())
    {
        *slot = Arc::new(item);
    }
}

fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, IntentError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}
