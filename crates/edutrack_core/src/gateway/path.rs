//! Document store addressing.
//!
//! # Responsibility
//! - Build validated collection/document paths for per-user data.
//!
//! # Invariants
//! - Collection paths have an odd number of segments, document paths an even
//!   number (`users/{uid}/subjects` vs `users/{uid}/subjects/{id}`).
//! - Segments are non-empty and never contain `/`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-.@]+$").expect("valid path segment regex"));

const USERS_COLLECTION: &str = "users";
const SUBJECTS_COLLECTION: &str = "subjects";
const EXAMS_COLLECTION: &str = "exams";

/// Path construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Segment is empty, `.`/`..`, or contains unsupported characters.
    InvalidSegment(String),
    /// Raw path has the wrong number of segments for its kind.
    WrongSegmentCount { path: String, expected_odd: bool },
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSegment(value) => write!(f, "invalid path segment: `{value}`"),
            Self::WrongSegmentCount { path, expected_odd } => {
                let kind = if *expected_odd {
                    "collection"
                } else {
                    "document"
                };
                write!(f, "`{path}` is not a valid {kind} path")
            }
        }
    }
}

impl Error for PathError {}

/// Address of a document collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

/// Address of one document inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    doc_id: String,
}

impl CollectionPath {
    /// Parses a slash-separated collection path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 == 0 {
            return Err(PathError::WrongSegmentCount {
                path: raw.to_string(),
                expected_odd: true,
            });
        }
        Ok(Self(segments.join("/")))
    }

    /// `users/{uid}/subjects`
    pub fn user_subjects(uid: &str) -> Result<Self, PathError> {
        Self::user_collection(uid, SUBJECTS_COLLECTION)
    }

    /// `users/{uid}/exams`
    pub fn user_exams(uid: &str) -> Result<Self, PathError> {
        Self::user_collection(uid, EXAMS_COLLECTION)
    }

    /// Addresses one document in this collection.
    pub fn doc(&self, doc_id: &str) -> Result<DocumentPath, PathError> {
        validate_segment(doc_id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            doc_id: doc_id.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn user_collection(uid: &str, name: &str) -> Result<Self, PathError> {
        validate_segment(uid)?;
        Ok(Self(format!("{USERS_COLLECTION}/{uid}/{name}")))
    }
}

impl DocumentPath {
    /// Parses a slash-separated document path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 != 0 {
            return Err(PathError::WrongSegmentCount {
                path: raw.to_string(),
                expected_odd: false,
            });
        }
        let (doc_id, parent) = segments
            .split_last()
            .ok_or_else(|| PathError::InvalidSegment(raw.to_string()))?;
        Ok(Self {
            collection: CollectionPath(parent.join("/")),
            doc_id: (*doc_id).to_string(),
        })
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for DocumentPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

fn split_segments(raw: &str) -> Result<Vec<&str>, PathError> {
    let segments: Vec<&str> = raw.trim().trim_matches('/').split('/').collect();
    for segment in &segments {
        validate_segment(segment)?;
    }
    Ok(segments)
}

fn validate_segment(value: &str) -> Result<(), PathError> {
    if value == "." || value == ".." || !SEGMENT_RE.is_match(value) {
        return Err(PathError::InvalidSegment(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CollectionPath, DocumentPath, PathError};

    #[test]
    fn builds_user_scoped_paths() {
        let subjects = CollectionPath::user_subjects("u-1").unwrap();
        assert_eq!(subjects.as_str(), "users/u-1/subjects");

        let doc = subjects.doc("abc").unwrap();
        assert_eq!(doc.to_string(), "users/u-1/subjects/abc");
        assert_eq!(doc.doc_id(), "abc");
        assert_eq!(doc.collection(), &subjects);
    }

    #[test]
    fn rejects_slash_and_blank_segments() {
        let exams = CollectionPath::user_exams("u-1").unwrap();
        assert!(matches!(exams.doc("a/b"), Err(PathError::InvalidSegment(_))));
        assert!(matches!(exams.doc(""), Err(PathError::InvalidSegment(_))));
        assert!(matches!(
            CollectionPath::user_subjects(".."),
            Err(PathError::InvalidSegment(_))
        ));
    }

    #[test]
    fn parse_checks_segment_parity() {
        assert!(CollectionPath::parse("users/u1/exams").is_ok());
        assert!(matches!(
            CollectionPath::parse("users/u1"),
            Err(PathError::WrongSegmentCount { .. })
        ));

        let doc = DocumentPath::parse("/users/u1/exams/e1/").unwrap();
        assert_eq!(doc.collection().as_str(), "users/u1/exams");
        assert_eq!(doc.doc_id(), "e1");
        assert!(DocumentPath::parse("users/u1/exams").is_err());
    }
}
