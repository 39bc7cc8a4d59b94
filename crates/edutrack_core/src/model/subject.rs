//! Subject document and its embedded papers/chapters.
//!
//! # Responsibility
//! - Define the nested `Subject -> Paper -> Chapter` tree stored as one
//!   remote document.
//! - Provide lookup and duplication helpers used by the mutation engine.
//!
//! # Invariants
//! - Papers and chapters keep the user-visible order of their arrays.
//! - A duplicated chapter never shares the source chapter's id.

use super::{new_entity_id, EntityId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const COPY_SUFFIX: &str = " (Copy)";

/// Root study document, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub papers: Vec<Paper>,
}

/// Exam paper embedded in a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// Chapter embedded in a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub progress_items: Vec<ProgressItem>,
    #[serde(default)]
    pub resource_links: Vec<ResourceLink>,
}

/// Countable progress tracker inside a chapter (e.g. "exercises 3/10").
///
/// `completed` may exceed `total` in stored data; display code clamps it.
/// Counts that are missing or not numeric read as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub completed: u32,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub total: u32,
}

/// External study resource attached to a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub id: EntityId,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Subject {
    /// Creates an empty subject with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            papers: Vec::new(),
        }
    }

    /// Finds one embedded paper by id.
    pub fn paper(&self, paper_id: &str) -> Option<&Paper> {
        self.papers.iter().find(|paper| paper.id == paper_id)
    }

    /// Iterates every chapter of every paper, in display order.
    pub fn chapters(&self) -> impl Iterator<Item = (&Paper, &Chapter)> {
        self.papers
            .iter()
            .flat_map(|paper| paper.chapters.iter().map(move |chapter| (paper, chapter)))
    }
}

impl Paper {
    /// Creates an empty paper with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            chapters: Vec::new(),
        }
    }

    /// Finds one chapter by id.
    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.id == chapter_id)
    }

    /// Returns the position of one chapter by id.
    pub fn chapter_position(&self, chapter_id: &str) -> Option<usize> {
        self.chapters
            .iter()
            .position(|chapter| chapter.id == chapter_id)
    }
}

impl Chapter {
    /// Creates an empty chapter with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            progress_items: Vec::new(),
            resource_links: Vec::new(),
        }
    }

    /// Returns a copy of this chapter under a fresh identity.
    ///
    /// The copy is named `"<name> (Copy)"`; progress items and links are
    /// carried over unchanged.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_entity_id(),
            name: format!("{}{COPY_SUFFIX}", self.name),
            progress_items: self.progress_items.clone(),
            resource_links: self.resource_links.clone(),
        }
    }
}

impl ProgressItem {
    /// Creates a tracker with a generated id.
    pub fn new(name: impl Into<String>, completed: u32, total: u32) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            completed,
            total,
        }
    }

    /// `completed` clamped to `[0, total]`.
    pub fn clamped_completed(&self) -> u32 {
        self.completed.min(self.total)
    }
}

impl ResourceLink {
    /// Creates a link with a generated id.
    pub fn new(url: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: new_entity_id(),
            url: url.into(),
            description,
        }
    }
}

/// Reads a stored count leniently: whole floats truncate, negatives and
/// non-numbers become 0, oversized values saturate.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match value {
        Value::Number(number) => match (number.as_u64(), number.as_f64()) {
            (Some(raw), _) => u32::try_from(raw).unwrap_or(u32::MAX),
            (None, Some(raw)) if raw.is_finite() && raw > 0.0 => raw as u32,
            _ => 0,
        },
        _ => 0,
    };
    Ok(count)
}
