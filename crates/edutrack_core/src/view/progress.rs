//! Progress percentages for progress items and chapters.

use crate::model::subject::{Chapter, ProgressItem};

/// Rounded completion percentage in `0..=100`.
///
/// `completed` is clamped to `total`; a zero `total` yields `0`. Halves round
/// up, matching `round(100 * completed / total)`.
pub fn progress_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(total));
    let total = u64::from(total);
    let percent = (200 * completed + total) / (2 * total);
    u8::try_from(percent).unwrap_or(100)
}

impl ProgressItem {
    pub fn percent(&self) -> u8 {
        progress_percent(self.completed, self.total)
    }
}

/// Aggregate completion of a chapter across all of its progress items.
///
/// Items are weighted by their `total`; a chapter without countable work
/// reports `0`.
pub fn chapter_percent(chapter: &Chapter) -> u8 {
    let (completed, total) = chapter
        .progress_items
        .iter()
        .fold((0u32, 0u32), |(completed, total), item| {
            (
                completed.saturating_add(item.clamped_completed()),
                total.saturating_add(item.total),
            )
        });
    progress_percent(completed, total)
}
