//! Exam selection, timeline and syllabus resolution.
//!
//! # Invariants
//! - Inputs are never reordered in place; every function returns borrowed
//!   views into the caller's collections.
//! - Ties on `date` keep original collection order.

use crate::model::exam::Exam;
use crate::model::subject::Subject;
use crate::model::EntityId;
use std::borrow::Borrow;

const MS_PER_SECOND: i64 = 1_000;
const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Earliest open exam that is not in the past.
///
/// Considers exams with `date >= now_ms` and `is_completed == false`.
pub fn next_exam<E: Borrow<Exam>>(exams: &[E], now_ms: i64) -> Option<&E> {
    exams
        .iter()
        .filter(|exam| {
            let exam = (*exam).borrow();
            !exam.is_completed && exam.date >= now_ms
        })
        .min_by_key(|exam| (*exam).borrow().date)
}

/// Exams split around `now_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamTimeline<'a, E> {
    /// `date >= now`, soonest first.
    pub upcoming: Vec<&'a E>,
    /// `date < now`, most recent first.
    pub past: Vec<&'a E>,
}

pub fn partition_exams<E: Borrow<Exam>>(exams: &[E], now_ms: i64) -> ExamTimeline<'_, E> {
    let (mut past, mut upcoming): (Vec<&E>, Vec<&E>) = exams
        .iter()
        .partition(|exam| (*exam).borrow().is_past(now_ms));
    upcoming.sort_by_key(|exam| (*exam).borrow().date);
    past.sort_by_key(|exam| std::cmp::Reverse((*exam).borrow().date));
    ExamTimeline { upcoming, past }
}

/// One syllabus entry of an exam, resolved against the subject tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamChapterDetail {
    pub subject_id: EntityId,
    pub subject_name: String,
    pub paper_name: String,
    pub chapter_id: EntityId,
    pub chapter_name: String,
}

/// Resolves `exam.chapter_ids` to chapter details.
///
/// Only subjects listed in `exam.subject_ids` are searched, in collection
/// order and across all their papers; the first match wins. Ids that resolve
/// to nothing are dropped.
pub fn exam_chapter_details<S: Borrow<Subject>>(
    exam: &Exam,
    subjects: &[S],
) -> Vec<ExamChapterDetail> {
    exam.chapter_ids
        .iter()
        .filter_map(|chapter_id| {
            subjects
                .iter()
                .map(Borrow::borrow)
                .filter(|subject: &&Subject| exam.covers_subject(&subject.id))
                .find_map(|subject| {
                    subject
                        .chapters()
                        .find(|(_, chapter)| chapter.id == *chapter_id)
                        .map(|(paper, chapter)| ExamChapterDetail {
                            subject_id: subject.id.clone(),
                            subject_name: subject.name.clone(),
                            paper_name: paper.name.clone(),
                            chapter_id: chapter.id.clone(),
                            chapter_name: chapter.name.clone(),
                        })
                })
        })
        .collect()
}

/// Time left until an exam, split into display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Remaining time from `now_ms` to `target_ms`.
///
/// Returns `None` once the target has passed or the exam is completed.
pub fn countdown(target_ms: i64, now_ms: i64, completed: bool) -> Option<Countdown> {
    if completed {
        return None;
    }
    let remaining_ms = target_ms.checked_sub(now_ms)?;
    if remaining_ms <= 0 {
        return None;
    }
    let total_seconds = remaining_ms / MS_PER_SECOND;
    Some(Countdown {
        days: total_seconds / SECONDS_PER_DAY,
        hours: (total_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
        minutes: (total_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
        seconds: total_seconds % SECONDS_PER_MINUTE,
    })
}
