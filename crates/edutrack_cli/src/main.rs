//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `edutrack_core` wiring end to end: config, logging, SQLite
//!   document store, session sign-in and derived views.
//! - Keep output deterministic for quick local sanity checks.

use edutrack_core::{
    core_version, countdown, exam_chapter_details, init_logging, CoreConfig,
    DocumentGateway, OptimisticStore, SqliteDocumentGateway, WriteQueue,
};
use log::info;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("edutrack_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging(&config.logging)?;

    println!("edutrack_core version={}", core_version());

    let gateway: Arc<dyn DocumentGateway> = match &config.db_path {
        Some(path) => Arc::new(SqliteDocumentGateway::open(path).map_err(|err| err.to_string())?),
        None => Arc::new(SqliteDocumentGateway::open_in_memory().map_err(|err| err.to_string())?),
    };

    let Some(user_id) = config.user_id.as_deref() else {
        println!("session=none hint=set EDUTRACK_USER_ID");
        return Ok(());
    };

    let writer = WriteQueue::background(Arc::clone(&gateway)).map_err(|err| err.to_string())?;
    let store = OptimisticStore::new(gateway, writer);
    store.sign_in(user_id).map_err(|err| err.to_string())?;

    let snapshot = store.snapshot();
    println!(
        "phase={} subjects={} exams={}",
        snapshot.phase.as_str(),
        snapshot.subjects.len(),
        snapshot.exams.len()
    );
    for subject in &snapshot.subjects {
        println!(
            "subject name={:?} papers={} chapters={}",
            subject.name,
            subject.papers.len(),
            subject.chapters().count()
        );
    }

    let now_ms = now_epoch_ms();
    match store.next_exam(now_ms) {
        Some(exam) => {
            println!("next_exam name={:?} date_ms={}", exam.name, exam.date);
            if let Some(left) = countdown(exam.date, now_ms, exam.is_completed) {
                println!(
                    "countdown days={} hours={} minutes={} seconds={}",
                    left.days, left.hours, left.minutes, left.seconds
                );
            }
            for detail in exam_chapter_details(&exam, &snapshot.subjects) {
                println!(
                    "syllabus subject={:?} paper={:?} chapter={:?}",
                    detail.subject_name, detail.paper_name, detail.chapter_name
                );
            }
        }
        None => println!("next_exam=none"),
    }

    info!(
        "event=cli_summary module=cli status=ok subjects={} exams={}",
        snapshot.subjects.len(),
        snapshot.exams.len()
    );
    store.shutdown();
    Ok(())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
