//! Scheduler exclusivity and cancellation against real merges.

use std::time::Duration;

use tempfile::TempDir;

use pdfmeld::error::Error;
use pdfmeld::merge::{MergeEngine, MergeInput, MergeJob};
use pdfmeld::options::OutputOptions;
use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};

use crate::common::save_pdf;

fn input(path: std::path::PathBuf) -> MergeInput {
    MergeInput {
        label: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        pdf_path: path,
        selection: None,
        preserve_bookmarks: true,
    }
}

#[tokio::test]
async fn test_live_merge_blocks_everything_and_cancels_cleanly() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 2);
    let dest = dir.path().join("out.pdf");

    let job = MergeJob {
        inputs: vec![input(a)],
        skipped: Vec::new(),
        options: OutputOptions::new(dest.clone()),
    };

    let scheduler = TaskScheduler::new();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| {
            // Hold the slot until the owner decides, then run for real.
            while !ctx.is_cancelled() {
                std::thread::sleep(Duration::from_millis(2));
            }
            MergeEngine::new().merge(&job, ctx)
        })
        .unwrap();

    // While the merge is live, nothing else may start.
    assert!(matches!(
        scheduler.submit::<(), _>(TaskKind::Merge, |_ctx| Ok(())),
        Err(Error::TaskAlreadyRunning)
    ));
    assert!(matches!(
        scheduler.submit::<(), _>(TaskKind::Batch, |_ctx| Ok(())),
        Err(Error::TaskAlreadyRunning)
    ));

    handle.cancel();
    assert!(matches!(handle.join().await, TaskOutcome::Cancelled));

    // Cancellation left nothing behind and freed the slot.
    assert!(!dest.exists());
    assert!(
        scheduler
            .submit::<(), _>(TaskKind::Merge, |_ctx| Ok(()))
            .is_ok()
    );
}

#[tokio::test]
async fn test_completed_merge_reports_progress_then_outcome() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 1);
    let b = save_pdf(dir.path(), "b.pdf", 1);
    let dest = dir.path().join("out.pdf");

    let job = MergeJob {
        inputs: vec![input(a), input(b)],
        skipped: Vec::new(),
        options: OutputOptions::new(dest.clone()),
    };

    let scheduler = TaskScheduler::new();
    let mut handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();

    let mut notes = Vec::new();
    while let Some(progress) = handle.next_progress().await {
        notes.push(progress.note);
    }
    assert_eq!(notes.first().map(String::as_str), Some("a.pdf"));
    assert!(notes.iter().any(|n| n == "writing output"));

    match handle.join().await {
        TaskOutcome::Completed(outcome) => {
            assert_eq!(outcome.total_pages, 2);
            assert!(dest.exists());
        }
        other => panic!("merge did not complete: {other:?}"),
    }
}
