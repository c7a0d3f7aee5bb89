//! Archive expansion through the full pipeline.

use lopdf::Document;
use tempfile::TempDir;

use pdfmeld::convert::ConverterRegistry;
use pdfmeld::document::DocumentList;
use pdfmeld::merge::{MergeEngine, MergeJob};
use pdfmeld::options::OutputOptions;
use pdfmeld::pipeline::{IngestPipeline, IngestReport};
use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};

use crate::common::{pdf_bytes, save_pdf, write_zip};

#[tokio::test]
async fn test_zip_members_merge_in_archive_order() {
    let dir = TempDir::new().unwrap();
    let archive = write_zip(
        dir.path(),
        "bundle.zip",
        &[
            ("one.pdf", pdf_bytes(1)),
            ("two.pdf", pdf_bytes(2)),
            ("notes.txt", b"not a pdf".to_vec()),
        ],
    );
    let dest = dir.path().join("merged.pdf");

    let scheduler = TaskScheduler::new();
    let inputs = vec![archive.clone()];
    let handle = scheduler
        .submit(TaskKind::Batch, move |ctx| {
            IngestPipeline::new(ConverterRegistry::new()).ingest(&inputs, ctx)
        })
        .unwrap();
    let IngestReport {
        entries,
        summary,
        scratch,
    } = match handle.join().await {
        TaskOutcome::Completed(report) => report,
        other => panic!("ingest did not complete: {other:?}"),
    };

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.skipped, 1);

    let mut list = DocumentList::new();
    for entry in entries {
        assert_eq!(entry.origin.as_deref(), Some(archive.as_path()));
        entry.register(&mut list).unwrap();
    }

    let job = MergeJob::from_list(&list, OutputOptions::new(dest.clone())).unwrap();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    let outcome = match handle.join().await {
        TaskOutcome::Completed(outcome) => outcome,
        other => panic!("merge did not complete: {other:?}"),
    };
    drop(scratch);

    assert_eq!(outcome.total_pages, 3);
    assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 3);
}

#[tokio::test]
async fn test_corrupt_archive_fails_source_not_batch() {
    let dir = TempDir::new().unwrap();
    let good = save_pdf(dir.path(), "good.pdf", 2);
    let broken = dir.path().join("broken.zip");
    std::fs::write(&broken, b"PK\x03\x04 definitely not a zip").unwrap();

    let scheduler = TaskScheduler::new();
    let inputs = vec![broken, good];
    let handle = scheduler
        .submit(TaskKind::Batch, move |ctx| {
            IngestPipeline::new(ConverterRegistry::new()).ingest(&inputs, ctx)
        })
        .unwrap();
    let report = match handle.join().await {
        TaskOutcome::Completed(report) => report,
        other => panic!("ingest did not complete: {other:?}"),
    };

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.entries.len(), 1);
    assert!(report.entries[0].is_ready());
    assert!(!report.summary.notes.is_empty());
}
