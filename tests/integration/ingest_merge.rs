//! End-to-end flow: mixed batch in, one merged PDF out.

use std::sync::Arc;

use lopdf::Document;
use tempfile::TempDir;

use pdfmeld::convert::ConverterRegistry;
use pdfmeld::detect::DetectedType;
use pdfmeld::document::DocumentList;
use pdfmeld::merge::{MergeEngine, MergeJob};
use pdfmeld::options::{OutputOptions, PageSelection};
use pdfmeld::pipeline::{IngestPipeline, IngestReport};
use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};

use crate::common::{fake_docx, fake_epub, save_pdf, stub_registry, StubConverter};

async fn ingest(
    scheduler: &TaskScheduler,
    inputs: Vec<std::path::PathBuf>,
) -> IngestReport {
    let handle = scheduler
        .submit(TaskKind::Batch, move |ctx| {
            IngestPipeline::new(stub_registry()).ingest(&inputs, ctx)
        })
        .unwrap();
    match handle.join().await {
        TaskOutcome::Completed(report) => report,
        other => panic!("ingest did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn test_mixed_batch_ingests_and_merges() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 1);
    let b = fake_docx(dir.path(), "b.docx");
    let c = fake_epub(dir.path(), "c.epub");
    let dest = dir.path().join("merged.pdf");

    let scheduler = TaskScheduler::new();
    let IngestReport {
        entries,
        summary,
        scratch,
    } = ingest(&scheduler, vec![a, b, c]).await;

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    let mut list = DocumentList::new();
    for entry in entries {
        entry.register(&mut list).unwrap();
    }
    assert_eq!(list.merge_ready().len(), 3);

    let job = MergeJob::from_list(&list, OutputOptions::new(dest.clone())).unwrap();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    let outcome = match handle.join().await {
        TaskOutcome::Completed(outcome) => outcome,
        other => panic!("merge did not complete: {other:?}"),
    };

    // Converted files live in scratch until the merge has read them.
    drop(scratch);

    // 1 (pdf) + 2 (stub docx) + 3 (stub epub).
    assert_eq!(outcome.total_pages, 6);
    assert_eq!(outcome.documents_merged, 3);
    assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 6);
}

#[tokio::test]
async fn test_failed_document_is_skipped_and_the_rest_merge() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 4);
    let b = fake_docx(dir.path(), "b.docx");
    let c = fake_epub(dir.path(), "c.epub");
    let dest = dir.path().join("merged.pdf");

    // Word converts; nothing handles EPUB, so c.epub fails ingest.
    let mut registry = ConverterRegistry::new();
    registry.register(DetectedType::Word, Arc::new(StubConverter { pages: 2 }));

    let scheduler = TaskScheduler::new();
    let inputs = vec![a, b, c];
    let handle = scheduler
        .submit(TaskKind::Batch, move |ctx| {
            IngestPipeline::new(registry).ingest(&inputs, ctx)
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
    assert_eq!(summary.failed, 1);

    let mut list = DocumentList::new();
    let mut ids = Vec::new();
    for entry in entries {
        ids.push(entry.register(&mut list).unwrap());
    }
    list.set_selection(ids[0], Some(PageSelection::parse("1-3").unwrap()))
        .unwrap();

    // The failed document is left out of the snapshot, not fatal.
    let job = MergeJob::from_list(&list, OutputOptions::new(dest.clone())).unwrap();
    assert_eq!(job.inputs.len(), 2);
    assert_eq!(job.skipped.len(), 1);
    assert_eq!(job.skipped[0].label, "c.epub");

    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    let outcome = match handle.join().await {
        TaskOutcome::Completed(outcome) => outcome,
        other => panic!("merge did not complete: {other:?}"),
    };
    drop(scratch);

    // Pages 1-3 of a.pdf plus the 2 converted pages of b.docx.
    assert_eq!(outcome.total_pages, 5);
    assert_eq!(outcome.documents_merged, 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].label, "c.epub");
    assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 5);
}

#[tokio::test]
async fn test_selection_and_order_shape_the_output() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 4);
    let b = save_pdf(dir.path(), "b.pdf", 3);
    let dest = dir.path().join("merged.pdf");

    let scheduler = TaskScheduler::new();
    let report = ingest(&scheduler, vec![a, b]).await;

    let mut list = DocumentList::new();
    let mut ids = Vec::new();
    for entry in report.entries {
        ids.push(entry.register(&mut list).unwrap());
    }

    // Take only two pages of a.pdf and put b.pdf first.
    list.set_selection(ids[0], Some(PageSelection::parse("2-3").unwrap()))
        .unwrap();
    list.move_to(ids[1], 0).unwrap();

    let job = MergeJob::from_list(&list, OutputOptions::new(dest.clone())).unwrap();
    assert_eq!(job.inputs[0].label, "b.pdf");
    assert_eq!(job.inputs[1].label, "a.pdf");

    let mut handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();

    // Progress notes name the current source in merge order.
    let first = handle.next_progress().await.unwrap();
    assert_eq!(first.note, "b.pdf");

    let outcome = match handle.join().await {
        TaskOutcome::Completed(outcome) => outcome,
        other => panic!("merge did not complete: {other:?}"),
    };
    assert_eq!(outcome.total_pages, 5);
    assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 5);
}
