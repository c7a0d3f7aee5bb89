//! Profile save, load, and restore driving a real merge.

use lopdf::Document;
use tempfile::TempDir;

use pdfmeld::document::{DocumentDelta, DocumentUpdate, ValidationState};
use pdfmeld::merge::{MergeEngine, MergeJob};
use pdfmeld::options::{CompressionLevel, OutputOptions, PageSelection};
use pdfmeld::pipeline::IngestPipeline;
use pdfmeld::profile::Profile;
use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};
use pdfmeld::validate::Validator;

use crate::common::{save_pdf, stub_registry};

#[tokio::test]
async fn test_profile_round_trip_drives_a_merge() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 2);
    let b = save_pdf(dir.path(), "b.pdf", 3);
    let dest = dir.path().join("merged.pdf");
    let profile_path = dir.path().join("setup.json");

    // Stage a list the way the CLI would.
    let scheduler = TaskScheduler::new();
    let inputs = vec![a, b];
    let handle = scheduler
        .submit(TaskKind::Batch, move |ctx| {
            IngestPipeline::new(stub_registry()).ingest(&inputs, ctx)
        })
        .unwrap();
    let report = match handle.join().await {
        TaskOutcome::Completed(report) => report,
        other => panic!("ingest did not complete: {other:?}"),
    };

    let mut list = pdfmeld::document::DocumentList::new();
    let mut ids = Vec::new();
    for entry in report.entries {
        ids.push(entry.register(&mut list).unwrap());
    }
    list.set_selection(ids[1], Some(PageSelection::parse("1-2").unwrap()))
        .unwrap();
    list.set_preserve_bookmarks(ids[0], false).unwrap();

    let mut options = OutputOptions::new(dest.clone());
    options.compression = CompressionLevel::High;
    options.password = Some("never-saved".to_string());

    // Save, then load as if in a fresh run.
    Profile::capture(&list, &options).save(&profile_path).unwrap();
    let raw = std::fs::read_to_string(&profile_path).unwrap();
    assert!(!raw.contains("never-saved"));

    let loaded = Profile::load(&profile_path).unwrap();
    let (mut restored, options) = loaded.restore().unwrap();
    assert_eq!(options.password, None);
    assert_eq!(options.compression, CompressionLevel::High);

    // The restored list is unvalidated; run validation and apply deltas.
    let items: Vec<_> = restored
        .ordered()
        .filter_map(|doc| doc.resolved_pdf.clone().map(|path| (doc.id, path)))
        .collect();
    assert_eq!(items.len(), 2);
    for (id, outcome) in Validator::new().validate_all(items, 2).await {
        let (state, pages) = match outcome {
            pdfmeld::validate::ValidationOutcome::Valid { pages } => {
                (ValidationState::Valid, Some(pages))
            }
            pdfmeld::validate::ValidationOutcome::Invalid(reason) => {
                (ValidationState::Invalid(reason), None)
            }
        };
        restored.apply(DocumentDelta {
            id,
            update: DocumentUpdate::Validation { state, pages },
        });
    }
    assert_eq!(restored.merge_ready().len(), 2);

    // Settings survived the round trip.
    let docs: Vec<_> = restored.ordered().collect();
    assert!(!docs[0].preserve_bookmarks);
    assert_eq!(
        docs[1].selection.as_ref().map(ToString::to_string),
        Some("1-2".to_string())
    );

    let job = MergeJob::from_list(&restored, options).unwrap();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    let outcome = match handle.join().await {
        TaskOutcome::Completed(outcome) => outcome,
        other => panic!("merge did not complete: {other:?}"),
    };

    // 2 pages of a.pdf plus pages 1-2 of b.pdf.
    assert_eq!(outcome.total_pages, 4);
    assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 4);
}
