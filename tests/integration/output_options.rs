//! Compression, metadata, and password protection on the way out.

use lopdf::Document;
use tempfile::TempDir;

use pdfmeld::merge::{MergeEngine, MergeInput, MergeJob};
use pdfmeld::options::{CompressionLevel, DocMetadata, OutputOptions};
use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};
use pdfmeld::validate::{InvalidReason, ValidationOutcome, Validator};

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
async fn test_password_protected_output_round_trips() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 2);
    let b = save_pdf(dir.path(), "b.pdf", 1);
    let dest = dir.path().join("locked.pdf");

    let mut options = OutputOptions::new(dest.clone());
    options.compression = CompressionLevel::Maximum;
    options.metadata = DocMetadata::new(Some("Locked bundle".to_string()), None, None, None);
    options.password = Some("hunter2".to_string());

    let job = MergeJob {
        inputs: vec![input(a), input(b)],
        skipped: Vec::new(),
        options,
    };

    let scheduler = TaskScheduler::new();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    match handle.join().await {
        TaskOutcome::Completed(outcome) => assert_eq!(outcome.total_pages, 3),
        other => panic!("merge did not complete: {other:?}"),
    }

    assert!(Document::load(&dest).unwrap().is_encrypted());

    // The validator sees the whole password lifecycle.
    let validator = Validator::new();
    assert_eq!(
        validator.validate(&dest, None),
        ValidationOutcome::Invalid(InvalidReason::Encrypted)
    );
    assert_eq!(
        validator.validate(&dest, Some("wrong")),
        ValidationOutcome::Invalid(InvalidReason::WrongPassword)
    );
    assert_eq!(
        validator.validate(&dest, Some("hunter2")),
        ValidationOutcome::Valid { pages: 3 }
    );
}

#[tokio::test]
async fn test_unprotected_output_stays_open() {
    let dir = TempDir::new().unwrap();
    let a = save_pdf(dir.path(), "a.pdf", 2);
    let dest = dir.path().join("open.pdf");

    let job = MergeJob {
        inputs: vec![input(a)],
        skipped: Vec::new(),
        options: OutputOptions::new(dest.clone()),
    };

    let scheduler = TaskScheduler::new();
    let handle = scheduler
        .submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))
        .unwrap();
    assert!(matches!(handle.join().await, TaskOutcome::Completed(_)));

    assert!(!Document::load(&dest).unwrap().is_encrypted());
    assert_eq!(
        Validator::new().validate(&dest, None),
        ValidationOutcome::Valid { pages: 2 }
    );
}
