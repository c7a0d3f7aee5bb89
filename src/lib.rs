//! pdfmeld - Merge PDF, Word, and EPUB documents into a single PDF.
//!
//! This library ingests mixed document batches, normalizes everything to
//! PDF, and merges the results into one output file. It supports:
//!
//! - Content-based type detection (PDF, DOCX, EPUB, ZIP, RAR)
//! - Conversion through external tools (LibreOffice, Calibre)
//! - Archive expansion with PDF sniffing
//! - Per-document page selections and bookmark re-rooting
//! - Compression tiers, output metadata, and password protection
//! - Background tasks with progress reporting and cooperative cancellation
//!
//! # Examples
//!
//! ## Ingest and merge
//!
//! ```no_run
//! use pdfmeld::document::DocumentList;
//! use pdfmeld::merge::{MergeEngine, MergeJob};
//! use pdfmeld::options::OutputOptions;
//! use pdfmeld::pipeline::IngestPipeline;
//! use pdfmeld::task::{TaskKind, TaskOutcome, TaskScheduler};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = TaskScheduler::new();
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.docx")];
//!
//! // Ingest off-thread, collect the report.
//! let ingest = scheduler.submit(TaskKind::Batch, move |ctx| {
//!     IngestPipeline::with_system_tools().ingest(&inputs, ctx)
//! })?;
//! let report = match ingest.join().await {
//!     TaskOutcome::Completed(report) => report,
//!     other => panic!("ingest did not complete: {other:?}"),
//! };
//!
//! let mut list = DocumentList::new();
//! for entry in report.entries {
//!     entry.register(&mut list)?;
//! }
//!
//! // Merge in list order.
//! let job = MergeJob::from_list(&list, OutputOptions::new("merged.pdf"))?;
//! let merge = scheduler.submit(TaskKind::Merge, move |ctx| {
//!     MergeEngine::new().merge(&job, ctx)
//! })?;
//! if let TaskOutcome::Completed(outcome) = merge.join().await {
//!     println!("wrote {} pages", outcome.total_pages);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod cli;
pub mod convert;
pub mod detect;
pub mod document;
pub mod error;
pub mod io;
pub mod merge;
pub mod options;
pub mod pipeline;
pub mod profile;
pub mod task;
pub mod validate;

// Re-export commonly used types
pub use document::{Document, DocumentId, DocumentList};
pub use error::{Error, Result};
pub use options::OutputOptions;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
