//! Batch ingest: turn user paths into validated, merge-ready documents.
//!
//! One pass per source path: detect the type, expand archives, convert
//! what needs converting, validate the resulting PDF. Per-document
//! failures are recorded and the batch keeps going; only infrastructure
//! errors (I/O on the scratch directory, cancellation) abort it.
//!
//! The pipeline runs on a worker and returns plain data. Registering the
//! results into a [`DocumentList`] happens on the control thread via
//! [`IngestedDocument::register`].

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::archive::ArchiveExtractor;
use crate::convert::ConverterRegistry;
use crate::detect::{DetectedType, FileTypeDetector};
use crate::document::{
    ConversionState, DocumentDelta, DocumentId, DocumentList, DocumentUpdate, ValidationState,
};
use crate::error::{Error, Result};
use crate::task::TaskContext;
use crate::validate::{ValidationOutcome, Validator};

/// One document produced by ingest, not yet in any list.
#[derive(Debug)]
pub struct IngestedDocument {
    /// The file this entry represents. Archive members point into the
    /// batch's scratch directory.
    pub source_path: PathBuf,
    /// The archive this entry was extracted from, if any.
    pub origin: Option<PathBuf>,
    /// Detected type of the source.
    pub detected_type: DetectedType,
    /// Conversion result.
    pub conversion: ConversionState,
    /// The PDF to merge, when one exists.
    pub resolved_pdf: Option<PathBuf>,
    /// Validation result.
    pub validation: ValidationState,
    /// Page count when validation succeeded.
    pub page_count: Option<usize>,
}

impl IngestedDocument {
    /// Whether this entry came out merge-ready.
    pub fn is_ready(&self) -> bool {
        self.resolved_pdf.is_some()
            && self.validation == ValidationState::Valid
            && !matches!(self.conversion, ConversionState::Failed { .. })
    }

    /// Add this entry to a document list, replaying its state as deltas.
    pub fn register(self, list: &mut DocumentList) -> Result<DocumentId> {
        let id = list.add(self.source_path, self.detected_type)?;
        list.apply(DocumentDelta {
            id,
            update: DocumentUpdate::Conversion(self.conversion),
        });
        if let Some(pdf) = self.resolved_pdf {
            list.apply(DocumentDelta {
                id,
                update: DocumentUpdate::Resolved(pdf),
            });
        }
        list.apply(DocumentDelta {
            id,
            update: DocumentUpdate::Validation {
                state: self.validation,
                pages: self.page_count,
            },
        });
        Ok(id)
    }
}

/// Counters for one ingest batch.
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    /// Entries that came out merge-ready.
    pub succeeded: usize,
    /// Entries or sources that failed.
    pub failed: usize,
    /// Archive members passed over (not PDFs, unreadable).
    pub skipped: usize,
    /// Human-readable notes about failures and oddities.
    pub notes: Vec<String>,
}

/// Everything one ingest batch produced.
#[derive(Debug)]
pub struct IngestReport {
    /// Per-document results, in input order.
    pub entries: Vec<IngestedDocument>,
    /// Batch counters.
    pub summary: BatchSummary,
    /// Scratch directory holding extracted and converted files.
    ///
    /// Dropping it deletes those files; keep it alive until after the
    /// merge.
    pub scratch: Option<TempDir>,
}

/// Extensions accepted when expanding a folder argument.
const FOLDER_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "epub", "zip", "rar"];

/// Turns raw paths into validated merge candidates.
pub struct IngestPipeline {
    detector: FileTypeDetector,
    registry: ConverterRegistry,
    extractor: ArchiveExtractor,
    validator: Validator,
}

impl IngestPipeline {
    /// Pipeline with an explicit converter registry.
    pub fn new(registry: ConverterRegistry) -> Self {
        Self {
            detector: FileTypeDetector::new(),
            registry,
            extractor: ArchiveExtractor::new(),
            validator: Validator::new(),
        }
    }

    /// Pipeline using whatever converters exist on this system.
    pub fn with_system_tools() -> Self {
        Self::new(ConverterRegistry::with_system_tools())
    }

    /// Ingest a batch of paths. Folders expand one level deep.
    pub fn ingest(&self, paths: &[PathBuf], ctx: &TaskContext) -> Result<IngestReport> {
        let sources = self.expand(paths);
        let total = sources.len();

        let mut entries = Vec::new();
        let mut summary = BatchSummary::default();
        let mut scratch: Option<TempDir> = None;

        for (index, source) in sources.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(index, total, source.display().to_string());

            let kind = self.detector.detect(source);
            match kind {
                DetectedType::Zip | DetectedType::Rar => {
                    self.ingest_archive(
                        source,
                        kind,
                        &mut entries,
                        &mut summary,
                        &mut scratch,
                        index,
                    )?;
                }
                DetectedType::Unknown => {
                    summary.failed += 1;
                    summary
                        .notes
                        .push(format!("{}: unrecognized document type", source.display()));
                    entries.push(IngestedDocument {
                        source_path: source.clone(),
                        origin: None,
                        detected_type: kind,
                        conversion: ConversionState::Failed {
                            reason: "unrecognized document type".to_string(),
                        },
                        resolved_pdf: None,
                        validation: ValidationState::Unchecked,
                        page_count: None,
                    });
                }
                _ => {
                    let entry = self.ingest_single(source, kind, &mut scratch, index)?;
                    if entry.is_ready() {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                        summary.notes.push(describe_failure(&entry));
                    }
                    entries.push(entry);
                }
            }
            ctx.progress(index + 1, total, source.display().to_string());
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "ingest batch finished"
        );
        Ok(IngestReport {
            entries,
            summary,
            scratch,
        })
    }

    /// Expand folder arguments one level deep; other paths pass through.
    fn expand(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for path in paths {
            if path.is_dir() {
                let mut found: Vec<PathBuf> = WalkDir::new(path)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| {
                        p.extension()
                            .and_then(|e| e.to_str())
                            .map(|e| e.to_lowercase())
                            .is_some_and(|e| FOLDER_EXTENSIONS.contains(&e.as_str()))
                    })
                    .collect();
                out.append(&mut found);
            } else {
                out.push(path.clone());
            }
        }
        out
    }

    fn ingest_archive(
        &self,
        source: &Path,
        kind: DetectedType,
        entries: &mut Vec<IngestedDocument>,
        summary: &mut BatchSummary,
        scratch: &mut Option<TempDir>,
        index: usize,
    ) -> Result<()> {
        let dest = self.scratch_subdir(scratch, index)?;

        let extraction = match self.extractor.extract(source, kind, &dest) {
            Ok(extraction) => extraction,
            Err(e) if e.is_recoverable() => {
                warn!(archive = %source.display(), error = %e, "archive failed");
                summary.failed += 1;
                summary.notes.push(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        summary.skipped += extraction.skipped;
        if extraction.candidates.is_empty() {
            summary
                .notes
                .push(format!("{}: no PDFs found in archive", source.display()));
            return Ok(());
        }

        for candidate in extraction.candidates {
            let outcome = self.validator.validate(&candidate, None);
            let entry = entry_from_validation(
                candidate,
                Some(source.to_path_buf()),
                DetectedType::Pdf,
                ConversionState::NotNeeded,
                outcome,
            );
            if entry.is_ready() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                summary.notes.push(describe_failure(&entry));
            }
            entries.push(entry);
        }
        Ok(())
    }

    fn ingest_single(
        &self,
        source: &Path,
        kind: DetectedType,
        scratch: &mut Option<TempDir>,
        index: usize,
    ) -> Result<IngestedDocument> {
        let (conversion, pdf_path) = if kind == DetectedType::Pdf {
            (ConversionState::NotNeeded, Some(source.to_path_buf()))
        } else {
            let out_dir = self.scratch_subdir(scratch, index)?;
            match self.registry.convert(source, kind, &out_dir) {
                Ok(pdf) => (ConversionState::Converted, Some(pdf)),
                Err(e) if e.is_recoverable() => {
                    warn!(source = %source.display(), error = %e, "conversion failed");
                    (
                        ConversionState::Failed {
                            reason: e.to_string(),
                        },
                        None,
                    )
                }
                Err(e) => return Err(e),
            }
        };

        let entry = match pdf_path {
            Some(pdf) => {
                let outcome = self.validator.validate(&pdf, None);
                let mut entry =
                    entry_from_validation(source.to_path_buf(), None, kind, conversion, outcome);
                entry.resolved_pdf = Some(pdf);
                entry
            }
            None => IngestedDocument {
                source_path: source.to_path_buf(),
                origin: None,
                detected_type: kind,
                conversion,
                resolved_pdf: None,
                validation: ValidationState::Unchecked,
                page_count: None,
            },
        };
        Ok(entry)
    }

    fn scratch_subdir(&self, scratch: &mut Option<TempDir>, index: usize) -> Result<PathBuf> {
        if scratch.is_none() {
            *scratch = Some(tempfile::tempdir()?);
        }
        let base = scratch
            .as_ref()
            .ok_or_else(|| Error::other("scratch directory unavailable"))?
            .path()
            .join(format!("src{index}"));
        std::fs::create_dir_all(&base)?;
        Ok(base)
    }
}

fn entry_from_validation(
    source_path: PathBuf,
    origin: Option<PathBuf>,
    detected_type: DetectedType,
    conversion: ConversionState,
    outcome: ValidationOutcome,
) -> IngestedDocument {
    let (validation, page_count) = match outcome {
        ValidationOutcome::Valid { pages } => (ValidationState::Valid, Some(pages)),
        ValidationOutcome::Invalid(reason) => (ValidationState::Invalid(reason), None),
    };
    IngestedDocument {
        source_path: source_path.clone(),
        origin,
        detected_type,
        conversion,
        resolved_pdf: Some(source_path),
        validation,
        page_count,
    }
}

fn describe_failure(entry: &IngestedDocument) -> String {
    let what = match (&entry.conversion, entry.validation) {
        (ConversionState::Failed { reason }, _) => reason.clone(),
        (_, ValidationState::Invalid(reason)) => reason.to_string(),
        _ => "not merge-ready".to_string(),
    };
    format!("{}: {what}", entry.source_path.display())
}
