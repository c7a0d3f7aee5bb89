//! The merge operation: load sources in order, filter pages, re-root
//! outlines, compress, stamp metadata, encrypt, and write atomically.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use crate::document::{ConversionState, DocumentList, ValidationState};
use crate::error::{Error, MergeFailure, Result};
use crate::io::PdfWriter;
use crate::merge::bookmarks::{OutlineEntry, OutlineRerooter};
use crate::merge::metadata::MetadataWriter;
use crate::merge::pages::PageFilter;
use crate::options::{CompressionLevel, OutputOptions, PageSelection};
use crate::task::TaskContext;

/// One source in a merge job.
#[derive(Debug, Clone)]
pub struct MergeInput {
    /// Name used in progress notes and logs.
    pub label: String,
    /// The validated PDF to merge.
    pub pdf_path: PathBuf,
    /// Pages to take; `None` takes all.
    pub selection: Option<PageSelection>,
    /// Whether this source's outline is carried over.
    pub preserve_bookmarks: bool,
}

/// A staged document left out of a merge, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedInput {
    /// Display name of the document.
    pub label: String,
    /// Why it was not merged.
    pub reason: String,
}

/// Immutable snapshot of everything a merge needs.
///
/// Built from the document list at submit time so the worker never
/// touches the list itself.
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// Sources in merge order.
    pub inputs: Vec<MergeInput>,
    /// Documents left out, with reasons, reported in the outcome.
    pub skipped: Vec<SkippedInput>,
    /// Output shape.
    pub options: OutputOptions,
}

impl MergeJob {
    /// Snapshot a document list.
    ///
    /// Documents that are not merge-ready (failed conversion, invalid or
    /// unchecked validation) are skipped with a recorded reason; the rest
    /// merge. A selection that does not fit its document is an error, and
    /// a list with zero eligible documents is [`Error::NoEligibleDocuments`].
    pub fn from_list(list: &DocumentList, options: OutputOptions) -> Result<Self> {
        options.validate()?;

        let mut inputs = Vec::with_capacity(list.len());
        let mut skipped = Vec::new();
        for doc in list.ordered() {
            if let Some(reason) = skip_reason(doc) {
                debug!(source = %doc.display_name, %reason, "document skipped");
                skipped.push(SkippedInput {
                    label: doc.display_name.clone(),
                    reason,
                });
                continue;
            }
            let Some(pdf_path) = doc.resolved_pdf.clone() else {
                skipped.push(SkippedInput {
                    label: doc.display_name.clone(),
                    reason: "no PDF to merge".to_string(),
                });
                continue;
            };
            if let (Some(selection), Some(pages)) = (&doc.selection, doc.page_count) {
                selection.validate_against(pages)?;
            }

            inputs.push(MergeInput {
                label: doc.display_name.clone(),
                pdf_path,
                selection: doc.selection.clone(),
                preserve_bookmarks: doc.preserve_bookmarks,
            });
        }
        if inputs.is_empty() {
            return Err(Error::NoEligibleDocuments);
        }
        Ok(Self {
            inputs,
            skipped,
            options,
        })
    }
}

fn skip_reason(doc: &crate::document::Document) -> Option<String> {
    if let ConversionState::Failed { reason } = &doc.conversion {
        return Some(reason.clone());
    }
    match doc.validation {
        ValidationState::Valid => None,
        ValidationState::Invalid(reason) => Some(reason.to_string()),
        ValidationState::Unchecked => Some("not validated".to_string()),
    }
}

/// What a finished merge reports back.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Where the output landed.
    pub destination: PathBuf,
    /// Number of source documents merged.
    pub documents_merged: usize,
    /// Documents that were staged but left out, with reasons.
    pub skipped: Vec<SkippedInput>,
    /// Pages in the output.
    pub total_pages: usize,
    /// Outline items carried into the output.
    pub bookmarks_kept: usize,
    /// Output size in bytes.
    pub bytes_written: u64,
    /// Wall-clock time of the merge.
    pub duration: Duration,
}

/// Merges validated PDFs into one document.
#[derive(Debug, Default)]
pub struct MergeEngine {
    filter: PageFilter,
    rerooter: OutlineRerooter,
    metadata: MetadataWriter,
    writer: PdfWriter,
}

impl MergeEngine {
    /// Create a merge engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a merge job to completion.
    ///
    /// Runs on a worker; progress and cancellation go through `ctx`.
    /// Cancellation is checked before each source and before the write,
    /// and never leaves a file at the destination.
    ///
    /// # Errors
    ///
    /// A source that cannot be opened aborts the whole merge with
    /// [`MergeFailure::SourceUnavailable`]; there is no partial output.
    pub fn merge(&self, job: &MergeJob, ctx: &TaskContext) -> Result<MergeOutcome> {
        let start = Instant::now();
        if job.inputs.is_empty() {
            return Err(Error::NoEligibleDocuments);
        }

        // One step per source, one for assembly, one for the write.
        let total_steps = job.inputs.len() + 2;

        let mut merged = Document::with_version("1.7");
        let pages_root_id = merged.new_object_id();
        let catalog_id = merged.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        let mut page_ids: Vec<ObjectId> = Vec::new();
        let mut outline: Vec<OutlineEntry> = Vec::new();

        for (index, input) in job.inputs.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(index, total_steps, input.label.clone());

            let mut doc = self.load_source(input)?;
            doc.renumber_objects_with(merged.max_id + 1);
            merged.max_id = doc.max_id;

            let kept = self.filter.selected_pages(&doc, input.selection.as_ref())?;
            let parsed = if input.preserve_bookmarks {
                self.rerooter.parse(&doc)
            } else {
                Vec::new()
            };

            merged.objects.extend(doc.objects);

            // (original page number) -> merged page number, for this source.
            let mut local_map: HashMap<u32, u32> = HashMap::with_capacity(kept.len());
            for (original_number, page_id) in kept {
                page_ids.push(page_id);
                let merged_number = page_ids.len() as u32;
                local_map.insert(original_number, merged_number);

                if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
                    page.set("Parent", Object::Reference(pages_root_id));
                }
                kids.push(Object::Reference(page_id));
            }

            if !parsed.is_empty() {
                let remapped =
                    OutlineRerooter::remap(parsed, &|page| local_map.get(&page).copied());
                debug!(source = %input.label, entries = remapped.len(), "outline re-rooted");
                outline.extend(remapped);
            }
        }

        ctx.check_cancelled()?;
        ctx.progress(job.inputs.len(), total_steps, "assembling output");

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        };
        merged.objects.insert(pages_root_id, pages_dict.into());
        let catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_root_id,
        };
        merged.objects.insert(catalog_id, catalog.into());
        merged.trailer.set("Root", catalog_id);

        let bookmarks_kept = if outline.is_empty() {
            0
        } else {
            self.rerooter.install(&mut merged, &outline, &page_ids)?
        };

        match job.options.compression {
            CompressionLevel::None => {}
            CompressionLevel::Fast | CompressionLevel::Normal => {
                merged.compress();
            }
            CompressionLevel::High | CompressionLevel::Maximum => {
                merged.compress();
                merged.prune_objects();
            }
        }
        merged.renumber_objects();

        self.metadata.apply(&mut merged, &job.options.metadata)?;

        // Encryption is the last transformation before the write.
        if let Some(password) = &job.options.password {
            self.encrypt(&mut merged, password)?;
        }

        ctx.check_cancelled()?;
        ctx.progress(total_steps - 1, total_steps, "writing output");
        let bytes_written = self
            .writer
            .save_atomic(&mut merged, &job.options.destination)?;

        let outcome = MergeOutcome {
            destination: job.options.destination.clone(),
            documents_merged: job.inputs.len(),
            skipped: job.skipped.clone(),
            total_pages: page_ids.len(),
            bookmarks_kept,
            bytes_written,
            duration: start.elapsed(),
        };
        info!(
            documents = outcome.documents_merged,
            pages = outcome.total_pages,
            bytes = outcome.bytes_written,
            "merge complete"
        );
        Ok(outcome)
    }

    fn load_source(&self, input: &MergeInput) -> Result<Document> {
        let doc = Document::load(&input.pdf_path).map_err(|e| {
            Error::merge_failed(
                MergeFailure::SourceUnavailable,
                format!("{}: {e}", input.pdf_path.display()),
            )
        })?;
        if doc.is_encrypted() {
            return Err(Error::merge_failed(
                MergeFailure::SourceUnavailable,
                format!("{} is encrypted", input.pdf_path.display()),
            ));
        }
        Ok(doc)
    }

    fn encrypt(&self, doc: &mut Document, password: &str) -> Result<()> {
        use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};

        let state = {
            let version = EncryptionVersion::V2 {
                document: doc,
                owner_password: password,
                user_password: password,
                key_length: 128,
                permissions: Permissions::default(),
            };
            EncryptionState::try_from(version).map_err(|e| {
                Error::merge_failed(MergeFailure::EncryptionFailed, e.to_string())
            })?
        };
        doc.encrypt(&state)
            .map_err(|e| Error::merge_failed(MergeFailure::EncryptionFailed, e.to_string()))?;
        Ok(())
    }
}
