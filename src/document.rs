//! The document model: one entry per ingested document plus the ordered
//! list the merge consumes.
//!
//! The list lives on the control thread. Worker tasks never hold a
//! reference to it; they emit [`DocumentDelta`] values that the control
//! thread applies. The `order` field of the entries always forms the
//! dense permutation `0..len`.

use std::path::{Path, PathBuf};

use crate::detect::DetectedType;
use crate::error::{Error, Result};
use crate::options::PageSelection;
use crate::validate::InvalidReason;

/// Opaque identifier of a document entry. Stable across reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Build an id from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Where a document stands in the conversion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionState {
    /// The source is already a PDF.
    NotNeeded,
    /// Conversion has not run yet.
    Pending,
    /// Conversion produced a PDF.
    Converted,
    /// Conversion failed; the document cannot be merged.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// Where a document stands in validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    /// Not validated yet.
    Unchecked,
    /// Validated as mergeable.
    Valid,
    /// Validated and rejected.
    Invalid(InvalidReason),
}

/// One ingested document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier.
    pub id: DocumentId,
    /// The path the user added (archive member paths point into scratch).
    pub source_path: PathBuf,
    /// Name shown in listings and used as the bookmark label.
    pub display_name: String,
    /// Detected type of the source.
    pub detected_type: DetectedType,
    /// Conversion progress.
    pub conversion: ConversionState,
    /// Path of the PDF that will actually be merged.
    pub resolved_pdf: Option<PathBuf>,
    /// Validation progress.
    pub validation: ValidationState,
    /// Page count, known once validation succeeds.
    pub page_count: Option<usize>,
    /// Pages to merge; `None` means all pages.
    pub selection: Option<PageSelection>,
    /// Whether this document's outline is carried into the output.
    pub preserve_bookmarks: bool,
    /// Position in the merge order. Dense, zero-based.
    pub order: usize,
}

impl Document {
    /// Whether the document can be merged as it stands.
    pub fn is_merge_ready(&self) -> bool {
        self.resolved_pdf.is_some()
            && self.validation == ValidationState::Valid
            && !matches!(self.conversion, ConversionState::Failed { .. })
    }

    /// Pages this document contributes to the merge.
    pub fn selected_page_count(&self) -> Option<usize> {
        let total = self.page_count?;
        Some(match &self.selection {
            Some(sel) => sel.page_count(),
            None => total,
        })
    }
}

/// A state change produced by a worker, applied by the control thread.
#[derive(Debug, Clone)]
pub struct DocumentDelta {
    /// Which document changed.
    pub id: DocumentId,
    /// What changed.
    pub update: DocumentUpdate,
}

/// The kinds of state change workers report.
#[derive(Debug, Clone)]
pub enum DocumentUpdate {
    /// Detection finished.
    Detected(DetectedType),
    /// Conversion state moved.
    Conversion(ConversionState),
    /// The mergeable PDF path is known.
    Resolved(PathBuf),
    /// Validation finished.
    Validation {
        /// The new validation state.
        state: ValidationState,
        /// Page count when validation succeeded.
        pages: Option<usize>,
    },
}

/// The ordered set of documents staged for a merge.
#[derive(Debug, Default)]
pub struct DocumentList {
    docs: Vec<Document>,
    next_id: u64,
}

impl DocumentList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in the list.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Add a document at the end of the order.
    ///
    /// Duplicate source paths are rejected so the same file cannot be
    /// staged twice.
    pub fn add(&mut self, source_path: PathBuf, detected_type: DetectedType) -> Result<DocumentId> {
        if self.docs.iter().any(|d| d.source_path == source_path) {
            return Err(Error::other(format!(
                "already in the list: {}",
                source_path.display()
            )));
        }

        let id = DocumentId(self.next_id);
        self.next_id += 1;

        let display_name = display_name_for(&source_path);
        let conversion = if detected_type == DetectedType::Pdf {
            ConversionState::NotNeeded
        } else {
            ConversionState::Pending
        };
        let resolved_pdf = (detected_type == DetectedType::Pdf).then(|| source_path.clone());

        self.docs.push(Document {
            id,
            source_path,
            display_name,
            detected_type,
            conversion,
            resolved_pdf,
            validation: ValidationState::Unchecked,
            page_count: None,
            selection: None,
            preserve_bookmarks: true,
            order: self.docs.len(),
        });
        Ok(id)
    }

    /// Remove a document and close the gap in the order.
    pub fn remove(&mut self, id: DocumentId) -> Option<Document> {
        let idx = self.docs.iter().position(|d| d.id == id)?;
        let removed = self.docs.remove(idx);
        self.reindex();
        Some(removed)
    }

    /// Move a document to a new position in the order.
    ///
    /// `index` beyond the end clamps to the last position; every other
    /// document shifts to keep the order dense.
    pub fn move_to(&mut self, id: DocumentId, index: usize) -> Result<()> {
        let from = self
            .docs
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| Error::other(format!("no document with id {}", id.raw())))?;
        let to = index.min(self.docs.len().saturating_sub(1));
        let doc = self.docs.remove(from);
        self.docs.insert(to, doc);
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        for (idx, doc) in self.docs.iter_mut().enumerate() {
            doc.order = idx;
        }
    }

    /// Documents in merge order.
    pub fn ordered(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter()
    }

    /// Look up a document by id.
    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.docs.iter().find(|d| d.id == id)
    }

    /// Documents that can be merged right now, in order.
    pub fn merge_ready(&self) -> Vec<&Document> {
        self.docs.iter().filter(|d| d.is_merge_ready()).collect()
    }

    /// Set the page selection of a document.
    ///
    /// If the page count is already known the selection is checked
    /// against it; an out-of-range selection is rejected, not clamped.
    pub fn set_selection(&mut self, id: DocumentId, selection: Option<PageSelection>) -> Result<()> {
        let doc = self
            .docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::other(format!("no document with id {}", id.raw())))?;

        if let (Some(sel), Some(pages)) = (&selection, doc.page_count) {
            sel.validate_against(pages)?;
        }
        doc.selection = selection;
        Ok(())
    }

    /// Toggle whether a document's outline is carried into the output.
    pub fn set_preserve_bookmarks(&mut self, id: DocumentId, preserve: bool) -> Result<()> {
        let doc = self
            .docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::other(format!("no document with id {}", id.raw())))?;
        doc.preserve_bookmarks = preserve;
        Ok(())
    }

    /// Apply a worker-produced delta. Unknown ids are ignored; the
    /// document may have been removed while the worker ran.
    pub fn apply(&mut self, delta: DocumentDelta) {
        let Some(doc) = self.docs.iter_mut().find(|d| d.id == delta.id) else {
            return;
        };
        match delta.update {
            DocumentUpdate::Detected(kind) => doc.detected_type = kind,
            DocumentUpdate::Conversion(state) => doc.conversion = state,
            DocumentUpdate::Resolved(path) => doc.resolved_pdf = Some(path),
            DocumentUpdate::Validation { state, pages } => {
                doc.validation = state;
                doc.page_count = pages;
            }
        }
    }

    #[cfg(test)]
    fn order_is_dense(&self) -> bool {
        self.docs.iter().enumerate().all(|(idx, d)| d.order == idx)
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
