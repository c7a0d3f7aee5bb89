//! Page selection against a document's page tree.

use lopdf::{Document, ObjectId};

use crate::error::{Error, Result};
use crate::options::PageSelection;

/// Resolves page selections to concrete page objects.
#[derive(Debug, Default)]
pub struct PageFilter;

impl PageFilter {
    /// Create a new page filter.
    pub fn new() -> Self {
        Self
    }

    /// The pages a selection keeps, as `(page number, object id)` pairs
    /// in ascending page order. `None` keeps every page.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidSelection`] when the selection
    /// references pages beyond the document; nothing is clamped.
    pub fn selected_pages(
        &self,
        doc: &Document,
        selection: Option<&PageSelection>,
    ) -> Result<Vec<(u32, ObjectId)>> {
        let all_pages = doc.get_pages();

        let Some(selection) = selection else {
            return Ok(all_pages.into_iter().collect());
        };

        selection.validate_against(all_pages.len())?;

        let kept: Vec<(u32, ObjectId)> = all_pages
            .into_iter()
            .filter(|(number, _)| selection.contains(*number))
            .collect();

        if kept.is_empty() {
            return Err(Error::InvalidSelection {
                message: "selection keeps no pages".to_string(),
            });
        }
        Ok(kept)
    }

    /// Number of pages in a document.
    pub fn page_count(&self, doc: &Document) -> usize {
        doc.get_pages().len()
    }
}
