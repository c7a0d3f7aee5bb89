//! Outline (bookmark) re-rooting.
//!
//! Source outlines are parsed into a plain tree keyed by 1-based page
//! numbers, remapped through the merge's page map, and rebuilt inside the
//! merged document. Entries whose target page did not survive page
//! selection are dropped and their children promoted one level up.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::{Error, MergeFailure, Result};

/// Outlines deeper than this are treated as malformed and cut off.
const MAX_DEPTH: usize = 64;

/// One outline entry, detached from any document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// Raw title bytes as stored in the PDF.
    pub title: Vec<u8>,
    /// 1-based target page, if the destination resolved to one.
    pub page: Option<u32>,
    /// Child entries.
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    /// Entries in this subtree, including self.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(OutlineEntry::count).sum::<usize>()
    }
}

/// Parses, remaps, and rebuilds outlines across a merge.
#[derive(Debug, Default)]
pub struct OutlineRerooter;

impl OutlineRerooter {
    /// Create a new re-rooter.
    pub fn new() -> Self {
        Self
    }

    /// Parse a document's outline into detached entries.
    ///
    /// Tolerant by design: a missing or malformed outline yields an
    /// empty list, never an error. Cycles and runaway depth are cut off.
    pub fn parse(&self, doc: &Document) -> Vec<OutlineEntry> {
        let page_numbers: HashMap<ObjectId, u32> = doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number))
            .collect();

        let Ok(catalog) = doc.catalog() else {
            return Vec::new();
        };
        let Ok(outlines_id) = catalog.get(b"Outlines").and_then(|o| o.as_reference()) else {
            return Vec::new();
        };
        let Ok(outlines) = doc.get_dictionary(outlines_id) else {
            return Vec::new();
        };
        let Ok(first) = outlines.get(b"First").and_then(|o| o.as_reference()) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        self.walk_siblings(doc, first, &page_numbers, &mut visited, 0)
    }

    fn walk_siblings(
        &self,
        doc: &Document,
        first: ObjectId,
        page_numbers: &HashMap<ObjectId, u32>,
        visited: &mut HashSet<ObjectId>,
        depth: usize,
    ) -> Vec<OutlineEntry> {
        if depth >= MAX_DEPTH {
            return Vec::new();
        }

        let mut entries = Vec::new();
        let mut current = Some(first);
        while let Some(item_id) = current {
            if !visited.insert(item_id) {
                break;
            }
            let Ok(item) = doc.get_dictionary(item_id) else {
                break;
            };

            let title = match item.get(b"Title") {
                Ok(Object::String(bytes, _)) => bytes.clone(),
                _ => Vec::new(),
            };
            let page = self.resolve_target_page(doc, item, page_numbers);

            let children = match item.get(b"First").and_then(|o| o.as_reference()) {
                Ok(child) => {
                    self.walk_siblings(doc, child, page_numbers, visited, depth + 1)
                }
                Err(_) => Vec::new(),
            };

            entries.push(OutlineEntry {
                title,
                page,
                children,
            });

            current = item.get(b"Next").and_then(|o| o.as_reference()).ok();
        }
        entries
    }

    /// Resolve an item's destination to a 1-based page number.
    ///
    /// Handles direct and referenced `Dest` arrays and `A` dictionaries
    /// with a GoTo action. Named destinations are left unresolved.
    fn resolve_target_page(
        &self,
        doc: &Document,
        item: &Dictionary,
        page_numbers: &HashMap<ObjectId, u32>,
    ) -> Option<u32> {
        let dest = if let Ok(dest) = item.get(b"Dest") {
            self.resolve_dest_array(doc, dest)
        } else if let Ok(action) = item.get(b"A") {
            let action = self.deref(doc, action)?;
            let action = action.as_dict().ok()?;
            let is_goto = matches!(action.get(b"S"), Ok(Object::Name(n)) if n == b"GoTo");
            if !is_goto {
                return None;
            }
            self.resolve_dest_array(doc, action.get(b"D").ok()?)
        } else {
            None
        }?;

        let page_ref = dest.first()?.as_reference().ok()?;
        page_numbers.get(&page_ref).copied()
    }

    fn resolve_dest_array<'a>(&self, doc: &'a Document, dest: &'a Object) -> Option<&'a [Object]> {
        match self.deref(doc, dest)? {
            Object::Array(items) => Some(items),
            _ => None,
        }
    }

    fn deref<'a>(&self, doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Remap entry targets through `map`, dropping entries whose target
    /// page is gone and promoting their children.
    pub fn remap<F>(entries: Vec<OutlineEntry>, map: &F) -> Vec<OutlineEntry>
    where
        F: Fn(u32) -> Option<u32>,
    {
        let mut out = Vec::new();
        for mut entry in entries {
            let children = Self::remap(std::mem::take(&mut entry.children), map);
            match entry.page {
                Some(original) => match map(original) {
                    Some(mapped) => out.push(OutlineEntry {
                        title: entry.title,
                        page: Some(mapped),
                        children,
                    }),
                    // Target page was deselected: the entry goes, its
                    // children move up a level.
                    None => out.extend(children),
                },
                None => {
                    // Folder entry with no destination of its own.
                    if !children.is_empty() {
                        out.push(OutlineEntry {
                            title: entry.title,
                            page: None,
                            children,
                        });
                    }
                }
            }
        }
        out
    }

    /// Build the merged document's outline from detached entries.
    ///
    /// `page_ids[n - 1]` must be the object id of merged page `n`.
    /// Returns the number of outline items written. No `Outlines`
    /// dictionary is created for an empty entry list.
    pub fn install(
        &self,
        doc: &mut Document,
        entries: &[OutlineEntry],
        page_ids: &[ObjectId],
    ) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let outlines_id = doc.new_object_id();
        let mut written = 0usize;
        let top_ids = self.build_level(doc, entries, outlines_id, page_ids, &mut written);

        let mut outlines = Dictionary::new();
        outlines.set("Type", Object::Name(b"Outlines".to_vec()));
        outlines.set("Count", Object::Integer(written as i64));
        if let (Some(&first), Some(&last)) = (top_ids.first(), top_ids.last()) {
            outlines.set("First", Object::Reference(first));
            outlines.set("Last", Object::Reference(last));
        }
        doc.objects
            .insert(outlines_id, Object::Dictionary(outlines));

        let catalog = doc.catalog_mut().map_err(|e| {
            Error::merge_failed(MergeFailure::WriteFailed, format!("no catalog: {e}"))
        })?;
        catalog.set("Outlines", Object::Reference(outlines_id));

        debug!(items = written, "installed merged outline");
        Ok(written)
    }

    fn build_level(
        &self,
        doc: &mut Document,
        entries: &[OutlineEntry],
        parent_id: ObjectId,
        page_ids: &[ObjectId],
        written: &mut usize,
    ) -> Vec<ObjectId> {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let item_id = doc.new_object_id();

            let mut dict = Dictionary::new();
            dict.set(
                "Title",
                Object::String(entry.title.clone(), lopdf::StringFormat::Literal),
            );
            dict.set("Parent", Object::Reference(parent_id));
            if let Some(page) = entry.page {
                if let Some(&page_ref) = (page as usize)
                    .checked_sub(1)
                    .and_then(|idx| page_ids.get(idx))
                {
                    dict.set(
                        "Dest",
                        Object::Array(vec![
                            Object::Reference(page_ref),
                            Object::Name(b"XYZ".to_vec()),
                            Object::Null,
                            Object::Null,
                            Object::Null,
                        ]),
                    );
                }
            }
            doc.objects.insert(item_id, Object::Dictionary(dict));
            *written += 1;

            let child_ids = self.build_level(doc, &entry.children, item_id, page_ids, written);
            if let (Some(&first), Some(&last)) = (child_ids.first(), child_ids.last()) {
                if let Ok(Object::Dictionary(d)) = doc.get_object_mut(item_id) {
                    d.set("First", Object::Reference(first));
                    d.set("Last", Object::Reference(last));
                    d.set("Count", Object::Integer(child_ids.len() as i64));
                }
            }
            ids.push(item_id);
        }

        for i in 0..ids.len() {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(ids[i]) {
                if i > 0 {
                    dict.set("Prev", Object::Reference(ids[i - 1]));
                }
                if i + 1 < ids.len() {
                    dict.set("Next", Object::Reference(ids[i + 1]));
                }
            }
        }
        ids
    }

    /// Whether a document carries an outline.
    pub fn has_outline(&self, doc: &Document) -> bool {
        doc.catalog()
            .map(|catalog| catalog.has(b"Outlines"))
            .unwrap_or(false)
    }
}
