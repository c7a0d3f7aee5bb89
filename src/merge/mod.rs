//! The merge engine and its helpers.
//!
//! [`merger::MergeEngine`] drives the whole operation; [`pages`] filters
//! page trees to a selection, [`bookmarks`] re-roots source outlines into
//! the merged document, and [`metadata`] writes the output's Info
//! dictionary.

pub mod bookmarks;
pub mod merger;
pub mod metadata;
pub mod pages;

pub use merger::{MergeEngine, MergeInput, MergeJob, MergeOutcome, SkippedInput};

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::{Document, Object, dictionary};

    /// Build an in-memory PDF with `pages` empty pages.
    pub fn build_pdf(pages: usize) -> Document {
        let mut doc = Document::with_version("1.4");

        let catalog_id = doc.new_object_id();
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();
        for _ in 0..pages {
            let page_id = doc.new_object_id();
            let page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            };
            doc.objects.insert(page_id, page.into());
            page_ids.push(page_id);
        }

        let catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|&id| id.into()).collect::<Vec<Object>>(),
            "Count" => pages as i64,
        };

        doc.objects.insert(catalog_id, catalog.into());
        doc.objects.insert(pages_id, pages_dict.into());
        doc.trailer.set("Root", catalog_id);

        doc
    }

    /// Build a PDF with a flat outline: one bookmark per entry, titled
    /// with the given string, pointing at the given 1-based page.
    pub fn build_pdf_with_outline(pages: usize, entries: &[(&str, u32)]) -> Document {
        let mut doc = build_pdf(pages);
        let page_ids: std::collections::BTreeMap<u32, lopdf::ObjectId> = doc.get_pages();

        let outlines_id = doc.new_object_id();
        let mut item_ids = Vec::new();
        for (title, page) in entries {
            let item_id = doc.new_object_id();
            let page_ref = page_ids[page];
            let dict = dictionary! {
                "Title" => Object::string_literal(*title),
                "Parent" => outlines_id,
                "Dest" => vec![
                    Object::Reference(page_ref),
                    Object::Name(b"XYZ".to_vec()),
                    Object::Null,
                    Object::Null,
                    Object::Null,
                ],
            };
            doc.objects.insert(item_id, dict.into());
            item_ids.push(item_id);
        }
        for i in 0..item_ids.len() {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(item_ids[i]) {
                if i > 0 {
                    dict.set("Prev", Object::Reference(item_ids[i - 1]));
                }
                if i + 1 < item_ids.len() {
                    dict.set("Next", Object::Reference(item_ids[i + 1]));
                }
            }
        }

        let mut outlines = dictionary! {
            "Type" => "Outlines",
            "Count" => item_ids.len() as i64,
        };
        if let (Some(&first), Some(&last)) = (item_ids.first(), item_ids.last()) {
            outlines.set("First", Object::Reference(first));
            outlines.set("Last", Object::Reference(last));
        }
        doc.objects.insert(outlines_id, outlines.into());

        let catalog_id = doc
            .trailer
            .get(b"Root")
            .and_then(|r| r.as_reference())
            .unwrap();
        if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
            catalog.set("Outlines", Object::Reference(outlines_id));
        }

        doc
    }
}
