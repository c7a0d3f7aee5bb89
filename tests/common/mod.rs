//! Shared helpers for integration tests.
//!
//! Fixtures are built programmatically so the tests carry no binary
//! files: minimal PDFs through lopdf, containers through the zip crate,
//! and a stub converter standing in for the external tools.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{Document, Object, dictionary};
use zip::write::SimpleFileOptions;

use pdfmeld::convert::{Converter, ConverterRegistry};
use pdfmeld::detect::DetectedType;
use pdfmeld::error::Result;

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

/// Serialize a fresh PDF to bytes.
pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = build_pdf(pages);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Write a fresh PDF under `dir` and return its path.
pub fn save_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    let mut doc = build_pdf(pages);
    doc.save(&path).unwrap();
    path
}

/// Write a ZIP with the given members under `dir`.
pub fn write_zip(dir: &Path, name: &str, members: &[(&str, Vec<u8>)]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (member, content) in members {
        writer
            .start_file(*member, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Write a minimal OOXML container that detects as Word.
pub fn fake_docx(dir: &Path, name: &str) -> PathBuf {
    write_zip(
        dir,
        name,
        &[
            ("[Content_Types].xml", b"<Types/>".to_vec()),
            ("word/document.xml", b"<document/>".to_vec()),
        ],
    )
}

/// Write a minimal container that detects as EPUB.
pub fn fake_epub(dir: &Path, name: &str) -> PathBuf {
    write_zip(
        dir,
        name,
        &[("mimetype", b"application/epub+zip".to_vec())],
    )
}

/// Converter that emits a fixed-size PDF instead of calling external tools.
pub struct StubConverter {
    pub pages: usize,
}

impl Converter for StubConverter {
    fn name(&self) -> &str {
        "stub"
    }

    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());
        let path = out_dir.join(format!("{stem}.pdf"));
        let mut doc = build_pdf(self.pages);
        doc.save(&path)?;
        Ok(path)
    }
}

/// Registry with stub converters for Word (2 pages) and EPUB (3 pages).
pub fn stub_registry() -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    registry.register(DetectedType::Word, Arc::new(StubConverter { pages: 2 }));
    registry.register(DetectedType::Epub, Arc::new(StubConverter { pages: 3 }));
    registry
}
