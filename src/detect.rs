//! Content-based file type detection.
//!
//! Detection is two-stage: a magic-byte probe on the first bytes of the
//! file, then (for ZIP containers) a manifest probe that tells EPUB and
//! DOCX apart from plain archives. When content gives no answer the
//! extension decides; when nothing does, the type is [`DetectedType::Unknown`].
//! Detection itself never fails.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many bytes of the file the magic probe reads.
const PROBE_LEN: usize = 512;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
// Shared prefix of the RAR4 and RAR5 signatures.
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";

/// Document type as resolved by content and extension probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedType {
    /// A PDF document; passes through ingestion untouched.
    Pdf,
    /// A Word document (OOXML or legacy binary).
    Word,
    /// An EPUB e-book.
    Epub,
    /// A plain ZIP archive.
    Zip,
    /// A RAR archive.
    Rar,
    /// Nothing recognized the file.
    Unknown,
}

impl DetectedType {
    /// Whether this type is an archive to be expanded rather than merged.
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Zip | Self::Rar)
    }

    /// Whether this type needs a converter before merging.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, Self::Word | Self::Epub)
    }
}

impl fmt::Display for DetectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "PDF",
            Self::Word => "Word",
            Self::Epub => "EPUB",
            Self::Zip => "ZIP",
            Self::Rar => "RAR",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Detects document types from content with an extension fallback.
#[derive(Debug, Default)]
pub struct FileTypeDetector;

impl FileTypeDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self
    }

    /// Detect the type of a file.
    ///
    /// Content wins over extension: a `.txt` file starting with `%PDF-`
    /// is a PDF. I/O problems degrade to the extension fallback.
    pub fn detect(&self, path: &Path) -> DetectedType {
        let by_content = self.detect_by_content(path);
        let detected = match by_content {
            Some(kind) => kind,
            None => Self::detect_by_extension(path),
        };
        debug!(path = %path.display(), kind = %detected, "detected file type");
        detected
    }

    /// Sniff bytes as PDF content. Used for archive members too.
    pub fn looks_like_pdf(bytes: &[u8]) -> bool {
        bytes.starts_with(PDF_MAGIC)
    }

    fn detect_by_content(&self, path: &Path) -> Option<DetectedType> {
        let mut file = File::open(path).ok()?;
        let mut prefix = [0u8; PROBE_LEN];
        let read = file.read(&mut prefix).ok()?;
        let prefix = &prefix[..read];

        if prefix.starts_with(PDF_MAGIC) {
            return Some(DetectedType::Pdf);
        }
        if prefix.starts_with(RAR_MAGIC) {
            return Some(DetectedType::Rar);
        }
        if prefix.starts_with(ZIP_MAGIC) {
            // All three ZIP-container formats share the signature; the
            // manifest inside decides. An unreadable container falls
            // back to the extension.
            return Self::probe_zip_container(path);
        }
        None
    }

    /// Distinguish EPUB, DOCX, and plain ZIP by the container manifest.
    fn probe_zip_container(path: &Path) -> Option<DetectedType> {
        let file = File::open(path).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;

        // EPUB mandates a "mimetype" member holding the media type.
        if let Ok(mut mimetype) = archive.by_name("mimetype") {
            let mut buf = [0u8; 64];
            let read = mimetype.read(&mut buf).unwrap_or(0);
            if buf[..read].starts_with(b"application/epub+zip") {
                return Some(DetectedType::Epub);
            }
        }

        let mut has_content_types = false;
        let mut has_word_part = false;
        for name in archive.file_names() {
            if name == "[Content_Types].xml" {
                has_content_types = true;
            }
            if name == "word/document.xml" || name.starts_with("word/") {
                has_word_part = true;
            }
        }
        if has_content_types && has_word_part {
            return Some(DetectedType::Word);
        }

        Some(DetectedType::Zip)
    }

    /// Classify by extension only, without opening the file.
    pub fn detect_by_extension(path: &Path) -> DetectedType {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("pdf") => DetectedType::Pdf,
            Some("doc") | Some("docx") => DetectedType::Word,
            Some("epub") => DetectedType::Epub,
            Some("zip") => DetectedType::Zip,
            Some("rar") => DetectedType::Rar,
            _ => DetectedType::Unknown,
        }
    }
}
