//! Atomic PDF output.
//!
//! The document is serialized to a sibling temp file and renamed into
//! place, so the destination either holds the complete output or nothing.
//! Any failure removes the temp file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::debug;

use crate::error::{Error, MergeFailure, Result};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Writes merged documents to disk atomically.
#[derive(Debug)]
pub struct PdfWriter {
    buffer_size: usize,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl PdfWriter {
    /// Writer with the default buffer size.
    pub fn new() -> Self {
        Self::default()
    }

    /// The temp path used while writing `dest`.
    pub fn temp_path(dest: &Path) -> PathBuf {
        let mut os = dest.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// Serialize `doc` next to `dest` and rename it into place.
    ///
    /// Returns the number of bytes written. On any failure the temp
    /// file is removed and `dest` is left untouched.
    pub fn save_atomic(&self, doc: &mut Document, dest: &Path) -> Result<u64> {
        let temp = Self::temp_path(dest);

        let written = match self.write_to(doc, &temp) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = std::fs::remove_file(&temp);
                return Err(e);
            }
        };

        if let Err(e) = std::fs::rename(&temp, dest) {
            let _ = std::fs::remove_file(&temp);
            return Err(Error::merge_failed(
                MergeFailure::WriteFailed,
                format!("cannot move output into place at {}: {e}", dest.display()),
            ));
        }

        debug!(dest = %dest.display(), bytes = written, "output written");
        Ok(written)
    }

    fn write_to(&self, doc: &mut Document, path: &Path) -> Result<u64> {
        let file = File::create(path).map_err(|e| {
            Error::merge_failed(
                MergeFailure::WriteFailed,
                format!("cannot create {}: {e}", path.display()),
            )
        })?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);

        doc.save_to(&mut writer)
            .map_err(|e| Error::merge_failed(MergeFailure::WriteFailed, e.to_string()))?;
        writer
            .flush()
            .map_err(|e| Error::merge_failed(MergeFailure::WriteFailed, e.to_string()))?;

        let metadata = std::fs::metadata(path)?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::test_support::build_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_save_atomic_writes_and_cleans_temp() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.pdf");

        let mut doc = build_pdf(2);
        let bytes = PdfWriter::new().save_atomic(&mut doc, &dest).unwrap();

        assert!(dest.is_file());
        assert!(bytes > 0);
        assert!(!PdfWriter::temp_path(&dest).exists());

        let reloaded = Document::load(&dest).unwrap();
        assert_eq!(reloaded.get_pages().len(), 2);
    }

    #[test]
    fn test_save_atomic_failure_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        // Parent directory does not exist.
        let dest = dir.path().join("missing").join("out.pdf");

        let mut doc = build_pdf(1);
        let err = PdfWriter::new().save_atomic(&mut doc, &dest).unwrap_err();

        assert!(matches!(
            err,
            Error::MergeFailed {
                kind: MergeFailure::WriteFailed,
                ..
            }
        ));
        assert!(!dest.exists());
        assert!(!PdfWriter::temp_path(&dest).exists());
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        let temp = PdfWriter::temp_path(Path::new("/tmp/out.pdf"));
        assert_eq!(temp, Path::new("/tmp/out.pdf.tmp"));
    }
}
