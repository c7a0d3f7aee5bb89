//! Archive expansion: pull merge candidates out of ZIP and RAR files.
//!
//! Only members that look like PDFs come out; everything else is counted
//! as skipped. ZIPs are read in-process. RAR has no pure-Rust reader
//! worth depending on, so extraction shells out to `unrar` and the
//! destination tree is swept afterwards.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::detect::{DetectedType, FileTypeDetector};
use crate::error::{Error, Result};

/// What came out of one archive.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Extracted files that look like PDFs, in archive order.
    pub candidates: Vec<PathBuf>,
    /// Members that were not PDF candidates or could not be read.
    pub skipped: usize,
}

/// Extracts PDF candidates from archives into a scratch directory.
#[derive(Debug)]
pub struct ArchiveExtractor {
    rar_tool: String,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self {
            rar_tool: "unrar".to_string(),
        }
    }
}

impl ArchiveExtractor {
    /// Extractor using the system `unrar` tool for RAR archives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor with a custom RAR tool name.
    pub fn with_rar_tool(tool: impl Into<String>) -> Self {
        Self {
            rar_tool: tool.into(),
        }
    }

    /// Extract PDF candidates from `archive` into `dest`.
    ///
    /// `dest` must exist and outlive the merge; candidates point into it.
    /// A zero-candidate archive is success with an empty list.
    pub fn extract(&self, archive: &Path, kind: DetectedType, dest: &Path) -> Result<Extraction> {
        match kind {
            DetectedType::Zip => self.extract_zip(archive, dest),
            DetectedType::Rar => self.extract_rar(archive, dest),
            other => Err(Error::other(format!("{other} is not an archive type"))),
        }
    }

    fn extract_zip(&self, archive_path: &Path, dest: &Path) -> Result<Extraction> {
        let file = File::open(archive_path).map_err(|e| {
            Error::archive_corrupt(archive_path, format!("cannot open archive: {e}"))
        })?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| Error::archive_corrupt(archive_path, e.to_string()))?;

        let mut extraction = Extraction::default();
        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(archive = %archive_path.display(), index, error = %e, "unreadable member");
                    extraction.skipped += 1;
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }

            // Reject members that would escape the destination.
            let Some(rel) = entry.enclosed_name() else {
                warn!(archive = %archive_path.display(), name = entry.name(), "unsafe member path");
                extraction.skipped += 1;
                continue;
            };

            let mut content = Vec::new();
            if entry.read_to_end(&mut content).is_err() {
                extraction.skipped += 1;
                continue;
            }

            let named_pdf = rel
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
            if !named_pdf && !FileTypeDetector::looks_like_pdf(&content) {
                extraction.skipped += 1;
                continue;
            }

            let out_path = dest.join(&rel);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out_path, &content)?;
            debug!(member = %rel.display(), "extracted PDF candidate");
            extraction.candidates.push(out_path);
        }

        Ok(extraction)
    }

    fn extract_rar(&self, archive_path: &Path, dest: &Path) -> Result<Extraction> {
        // Availability probe first so a missing tool is reported as such
        // rather than as a failed extraction.
        if let Err(e) = Command::new(&self.rar_tool).output() {
            if e.kind() == io::ErrorKind::NotFound {
                return Err(Error::ArchiveToolMissing {
                    tool: self.rar_tool.clone(),
                });
            }
        }

        let output = Command::new(&self.rar_tool)
            .arg("x")
            .arg("-y")
            .arg("-o+")
            .arg(archive_path)
            .arg(dest)
            .output()
            .map_err(|e| {
                Error::archive_corrupt(archive_path, format!("failed to run {}: {e}", self.rar_tool))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::archive_corrupt(
                archive_path,
                format!("{} exited with {}: {}", self.rar_tool, output.status, stderr.trim()),
            ));
        }

        let mut extraction = Extraction::default();
        for entry in WalkDir::new(dest).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::archive_corrupt(archive_path, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if Self::file_is_pdf(entry.path()) {
                extraction.candidates.push(entry.path().to_path_buf());
            } else {
                extraction.skipped += 1;
            }
        }
        Ok(extraction)
    }

    fn file_is_pdf(path: &Path) -> bool {
        let Ok(mut file) = File::open(path) else {
            return false;
        };
        let mut prefix = [0u8; 8];
        let read = file.read(&mut prefix).unwrap_or(0);
        FileTypeDetector::looks_like_pdf(&prefix[..read])
    }
}
