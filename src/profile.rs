//! Saved merge profiles.
//!
//! A profile captures the staged document list (source paths, order, page
//! selections, bookmark toggles) together with the output options, minus
//! the password. It is written as pretty JSON so users can read and edit
//! it. Loading a profile restores an unvalidated list; ingest runs again
//! because the files may have changed since the profile was saved.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detect::FileTypeDetector;
use crate::document::DocumentList;
use crate::error::{Error, Result};
use crate::options::{CompressionLevel, DocMetadata, OutputOptions, PageSelection};

/// Format version written into every profile file.
pub const PROFILE_VERSION: u32 = 1;

/// One staged document as captured in a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEntry {
    /// Path the user originally added.
    pub source_path: PathBuf,
    /// Page selection spec, e.g. `"1-3,7"`. `None` means all pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    /// Whether this document's outline is carried into the output.
    pub preserve_bookmarks: bool,
}

/// Output options as captured in a profile. Passwords are never saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOptions {
    /// Destination path of the merged PDF.
    pub destination: PathBuf,
    /// Compression level.
    pub compression: CompressionLevel,
    /// Document properties.
    #[serde(default)]
    pub metadata: DocMetadata,
}

/// A saved merge setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Format version, checked on load.
    pub version: u32,
    /// Staged documents in merge order.
    pub entries: Vec<ProfileEntry>,
    /// Output options, minus the password.
    pub options: ProfileOptions,
    /// When the profile was written, RFC 3339 UTC.
    pub saved_at: String,
}

impl Profile {
    /// Capture the current list and options.
    ///
    /// Paths are saved as staged; files that moved or changed since are
    /// caught by validation on the next run.
    pub fn capture(list: &DocumentList, options: &OutputOptions) -> Self {
        let entries = list
            .ordered()
            .map(|doc| ProfileEntry {
                source_path: doc.source_path.clone(),
                selection: doc.selection.as_ref().map(|s| s.to_string()),
                preserve_bookmarks: doc.preserve_bookmarks,
            })
            .collect();

        Self {
            version: PROFILE_VERSION,
            entries,
            options: ProfileOptions {
                destination: options.destination.clone(),
                compression: options.compression,
                metadata: options.metadata.clone(),
            },
            saved_at: now_rfc3339(),
        }
    }

    /// Write the profile as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| profile_err(path, format!("cannot serialize: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| profile_err(path, format!("cannot write: {e}")))?;
        info!(path = %path.display(), entries = self.entries.len(), "profile saved");
        Ok(())
    }

    /// Read and parse a profile, rejecting unknown versions.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| profile_err(path, format!("cannot read: {e}")))?;
        let profile: Self = serde_json::from_str(&raw)
            .map_err(|e| profile_err(path, format!("malformed profile: {e}")))?;
        if profile.version != PROFILE_VERSION {
            return Err(profile_err(
                path,
                format!(
                    "unsupported profile version {} (expected {PROFILE_VERSION})",
                    profile.version
                ),
            ));
        }
        Ok(profile)
    }

    /// Rebuild a document list and output options from the profile.
    ///
    /// The restored documents are unvalidated; types come from extension
    /// sniffing only because the files are not opened here. Selections
    /// are kept and re-checked once the page counts are known.
    pub fn restore(&self) -> Result<(DocumentList, OutputOptions)> {
        let mut list = DocumentList::new();
        for entry in &self.entries {
            let kind = FileTypeDetector::detect_by_extension(&entry.source_path);
            let id = list.add(entry.source_path.clone(), kind)?;
            if let Some(spec) = &entry.selection {
                let selection = PageSelection::parse(spec)?;
                list.set_selection(id, Some(selection))?;
            }
            list.set_preserve_bookmarks(id, entry.preserve_bookmarks)?;
        }

        let options = OutputOptions {
            destination: self.options.destination.clone(),
            compression: self.options.compression,
            metadata: self.options.metadata.clone(),
            password: None,
        };
        Ok((list, options))
    }
}

fn profile_err(path: &Path, reason: String) -> Error {
    Error::Profile {
        path: path.to_path_buf(),
        reason,
    }
}

/// Current time as RFC 3339 UTC, to the second.
fn now_rfc3339() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let (year, month, day, hour, minute, second) = crate::merge::metadata::civil_utc(secs);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}
