//! PDF validation.
//!
//! Validation is read-only and idempotent: it opens the file, never
//! touches it, and reports one of a closed set of reasons when the file
//! cannot be merged. Running it twice on the same file gives the same
//! answer.

use std::fmt;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use crate::document::DocumentId;

/// Why a file cannot be merged. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidReason {
    /// The file does not exist.
    NotFound,
    /// The PDF is password protected and no password was supplied.
    Encrypted,
    /// A password was supplied but does not open the PDF.
    WrongPassword,
    /// The PDF parsed but contains no pages.
    ZeroPages,
    /// The file is not a parsable PDF.
    Corrupt,
    /// The file exists but cannot be read.
    Unreadable,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "file not found",
            Self::Encrypted => "encrypted (password required)",
            Self::WrongPassword => "wrong password",
            Self::ZeroPages => "document has no pages",
            Self::Corrupt => "corrupt or not a PDF",
            Self::Unreadable => "file cannot be read",
        };
        write!(f, "{text}")
    }
}

/// Result of validating one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationOutcome {
    /// The file is a mergeable PDF.
    Valid {
        /// Number of pages found.
        pages: usize,
    },
    /// The file cannot be merged.
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    /// Whether the outcome is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Validates files as mergeable PDFs.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self
    }

    /// Validate a single file.
    ///
    /// Never fails; every problem maps to an [`InvalidReason`].
    pub fn validate(&self, path: &Path, password: Option<&str>) -> ValidationOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ValidationOutcome::Invalid(InvalidReason::NotFound);
            }
            Err(_) => return ValidationOutcome::Invalid(InvalidReason::Unreadable),
        };
        if !metadata.is_file() {
            return ValidationOutcome::Invalid(InvalidReason::Unreadable);
        }
        if metadata.len() == 0 {
            return ValidationOutcome::Invalid(InvalidReason::Corrupt);
        }

        let mut doc = match Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                let msg = e.to_string().to_lowercase();
                let reason = if msg.contains("encrypt") || msg.contains("password") {
                    InvalidReason::Encrypted
                } else {
                    InvalidReason::Corrupt
                };
                debug!(path = %path.display(), error = %e, "failed to load PDF");
                return ValidationOutcome::Invalid(reason);
            }
        };

        if doc.is_encrypted() {
            match password {
                None => return ValidationOutcome::Invalid(InvalidReason::Encrypted),
                Some(pw) => {
                    if doc.decrypt(pw).is_err() {
                        return ValidationOutcome::Invalid(InvalidReason::WrongPassword);
                    }
                }
            }
        }

        let pages = doc.get_pages().len();
        if pages == 0 {
            return ValidationOutcome::Invalid(InvalidReason::ZeroPages);
        }

        ValidationOutcome::Valid { pages }
    }

    /// Validate many files with bounded concurrency.
    ///
    /// Each file is checked on the blocking pool; results carry the
    /// caller's [`DocumentId`] so they can be applied back to the list
    /// in any completion order.
    pub async fn validate_all(
        &self,
        items: Vec<(DocumentId, PathBuf)>,
        jobs: usize,
    ) -> Vec<(DocumentId, ValidationOutcome)> {
        let jobs = jobs.max(1);
        stream::iter(items)
            .map(|(id, path)| {
                task::spawn_blocking(move || {
                    let validator = Validator::new();
                    (id, validator.validate(&path, None))
                })
            })
            .buffer_unordered(jobs)
            .filter_map(|joined| async move { joined.ok() })
            .collect()
            .await
    }
}
