//! Error types for pdfmeld.
//!
//! One error enum covers the whole pipeline, from type detection through
//! the final merge. Per-document problems (a file that fails conversion or
//! validation) are recoverable: batch operations record them and continue.
//! Merge-level problems abort the merge and leave no output file.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::detect::DetectedType;
use crate::validate::InvalidReason;

/// Result type alias for pdfmeld operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of the merge itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeFailure {
    /// A source PDF could not be opened at merge time.
    SourceUnavailable,
    /// The output file could not be written or renamed into place.
    WriteFailed,
    /// Password protection could not be applied.
    EncryptionFailed,
}

impl std::fmt::Display for MergeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable => write!(f, "source unavailable"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::EncryptionFailed => write!(f, "encryption failed"),
        }
    }
}

/// Main error type for pdfmeld operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The file's type could not be pinned down by content or extension.
    #[error("cannot determine document type: {}", .path.display())]
    DetectionAmbiguous {
        /// Path whose type stayed ambiguous.
        path: PathBuf,
    },

    /// No converter is registered for this document type.
    #[error("no converter available for {kind} documents")]
    ConversionUnavailable {
        /// The detected type with no registered converter.
        kind: DetectedType,
    },

    /// A registered converter ran but did not produce a PDF.
    #[error("failed to convert {}: {reason}", .path.display())]
    ConversionFailed {
        /// Source document that failed to convert.
        path: PathBuf,
        /// What the converter reported.
        reason: String,
    },

    /// The external tool needed to read an archive is not installed.
    #[error("archive tool '{tool}' is not installed")]
    ArchiveToolMissing {
        /// Name of the missing tool.
        tool: String,
    },

    /// The archive could not be read.
    #[error("corrupt or unreadable archive: {}\n  details: {details}", .path.display())]
    ArchiveCorrupt {
        /// Path to the archive.
        path: PathBuf,
        /// Details from the archive reader.
        details: String,
    },

    /// A document failed PDF validation.
    #[error("validation failed for {}: {reason}", .path.display())]
    ValidationFailed {
        /// The PDF that failed validation.
        path: PathBuf,
        /// Why it failed.
        reason: InvalidReason,
    },

    /// A page selection is malformed or exceeds the document.
    #[error("invalid page selection: {message}")]
    InvalidSelection {
        /// What is wrong with the selection.
        message: String,
    },

    /// Output metadata failed validation.
    #[error("invalid metadata: {message}")]
    InvalidMetadata {
        /// Which field and why.
        message: String,
    },

    /// A conflicting task is already live in the scheduler.
    #[error("a background task is already running")]
    TaskAlreadyRunning,

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// Every staged document was skipped; there is nothing to merge.
    #[error("no eligible documents to merge")]
    NoEligibleDocuments,

    /// The merge aborted; no output file was produced.
    #[error("merge failed ({kind}): {reason}")]
    MergeFailed {
        /// Which stage failed.
        kind: MergeFailure,
        /// Details about the failure.
        reason: String,
    },

    /// A saved document list could not be read or written.
    #[error("profile error for {}: {reason}", .path.display())]
    Profile {
        /// Profile file involved.
        path: PathBuf,
        /// Details about the failure.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Error from the PDF engine.
    #[error("PDF error: {source}")]
    Pdf {
        /// Underlying lopdf error.
        #[from]
        source: lopdf::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Create a ConversionFailed error.
    pub fn conversion_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConversionFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an ArchiveCorrupt error.
    pub fn archive_corrupt(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::ArchiveCorrupt {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(path: impl Into<PathBuf>, reason: InvalidReason) -> Self {
        Self::ValidationFailed {
            path: path.into(),
            reason,
        }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(kind: MergeFailure, reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a generic error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether a batch can record this error and keep going.
    ///
    /// Per-document failures are recoverable; merge, task, and I/O
    /// failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DetectionAmbiguous { .. }
                | Self::ConversionUnavailable { .. }
                | Self::ConversionFailed { .. }
                | Self::ArchiveToolMissing { .. }
                | Self::ArchiveCorrupt { .. }
                | Self::ValidationFailed { .. }
        )
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DetectionAmbiguous { .. } => 2,
            Self::ConversionUnavailable { .. } | Self::ConversionFailed { .. } => 3,
            Self::ArchiveToolMissing { .. } | Self::ArchiveCorrupt { .. } => 4,
            Self::ValidationFailed { .. } => 5,
            Self::InvalidSelection { .. } | Self::InvalidMetadata { .. } => 6,
            Self::TaskAlreadyRunning => 7,
            Self::Cancelled => 130,
            Self::NoEligibleDocuments => 10,
            Self::MergeFailed { .. } => 8,
            Self::Profile { .. } => 9,
            Self::Io { .. } | Self::Pdf { .. } | Self::Other { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_merge_failed() {
        let err = Error::merge_failed(MergeFailure::WriteFailed, "disk full");
        let msg = err.to_string();
        assert!(msg.contains("write failed"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::conversion_failed("a.docx", "boom").is_recoverable());
        assert!(Error::validation_failed("a.pdf", InvalidReason::ZeroPages).is_recoverable());
        assert!(!Error::TaskAlreadyRunning.is_recoverable());
        assert!(!Error::NoEligibleDocuments.is_recoverable());
        assert!(!Error::merge_failed(MergeFailure::SourceUnavailable, "gone").is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_exit_codes_distinct_for_task_and_merge() {
        assert_ne!(
            Error::TaskAlreadyRunning.exit_code(),
            Error::merge_failed(MergeFailure::WriteFailed, "x").exit_code()
        );
        assert_eq!(Error::Cancelled.exit_code(), 130);
    }
}
