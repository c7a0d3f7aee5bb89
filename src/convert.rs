//! Conversion of non-PDF documents to PDF.
//!
//! Converters are looked up by detected type in a capability registry.
//! PDF inputs pass through untouched. The stock converters shell out to
//! external programs (LibreOffice for Word, Calibre for EPUB) and are
//! registered only when the program is actually on the PATH, so a missing
//! tool surfaces as [`Error::ConversionUnavailable`] at ingest time
//! instead of a spawn failure mid-batch.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, info};

use crate::detect::DetectedType;
use crate::error::{Error, Result};

/// Converts one document type to PDF.
pub trait Converter: Send + Sync {
    /// Short name for logs and summaries.
    fn name(&self) -> &str;

    /// Convert `input` to a PDF inside `out_dir`, returning the PDF path.
    ///
    /// Must not modify the input file.
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;
}

/// How the external program receives the output location.
#[derive(Debug, Clone, Copy)]
enum OutputStyle {
    /// Program takes an output directory flag and names the file itself.
    OutDir,
    /// Program takes the explicit output file as the final argument.
    OutputFile,
}

/// A converter that shells out to an external program.
pub struct CommandConverter {
    name: String,
    program: String,
    fixed_args: Vec<String>,
    output_style: OutputStyle,
}

impl CommandConverter {
    /// LibreOffice in headless mode, for Word documents.
    pub fn libreoffice() -> Self {
        Self {
            name: "libreoffice".to_string(),
            program: "soffice".to_string(),
            fixed_args: vec![
                "--headless".to_string(),
                "--convert-to".to_string(),
                "pdf".to_string(),
                "--outdir".to_string(),
            ],
            output_style: OutputStyle::OutDir,
        }
    }

    /// Calibre's ebook-convert, for EPUB documents.
    pub fn ebook_convert() -> Self {
        Self {
            name: "ebook-convert".to_string(),
            program: "ebook-convert".to_string(),
            fixed_args: Vec::new(),
            output_style: OutputStyle::OutputFile,
        }
    }

    /// Whether the underlying program can be spawned.
    pub fn is_available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output() {
            Ok(_) => true,
            Err(e) => e.kind() != io::ErrorKind::NotFound,
        }
    }

    fn expected_output(&self, input: &Path, out_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());
        out_dir.join(format!("{stem}.pdf"))
    }
}

impl Converter for CommandConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output_path = self.expected_output(input, out_dir);

        let mut cmd = Command::new(&self.program);
        match self.output_style {
            OutputStyle::OutDir => {
                cmd.args(&self.fixed_args).arg(out_dir).arg(input);
            }
            OutputStyle::OutputFile => {
                cmd.args(&self.fixed_args).arg(input).arg(&output_path);
            }
        }

        debug!(program = %self.program, input = %input.display(), "running converter");
        let output = cmd.output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::ConversionUnavailable {
                    kind: DetectedType::Unknown,
                }
            } else {
                Error::conversion_failed(input, format!("failed to run {}: {e}", self.program))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::conversion_failed(
                input,
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        if !output_path.is_file() {
            return Err(Error::conversion_failed(
                input,
                format!("{} reported success but produced no PDF", self.program),
            ));
        }

        Ok(output_path)
    }
}

/// Capability registry mapping detected types to converters.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<DetectedType, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry. Only PDFs will pass through it.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every external tool found on this system.
    pub fn with_system_tools() -> Self {
        let mut registry = Self::new();

        let word = CommandConverter::libreoffice();
        if word.is_available() {
            info!("registering LibreOffice for Word conversion");
            registry.register(DetectedType::Word, Arc::new(word));
        }

        let epub = CommandConverter::ebook_convert();
        if epub.is_available() {
            info!("registering ebook-convert for EPUB conversion");
            registry.register(DetectedType::Epub, Arc::new(epub));
        }

        registry
    }

    /// Register a converter for a type, replacing any previous one.
    pub fn register(&mut self, kind: DetectedType, converter: Arc<dyn Converter>) {
        self.converters.insert(kind, converter);
    }

    /// Whether documents of this type can be normalized to PDF.
    pub fn supports(&self, kind: DetectedType) -> bool {
        kind == DetectedType::Pdf || self.converters.contains_key(&kind)
    }

    /// Normalize a document to PDF.
    ///
    /// PDFs pass through (the input path comes back unchanged, no copy).
    /// Other types go through their registered converter; an unregistered
    /// type is [`Error::ConversionUnavailable`].
    pub fn convert(&self, input: &Path, kind: DetectedType, out_dir: &Path) -> Result<PathBuf> {
        match kind {
            DetectedType::Pdf => Ok(input.to_path_buf()),
            DetectedType::Unknown => Err(Error::DetectionAmbiguous {
                path: input.to_path_buf(),
            }),
            _ => {
                let converter = self
                    .converters
                    .get(&kind)
                    .ok_or(Error::ConversionUnavailable { kind })?;
                converter.convert(input, out_dir)
            }
        }
    }
}
