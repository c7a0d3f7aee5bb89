//! CLI argument parsing for pdfmeld.
//!
//! This module defines the command-line interface structure using `clap`.
//! It handles argument parsing, validation, and conversion into the
//! library's option types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{Error, Result};
use crate::options::{CompressionLevel, DocMetadata, OutputOptions, PageSelection};

/// Merge PDF, Word, and EPUB documents into a single PDF.
///
/// pdfmeld ingests mixed batches (PDF, DOCX, EPUB, ZIP, RAR), converts
/// everything to PDF, and merges the results in the order given. Page
/// selections, bookmarks, compression, metadata, and password protection
/// are applied on the way out.
#[derive(Parser, Debug)]
#[command(name = "pdfmeld")]
#[command(version)]
#[command(about = "Merge PDF, Word, and EPUB documents into a single PDF", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge documents into one PDF
    Merge(MergeArgs),
    /// Report detection and validation results without merging
    Inspect(InspectArgs),
}

/// Arguments of the `merge` subcommand.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input documents to merge (in order)
    ///
    /// PDF files pass through; DOCX and EPUB are converted; ZIP and RAR
    /// archives are expanded and their PDFs merged in archive order.
    /// Folders are expanded one level deep.
    #[arg(value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Page selection applied to every input (e.g. "1-5,10")
    ///
    /// Page numbers are 1-indexed and checked against each document's
    /// page count; a selection past the end is an error, not a clamp.
    #[arg(long, value_name = "SPEC")]
    pub pages: Option<String>,

    /// Compression level for the output PDF
    #[arg(short, long, value_name = "LEVEL", default_value = "normal")]
    #[arg(value_parser = ["none", "fast", "normal", "high", "maximum"])]
    pub compress: String,

    /// Set title metadata for the output PDF
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Set author metadata for the output PDF
    #[arg(long, value_name = "TEXT")]
    pub author: Option<String>,

    /// Set subject metadata for the output PDF
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Set keywords metadata for the output PDF (comma-separated)
    #[arg(long, value_name = "TEXT")]
    pub keywords: Option<String>,

    /// Protect the output with a user password
    ///
    /// Applied as the very last transformation. Never stored in profiles.
    #[arg(long, value_name = "PASSWORD", env = "PDFMELD_PASSWORD")]
    pub password: Option<String>,

    /// Drop source bookmarks instead of carrying them into the output
    #[arg(long)]
    pub no_bookmarks: bool,

    /// Load inputs, selections, and options from a saved profile
    #[arg(long, value_name = "FILE", conflicts_with = "save_profile")]
    pub profile: Option<PathBuf>,

    /// Save the resolved setup (without the password) to a profile file
    #[arg(long, value_name = "FILE")]
    pub save_profile: Option<PathBuf>,
}

impl MergeArgs {
    /// Early validation that needs no file I/O.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() && self.profile.is_none() {
            return Err(Error::other(
                "no input files specified (give files or --profile)",
            ));
        }
        if self.output.is_none() && self.profile.is_none() {
            return Err(Error::other("no output path specified (use --output)"));
        }
        if let Some(spec) = &self.pages {
            PageSelection::parse(spec)?;
        }
        Ok(())
    }

    /// The page selection shared by all inputs, if one was given.
    pub fn selection(&self) -> Result<Option<PageSelection>> {
        self.pages.as_deref().map(PageSelection::parse).transpose()
    }

    /// Build output options from the flags. The destination must already
    /// be resolved (from `--output` or the loaded profile).
    pub fn to_options(&self, destination: PathBuf) -> Result<OutputOptions> {
        let compression: CompressionLevel = self.compress.parse()?;
        let metadata = DocMetadata::new(
            self.title.clone(),
            self.author.clone(),
            self.subject.clone(),
            self.keywords.clone(),
        );

        let options = OutputOptions {
            destination,
            compression,
            metadata,
            password: self.password.clone(),
        };
        options.validate()?;
        Ok(options)
    }
}

/// Arguments of the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Files to inspect
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Emit the report as JSON instead of human-readable lines
    #[arg(long)]
    pub json: bool,
}
