//! pdfmeld - Merge PDF, Word, and EPUB documents into a single PDF.
//!
//! Thin CLI over the library: ingest runs as a batch task, the merge as
//! an exclusive task, and Ctrl-C requests cooperative cancellation.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use pdfmeld::cli::{Cli, Command, InspectArgs, MergeArgs};
use pdfmeld::detect::{DetectedType, FileTypeDetector};
use pdfmeld::document::DocumentList;
use pdfmeld::error::Error;
use pdfmeld::merge::{MergeEngine, MergeJob};
use pdfmeld::options::{OutputOptions, PageSelection};
use pdfmeld::pipeline::{IngestPipeline, IngestReport};
use pdfmeld::profile::Profile;
use pdfmeld::task::{TaskHandle, TaskKind, TaskOutcome, TaskScheduler};
use pdfmeld::validate::{ValidationOutcome, Validator};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<Error>().map_or(1, Error::exit_code);
        process::exit(code);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Merge(args) => run_merge(args).await,
        Command::Inspect(args) => run_inspect(args),
    }
}

/// One input as the user staged it: path plus per-document settings.
struct PlanItem {
    path: PathBuf,
    selection: Option<PageSelection>,
    preserve_bookmarks: bool,
}

async fn run_merge(args: MergeArgs) -> Result<()> {
    args.validate().map_err(anyhow::Error::from)?;
    let (plan, options) = resolve_plan(&args)?;
    let scheduler = TaskScheduler::new();

    // Ingest: detect, expand, convert, validate, off-thread.
    let paths: Vec<PathBuf> = plan.iter().map(|item| item.path.clone()).collect();
    let handle = scheduler.submit(TaskKind::Batch, move |ctx| {
        IngestPipeline::with_system_tools().ingest(&paths, ctx)
    })?;
    let IngestReport {
        entries,
        summary,
        scratch,
    } = drive("ingest", handle).await?;

    for note in &summary.notes {
        eprintln!("warning: {note}");
    }

    // Stage the documents and replay the plan's per-document settings.
    // Archive members inherit the settings of the archive they came from.
    let mut list = DocumentList::new();
    for entry in entries {
        let key = entry
            .origin
            .clone()
            .unwrap_or_else(|| entry.source_path.clone());
        let id = entry.register(&mut list)?;
        if let Some(item) = plan.iter().find(|item| item.path == key) {
            if item.selection.is_some() {
                list.set_selection(id, item.selection.clone())?;
            }
            list.set_preserve_bookmarks(id, item.preserve_bookmarks)?;
        }
    }

    if let Some(path) = &args.save_profile {
        Profile::capture(&list, &options).save(path)?;
        eprintln!("profile saved to {}", path.display());
    }

    // Merge the eligible subset, exclusive and cancellable. Documents
    // that failed ingest are skipped and reported, not fatal.
    let job = MergeJob::from_list(&list, options)?;
    let handle = scheduler.submit(TaskKind::Merge, move |ctx| MergeEngine::new().merge(&job, ctx))?;
    let outcome = drive("merge", handle).await?;

    // Extracted and converted files must survive until the merge has read them.
    drop(scratch);

    for item in &outcome.skipped {
        eprintln!("skipped {}: {}", item.label, item.reason);
    }
    println!(
        "Merged {} document(s), {} pages ({} bookmarks) into {} in {:.2}s",
        outcome.documents_merged,
        outcome.total_pages,
        outcome.bookmarks_kept,
        outcome.destination.display(),
        outcome.duration.as_secs_f64()
    );
    if !outcome.skipped.is_empty() {
        println!("{} document(s) skipped", outcome.skipped.len());
    }
    Ok(())
}

/// Resolve inputs, per-document settings, and output options from the
/// flags or a loaded profile. `--output` and `--password` always win.
fn resolve_plan(args: &MergeArgs) -> Result<(Vec<PlanItem>, OutputOptions)> {
    if let Some(path) = &args.profile {
        let profile = Profile::load(path)?;
        let (restored, mut options) = profile.restore()?;
        if let Some(out) = &args.output {
            options.destination = out.clone();
        }
        options.password = args.password.clone();
        options.validate()?;

        let plan = restored
            .ordered()
            .map(|doc| PlanItem {
                path: doc.source_path.clone(),
                selection: doc.selection.clone(),
                preserve_bookmarks: doc.preserve_bookmarks,
            })
            .collect();
        return Ok((plan, options));
    }

    let selection = args.selection()?;
    let destination = args
        .output
        .clone()
        .ok_or_else(|| Error::other("no output path specified"))?;
    let options = args.to_options(destination)?;
    let plan = args
        .inputs
        .iter()
        .map(|path| PlanItem {
            path: path.clone(),
            selection: selection.clone(),
            preserve_bookmarks: !args.no_bookmarks,
        })
        .collect();
    Ok((plan, options))
}

/// Print progress until the task stops sending, then collect its outcome.
/// Ctrl-C requests cancellation; the task stops at its next checkpoint.
async fn drive<T>(label: &str, mut handle: TaskHandle<T>) -> Result<T> {
    let cancel = handle.cancel_token();
    loop {
        tokio::select! {
            progress = handle.next_progress() => match progress {
                Some(p) => eprintln!("[{}/{}] {label}: {}", p.done, p.total, p.note),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("cancellation requested, stopping at the next checkpoint");
                cancel.cancel();
            }
        }
    }
    match handle.join().await {
        TaskOutcome::Completed(value) => Ok(value),
        TaskOutcome::Cancelled => Err(Error::Cancelled.into()),
        TaskOutcome::Failed(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectRow {
    path: PathBuf,
    detected: DetectedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationOutcome>,
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let detector = FileTypeDetector::new();
    let validator = Validator::new();

    let rows: Vec<InspectRow> = args
        .inputs
        .iter()
        .map(|path| {
            let detected = detector.detect(path);
            // Only PDFs are validated here; everything else would need
            // conversion or extraction first.
            let validation =
                (detected == DetectedType::Pdf).then(|| validator.validate(path, None));
            InspectRow {
                path: path.clone(),
                detected,
                validation,
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        match &row.validation {
            Some(ValidationOutcome::Valid { pages }) => {
                println!("{}: {} ({pages} pages)", row.path.display(), row.detected);
            }
            Some(ValidationOutcome::Invalid(reason)) => {
                println!("{}: {} ({reason})", row.path.display(), row.detected);
            }
            None => println!("{}: {}", row.path.display(), row.detected),
        }
    }
    Ok(())
}
