//! pagesieve - selector-driven PDF page extraction and smart renaming.
//!
//! One operation per invocation, long-form flags only. Exit codes:
//! 0 success, 1 user or validation error, 130 interrupted.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use pagesieve_core::rename::conflict::ConflictStrategy;
use pagesieve_core::select::dedup::DedupStrategy;

mod backend;
mod folder;
mod gs;
mod ops;
mod prompt;

use gs::GsQuality;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DedupArg {
    None,
    Strict,
    Groups,
    Warn,
    Fail,
}

impl From<DedupArg> for DedupStrategy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::None => DedupStrategy::None,
            DedupArg::Strict => DedupStrategy::Strict,
            DedupArg::Groups => DedupStrategy::Groups,
            DedupArg::Warn => DedupStrategy::Warn,
            DedupArg::Fail => DedupStrategy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ConflictArg {
    #[default]
    Ask,
    Overwrite,
    Skip,
    Rename,
    Fail,
}

impl From<ConflictArg> for ConflictStrategy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Ask => ConflictStrategy::Ask,
            ConflictArg::Overwrite => ConflictStrategy::Overwrite,
            ConflictArg::Skip => ConflictStrategy::Skip,
            ConflictArg::Rename => ConflictStrategy::Rename,
            ConflictArg::Fail => ConflictStrategy::Fail,
        }
    }
}

/// Select and extract page subsets from PDF documents, optionally naming
/// the outputs from content scraped off the pages.
#[derive(Parser, Debug)]
#[command(name = "pagesieve", version, about, long_about = None)]
pub struct Args {
    /// PDF file or folder to process
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // === Operations ===
    /// Remove the first page
    #[arg(long, help_heading = "Operations")]
    pub strip_first: bool,

    /// Extract pages matching a selector (default: all)
    #[arg(
        long,
        value_name = "RANGE",
        num_args = 0..=1,
        default_missing_value = "all",
        help_heading = "Operations"
    )]
    pub extract_pages: Option<String>,

    /// Split into one file per page
    #[arg(long, help_heading = "Operations")]
    pub split_pages: bool,

    /// Rewrite with compressed streams
    #[arg(long, help_heading = "Operations")]
    pub optimize: bool,

    /// Show page count and size summary
    #[arg(long, help_heading = "Operations")]
    pub analyze: bool,

    /// Per-page kind and size report as JSON
    #[arg(long, help_heading = "Operations")]
    pub analyze_detailed: bool,

    /// Run scrape patterns and print the extracted variables
    #[arg(long, help_heading = "Scraper operations")]
    pub scrape_text: bool,

    /// Dump raw page text
    #[arg(long, help_heading = "Scraper operations")]
    pub dump_text: bool,

    /// Repair a malformed PDF with Ghostscript
    #[arg(long, help_heading = "Ghostscript operations")]
    pub gs_fix: bool,

    /// Repair every malformed PDF in a folder
    #[arg(long, help_heading = "Ghostscript operations")]
    pub gs_batch_fix: bool,

    /// Ghostscript quality preset
    #[arg(long, value_enum, default_value = "ebook", help_heading = "Ghostscript operations")]
    pub gs_quality: GsQuality,

    // === Selection ===
    /// Keep only groups matching an index list or boolean criteria
    #[arg(long, value_name = "CRITERIA", help_heading = "Selection")]
    pub filter_matches: Option<String>,

    /// Pattern that opens a new group
    #[arg(long, value_name = "PATTERN", help_heading = "Selection")]
    pub group_start: Option<String>,

    /// Pattern that closes the current group (inclusive)
    #[arg(long, value_name = "PATTERN", help_heading = "Selection")]
    pub group_end: Option<String>,

    // === Scraping ===
    /// Compact scrape pattern (repeatable)
    #[arg(long, value_name = "PATTERN", help_heading = "Scraping")]
    pub scrape_pattern: Vec<String>,

    /// File with one scrape pattern per line
    #[arg(long, value_name = "FILE", help_heading = "Scraping")]
    pub scrape_patterns_file: Option<PathBuf>,

    /// Page scrape patterns read from (1-indexed)
    #[arg(long, value_name = "N", default_value_t = 1, help_heading = "Scraping")]
    pub pattern_source_page: usize,

    // === Naming ===
    /// Filename template with {variable|fallback} placeholders
    #[arg(long, value_name = "TEMPLATE", help_heading = "Naming")]
    pub filename_template: Option<String>,

    /// Timestamped smart output names
    #[arg(long, help_heading = "Naming")]
    pub smart_names: bool,

    /// Custom output-name prefix
    #[arg(long, value_name = "PREFIX", help_heading = "Naming")]
    pub name_prefix: Option<String>,

    /// Suppress the timestamp prefix of --smart-names
    #[arg(long, help_heading = "Naming")]
    pub no_timestamp: bool,

    // === Extraction modes ===
    /// One output file per page
    #[arg(long, conflicts_with = "respect_groups", help_heading = "Extraction modes")]
    pub separate_files: bool,

    /// One output file per selector group
    #[arg(long, help_heading = "Extraction modes")]
    pub respect_groups: bool,

    // === Policies ===
    /// Duplicate-page strategy (default: groups with --respect-groups, strict otherwise)
    #[arg(long, value_enum, help_heading = "Policies")]
    pub dedup: Option<DedupArg>,

    /// Existing-file strategy (ask degrades to rename in batch mode)
    #[arg(long, value_enum, default_value = "ask", help_heading = "Policies")]
    pub conflicts: ConflictArg,

    // === Processing modes ===
    /// Never prompt; process everything
    #[arg(long, help_heading = "Processing modes")]
    pub batch: bool,

    /// Recurse into subdirectories (only with --gs-batch-fix)
    #[arg(long, help_heading = "Processing modes")]
    pub recursive: bool,

    /// Compute and report without writing
    #[arg(long, help_heading = "Processing modes")]
    pub dry_run: bool,

    /// Show the planned outputs and stop
    #[arg(long, help_heading = "Processing modes")]
    pub preview: bool,

    // === Safety ===
    /// Never repair unreadable inputs with Ghostscript
    #[arg(long, help_heading = "Safety")]
    pub no_auto_fix: bool,

    /// Replace the original file (for --gs-fix)
    #[arg(long, help_heading = "Safety")]
    pub replace: bool,

    /// Replace originals after batch repair (for --gs-batch-fix)
    #[arg(long, help_heading = "Safety")]
    pub replace_originals: bool,

    // === Output ===
    /// Write scraper/dump output to a file instead of stdout
    #[arg(long, value_name = "FILE", help_heading = "Output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    StripFirst,
    Extract,
    Split,
    Optimize,
    Analyze,
    ScrapeText,
    DumpText,
    GsFix,
    GsBatchFix,
}

fn selected_operation(args: &Args) -> Result<Operation> {
    let mut ops: Vec<Operation> = Vec::new();
    if args.strip_first {
        ops.push(Operation::StripFirst);
    }
    if args.extract_pages.is_some() {
        ops.push(Operation::Extract);
    }
    if args.split_pages {
        ops.push(Operation::Split);
    }
    if args.optimize {
        ops.push(Operation::Optimize);
    }
    if args.analyze || args.analyze_detailed {
        ops.push(Operation::Analyze);
    }
    if args.scrape_text {
        ops.push(Operation::ScrapeText);
    }
    if args.dump_text {
        ops.push(Operation::DumpText);
    }
    if args.gs_fix {
        ops.push(Operation::GsFix);
    }
    if args.gs_batch_fix {
        ops.push(Operation::GsBatchFix);
    }

    match ops.as_slice() {
        [] => bail!(
            "no operation requested (try --extract-pages, --analyze, or --help)"
        ),
        [op] => Ok(*op),
        _ => bail!("only one operation may be requested per invocation"),
    }
}

fn validate(args: &Args, op: Operation) -> Result<()> {
    if args.recursive && op != Operation::GsBatchFix {
        bail!("--recursive can only be used with --gs-batch-fix");
    }
    if (args.replace || args.replace_originals)
        && !matches!(op, Operation::GsFix | Operation::GsBatchFix)
    {
        bail!("--replace/--replace-originals require a Ghostscript operation");
    }
    if args.dry_run
        && !matches!(
            op,
            Operation::Extract | Operation::Split | Operation::StripFirst | Operation::GsBatchFix
        )
    {
        bail!("--dry-run applies to extraction and --gs-batch-fix only");
    }
    if args.output.is_some() && !matches!(op, Operation::ScrapeText | Operation::DumpText) {
        bail!("--output applies to --scrape-text and --dump-text only");
    }

    let scrape_args = !args.scrape_pattern.is_empty()
        || args.scrape_patterns_file.is_some()
        || args.filename_template.is_some();
    if scrape_args
        && !matches!(
            op,
            Operation::Extract | Operation::Split | Operation::ScrapeText
        )
    {
        bail!("scrape patterns and templates require --extract-pages or --scrape-text");
    }
    Ok(())
}

fn run_single(args: &Args, op: Operation, pdf: &Path) -> Result<()> {
    match op {
        Operation::StripFirst => ops::run_strip_first(args, pdf),
        Operation::Extract => ops::run_extract(args, pdf),
        Operation::Split => ops::run_split(args, pdf),
        Operation::Optimize => ops::run_optimize(pdf),
        Operation::Analyze => ops::run_analyze(args, pdf),
        Operation::ScrapeText => ops::run_scrape_text(args, pdf),
        Operation::DumpText => ops::run_dump_text(args, pdf),
        Operation::GsFix | Operation::GsBatchFix => unreachable!("handled in run()"),
    }
}

fn run_ghostscript(args: &Args, op: Operation) -> Result<()> {
    if !gs::is_available() {
        bail!(
            "Ghostscript is not installed (install `gs` to use --gs-fix/--gs-batch-fix)"
        );
    }
    match op {
        Operation::GsFix => {
            if !args.path.is_file() {
                bail!("--gs-fix needs a single PDF file");
            }
            let fixed = gs::fix_in_place(&args.path, args.gs_quality, args.replace)?;
            println!("repaired {}", fixed.display());
            Ok(())
        }
        Operation::GsBatchFix => {
            if !args.path.is_dir() {
                bail!("--gs-batch-fix needs a folder");
            }
            let files = folder::find_pdfs(&args.path, args.recursive)?;
            if files.is_empty() {
                bail!("no PDF files found in {}", args.path.display());
            }
            let mut failures = 0usize;
            for file in &files {
                if args.dry_run {
                    println!("would repair {}", file.display());
                    continue;
                }
                match gs::fix_in_place(file, args.gs_quality, args.replace_originals) {
                    Ok(fixed) => println!("repaired {}", fixed.display()),
                    Err(e) => {
                        failures += 1;
                        error!(file = %file.display(), error = %e, "repair failed");
                    }
                }
            }
            if failures == files.len() {
                bail!("every repair failed");
            }
            Ok(())
        }
        _ => unreachable!(),
    }
}

fn run(args: &Args) -> Result<()> {
    let op = selected_operation(args)?;
    validate(args, op)?;

    if matches!(op, Operation::GsFix | Operation::GsBatchFix) {
        return run_ghostscript(args, op);
    }

    if args.path.is_file() {
        return run_single(args, op, &args.path);
    }
    if !args.path.is_dir() {
        bail!("{} is neither a file nor a folder", args.path.display());
    }

    // Folder mode: apply the operation to every PDF, isolating failures.
    let files = folder::find_pdfs(&args.path, false)?;
    if files.is_empty() {
        bail!("no PDF files found in {}", args.path.display());
    }
    let mut succeeded = 0usize;
    for file in &files {
        match run_single(args, op, file) {
            Ok(()) => succeeded += 1,
            Err(e) => error!(file = %file.display(), error = %e, "skipping document"),
        }
    }
    if succeeded == 0 {
        bail!("every document in {} failed", args.path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
