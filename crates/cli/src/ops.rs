//! Per-document operation drivers.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use pagesieve_core::analyzer::{AnalyzerCache, PageAnalyzer};
use pagesieve_core::extract::run_extraction;
use pagesieve_core::fs::OsFileSystem;
use pagesieve_core::rename::conflict::{ConflictPrompt, ConflictStrategy, resolve_conflicts};
use pagesieve_core::rename::planner::{ExtractMode, FilenamePlan, NamingOptions, plan_filenames};
use pagesieve_core::rename::template::Template;
use pagesieve_core::scrape::extract::ScrapeEngine;
use pagesieve_core::scrape::pattern::parse_pattern_set;
use pagesieve_core::scrape::ScrapedVars;
use pagesieve_core::select::boundary::apply_boundaries;
use pagesieve_core::select::dedup::{DedupStrategy, apply_dedup};
use pagesieve_core::select::filter::filter_groups;
use pagesieve_core::select::parser::SelectionParser;

use crate::Args;
use crate::backend::{LopdfAnalyzer, LopdfWriter, optimize_document};
use crate::gs;
use crate::prompt::StdinPrompt;

/// Removes a ghostscript temp file when the operation ends.
struct TempGuard(PathBuf);

impl Drop for TempGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// The path to actually read: the original, or a repaired temp copy when
/// loading fails and auto-fix is allowed.
fn effective_source(args: &Args, pdf: &Path) -> Result<(PathBuf, Option<TempGuard>)> {
    match LopdfAnalyzer::open(pdf) {
        Ok(_) => Ok((pdf.to_path_buf(), None)),
        Err(e) => {
            if args.no_auto_fix || !gs::is_available() {
                Err(e).with_context(|| format!("cannot open {}", pdf.display()))
            } else {
                warn!(path = %pdf.display(), error = %e, "load failed, repairing with ghostscript");
                let temp = gs::fix_to_temp(pdf, args.gs_quality)?;
                Ok((temp.clone(), Some(TempGuard(temp))))
            }
        }
    }
}

fn collect_patterns(args: &Args) -> Result<Vec<String>> {
    let mut patterns = args.scrape_pattern.clone();
    if let Some(file) = &args.scrape_patterns_file {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("cannot read pattern file {}", file.display()))?;
        for raw in content.lines() {
            let line = match raw.find('#') {
                Some(pos) => raw[..pos].trim(),
                None => raw.trim(),
            };
            if !line.is_empty() {
                patterns.push(line.to_string());
            }
        }
    }
    Ok(patterns)
}

fn naming_options(args: &Args) -> Result<NamingOptions> {
    let template = args
        .filename_template
        .as_deref()
        .map(Template::parse)
        .transpose()?;

    let prefix = if let Some(prefix) = &args.name_prefix {
        Some(prefix.clone())
    } else if args.smart_names && !args.no_timestamp {
        Some(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string())
    } else {
        None
    };

    Ok(NamingOptions { template, prefix })
}

fn extract_mode(args: &Args) -> ExtractMode {
    if args.separate_files {
        ExtractMode::Separate
    } else if args.respect_groups {
        ExtractMode::Grouped
    } else {
        ExtractMode::Single
    }
}

fn dedup_strategy(args: &Args) -> DedupStrategy {
    match args.dedup {
        Some(strategy) => strategy.into(),
        None if args.respect_groups => DedupStrategy::Groups,
        None => DedupStrategy::Strict,
    }
}

fn conflict_strategy(args: &Args) -> ConflictStrategy {
    let strategy: ConflictStrategy = args.conflicts.into();
    if strategy == ConflictStrategy::Ask && args.batch {
        ConflictStrategy::Rename
    } else {
        strategy
    }
}

fn print_plan(plan: &FilenamePlan) {
    println!("Planned outputs:");
    for entry in &plan.entries {
        println!("  {}  ({} pages)", entry.path.display(), entry.pages.len());
    }
}

/// The main selector-driven extraction pipeline.
pub fn run_extract(args: &Args, pdf: &Path) -> Result<()> {
    let selector = args.extract_pages.as_deref().unwrap_or("all");
    extract_with(args, pdf, selector, extract_mode(args), None)
}

/// `--split-pages`: every page into its own file.
pub fn run_split(args: &Args, pdf: &Path) -> Result<()> {
    extract_with(args, pdf, "all", ExtractMode::Separate, None)
}

/// `--strip-first`: everything except page one, into a single file.
pub fn run_strip_first(args: &Args, pdf: &Path) -> Result<()> {
    let (source, _guard) = effective_source(args, pdf)?;
    let analyzer = LopdfAnalyzer::open(&source)?;
    if analyzer.page_count() < 2 {
        warn!(path = %pdf.display(), "document has a single page, nothing to strip");
        return Ok(());
    }
    let stem = file_stem(pdf);
    let name = format!("{stem}_stripped.pdf");
    extract_with(args, pdf, "2-", ExtractMode::Single, Some(name))
}

fn extract_with(
    args: &Args,
    pdf: &Path,
    selector: &str,
    mode: ExtractMode,
    fixed_name: Option<String>,
) -> Result<()> {
    let (source, _guard) = effective_source(args, pdf)?;
    let analyzer = LopdfAnalyzer::open(&source)?;
    let cache = AnalyzerCache::new(&analyzer);

    let base = pdf.parent().unwrap_or_else(|| Path::new("."));
    let selection = SelectionParser::with_base(&cache, base).parse(selector)?;
    info!(
        selector,
        pages = selection.pages.len(),
        groups = selection.groups.len(),
        description = selection.description.as_str(),
        "parsed selection"
    );

    let mut groups = apply_boundaries(
        selection.groups,
        args.group_start.as_deref(),
        args.group_end.as_deref(),
        &cache,
    )?;
    if let Some(criteria) = &args.filter_matches {
        let before = groups.len();
        groups = filter_groups(groups, criteria, &cache)?;
        info!(before, after = groups.len(), "filtered groups");
    }

    let (groups, _dup_report) = apply_dedup(groups, dedup_strategy(args))?;
    if groups.is_empty() {
        bail!("no pages matched selector '{selector}'");
    }

    let patterns = collect_patterns(args)?;
    let parsed = parse_pattern_set(&patterns)?;
    let vars = if parsed.is_empty() {
        ScrapedVars::new()
    } else {
        ScrapeEngine::new(args.pattern_source_page).scrape(&parsed, &cache)?
    };

    let options = naming_options(args)?;
    let mut plan = plan_filenames(pdf, &groups, mode, &vars, &selection.range_label, &options)?;
    if let Some(name) = fixed_name {
        let dir = pdf.parent().unwrap_or_else(|| Path::new("."));
        if let [entry] = plan.entries.as_mut_slice() {
            entry.path = dir.join(name);
        }
    }

    if args.preview {
        print_plan(&plan);
        return Ok(());
    }

    let strategy = conflict_strategy(args);
    let prompt = StdinPrompt;
    let prompt_ref: Option<&dyn ConflictPrompt> =
        if strategy == ConflictStrategy::Ask && !args.batch {
            Some(&prompt)
        } else {
            None
        };
    let resolved = resolve_conflicts(plan.entries, strategy, &OsFileSystem, prompt_ref)?;

    let writer = LopdfWriter::open(&source)?;
    let report = run_extraction(resolved, &writer, &OsFileSystem, args.dry_run)?;

    for (path, pages, bytes) in &report.written {
        if report.dry_run {
            println!("would write {} ({pages} pages)", path.display());
        } else {
            println!("wrote {} ({pages} pages, {bytes} bytes)", path.display());
        }
    }
    for path in &report.skipped {
        println!("skipped {}", path.display());
    }
    Ok(())
}

/// `--optimize`: rewrite with compressed streams and pruned objects.
pub fn run_optimize(pdf: &Path) -> Result<()> {
    let stem = file_stem(pdf);
    let dest = pdf
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_optimized.pdf"));
    let (before, after) = optimize_document(pdf, &dest)?;
    println!(
        "optimized {} -> {} ({before} -> {after} bytes)",
        pdf.display(),
        dest.display()
    );
    Ok(())
}

#[derive(Serialize)]
struct PageDetail {
    page: usize,
    kind: &'static str,
    size_bytes: u64,
    text_chars: usize,
}

#[derive(Serialize)]
struct AnalyzeReport {
    file: String,
    pages: usize,
    file_size_bytes: u64,
    page_details: Vec<PageDetail>,
}

/// `--analyze` / `--analyze-detailed`.
pub fn run_analyze(args: &Args, pdf: &Path) -> Result<()> {
    let (source, _guard) = effective_source(args, pdf)?;
    let analyzer = LopdfAnalyzer::open(&source)?;
    let cache = AnalyzerCache::new(&analyzer);
    let total = cache.page_count();
    let file_size = std::fs::metadata(pdf).map(|m| m.len()).unwrap_or(0);
    let mb = file_size as f64 / (1024.0 * 1024.0);

    if !args.analyze_detailed {
        let per_page = if total > 0 { mb / total as f64 } else { 0.0 };
        println!(
            "{}: {total} pages, {mb:.2} MB ({per_page:.2} MB/page)",
            pdf.display()
        );
        return Ok(());
    }

    let mut page_details = Vec::with_capacity(total);
    for page in 1..=total {
        let analysis = cache.analyze(page)?;
        page_details.push(PageDetail {
            page,
            kind: analysis.kind.as_str(),
            size_bytes: analysis.size_bytes,
            text_chars: analysis.text.chars().count(),
        });
    }
    let report = AnalyzeReport {
        file: pdf.display().to_string(),
        pages: total,
        file_size_bytes: file_size,
        page_details,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `--dump-text`: raw analyzer text per page.
pub fn run_dump_text(args: &Args, pdf: &Path) -> Result<()> {
    let (source, _guard) = effective_source(args, pdf)?;
    let analyzer = LopdfAnalyzer::open(&source)?;
    let cache = AnalyzerCache::new(&analyzer);

    let mut out = open_output(args)?;
    for page in 1..=cache.page_count() {
        let analysis = cache.analyze(page)?;
        writeln!(out, "=== Page {page} ===")?;
        writeln!(out, "{}", analysis.text)?;
    }
    Ok(())
}

/// `--scrape-text`: run the patterns and report the variables.
pub fn run_scrape_text(args: &Args, pdf: &Path) -> Result<()> {
    let patterns = collect_patterns(args)?;
    if patterns.is_empty() {
        bail!("--scrape-text requires --scrape-pattern or --scrape-patterns-file");
    }
    let parsed = parse_pattern_set(&patterns)?;

    let (source, _guard) = effective_source(args, pdf)?;
    let analyzer = LopdfAnalyzer::open(&source)?;
    let cache = AnalyzerCache::new(&analyzer);
    let vars = ScrapeEngine::new(args.pattern_source_page).scrape(&parsed, &cache)?;

    if let Some(output) = &args.output {
        let report: serde_json::Map<String, serde_json::Value> = vars
            .iter()
            .map(|(name, value)| (name.clone(), json!(value)))
            .collect();
        std::fs::write(output, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("cannot write {}", output.display()))?;
        println!("wrote {}", output.display());
    } else {
        for (name, value) in &vars {
            match value {
                Some(v) => println!("{name} = {v}"),
                None => println!("{name} = (not found)"),
            }
        }
    }
    Ok(())
}

fn open_output(args: &Args) -> Result<Box<dyn Write>> {
    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
