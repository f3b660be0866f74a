//! Extraction orchestration: drive the PDF writer over a resolved plan.
//!
//! The orchestrator is the only component that writes output files. Every
//! document is written to a temporary sibling and renamed into place on
//! success, so an interrupt never leaves a partial file at its final name.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::fs::FileSystem;
use crate::rename::conflict::ResolvedPlan;

/// Collaborator that writes selected pages of the source document.
pub trait DocumentWriter {
    /// Write `pages` (1-indexed, in the given order, duplicates allowed)
    /// to `dest`. Returns the number of bytes written.
    fn write_pages(&self, pages: &[usize], dest: &Path) -> Result<u64>;
}

/// What an extraction run did (or would do, under `dry_run`).
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Output path, page count, and bytes written (zero in a dry run).
    pub written: Vec<(PathBuf, usize, u64)>,
    /// Paths dropped by conflict resolution.
    pub skipped: Vec<PathBuf>,
    pub dry_run: bool,
}

/// Execute a resolved plan against the writer.
pub fn run_extraction(
    plan: ResolvedPlan,
    writer: &dyn DocumentWriter,
    fs: &dyn FileSystem,
    dry_run: bool,
) -> Result<ExtractionReport> {
    let mut report = ExtractionReport {
        skipped: plan.skipped,
        dry_run,
        ..Default::default()
    };

    for entry in plan.entries {
        if dry_run {
            debug!(path = %entry.path.display(), pages = entry.pages.len(), "dry run");
            report.written.push((entry.path, entry.pages.len(), 0));
            continue;
        }

        let tmp = temp_sibling(&entry.path);
        let bytes = match writer.write_pages(&entry.pages, &tmp) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs.remove_file(&tmp);
                return Err(e);
            }
        };
        fs.rename(&tmp, &entry.path)?;
        info!(
            path = %entry.path.display(),
            pages = entry.pages.len(),
            bytes,
            "wrote output"
        );
        report.written.push((entry.path, entry.pages.len(), bytes));
    }

    Ok(report)
}

/// Temporary name next to the final one: `.<name>.tmp`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
