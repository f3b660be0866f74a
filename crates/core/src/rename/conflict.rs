//! Output-path conflict resolution.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SieveError};
use crate::fs::FileSystem;
use crate::rename::planner::PlanEntry;

static NUMERIC_SUFFIX_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d+)$").unwrap());

/// Upper bound on `_N` rename attempts per path.
const MAX_RENAME_ATTEMPTS: usize = 100;

/// What to do when a planned path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    /// Ask the user per conflict; degrades to `Rename` without a prompt.
    #[default]
    Ask,
    Overwrite,
    Skip,
    Rename,
    Fail,
}

impl ConflictStrategy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(ConflictStrategy::Ask),
            "overwrite" => Ok(ConflictStrategy::Overwrite),
            "skip" => Ok(ConflictStrategy::Skip),
            "rename" => Ok(ConflictStrategy::Rename),
            "fail" => Ok(ConflictStrategy::Fail),
            other => Err(SieveError::input(format!(
                "unknown conflict strategy '{other}'"
            ))),
        }
    }
}

/// Per-conflict answer from an interactive prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Overwrite,
    Rename,
    Skip,
}

/// Collaborator asking the user about one conflicting path.
pub trait ConflictPrompt {
    fn resolve(&self, path: &Path) -> PromptChoice;
}

/// A conflict-free plan: entries to write plus what was skipped.
#[derive(Debug)]
pub struct ResolvedPlan {
    pub entries: Vec<PlanEntry>,
    pub skipped: Vec<PathBuf>,
}

/// Resolve collisions between planned entries and the file system (and
/// among the entries themselves).
///
/// The returned entries are pairwise distinct and, unless the strategy is
/// `Overwrite`, collision-free against `fs` at the moment of return.
pub fn resolve_conflicts(
    entries: Vec<PlanEntry>,
    strategy: ConflictStrategy,
    fs: &dyn FileSystem,
    prompt: Option<&dyn ConflictPrompt>,
) -> Result<ResolvedPlan> {
    if strategy == ConflictStrategy::Fail {
        let conflicts: Vec<String> = entries
            .iter()
            .filter(|e| fs.exists(&e.path))
            .map(|e| e.path.display().to_string())
            .collect();
        if !conflicts.is_empty() {
            return Err(SieveError::conflict(format!(
                "output files already exist: {}",
                conflicts.join(", ")
            )));
        }
    }

    let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();
    let mut resolved = Vec::new();
    let mut skipped = Vec::new();

    for mut entry in entries {
        let collides = fs.exists(&entry.path) || claimed.contains(&entry.path);
        if !collides {
            claimed.insert(entry.path.clone());
            resolved.push(entry);
            continue;
        }

        let action = match strategy {
            ConflictStrategy::Overwrite => PromptChoice::Overwrite,
            ConflictStrategy::Skip => PromptChoice::Skip,
            ConflictStrategy::Rename | ConflictStrategy::Fail => PromptChoice::Rename,
            ConflictStrategy::Ask => match prompt {
                Some(p) => p.resolve(&entry.path),
                None => {
                    debug!(path = %entry.path.display(), "non-interactive ask, auto-renaming");
                    PromptChoice::Rename
                }
            },
        };

        match action {
            PromptChoice::Overwrite => {
                if claimed.contains(&entry.path) {
                    // Two planned outputs on one name cannot both win.
                    entry.path = unique_path(&entry.path, fs, &claimed)?;
                }
                info!(path = %entry.path.display(), "overwriting existing file");
                claimed.insert(entry.path.clone());
                resolved.push(entry);
            }
            PromptChoice::Skip => {
                debug!(path = %entry.path.display(), "skipping existing file");
                skipped.push(entry.path);
            }
            PromptChoice::Rename => {
                let renamed = unique_path(&entry.path, fs, &claimed)?;
                info!(
                    from = %entry.path.display(),
                    to = %renamed.display(),
                    "renaming to avoid conflict"
                );
                entry.path = renamed;
                claimed.insert(entry.path.clone());
                resolved.push(entry);
            }
        }
    }

    Ok(ResolvedPlan {
        entries: resolved,
        skipped,
    })
}

/// Next free `stem_N.ext` name, continuing an existing numeric suffix.
fn unique_path(
    path: &Path,
    fs: &dyn FileSystem,
    claimed: &BTreeSet<PathBuf>,
) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let (base, start) = match NUMERIC_SUFFIX_RGX.captures(&stem) {
        Some(caps) => {
            let n: usize = caps[1].parse().unwrap_or(0);
            (stem[..caps.get(0).unwrap().start()].to_string(), n + 1)
        }
        None => (stem.clone(), 1),
    };

    for i in start..start + MAX_RENAME_ATTEMPTS {
        let candidate = parent.join(format!("{base}_{i}{ext}"));
        if !fs.exists(&candidate) && !claimed.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SieveError::conflict(format!(
        "unable to find a free name for {} after {MAX_RENAME_ATTEMPTS} attempts",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFileSystem;

    fn entry(path: &str) -> PlanEntry {
        PlanEntry {
            path: PathBuf::from(path),
            pages: vec![1],
        }
    }

    #[test]
    fn no_conflicts_pass_through() {
        let fs = MemFileSystem::default();
        let plan =
            resolve_conflicts(vec![entry("out/a.pdf")], ConflictStrategy::Fail, &fs, None)
                .unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("out/a.pdf"));
    }

    #[test]
    fn fail_lists_all_conflicts() {
        let fs = MemFileSystem::with_files(["a.pdf", "b.pdf"]);
        let err = resolve_conflicts(
            vec![entry("a.pdf"), entry("b.pdf"), entry("c.pdf")],
            ConflictStrategy::Fail,
            &fs,
            None,
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("a.pdf") && text.contains("b.pdf"));
    }

    #[test]
    fn rename_appends_numeric_suffix() {
        let fs = MemFileSystem::with_files(["a.pdf", "a_1.pdf"]);
        let plan =
            resolve_conflicts(vec![entry("a.pdf")], ConflictStrategy::Rename, &fs, None)
                .unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("a_2.pdf"));
    }

    #[test]
    fn rename_continues_existing_suffix() {
        let fs = MemFileSystem::with_files(["report_3.pdf"]);
        let plan = resolve_conflicts(
            vec![entry("report_3.pdf")],
            ConflictStrategy::Rename,
            &fs,
            None,
        )
        .unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("report_4.pdf"));
    }

    #[test]
    fn skip_records_skipped_paths() {
        let fs = MemFileSystem::with_files(["a.pdf"]);
        let plan = resolve_conflicts(
            vec![entry("a.pdf"), entry("b.pdf")],
            ConflictStrategy::Skip,
            &fs,
            None,
        )
        .unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.skipped, vec![PathBuf::from("a.pdf")]);
    }

    #[test]
    fn overwrite_keeps_paths() {
        let fs = MemFileSystem::with_files(["a.pdf"]);
        let plan = resolve_conflicts(
            vec![entry("a.pdf")],
            ConflictStrategy::Overwrite,
            &fs,
            None,
        )
        .unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("a.pdf"));
    }

    #[test]
    fn duplicate_planned_names_become_distinct() {
        let fs = MemFileSystem::default();
        let plan = resolve_conflicts(
            vec![entry("a.pdf"), entry("a.pdf")],
            ConflictStrategy::Rename,
            &fs,
            None,
        )
        .unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("a.pdf"));
        assert_eq!(plan.entries[1].path, PathBuf::from("a_1.pdf"));
    }

    #[test]
    fn ask_degrades_to_rename_without_prompt() {
        let fs = MemFileSystem::with_files(["a.pdf"]);
        let plan =
            resolve_conflicts(vec![entry("a.pdf")], ConflictStrategy::Ask, &fs, None).unwrap();
        assert_eq!(plan.entries[0].path, PathBuf::from("a_1.pdf"));
    }

    #[test]
    fn ask_uses_prompt_choice() {
        struct AlwaysSkip;
        impl ConflictPrompt for AlwaysSkip {
            fn resolve(&self, _path: &Path) -> PromptChoice {
                PromptChoice::Skip
            }
        }
        let fs = MemFileSystem::with_files(["a.pdf"]);
        let plan = resolve_conflicts(
            vec![entry("a.pdf")],
            ConflictStrategy::Ask,
            &fs,
            Some(&AlwaysSkip),
        )
        .unwrap();
        assert!(plan.entries.is_empty());
        assert_eq!(plan.skipped, vec![PathBuf::from("a.pdf")]);
    }

    #[test]
    fn rename_attempt_limit_is_bounded() {
        let mut existing: Vec<String> = vec!["x.pdf".to_string()];
        existing.extend((1..=100).map(|i| format!("x_{i}.pdf")));
        let fs = MemFileSystem::with_files(existing);
        let err =
            resolve_conflicts(vec![entry("x.pdf")], ConflictStrategy::Rename, &fs, None)
                .unwrap_err();
        assert!(matches!(err, SieveError::Conflict { .. }));
    }
}
