//! Deduplication strategies applied to the final group list.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::error::{Result, SieveError};
use crate::select::group::PageGroup;

/// How to treat pages that occur in more than one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupStrategy {
    /// Pass everything through untouched.
    None,
    /// First occurrence wins, across and within groups.
    #[default]
    Strict,
    /// Remove duplicates only within each individual group.
    Groups,
    /// Log an overlap summary, then apply `Strict`.
    Warn,
    /// Any cross-group duplicate is an error.
    Fail,
}

impl DedupStrategy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DedupStrategy::None),
            "strict" => Ok(DedupStrategy::Strict),
            "groups" => Ok(DedupStrategy::Groups),
            "warn" => Ok(DedupStrategy::Warn),
            "fail" => Ok(DedupStrategy::Fail),
            other => Err(SieveError::input(format!(
                "unknown dedup strategy '{other}'"
            ))),
        }
    }
}

/// Cross-group duplicate analysis.
#[derive(Debug, Default)]
pub struct DuplicateReport {
    /// Pages that occur in more than one group, ascending.
    pub duplicate_pages: Vec<usize>,
    /// Per duplicate page: the `original_spec` of every containing group.
    pub occurrences: BTreeMap<usize, Vec<String>>,
}

impl DuplicateReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_pages.is_empty()
    }

    /// Human-readable overlap listing, one line per duplicate page.
    pub fn summary(&self) -> String {
        self.duplicate_pages
            .iter()
            .map(|page| {
                format!(
                    "  page {page} appears in: {}",
                    self.occurrences[page].iter().join(", ")
                )
            })
            .join("\n")
    }
}

/// Find pages occurring in more than one group.
pub fn detect_duplicates(groups: &[PageGroup]) -> DuplicateReport {
    let mut page_specs: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for group in groups {
        for &page in &group.pages {
            page_specs
                .entry(page)
                .or_default()
                .push(group.original_spec.clone());
        }
    }

    let duplicate_pages: Vec<usize> = page_specs
        .iter()
        .filter(|(_, specs)| specs.len() > 1)
        .map(|(&page, _)| page)
        .collect();
    let occurrences = page_specs
        .into_iter()
        .filter(|(_, specs)| specs.len() > 1)
        .collect();

    DuplicateReport {
        duplicate_pages,
        occurrences,
    }
}

/// Apply a strategy, returning the surviving groups and the report.
pub fn apply_dedup(
    groups: Vec<PageGroup>,
    strategy: DedupStrategy,
) -> Result<(Vec<PageGroup>, DuplicateReport)> {
    let report = detect_duplicates(&groups);

    let effective = match strategy {
        DedupStrategy::None => {
            if report.has_duplicates() {
                debug!("deduplication disabled, keeping duplicate pages");
            }
            return Ok((groups, report));
        }
        DedupStrategy::Warn => {
            if report.has_duplicates() {
                warn!(
                    count = report.duplicate_pages.len(),
                    "duplicate pages detected:\n{}",
                    report.summary()
                );
            }
            DedupStrategy::Strict
        }
        DedupStrategy::Fail => {
            if report.has_duplicates() {
                return Err(SieveError::Duplicate {
                    summary: report.summary(),
                });
            }
            return Ok((groups, report));
        }
        other => other,
    };

    let deduped = match effective {
        DedupStrategy::Strict => dedup_strict(groups),
        DedupStrategy::Groups => dedup_within_groups(groups),
        _ => unreachable!("strategies above either returned or mapped to strict/groups"),
    };
    Ok((deduped, report))
}

/// First occurrence wins; groups emptied by the sweep are dropped.
fn dedup_strict(groups: Vec<PageGroup>) -> Vec<PageGroup> {
    let mut seen: BTreeSet<usize> = BTreeSet::new();
    groups
        .into_iter()
        .filter_map(|group| {
            let pages: Vec<usize> = group
                .pages
                .iter()
                .copied()
                .filter(|&p| seen.insert(p))
                .collect();
            if pages.is_empty() {
                None
            } else {
                Some(PageGroup {
                    pages,
                    ..group
                })
            }
        })
        .collect()
}

fn dedup_within_groups(groups: Vec<PageGroup>) -> Vec<PageGroup> {
    groups
        .into_iter()
        .filter_map(|group| {
            let mut seen: BTreeSet<usize> = BTreeSet::new();
            let pages: Vec<usize> = group
                .pages
                .iter()
                .copied()
                .filter(|&p| seen.insert(p))
                .collect();
            if pages.is_empty() {
                None
            } else {
                Some(PageGroup {
                    pages,
                    ..group
                })
            }
        })
        .collect()
}
