//! Boundary detection: split groups where start/end patterns match.
//!
//! A page matching the end pattern closes the current run (inclusive); a
//! page matching the start pattern opens a new run, closing any current
//! one first; a page matching both becomes its own singleton group.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::analyzer::AnalyzerCache;
use crate::error::{Result, SieveError};
use crate::select::group::PageGroup;
use crate::select::pattern::Predicate;

/// Recompute `groups` using optional start/end boundary patterns.
pub fn apply_boundaries(
    groups: Vec<PageGroup>,
    start_pattern: Option<&str>,
    end_pattern: Option<&str>,
    doc: &AnalyzerCache<'_>,
) -> Result<Vec<PageGroup>> {
    if start_pattern.is_none() && end_pattern.is_none() {
        return Ok(groups);
    }

    let starts = boundary_pages(start_pattern, doc, "start")?;
    let ends = boundary_pages(end_pattern, doc, "end")?;

    let mut result = Vec::new();
    for group in groups {
        result.extend(
            split_at_boundaries(&group, &starts, &ends)
                .into_iter()
                .filter(|g| !g.pages.is_empty()),
        );
    }
    Ok(result)
}

fn boundary_pages(
    pattern: Option<&str>,
    doc: &AnalyzerCache<'_>,
    which: &str,
) -> Result<BTreeSet<usize>> {
    match pattern {
        None => Ok(BTreeSet::new()),
        Some(p) => {
            let predicate = Predicate::parse(p).map_err(|e| {
                SieveError::input(format!("invalid {which} boundary pattern: {e}"))
            })?;
            Ok(predicate.match_pages(doc)?.into_iter().collect())
        }
    }
}

fn split_at_boundaries(
    group: &PageGroup,
    starts: &BTreeSet<usize>,
    ends: &BTreeSet<usize>,
) -> Vec<PageGroup> {
    if group.pages.is_empty() {
        return vec![group.clone()];
    }

    let sorted: Vec<usize> = group.pages.iter().copied().sorted().dedup().collect();
    let mut groups = Vec::new();
    let mut run: Vec<usize> = Vec::new();

    for page in sorted {
        let is_start = starts.contains(&page);
        let is_end = ends.contains(&page);

        if is_start && is_end {
            if !run.is_empty() {
                groups.push(boundary_group(&run));
                run.clear();
            }
            groups.push(boundary_group(&[page]));
        } else if is_end {
            run.push(page);
            groups.push(boundary_group(&run));
            run.clear();
        } else if is_start {
            if !run.is_empty() {
                groups.push(boundary_group(&run));
            }
            run = vec![page];
        } else {
            run.push(page);
        }
    }
    if !run.is_empty() {
        groups.push(boundary_group(&run));
    }

    if groups.is_empty() {
        vec![group.clone()]
    } else {
        groups
    }
}

/// Split groups carry a spec describing their own pages; `is_range`
/// reflects the split result, not the parent.
fn boundary_group(pages: &[usize]) -> PageGroup {
    if pages.len() == 1 {
        return PageGroup::new(pages.to_vec(), false, format!("page{}", pages[0]));
    }
    let consecutive = pages.windows(2).all(|w| w[1] == w[0] + 1);
    let spec = if consecutive {
        format!("pages{}-{}", pages[0], pages[pages.len() - 1])
    } else {
        format!("pages{}", pages.iter().join(","))
    };
    PageGroup::new(pages.to_vec(), true, spec)
}
