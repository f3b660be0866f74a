//! Group filtering by index or by content criteria.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::analyzer::AnalyzerCache;
use crate::error::{Result, SieveError};
use crate::select::boolean::BooleanExpr;
use crate::select::group::PageGroup;

static INDEX_FILTER_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d,\-]+$").unwrap());

/// Keep groups selected by `criteria`: a purely numeric criterion selects
/// groups by 1-indexed position, anything else is a boolean expression and
/// keeps groups whose pages intersect its page set.
pub fn filter_groups(
    groups: Vec<PageGroup>,
    criteria: &str,
    doc: &AnalyzerCache<'_>,
) -> Result<Vec<PageGroup>> {
    let criteria = criteria.trim();
    if groups.is_empty() || criteria.is_empty() {
        return Ok(groups);
    }

    let stripped: String = criteria.chars().filter(|c| !c.is_whitespace()).collect();
    if INDEX_FILTER_RGX.is_match(&stripped) {
        filter_by_indices(groups, &stripped)
    } else {
        filter_by_criteria(groups, criteria, doc)
    }
}

fn filter_by_indices(groups: Vec<PageGroup>, indices_str: &str) -> Result<Vec<PageGroup>> {
    let mut selected: BTreeSet<usize> = BTreeSet::new();

    for part in indices_str.split(',') {
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((start_str, end_str)) if !start_str.is_empty() && !end_str.is_empty() => {
                let start: usize = parse_index(start_str, part)?;
                let end: usize = parse_index(end_str, part)?;
                if start > end {
                    return Err(SieveError::range(format!(
                        "invalid group range {part}: {start} > {end}"
                    )));
                }
                selected.extend(start..=end);
            }
            _ => {
                selected.insert(parse_index(part, part)?);
            }
        }
    }

    let out_of_range: Vec<usize> = selected
        .iter()
        .copied()
        .filter(|&i| i < 1 || i > groups.len())
        .collect();
    if !out_of_range.is_empty() {
        warn!(
            max = groups.len(),
            indices = ?out_of_range,
            "ignoring out-of-range group indices"
        );
    }

    Ok(groups
        .into_iter()
        .enumerate()
        .filter(|(i, _)| selected.contains(&(i + 1)))
        .map(|(_, g)| g)
        .collect())
}

fn parse_index(s: &str, context: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| SieveError::input(format!("invalid group index '{context}'")))
}

fn filter_by_criteria(
    groups: Vec<PageGroup>,
    criteria: &str,
    doc: &AnalyzerCache<'_>,
) -> Result<Vec<PageGroup>> {
    let expr = BooleanExpr::parse(criteria)
        .map_err(|e| SieveError::input(format!("invalid filter criteria: {e}")))?;
    let (matching, _) = expr.evaluate(doc)?;

    Ok(groups
        .into_iter()
        .filter(|group| group.pages.iter().any(|p| matching.contains(p)))
        .collect())
}
