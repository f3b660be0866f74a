//! Range patterns: `X to Y` resolved into contiguous page sections.
//!
//! Each side is a predicate or a literal page number. Every page matching
//! the left side opens a section that closes at the smallest right-side
//! match at or after it; left matches with no closing page contribute
//! nothing. An empty result is not an error here - callers decide whether
//! emptiness is acceptable.

use crate::analyzer::AnalyzerCache;
use crate::error::{Result, SieveError};
use crate::select::group::PageGroup;
use crate::select::lexer::{contains_unquoted, split_unquoted};
use crate::select::pattern::{Predicate, looks_like_predicate};

/// One side of a range pattern.
#[derive(Debug)]
pub enum Endpoint {
    Page(usize),
    Pattern(Predicate),
}

impl Endpoint {
    fn parse(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim();
        if let Ok(page) = fragment.parse::<usize>() {
            return Ok(Endpoint::Page(page));
        }
        if looks_like_predicate(fragment) {
            return Ok(Endpoint::Pattern(Predicate::parse(fragment)?));
        }
        Err(SieveError::input(format!(
            "range endpoint '{fragment}' is neither a page number nor a pattern"
        )))
    }

    fn match_pages(&self, doc: &AnalyzerCache<'_>) -> Result<Vec<usize>> {
        match self {
            Endpoint::Page(page) => {
                if *page >= 1 && *page <= doc.page_count() {
                    Ok(vec![*page])
                } else {
                    Ok(Vec::new())
                }
            }
            Endpoint::Pattern(pred) => pred.match_pages(doc),
        }
    }
}

/// A parsed `X to Y` pattern.
#[derive(Debug)]
pub struct RangePattern {
    left: Endpoint,
    right: Endpoint,
    source: String,
}

/// True when the fragment contains an unquoted ` to ` separator.
pub fn looks_like_range_pattern(s: &str) -> bool {
    contains_unquoted(s, " to ")
}

impl RangePattern {
    pub fn parse(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim();
        let parts = split_unquoted(fragment, " to ");
        if parts.len() != 2 {
            return Err(SieveError::input(format!(
                "range pattern must have exactly one ' to ' separator: '{fragment}'"
            )));
        }
        Ok(Self {
            left: Endpoint::parse(&parts[0])?,
            right: Endpoint::parse(&parts[1])?,
            source: fragment.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Expand into `[start, end]` sections by pairing each left match with
    /// the next right match.
    pub fn resolve(&self, doc: &AnalyzerCache<'_>) -> Result<Vec<(usize, usize)>> {
        let starts = self.left.match_pages(doc)?;
        let ends = self.right.match_pages(doc)?;

        let mut sections = Vec::new();
        for &start in &starts {
            if let Some(&end) = ends.iter().find(|&&e| e >= start) {
                sections.push((start, end));
            }
        }
        Ok(sections)
    }

    /// Resolve and wrap every section in a [`PageGroup`] annotated with its
    /// section index.
    pub fn section_groups(&self, doc: &AnalyzerCache<'_>) -> Result<Vec<PageGroup>> {
        let groups = self
            .resolve(doc)?
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                PageGroup::new(
                    (start..=end).collect(),
                    true,
                    format!("{} (section {})", self.source, i + 1),
                )
            })
            .collect();
        Ok(groups)
    }
}
