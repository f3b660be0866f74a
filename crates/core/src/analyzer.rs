//! Page analysis trait and the per-invocation analysis cache.
//!
//! The analyzer is a collaborator: the core never reads PDF bytes. A
//! backend answers three questions about a page - its text, its kind, and
//! its byte size - and the cache memoises the answers for the lifetime of
//! one command invocation.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{Result, SieveError};

/// Structural classification of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Mostly extractable text.
    Text,
    /// Mostly raster/vector content, little or no text.
    Image,
    /// Both text and images.
    Mixed,
    /// No meaningful content.
    Empty,
}

impl PageKind {
    /// Parse the user-facing kind name used by `type:` predicates.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(PageKind::Text),
            "image" => Ok(PageKind::Image),
            "mixed" => Ok(PageKind::Mixed),
            "empty" => Ok(PageKind::Empty),
            other => Err(SieveError::input(format!(
                "unknown page type '{other}' (expected text, image, mixed, or empty)"
            ))),
        }
    }

    /// The user-facing name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Text => "text",
            PageKind::Image => "image",
            PageKind::Mixed => "mixed",
            PageKind::Empty => "empty",
        }
    }
}

/// Everything the pipeline needs to know about one page.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub text: String,
    pub kind: PageKind,
    pub size_bytes: u64,
}

/// Collaborator interface for reading pages of one document.
///
/// Pages are 1-indexed; `analyze` must fail with an `Evaluation` error for
/// pages outside `[1, page_count]`.
pub trait PageAnalyzer {
    /// Total number of pages in the document.
    fn page_count(&self) -> usize;

    /// Analyze a single page (1-indexed).
    fn analyze(&self, page: usize) -> Result<PageAnalysis>;
}

/// Lazy per-`(document, page)` cache in front of a backend analyzer.
///
/// The pipeline is single-threaded, so interior mutability is a plain
/// `RefCell`. Entries are never mutated once created.
pub struct AnalyzerCache<'a> {
    backend: &'a dyn PageAnalyzer,
    cache: RefCell<FxHashMap<usize, Rc<PageAnalysis>>>,
}

impl<'a> AnalyzerCache<'a> {
    pub fn new(backend: &'a dyn PageAnalyzer) -> Self {
        Self {
            backend,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    /// Analysis for one page, computed at most once.
    pub fn analyze(&self, page: usize) -> Result<Rc<PageAnalysis>> {
        if let Some(hit) = self.cache.borrow().get(&page) {
            return Ok(Rc::clone(hit));
        }
        let analysis = Rc::new(self.backend.analyze(page)?);
        self.cache
            .borrow_mut()
            .insert(page, Rc::clone(&analysis));
        Ok(analysis)
    }
}

/// In-memory analyzer used by tests and benches.
///
/// Kind defaults to `Text` for non-empty pages and `Empty` otherwise;
/// size defaults to the text length. Both can be overridden per page.
#[derive(Debug, Default)]
pub struct MemoryAnalyzer {
    pages: Vec<PageAnalysis>,
}

impl MemoryAnalyzer {
    /// Build from one text per page.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let pages = texts
            .iter()
            .map(|t| {
                let text = t.as_ref().to_string();
                let kind = if text.trim().is_empty() {
                    PageKind::Empty
                } else {
                    PageKind::Text
                };
                let size_bytes = text.len() as u64;
                PageAnalysis {
                    text,
                    kind,
                    size_bytes,
                }
            })
            .collect();
        Self { pages }
    }

    /// An `n`-page document with empty text everywhere.
    pub fn blank(n: usize) -> Self {
        Self::from_texts(&vec![""; n])
    }

    /// Override the kind of one page (1-indexed).
    pub fn set_kind(mut self, page: usize, kind: PageKind) -> Self {
        self.pages[page - 1].kind = kind;
        self
    }

    /// Override the byte size of one page (1-indexed).
    pub fn set_size(mut self, page: usize, size_bytes: u64) -> Self {
        self.pages[page - 1].size_bytes = size_bytes;
        self
    }
}

impl PageAnalyzer for MemoryAnalyzer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn analyze(&self, page: usize) -> Result<PageAnalysis> {
        self.pages
            .get(page.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| {
                SieveError::evaluation(format!(
                    "page {page} not available (document has {} pages)",
                    self.pages.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_returns_backend_results() {
        let backend = MemoryAnalyzer::from_texts(&["hello", ""]);
        let cache = AnalyzerCache::new(&backend);
        assert_eq!(cache.page_count(), 2);
        assert_eq!(cache.analyze(1).unwrap().text, "hello");
        assert_eq!(cache.analyze(2).unwrap().kind, PageKind::Empty);
    }

    #[test]
    fn cache_out_of_range_is_error() {
        let backend = MemoryAnalyzer::blank(2);
        let cache = AnalyzerCache::new(&backend);
        assert!(cache.analyze(3).is_err());
        assert!(cache.analyze(0).is_err());
    }

    #[test]
    fn kind_parse_round_trips() {
        for kind in [
            PageKind::Text,
            PageKind::Image,
            PageKind::Mixed,
            PageKind::Empty,
        ] {
            assert_eq!(PageKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(PageKind::parse("scanned").is_err());
    }
}
