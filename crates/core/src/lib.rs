//! pagesieve - selector-driven page extraction and content-based renaming.
//!
//! The pipeline runs in two halves. Selection:
//! selector text → file expansion → lexing → parsing → boundary/filter
//! transforms → deduplication → `Selection` (pages, description, groups).
//! Renaming/extraction: groups → scrape patterns → template → filename plan
//! → conflict resolution → orchestrated writes.
//!
//! The crate never opens a PDF itself. Documents are seen through the
//! [`analyzer::PageAnalyzer`] trait, output files through
//! [`extract::DocumentWriter`], and the disk through [`fs::FileSystem`], so
//! the whole pipeline is testable in memory.

pub mod analyzer;
pub mod error;
pub mod extract;
pub mod fs;
pub mod rename;
pub mod scrape;
pub mod select;

pub use analyzer::{AnalyzerCache, MemoryAnalyzer, PageAnalysis, PageAnalyzer, PageKind};
pub use error::{Result, SieveError};
pub use select::group::PageGroup;
pub use select::parser::Selection;
