//! Scrape patterns: the compact mini-language that pulls fields out of
//! page text for filename templating.
//!
//! `pattern` parses the syntax, `extract` walks the text, `trim` applies
//! start/end trimmers, and `sanitize` makes the result filename-safe.

pub mod extract;
pub mod pattern;
pub mod sanitize;
pub mod trim;

pub use extract::{ScrapeEngine, ScrapedVars};
pub use pattern::{ScrapePattern, parse_pattern_set};
