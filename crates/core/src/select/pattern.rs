//! Content and structural predicates on single pages.
//!
//! A predicate is one test from the selector grammar: `contains:`,
//! `regex:`, `line-starts:` (each with a `/i` case-insensitive variant),
//! `type:`, or `size:`. A trailing `+N`/`-N` shifts every matched page
//! after evaluation, dropping pages that leave the document.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::{AnalyzerCache, PageAnalysis, PageKind};
use crate::error::{Result, SieveError};
use crate::select::lexer::strip_matching_quotes;

static OFFSET_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([+-]\d+)$").unwrap());
static SIZE_RGX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(<=|>=|<|>|=)\s*(\d+(?:\.\d+)?)\s*(KB|MB|GB)?$").unwrap());

const PREDICATE_PREFIXES: [&str; 5] = ["contains", "regex", "line-starts", "type", "size"];

/// Comparison operator of a `size:` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl SizeOp {
    fn holds(self, actual: u64, threshold: u64) -> bool {
        match self {
            SizeOp::Lt => actual < threshold,
            SizeOp::Le => actual <= threshold,
            SizeOp::Gt => actual > threshold,
            SizeOp::Ge => actual >= threshold,
            SizeOp::Eq => actual == threshold,
        }
    }
}

/// The test itself, as a tagged variant with one evaluation function.
#[derive(Debug)]
enum Test {
    Contains { value: String, ci: bool },
    Regex(Regex),
    LineStarts { value: String, ci: bool },
    Kind(PageKind),
    Size { op: SizeOp, threshold: u64 },
}

/// A parsed single-page predicate plus its page offset.
#[derive(Debug)]
pub struct Predicate {
    test: Test,
    offset: i64,
    source: String,
}

/// True when the fragment starts with a known predicate prefix followed
/// by `:` (or `/i:`) and carries a non-empty value.
pub fn looks_like_predicate(s: &str) -> bool {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    PREDICATE_PREFIXES.iter().any(|prefix| {
        for sep in [":", "/i:"] {
            if let Some(value) = lower
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix(sep))
            {
                return !strip_matching_quotes(value).trim().is_empty();
            }
        }
        false
    })
}

impl Predicate {
    /// Parse a predicate fragment like `contains/i:"Total"` or
    /// `size:>1MB` or `regex:"^Ch\. \d+"+1`.
    pub fn parse(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim();
        let mut base = fragment;
        let mut offset = 0i64;

        // Offset applies only when the fragment does not end inside quotes.
        if !fragment.ends_with('"') && !fragment.ends_with('\'') {
            if let Some(m) = OFFSET_RGX.captures(fragment) {
                let text = m.get(1).unwrap();
                // `size:>100` must not lose its value to the offset rule.
                let head = &fragment[..text.start()];
                if head.contains(':') && !head.ends_with(['<', '>', '=', ':']) {
                    offset = text.as_str().parse().unwrap_or(0);
                    base = head;
                }
            }
        }

        let (name, ci, raw_value) = split_predicate(base)?;
        let value = strip_matching_quotes(raw_value);
        if value.trim().is_empty() {
            return Err(SieveError::input(format!(
                "empty pattern value in '{fragment}'"
            )));
        }

        let test = match name.as_str() {
            "contains" => Test::Contains {
                value: value.to_string(),
                ci,
            },
            "regex" => {
                let pattern = if ci {
                    format!("(?i){value}")
                } else {
                    value.to_string()
                };
                let compiled = Regex::new(&pattern).map_err(|e| {
                    SieveError::evaluation(format!("invalid regex '{value}': {e}"))
                })?;
                Test::Regex(compiled)
            }
            "line-starts" => Test::LineStarts {
                value: value.to_string(),
                ci,
            },
            "type" => Test::Kind(PageKind::parse(value)?),
            "size" => {
                let caps = SIZE_RGX.captures(value.trim()).ok_or_else(|| {
                    SieveError::input(format!(
                        "invalid size pattern '{value}' (expected e.g. size:>500KB)"
                    ))
                })?;
                let op = match &caps[1] {
                    "<" => SizeOp::Lt,
                    "<=" => SizeOp::Le,
                    ">" => SizeOp::Gt,
                    ">=" => SizeOp::Ge,
                    _ => SizeOp::Eq,
                };
                let number: f64 = caps[2].parse().map_err(|_| {
                    SieveError::input(format!("invalid size value '{}'", &caps[2]))
                })?;
                let multiplier = match caps.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
                    Some(ref s) if s == "KB" => 1024.0,
                    Some(ref s) if s == "MB" => 1024.0 * 1024.0,
                    Some(ref s) if s == "GB" => 1024.0 * 1024.0 * 1024.0,
                    _ => 1.0,
                };
                Test::Size {
                    op,
                    threshold: (number * multiplier) as u64,
                }
            }
            other => {
                return Err(SieveError::input(format!(
                    "unknown predicate '{other}:' in '{fragment}'"
                )));
            }
        };

        Ok(Self {
            test,
            offset,
            source: fragment.to_string(),
        })
    }

    /// The verbatim source fragment.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Does the predicate hold on one analyzed page?
    pub fn matches(&self, page: &PageAnalysis) -> bool {
        match &self.test {
            Test::Contains { value, ci } => {
                if *ci {
                    page.text.to_lowercase().contains(&value.to_lowercase())
                } else {
                    page.text.contains(value.as_str())
                }
            }
            Test::Regex(rgx) => rgx.is_match(&page.text),
            Test::LineStarts { value, ci } => page.text.lines().any(|line| {
                let line = line.trim();
                if *ci {
                    line.to_lowercase().starts_with(&value.to_lowercase())
                } else {
                    line.starts_with(value.as_str())
                }
            }),
            Test::Kind(kind) => page.kind == *kind,
            Test::Size { op, threshold } => op.holds(page.size_bytes, *threshold),
        }
    }

    /// All matching pages, ascending, offset applied, out-of-range dropped.
    pub fn match_pages(&self, doc: &AnalyzerCache<'_>) -> Result<Vec<usize>> {
        let total = doc.page_count();
        let mut pages = Vec::new();
        for page in 1..=total {
            if self.matches(&*doc.analyze(page)?) {
                let shifted = page as i64 + self.offset;
                if shifted >= 1 && shifted <= total as i64 {
                    pages.push(shifted as usize);
                }
            }
        }
        pages.sort_unstable();
        pages.dedup();
        Ok(pages)
    }
}

/// Split `name:value` / `name/i:value`, lowercasing the name.
fn split_predicate(s: &str) -> Result<(String, bool, &str)> {
    if let Some(pos) = s.find("/i:") {
        let name = s[..pos].trim().to_ascii_lowercase();
        return Ok((name, true, &s[pos + 3..]));
    }
    if let Some(pos) = s.find(':') {
        let name = s[..pos].trim().to_ascii_lowercase();
        return Ok((name, false, &s[pos + 1..]));
    }
    Err(SieveError::input(format!(
        "pattern '{s}' is missing ':' between type and value"
    )))
}
