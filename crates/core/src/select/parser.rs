//! Top-level selector parsing.
//!
//! Order of operations: strip one matched outer quote pair, expand `file:`
//! selectors, split on top-level commas, decide order preservation, then
//! dispatch each argument to the first matching kind: special keyword,
//! boolean expression, range pattern, single predicate, numeric form.

use std::collections::BTreeSet;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::AnalyzerCache;
use crate::error::{Result, SieveError};
use crate::select::boolean::{BooleanExpr, looks_like_boolean};
use crate::select::file_selector::FileSelector;
use crate::select::group::PageGroup;
use crate::select::lexer::{split_top_level, strip_matching_quotes};
use crate::select::pattern::{Predicate, looks_like_predicate};
use crate::select::range::{RangePattern, looks_like_range_pattern};

static SIMPLE_RANGE_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+-\d+$").unwrap());
static FIRST_LAST_RGX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(first|last)[\s-]?(\d+)$").unwrap());
static NUMERIC_SHAPE_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s:\-]+$").unwrap());
static NON_LABEL_CHARS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]").unwrap());
static NUMERIC_LABEL_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d,\-]+$").unwrap());

/// The outcome of parsing one selector against one document.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Union of all group pages.
    pub pages: BTreeSet<usize>,
    /// Raw range label, e.g. `3-7` or `5,1,3` - feeds the `{range}`
    /// template variable.
    pub range_label: String,
    /// Filename-ready description, e.g. `pages3-7` or `page5`.
    pub description: String,
    /// Groups in user-visible order.
    pub groups: Vec<PageGroup>,
}

/// Pages and provenance contributed by a single argument.
struct ParsedArg {
    pages: Vec<usize>,
    label: String,
    groups: Vec<PageGroup>,
}

/// Parses selectors against one analyzed document.
pub struct SelectionParser<'a> {
    doc: &'a AnalyzerCache<'a>,
    files: FileSelector,
}

impl<'a> SelectionParser<'a> {
    pub fn new(doc: &'a AnalyzerCache<'a>) -> Self {
        Self {
            doc,
            files: FileSelector::new("."),
        }
    }

    /// Resolve relative `file:` paths against `base` (normally the source
    /// PDF's directory).
    pub fn with_base(doc: &'a AnalyzerCache<'a>, base: impl Into<PathBuf>) -> Self {
        Self {
            doc,
            files: FileSelector::new(base),
        }
    }

    /// Parse a complete selector string.
    pub fn parse(&self, selector: &str) -> Result<Selection> {
        let stripped = strip_matching_quotes(selector);

        if stripped.contains('.')
            && (stripped.ends_with(".pdf") || stripped.contains('/') || stripped.contains('\\'))
            && !stripped.contains("file:")
        {
            return Err(SieveError::input(format!(
                "'{stripped}' looks like a filename, not a page range (use 'all' for all pages)"
            )));
        }

        let expanded = self.files.expand(stripped)?;
        let arguments = split_top_level(&expanded);
        if arguments.is_empty() {
            return Err(SieveError::input("empty page selector"));
        }

        let preserve_order = should_preserve_order(&arguments);

        let mut pages = BTreeSet::new();
        let mut labels = Vec::new();
        let mut groups = Vec::new();

        for arg in &arguments {
            let mut parsed = self.parse_argument(arg).map_err(|e| match e {
                SieveError::Input { msg } => {
                    SieveError::input(format!("invalid page range '{arg}': {msg}"))
                }
                other => other,
            })?;
            if preserve_order {
                for group in &mut parsed.groups {
                    group.preserve_order = true;
                }
            }
            pages.extend(parsed.pages.iter().copied());
            labels.push(parsed.label);
            groups.extend(parsed.groups);
        }

        groups.retain(|g| !g.pages.is_empty());

        let range_label = join_labels(&labels, &pages);
        let description = format_description(&range_label);

        Ok(Selection {
            pages,
            range_label,
            description,
            groups,
        })
    }

    fn parse_argument(&self, arg: &str) -> Result<ParsedArg> {
        let arg = arg.trim();

        if let Some(parsed) = self.try_keyword(arg)? {
            return Ok(parsed);
        }
        if looks_like_boolean(arg) {
            return self.parse_boolean(arg);
        }
        if looks_like_range_pattern(arg) {
            return self.parse_range_pattern(arg);
        }
        if looks_like_predicate(arg) {
            return self.parse_predicate(arg);
        }
        if let Some(parsed) = self.try_numeric(arg)? {
            return Ok(parsed);
        }
        Err(SieveError::input(format!("unrecognized format '{arg}'")))
    }

    fn try_keyword(&self, arg: &str) -> Result<Option<ParsedArg>> {
        let total = self.doc.page_count();
        let (pages, label): (Vec<usize>, &str) = match arg.to_ascii_lowercase().as_str() {
            "all" => ((1..=total).collect(), "all"),
            "odd" => ((1..=total).step_by(2).collect(), "odd"),
            "even" => ((2..=total).step_by(2).collect(), "even"),
            _ => return Ok(None),
        };
        let group = PageGroup::new(pages.clone(), true, arg);
        Ok(Some(ParsedArg {
            pages,
            label: label.to_string(),
            groups: vec![group],
        }))
    }

    fn parse_boolean(&self, arg: &str) -> Result<ParsedArg> {
        let expr = BooleanExpr::parse(arg)?;
        let (pages, groups) = expr.evaluate(self.doc)?;
        Ok(ParsedArg {
            pages: pages.into_iter().collect(),
            label: boolean_description(arg),
            groups,
        })
    }

    fn parse_range_pattern(&self, arg: &str) -> Result<ParsedArg> {
        let range = RangePattern::parse(arg)?;
        let groups = range.section_groups(self.doc)?;
        let pages: Vec<usize> = groups.iter().flat_map(|g| g.pages.iter().copied()).collect();
        Ok(ParsedArg {
            pages,
            label: pattern_description(arg),
            groups,
        })
    }

    fn parse_predicate(&self, arg: &str) -> Result<ParsedArg> {
        let predicate = Predicate::parse(arg)?;
        let pages = predicate.match_pages(self.doc)?;
        let groups = if pages.is_empty() {
            Vec::new()
        } else {
            vec![PageGroup::new(pages.clone(), pages.len() > 1, arg)]
        };
        Ok(ParsedArg {
            pages,
            label: pattern_description(arg),
            groups,
        })
    }

    /// Numeric forms: `N`, `A-B` (reverse and open ends allowed),
    /// `first K` / `last K`, and slices `start:stop:step`.
    ///
    /// Returns `Ok(None)` when the argument does not look numeric at all;
    /// numeric-looking arguments that fail to parse are errors naming the
    /// argument.
    fn try_numeric(&self, arg: &str) -> Result<Option<ParsedArg>> {
        let total = self.doc.page_count();

        if let Some(caps) = FIRST_LAST_RGX.captures(arg) {
            let n: usize = caps[2]
                .parse()
                .map_err(|_| SieveError::input(format!("invalid count in '{arg}'")))?;
            let count = n.min(total);
            let (pages, label): (Vec<usize>, String) =
                if caps[1].eq_ignore_ascii_case("first") {
                    ((1..=count).collect(), format!("first{n}"))
                } else {
                    ((total - count + 1..=total).collect(), format!("last{n}"))
                };
            let group = PageGroup::new(pages.clone(), true, arg);
            return Ok(Some(ParsedArg {
                pages,
                label,
                groups: vec![group],
            }));
        }

        if !NUMERIC_SHAPE_RGX.is_match(arg) {
            return Ok(None);
        }

        if arg.matches(':').count() >= 1 {
            return self.parse_slice(arg).map(Some);
        }

        if let Ok(page) = arg.parse::<usize>() {
            if page < 1 || page > total {
                return Err(SieveError::range(format!(
                    "page {page} out of range (1-{total})"
                )));
            }
            return Ok(Some(ParsedArg {
                pages: vec![page],
                label: page.to_string(),
                groups: vec![PageGroup::new(vec![page], false, arg)],
            }));
        }

        if let Some((start_str, end_str)) = arg.split_once('-') {
            let start: usize = if start_str.trim().is_empty() {
                1
            } else {
                start_str
                    .trim()
                    .parse()
                    .map_err(|_| SieveError::input(format!("invalid page number '{start_str}'")))?
            };
            let end: usize = if end_str.trim().is_empty() {
                total
            } else {
                end_str
                    .trim()
                    .parse()
                    .map_err(|_| SieveError::input(format!("invalid page number '{end_str}'")))?
            };

            // Ranges clip silently; reverse ranges emit descending pages.
            let (pages, descending) = if start <= end {
                let lo = start.max(1);
                let hi = end.min(total);
                ((lo..=hi).collect::<Vec<_>>(), false)
            } else {
                let hi = start.min(total);
                let lo = end.max(1);
                ((lo..=hi).rev().collect(), true)
            };

            let mut group = PageGroup::new(pages.clone(), true, arg);
            group.preserve_order = descending;
            return Ok(Some(ParsedArg {
                pages,
                label: format!("{start}-{end}"),
                groups: vec![group],
            }));
        }

        Err(SieveError::input(format!("unrecognized format '{arg}'")))
    }

    fn parse_slice(&self, arg: &str) -> Result<ParsedArg> {
        let total = self.doc.page_count();
        let parts: Vec<&str> = arg.split(':').collect();
        if parts.len() > 3 {
            return Err(SieveError::input(format!("invalid slice '{arg}'")));
        }

        let parse_part = |part: &str, default: usize| -> Result<usize> {
            let part = part.trim();
            if part.is_empty() {
                Ok(default)
            } else {
                part.parse()
                    .map_err(|_| SieveError::input(format!("invalid slice bound '{part}'")))
            }
        };

        let start = parse_part(parts[0], 1)?;
        let stop = parse_part(parts.get(1).copied().unwrap_or(""), total)?;
        let step = parse_part(parts.get(2).copied().unwrap_or(""), 1)?;
        if step == 0 {
            return Err(SieveError::range(format!("slice step cannot be 0 in '{arg}'")));
        }

        let pages: Vec<usize> = (start..=stop.min(total))
            .step_by(step)
            .filter(|&p| p >= 1)
            .collect();

        let label = if parts[0].trim().is_empty() && parts.get(1).is_none_or(|p| p.trim().is_empty())
        {
            match step {
                2 => "odd".to_string(),
                _ => format!("every-{step}"),
            }
        } else if step == 1 {
            format!("{start}-{stop}")
        } else {
            format!("{start}-{stop}-step{step}")
        };

        Ok(ParsedArg {
            pages: pages.clone(),
            label,
            groups: vec![PageGroup::new(pages, true, arg)],
        })
    }
}

/// Comma-separated arguments preserve order when any argument is not a
/// simple numeric spec, or when the numeric arguments are out of ascending
/// order.
fn should_preserve_order(arguments: &[String]) -> bool {
    if arguments.iter().any(|arg| !is_simple_numeric(arg.trim())) {
        return true;
    }

    let starts: Vec<usize> = arguments
        .iter()
        .filter_map(|arg| {
            let arg = arg.trim();
            if arg.chars().all(|c| c.is_ascii_digit()) {
                arg.parse().ok()
            } else if SIMPLE_RANGE_RGX.is_match(arg) {
                arg.split('-').next().and_then(|s| s.parse().ok())
            } else {
                None
            }
        })
        .collect();
    starts.len() >= 2 && starts.windows(2).any(|w| w[0] > w[1])
}

fn is_simple_numeric(arg: &str) -> bool {
    arg.chars().all(|c| c.is_ascii_digit()) && !arg.is_empty()
        || SIMPLE_RANGE_RGX.is_match(arg)
        || matches!(
            arg.to_ascii_lowercase().as_str(),
            "all" | "odd" | "even"
        )
        || FIRST_LAST_RGX.is_match(arg)
}

/// Join per-argument labels; long multi-argument labels collapse to a
/// `min-max-selected` summary.
fn join_labels(labels: &[String], pages: &BTreeSet<usize>) -> String {
    if labels.len() == 1 {
        return labels[0].clone();
    }
    let joined = labels.join(",");
    if joined.len() > 20 {
        match (pages.first(), pages.last()) {
            (Some(min), Some(max)) => format!("{min}-{max}-selected"),
            _ => joined,
        }
    } else {
        joined
    }
}

/// Filename-ready description derived from the raw label.
fn format_description(label: &str) -> String {
    let keyworded = ["odd", "even", "every", "first", "last", "selected", "all"]
        .iter()
        .any(|k| label.contains(k));
    if keyworded {
        label.to_string()
    } else if NUMERIC_LABEL_RGX.is_match(label) {
        if label.contains(',') || label.contains('-') {
            format!("pages{label}")
        } else {
            format!("page{label}")
        }
    } else {
        label.to_string()
    }
}

/// Filename-safe description of a single pattern argument.
fn pattern_description(arg: &str) -> String {
    if arg.len() > 15 {
        return "pattern-match".to_string();
    }
    let safe = NON_LABEL_CHARS_RGX.replace_all(arg, "-");
    safe.chars().take(15).collect()
}

/// Filename-safe description of a boolean argument.
fn boolean_description(arg: &str) -> String {
    if arg.len() > 20 {
        return "boolean-match".to_string();
    }
    let replaced = arg
        .replace(" & ", "-and-")
        .replace(" | ", "-or-")
        .replace('!', "not-");
    let safe = NON_LABEL_CHARS_RGX.replace_all(&replaced, "-");
    safe.chars().take(20).collect()
}
