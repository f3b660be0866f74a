//! `file:PATH` selector expansion.
//!
//! A `file:` token is replaced by the contents of the named file, one page
//! spec per line, joined with commas so the result re-enters the normal
//! comma-separated parse. Blank lines and `#` comments are ignored; lines
//! that do not look like any valid spec are skipped with a warning.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{Result, SieveError};
use crate::select::boolean::looks_like_boolean;
use crate::select::lexer::strip_matching_quotes;
use crate::select::pattern::looks_like_predicate;
use crate::select::range::looks_like_range_pattern;

static NUMERIC_SPEC_RGX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ix)^(?:
        \d+ (?:-\d*)? | -\d+ |              # single page, range, open range
        (?:first|last)[\s-]?\d+ |           # first/last N
        \d*:\d*(?::\d+)? |                  # slices
        [\d,\-:\s]+                         # comma-joined numerics
    )$")
    .unwrap()
});

/// True when a pattern-file line looks like something the selector parser
/// could accept.
pub fn looks_like_page_spec(line: &str) -> bool {
    let line = strip_matching_quotes(line);
    if line.is_empty() {
        return false;
    }
    let lower = line.to_ascii_lowercase();
    matches!(lower.as_str(), "all" | "odd" | "even")
        || looks_like_predicate(line)
        || looks_like_range_pattern(line)
        || looks_like_boolean(line)
        || NUMERIC_SPEC_RGX.is_match(&lower)
}

/// Expands `file:` tokens, caching file contents per invocation.
pub struct FileSelector {
    base: PathBuf,
    cache: RefCell<FxHashMap<PathBuf, Vec<String>>>,
}

impl FileSelector {
    /// `base` is the directory relative paths resolve against - the source
    /// PDF's directory when available, otherwise the working directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Replace every unquoted `file:PATH` token with the comma-joined
    /// specs loaded from PATH. Idempotent on inputs without `file:`.
    pub fn expand(&self, selector: &str) -> Result<String> {
        if !selector.contains("file:") {
            return Ok(selector.to_string());
        }

        let mut result = String::new();
        let mut rest = selector;
        while let Some(found) = find_unquoted_file_token(rest) {
            let (before, path_str, after) = found;
            result.push_str(before);

            let specs = self.load_specs(&self.resolve(path_str))?;
            result.push_str(&specs.join(","));
            rest = after;
        }
        result.push_str(rest);

        if result != selector {
            debug!(original = selector, expanded = %result, "expanded file selectors");
        }
        Ok(result)
    }

    fn resolve(&self, path_str: &str) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }

    fn load_specs(&self, path: &Path) -> Result<Vec<String>> {
        if let Some(hit) = self.cache.borrow().get(path) {
            return Ok(hit.clone());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| SieveError::io(path, e))?;

        let mut specs = Vec::new();
        for (line_no, raw) in content.lines().enumerate() {
            let line = match raw.find('#') {
                Some(pos) => raw[..pos].trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }
            if looks_like_page_spec(line) {
                specs.push(line.to_string());
            } else {
                warn!(
                    file = %path.display(),
                    line = line_no + 1,
                    spec = line,
                    "skipping invalid page spec"
                );
            }
        }

        if specs.is_empty() {
            return Err(SieveError::input(format!(
                "no valid page specifications found in {}",
                path.display()
            )));
        }

        self.cache
            .borrow_mut()
            .insert(path.to_path_buf(), specs.clone());
        Ok(specs)
    }
}

/// Locate the next `file:` token outside quotes. Returns the text before
/// it, the path, and the text after the path.
fn find_unquoted_file_token(s: &str) -> Option<(&str, &str, &str)> {
    let mut quote: Option<char> = None;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if s[i..].starts_with("file:") {
                    let path_start = i + 5;
                    let path_len = s[path_start..]
                        .find(|c: char| c.is_whitespace() || c == ',')
                        .unwrap_or(s.len() - path_start);
                    let path = &s[path_start..path_start + path_len];
                    return Some((&s[..i], path, &s[path_start + path_len..]));
                }
            }
        }
    }
    None
}
