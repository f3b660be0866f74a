//! Scrape-pattern evaluation: locate a keyword, walk movements, extract.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::analyzer::AnalyzerCache;
use crate::error::Result;
use crate::scrape::pattern::{Direction, ExtractType, Movement, ScrapePattern};
use crate::scrape::sanitize::{MAX_COMPONENT_LEN, sanitize_filename};
use crate::scrape::trim::apply_trimmers;

/// Strict signed-decimal number shape used by `nb` extraction.
static STRICT_NUMBER_RGX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)*").unwrap());
/// Flexible mode accepts any digit-bearing run.
static FLEXIBLE_NUMBER_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d.,]+").unwrap());
static NON_NUMERIC_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.\-]").unwrap());
static DASH_RUNS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Scraped variables in pattern order; `None` marks a failed extraction.
pub type ScrapedVars = IndexMap<String, Option<String>>;

/// Position inside a page text: a line index plus a word index within it.
#[derive(Debug, Clone, Copy)]
struct TextPos {
    line: usize,
    word: usize,
}

/// Evaluates scrape patterns against a document.
pub struct ScrapeEngine {
    source_page: usize,
}

impl ScrapeEngine {
    /// `source_page` is the page extractions target when a pattern has no
    /// `pg` spec (1-indexed).
    pub fn new(source_page: usize) -> Self {
        Self { source_page }
    }

    /// Run every pattern, producing a variable map in pattern order.
    pub fn scrape(
        &self,
        patterns: &[ScrapePattern],
        doc: &AnalyzerCache<'_>,
    ) -> Result<ScrapedVars> {
        let mut vars = ScrapedVars::new();
        for pattern in patterns {
            let value = self.scrape_one(pattern, doc)?;
            if value.is_none() {
                warn!(
                    variable = pattern.variable.as_str(),
                    pattern = pattern.source.as_str(),
                    "pattern extracted nothing"
                );
            }
            vars.insert(pattern.variable.clone(), value);
        }
        Ok(vars)
    }

    fn scrape_one(
        &self,
        pattern: &ScrapePattern,
        doc: &AnalyzerCache<'_>,
    ) -> Result<Option<String>> {
        let total = doc.page_count();
        let pages: Vec<usize> = match &pattern.page_spec {
            Some(spec) => spec.select(total),
            None => {
                if self.source_page >= 1 && self.source_page <= total {
                    vec![self.source_page]
                } else {
                    Vec::new()
                }
            }
        };

        let mut values = Vec::new();
        for page in pages {
            let analysis = doc.analyze(page)?;
            values.extend(extract_all(&analysis.text, pattern));
        }

        if values.is_empty() {
            return Ok(None);
        }
        let joined = values.join(" ");
        Ok(Some(sanitize_value(&joined, pattern.extract_type)))
    }
}

/// Run one pattern against one page text, without sanitization. Used by
/// the engine and directly by tests.
pub fn extract_from_text(text: &str, pattern: &ScrapePattern) -> Option<String> {
    let values = extract_all(text, pattern);
    if values.is_empty() {
        None
    } else {
        Some(values.join(" "))
    }
}

/// Every extraction the pattern's `mt` spec asks for (first occurrence
/// only when there is no `mt` spec), trimmed but not yet sanitized.
fn extract_all(text: &str, pattern: &ScrapePattern) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();

    let occurrences = match &pattern.match_spec {
        None => locate_keyword(&lines, &pattern.keyword)
            .into_iter()
            .collect::<Vec<_>>(),
        Some(spec) => {
            let all = locate_all_keywords(&lines, &pattern.keyword);
            spec.select(all.len())
                .into_iter()
                .map(|i| all[i - 1])
                .collect()
        }
    };

    let mut values = Vec::new();
    for origin in occurrences {
        let Some(pos) = walk_movements(&lines, origin, &pattern.movements) else {
            continue;
        };
        let Some(raw) = extract_at(&lines, pos, pattern) else {
            continue;
        };
        let trimmed = apply_trimmers(&raw, &pattern.start_trims, &pattern.end_trims);
        values.push(trimmed);
    }
    values
}

/// Case-insensitive regex for a literal keyword.
fn keyword_rgx(keyword: &str) -> Regex {
    Regex::new(&format!("(?i){}", regex::escape(keyword))).expect("escaped literal")
}

/// First occurrence of the keyword: its line, and the word containing the
/// keyword's last character.
fn locate_keyword(lines: &[&str], keyword: &str) -> Option<TextPos> {
    let rgx = keyword_rgx(keyword);
    for (line_idx, line) in lines.iter().enumerate() {
        if let Some(m) = rgx.find(line) {
            return Some(TextPos {
                line: line_idx,
                word: word_at_end(line, m.end()),
            });
        }
    }
    None
}

/// All occurrences, line by line, left to right.
fn locate_all_keywords(lines: &[&str], keyword: &str) -> Vec<TextPos> {
    let rgx = keyword_rgx(keyword);
    let mut positions = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for m in rgx.find_iter(line) {
            positions.push(TextPos {
                line: line_idx,
                word: word_at_end(line, m.end()),
            });
        }
    }
    positions
}

/// Byte spans of whitespace-separated words.
fn word_spans(line: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len()));
    }
    spans
}

/// Index of the word containing byte offset `end` (the position right
/// after the keyword's last character); the last word when the offset is
/// beyond every word.
fn word_at_end(line: &str, end: usize) -> usize {
    let spans = word_spans(line);
    for (idx, &(_, word_end)) in spans.iter().enumerate() {
        if end <= word_end {
            return idx;
        }
    }
    spans.len().saturating_sub(1)
}

/// Apply movements in order. `u`/`d` change lines and reset the word
/// index; `l`/`r` move within the current line. Any step that leaves the
/// document aborts the extraction.
fn walk_movements(lines: &[&str], origin: TextPos, movements: &[Movement]) -> Option<TextPos> {
    let mut pos = origin;
    for movement in movements {
        pos = match movement.direction {
            Direction::Left => {
                let word = pos.word.checked_sub(movement.distance)?;
                TextPos { word, ..pos }
            }
            Direction::Right => {
                let word = pos.word + movement.distance;
                if word >= word_spans(lines[pos.line]).len() {
                    return None;
                }
                TextPos { word, ..pos }
            }
            Direction::Up => {
                let line = pos.line.checked_sub(movement.distance)?;
                TextPos { line, word: 0 }
            }
            Direction::Down => {
                let line = pos.line + movement.distance;
                if line >= lines.len() {
                    return None;
                }
                TextPos { line, word: 0 }
            }
        };
    }
    Some(pos)
}

fn extract_at(lines: &[&str], pos: TextPos, pattern: &ScrapePattern) -> Option<String> {
    let line = lines.get(pos.line)?;
    if line.trim().is_empty() {
        return None;
    }
    let words: Vec<&str> = line.split_whitespace().collect();

    match pattern.extract_type {
        ExtractType::Lines => extract_lines(lines, pos.line, pattern.extract_count, pattern.flexible),
        ExtractType::Words => {
            extract_words(&words, pos.word, pattern.extract_count)
        }
        ExtractType::Numbers => {
            extract_numbers(&words, pos.word, pattern.extract_count, pattern.flexible)
        }
    }
}

/// `ln N`: this line plus the next N-1; `ln 0`: the rest of the document.
/// Flexible mode joins everything with single spaces.
fn extract_lines(lines: &[&str], start: usize, count: usize, flexible: bool) -> Option<String> {
    let end = if count == 0 {
        lines.len()
    } else {
        (start + count).min(lines.len())
    };
    let selected = &lines[start..end];

    let result = if flexible {
        selected
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        selected.join("\n")
    };

    if result.is_empty() { None } else { Some(result) }
}

/// `wd N`: the next N words of the line; `wd 0`: the rest of the line.
fn extract_words(words: &[&str], word_idx: usize, count: usize) -> Option<String> {
    if word_idx >= words.len() {
        return None;
    }
    let end = if count == 0 {
        words.len()
    } else {
        (word_idx + count).min(words.len())
    };
    let selected = &words[word_idx..end];
    if selected.is_empty() {
        None
    } else {
        Some(selected.join(" "))
    }
}

/// `nb N`: the next N digit-bearing tokens reading forward; `nb 0`: keep
/// consuming while tokens stay numeric.
fn extract_numbers(words: &[&str], word_idx: usize, count: usize, flexible: bool) -> Option<String> {
    if word_idx >= words.len() {
        return None;
    }
    let rgx: &Regex = if flexible {
        &FLEXIBLE_NUMBER_RGX
    } else {
        &STRICT_NUMBER_RGX
    };

    let mut found: Vec<String> = Vec::new();
    for word in &words[word_idx..] {
        match rgx.find(word) {
            Some(m) => {
                found.push(m.as_str().to_string());
                if count > 0 && found.len() >= count {
                    break;
                }
            }
            None => {
                if count == 0 {
                    break;
                }
            }
        }
    }

    if found.is_empty() {
        None
    } else {
        Some(found.join(" "))
    }
}

/// Numeric extractions keep digits, dots, and dashes; everything else goes
/// through the general filename sanitizer.
fn sanitize_value(content: &str, extract_type: ExtractType) -> String {
    match extract_type {
        ExtractType::Numbers => {
            let clean = NON_NUMERIC_RGX.replace_all(content.trim(), "-");
            let collapsed = DASH_RUNS_RGX.replace_all(&clean, "-");
            let result = collapsed.trim_matches('-').to_string();
            if result.is_empty() {
                "unknown".to_string()
            } else {
                result
            }
        }
        _ => sanitize_filename(content, MAX_COMPONENT_LEN),
    }
}
