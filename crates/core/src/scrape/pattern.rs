//! The compact scrape-pattern mini-language.
//!
//! Syntax: `[VAR=]KEYWORD:[MOVE][MOVE]TYPE COUNT[-][^TRIMS][$TRIMS][pgRANGE][mtRANGE]`
//!
//! * `MOVE` - `[udlr]` + distance 1-99; at most two, of non-conflicting
//!   directions (no `u`+`d`, no `l`+`r`).
//! * `TYPE COUNT` - `wd`/`ln`/`nb` + 0-99; 0 means "until end".
//! * `-` - flexible mode (format-tolerant extraction).
//! * `^BLOCK` / `$BLOCK` - start/end trimmer blocks, `(wd|ln|nb|ch)N`.
//! * `pg` / `mt` - page and keyword-match iteration specs, each one of
//!   `N`, `A-B`, `A-`, `-K`, or `0` (all).

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

use crate::error::{Result, SieveError};
use crate::scrape::sanitize::{MAX_VARIABLE_LEN, is_identifier, sanitize_variable_name};
use crate::scrape::trim::{Trim, parse_trimmer_block};

static COMPACT_RGX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        ([udlr]\d{1,2})?            # first movement
        ([udlr]\d{1,2})?            # second movement
        (wd|ln|nb)(\d{1,2})         # extraction type and count
        (-?)                        # flexible marker
        (\^(?:(?:wd|ln|nb|ch)\d{1,3})+)?    # start trimmers
        (\$(?:(?:wd|ln|nb|ch)\d{1,3})+)?    # end trimmers
        (pg(?:\d{1,3}-\d{1,3}|\d{1,3}-|-\d{1,3}|\d{1,3}))?   # page spec
        (mt(?:\d{1,3}-\d{1,3}|\d{1,3}-|-\d{1,3}|\d{1,3}))?   # match spec
        $",
    )
    .unwrap()
});

/// Movement direction within the page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// One movement step: direction plus distance in lines or words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub direction: Direction,
    pub distance: usize,
}

/// What gets extracted at the final position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractType {
    Words,
    Lines,
    Numbers,
}

/// Which pages (`pg`) or keyword matches (`mt`) an extraction iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterSpec {
    All,
    Single(usize),
    Range(usize, usize),
    From(usize),
    Last(usize),
}

impl IterSpec {
    fn parse(text: &str) -> Result<Self> {
        if text == "0" {
            return Ok(IterSpec::All);
        }
        if let Some(rest) = text.strip_prefix('-') {
            let k = parse_count(rest)?;
            return Ok(IterSpec::Last(k));
        }
        if let Some((a, b)) = text.split_once('-') {
            if b.is_empty() {
                return Ok(IterSpec::From(parse_count(a)?));
            }
            let (a, b) = (parse_count(a)?, parse_count(b)?);
            if a > b {
                return Err(SieveError::range(format!(
                    "reversed iteration range {a}-{b}"
                )));
            }
            return Ok(IterSpec::Range(a, b));
        }
        Ok(IterSpec::Single(parse_count(text)?))
    }

    /// Select 1-indexed positions out of `len` candidates.
    pub fn select(&self, len: usize) -> Vec<usize> {
        match *self {
            IterSpec::All => (1..=len).collect(),
            IterSpec::Single(n) => {
                if n >= 1 && n <= len {
                    vec![n]
                } else {
                    Vec::new()
                }
            }
            IterSpec::Range(a, b) => (a.max(1)..=b.min(len)).collect(),
            IterSpec::From(a) => (a.max(1)..=len).collect(),
            IterSpec::Last(k) => {
                let start = len.saturating_sub(k) + 1;
                (start..=len).collect()
            }
        }
    }
}

fn parse_count(s: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| SieveError::input(format!("invalid number '{s}' in iteration spec")))
}

/// A fully parsed scrape pattern.
#[derive(Debug, Clone)]
pub struct ScrapePattern {
    pub variable: String,
    pub keyword: String,
    pub movements: SmallVec<[Movement; 2]>,
    pub extract_type: ExtractType,
    pub extract_count: usize,
    pub flexible: bool,
    pub start_trims: Vec<Trim>,
    pub end_trims: Vec<Trim>,
    pub page_spec: Option<IterSpec>,
    pub match_spec: Option<IterSpec>,
    pub source: String,
}

impl ScrapePattern {
    /// Parse one pattern string like `invoice=Invoice Number:r1wd1`.
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();

        let (variable, body) = match pattern.split_once('=') {
            Some((var, rest)) => {
                let var = var.trim();
                if !is_identifier(var) {
                    return Err(SieveError::input(format!(
                        "invalid variable name '{var}' in pattern '{pattern}'"
                    )));
                }
                (Some(var.to_string()), rest)
            }
            None => (None, pattern),
        };

        let (keyword, spec) = body.rsplit_once(':').ok_or_else(|| {
            SieveError::input(format!(
                "pattern '{pattern}' must contain ':' between keyword and spec"
            ))
        })?;
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(SieveError::input(format!(
                "empty keyword in pattern '{pattern}'"
            )));
        }

        let caps = COMPACT_RGX.captures(spec.trim()).ok_or_else(|| {
            SieveError::input(format!(
                "invalid extraction spec '{}' in pattern '{pattern}'",
                spec.trim()
            ))
        })?;

        let mut movements: SmallVec<[Movement; 2]> = SmallVec::new();
        for idx in [1, 2] {
            if let Some(m) = caps.get(idx) {
                movements.push(parse_movement(m.as_str())?);
            }
        }
        validate_directions(&movements)?;

        let extract_type = match &caps[3] {
            "wd" => ExtractType::Words,
            "ln" => ExtractType::Lines,
            _ => ExtractType::Numbers,
        };
        let extract_count: usize = caps[4]
            .parse()
            .map_err(|_| SieveError::input(format!("invalid extraction count in '{pattern}'")))?;
        let flexible = !caps[5].is_empty();

        let start_trims = match caps.get(6) {
            Some(block) => parse_trimmer_block(&block.as_str()[1..])?,
            None => Vec::new(),
        };
        let end_trims = match caps.get(7) {
            Some(block) => parse_trimmer_block(&block.as_str()[1..])?,
            None => Vec::new(),
        };

        let page_spec = caps
            .get(8)
            .map(|m| IterSpec::parse(&m.as_str()[2..]))
            .transpose()?;
        let match_spec = caps
            .get(9)
            .map(|m| IterSpec::parse(&m.as_str()[2..]))
            .transpose()?;

        let variable =
            variable.unwrap_or_else(|| sanitize_variable_name(keyword, MAX_VARIABLE_LEN));

        Ok(Self {
            variable,
            keyword: keyword.to_string(),
            movements,
            extract_type,
            extract_count,
            flexible,
            start_trims,
            end_trims,
            page_spec,
            match_spec,
            source: pattern.to_string(),
        })
    }
}

fn parse_movement(text: &str) -> Result<Movement> {
    let direction = match text.as_bytes()[0] {
        b'u' => Direction::Up,
        b'd' => Direction::Down,
        b'l' => Direction::Left,
        _ => Direction::Right,
    };
    let distance: usize = text[1..]
        .parse()
        .map_err(|_| SieveError::input(format!("invalid movement '{text}'")))?;
    if !(1..=99).contains(&distance) {
        return Err(SieveError::input(format!(
            "movement distance must be 1-99: {text}"
        )));
    }
    Ok(Movement {
        direction,
        distance,
    })
}

fn validate_directions(movements: &[Movement]) -> Result<()> {
    let has = |d: Direction| movements.iter().any(|m| m.direction == d);
    if has(Direction::Up) && has(Direction::Down) {
        return Err(SieveError::input(
            "conflicting directions: cannot move both up and down",
        ));
    }
    if has(Direction::Left) && has(Direction::Right) {
        return Err(SieveError::input(
            "conflicting directions: cannot move both left and right",
        ));
    }
    Ok(())
}

/// Parse a whole pattern set, refusing duplicate variable names.
pub fn parse_pattern_set(patterns: &[String]) -> Result<Vec<ScrapePattern>> {
    let mut parsed = Vec::with_capacity(patterns.len());
    let mut names: Vec<String> = Vec::new();

    for (i, raw) in patterns.iter().enumerate() {
        let pattern = ScrapePattern::parse(raw)
            .map_err(|e| SieveError::input(format!("pattern {}: {e}", i + 1)))?;
        if names.contains(&pattern.variable) {
            return Err(SieveError::input(format!(
                "duplicate variable name '{}' in pattern {}",
                pattern.variable,
                i + 1
            )));
        }
        names.push(pattern.variable.clone());
        parsed.push(pattern);
    }
    Ok(parsed)
}
