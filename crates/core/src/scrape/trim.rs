//! Start/end trimmers applied to scraped values.
//!
//! A trimmer block is a concatenation of `(ch|wd|ln|nb)N` operations with
//! `N >= 1`. Start trimmers run first in list order, then end trimmers;
//! a trim that exceeds the content leaves the empty string.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SieveError};

static TRIMMER_OP_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(wd|ln|nb|ch)(\d{1,3})").unwrap());
static NUMBER_TOKEN_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());

/// What a single trim operation removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    Chars,
    Words,
    Lines,
    Numbers,
}

/// One trim operation: remove `count` units from one boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trim {
    pub kind: TrimKind,
    pub count: usize,
}

/// Parse a trimmer block like `wd1ch5nb2`.
pub fn parse_trimmer_block(block: &str) -> Result<Vec<Trim>> {
    if block.is_empty() {
        return Ok(Vec::new());
    }

    let mut trims = Vec::new();
    let mut matched_len = 0;
    for caps in TRIMMER_OP_RGX.captures_iter(block) {
        let whole = caps.get(0).unwrap();
        matched_len += whole.len();
        let kind = match &caps[1] {
            "ch" => TrimKind::Chars,
            "wd" => TrimKind::Words,
            "ln" => TrimKind::Lines,
            _ => TrimKind::Numbers,
        };
        let count: usize = caps[2]
            .parse()
            .map_err(|_| SieveError::input(format!("invalid trimmer count in '{block}'")))?;
        if count == 0 {
            return Err(SieveError::input(format!(
                "trimmer count cannot be zero: {}0",
                &caps[1]
            )));
        }
        trims.push(Trim { kind, count });
    }

    if trims.is_empty() || matched_len != block.len() {
        return Err(SieveError::input(format!(
            "invalid trimmer block '{block}'"
        )));
    }
    Ok(trims)
}

/// Apply start trimmers, then end trimmers, in list order.
pub fn apply_trimmers(content: &str, start: &[Trim], end: &[Trim]) -> String {
    let mut result = content.to_string();
    for trim in start {
        result = apply_single(&result, *trim, true);
        if result.is_empty() {
            return result;
        }
    }
    for trim in end {
        result = apply_single(&result, *trim, false);
        if result.is_empty() {
            return result;
        }
    }
    result
}

fn apply_single(content: &str, trim: Trim, from_start: bool) -> String {
    match trim.kind {
        TrimKind::Chars => trim_chars(content, trim.count, from_start),
        TrimKind::Words => trim_split_units(content, trim.count, from_start, " "),
        TrimKind::Lines => trim_split_units(content, trim.count, from_start, "\n"),
        TrimKind::Numbers => trim_numbers(content, trim.count, from_start),
    }
}

fn trim_chars(content: &str, count: usize, from_start: bool) -> String {
    let chars: Vec<char> = content.chars().collect();
    if count >= chars.len() {
        return String::new();
    }
    if from_start {
        chars[count..].iter().collect()
    } else {
        chars[..chars.len() - count].iter().collect()
    }
}

fn trim_split_units(content: &str, count: usize, from_start: bool, joiner: &str) -> String {
    let units: Vec<&str> = if joiner == " " {
        content.split_whitespace().collect()
    } else {
        content.split('\n').collect()
    };
    if count >= units.len() {
        return String::new();
    }
    let kept = if from_start {
        &units[count..]
    } else {
        &units[..units.len() - count]
    };
    kept.join(joiner)
}

/// Numeric-token trims cut at the Nth token: from the start, everything up
/// to and including the Nth number goes; from the end, everything from the
/// Nth-from-last number onward goes.
fn trim_numbers(content: &str, count: usize, from_start: bool) -> String {
    let matches: Vec<(usize, usize)> = NUMBER_TOKEN_RGX
        .find_iter(content)
        .map(|m| (m.start(), m.end()))
        .collect();
    if count > matches.len() {
        return String::new();
    }
    if from_start {
        content[matches[count - 1].1..].to_string()
    } else {
        content[..matches[matches.len() - count].0].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_block() {
        let trims = parse_trimmer_block("wd1ch5nb2").unwrap();
        assert_eq!(
            trims,
            vec![
                Trim { kind: TrimKind::Words, count: 1 },
                Trim { kind: TrimKind::Chars, count: 5 },
                Trim { kind: TrimKind::Numbers, count: 2 },
            ]
        );
    }

    #[test]
    fn parse_rejects_zero_counts_and_junk() {
        assert!(parse_trimmer_block("ch0").is_err());
        assert!(parse_trimmer_block("xy3").is_err());
        assert!(parse_trimmer_block("wd1junk").is_err());
    }

    #[test]
    fn char_trims() {
        assert_eq!(apply_trimmers("CompanyNameACME", &[Trim { kind: TrimKind::Chars, count: 11 }], &[]), "ACME");
        assert_eq!(
            apply_trimmers("ACMECorp", &[], &[Trim { kind: TrimKind::Chars, count: 4 }]),
            "ACME"
        );
    }

    #[test]
    fn word_trims_both_ends() {
        let start = [Trim { kind: TrimKind::Words, count: 1 }];
        let end = [Trim { kind: TrimKind::Words, count: 1 }];
        assert_eq!(apply_trimmers("OLD 2024 001 TEMP", &start, &end), "2024 001");
    }

    #[test]
    fn line_trims() {
        let content = "header\nbody one\nbody two\nfooter";
        let start = [Trim { kind: TrimKind::Lines, count: 1 }];
        let end = [Trim { kind: TrimKind::Lines, count: 1 }];
        assert_eq!(apply_trimmers(content, &start, &end), "body one\nbody two");
    }

    #[test]
    fn number_trims_cut_at_token_boundaries() {
        let content = "ref 12 code 34 end";
        assert_eq!(
            apply_trimmers(content, &[Trim { kind: TrimKind::Numbers, count: 1 }], &[]),
            " code 34 end"
        );
        assert_eq!(
            apply_trimmers(content, &[], &[Trim { kind: TrimKind::Numbers, count: 1 }]),
            "ref 12 code "
        );
    }

    #[test]
    fn over_trim_yields_empty() {
        assert_eq!(
            apply_trimmers("ab", &[Trim { kind: TrimKind::Chars, count: 5 }], &[]),
            ""
        );
        assert_eq!(
            apply_trimmers("one two", &[Trim { kind: TrimKind::Words, count: 2 }], &[]),
            ""
        );
    }
}
