//! Filename and variable-name sanitization for scraped content.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default clamp for filename components.
pub const MAX_COMPONENT_LEN: usize = 50;
/// Clamp used for template substitutions.
pub const MAX_TEMPLATE_VALUE_LEN: usize = 40;
/// Clamp for derived variable names.
pub const MAX_VARIABLE_LEN: usize = 20;

static MONETARY_RGX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\$£€¥]?[\d,]+\.?\d*$").unwrap());
static CURRENCY_CHARS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\$£€¥,]").unwrap());
static UNSAFE_CHARS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static NON_FILENAME_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w.\-]").unwrap());
static DASH_RUNS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static NON_WORD_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static UNDERSCORE_RUNS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Make a scraped value safe to embed in a filename.
///
/// Monetary-looking values (`$1,250.00`) drop currency punctuation and
/// turn decimal points into dashes; everything else maps reserved and
/// punctuation characters (whitespace included) to dashes. Dash runs
/// collapse, leading/trailing dashes and dots are trimmed, and the result
/// is clamped to `max_length`. Idempotent.
pub fn sanitize_filename(text: &str, max_length: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    let clean = if MONETARY_RGX.is_match(trimmed) {
        let no_currency = CURRENCY_CHARS_RGX.replace_all(trimmed, "");
        no_currency.replace('.', "-")
    } else {
        let no_reserved = UNSAFE_CHARS_RGX.replace_all(trimmed, "-");
        NON_FILENAME_RGX.replace_all(&no_reserved, "-").into_owned()
    };

    let collapsed = DASH_RUNS_RGX.replace_all(&clean, "-");
    let mut result: String = collapsed.trim_matches(['-', '.']).to_string();

    if result.len() > max_length {
        result = truncate_at_char_boundary(&result, max_length)
            .trim_end_matches(['-', '.'])
            .to_string();
    }

    if result.is_empty() {
        "unknown".to_string()
    } else {
        result
    }
}

/// Derive a template variable name from a scrape keyword.
///
/// Lowercases, strips punctuation, folds whitespace to underscores, and
/// truncates at word boundaries; a leading digit gets a `var_` prefix.
pub fn sanitize_variable_name(text: &str, max_length: usize) -> String {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return "unknown".to_string();
    }

    let no_punct = NON_WORD_RGX.replace_all(&lowered, "");
    let underscored = WHITESPACE_RGX.replace_all(no_punct.trim(), "_");
    let collapsed = UNDERSCORE_RUNS_RGX.replace_all(&underscored, "_");
    let mut clean = collapsed.trim_matches('_').to_string();

    if clean.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        clean = format!("var_{clean}");
    }

    if clean.len() > max_length {
        let mut truncated = String::new();
        for part in clean.split('_') {
            let candidate_len = if truncated.is_empty() {
                part.len()
            } else {
                truncated.len() + 1 + part.len()
            };
            if candidate_len > max_length {
                break;
            }
            if !truncated.is_empty() {
                truncated.push('_');
            }
            truncated.push_str(part);
        }
        clean = if truncated.is_empty() {
            truncate_at_char_boundary(&clean, max_length)
                .trim_end_matches('_')
                .to_string()
        } else {
            truncated
        };
    }

    if clean.is_empty() {
        "unknown".to_string()
    } else {
        clean
    }
}

/// True when `name` is a conventional identifier (letters, digits,
/// underscores, not starting with a digit).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn truncate_at_char_boundary(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_text_maps_to_dashes() {
        assert_eq!(sanitize_filename("ACME Corp & Co.", 50), "ACME-Corp-Co");
        assert_eq!(sanitize_filename("INV-2024/001", 50), "INV-2024-001");
        assert_eq!(sanitize_filename("a  b", 50), "a-b");
    }

    #[test]
    fn monetary_values_keep_digits() {
        assert_eq!(sanitize_filename("$1,250.00", 50), "1250-00");
        assert_eq!(sanitize_filename("1,000", 50), "1000");
    }

    #[test]
    fn trims_and_clamps() {
        assert_eq!(sanitize_filename("--hello--", 50), "hello");
        assert_eq!(sanitize_filename("...", 50), "unknown");
        let long = "x".repeat(80);
        assert_eq!(sanitize_filename(&long, 50).len(), 50);
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["ACME Corp & Co.", "$1,250.00", "a/b\\c", "  spaced out  "] {
            let once = sanitize_filename(input, 40);
            assert_eq!(sanitize_filename(&once, 40), once);
        }
    }

    #[test]
    fn variable_names_from_keywords() {
        assert_eq!(sanitize_variable_name("Invoice Number", 20), "invoice_number");
        assert_eq!(sanitize_variable_name("PO#", 20), "po");
        assert_eq!(
            sanitize_variable_name("Company Name Ltd.", 20),
            "company_name_ltd"
        );
        assert_eq!(sanitize_variable_name("2024 Totals", 20), "var_2024_totals");
    }

    #[test]
    fn variable_names_truncate_at_word_boundaries() {
        assert_eq!(
            sanitize_variable_name("very long keyword name here", 15),
            "very_long"
        );
    }

    #[test]
    fn identifier_check() {
        assert!(is_identifier("invoice"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
