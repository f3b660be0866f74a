//! Filename templates: literal text interleaved with `{name|fallback}`
//! placeholders.
//!
//! NAME must be a conventional identifier; FALLBACK is literal text that
//! may not contain braces. Built-in variables: `range`, `original_name`,
//! `page_count`; user variables shadow built-ins. A placeholder with no
//! value and no fallback substitutes the visible sentinel `NO-<NAME>`.

use std::collections::BTreeMap;

use crate::error::{Result, SieveError};
use crate::scrape::ScrapedVars;
use crate::scrape::sanitize::{MAX_TEMPLATE_VALUE_LEN, is_identifier, sanitize_filename};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Literal(String),
    Placeholder {
        name: String,
        fallback: Option<String>,
    },
}

/// A parsed filename template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
    source: String,
}

impl Template {
    pub fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(SieveError::input("template must be a non-empty string"));
        }
        if template.contains("{{") || template.contains("}}") {
            return Err(SieveError::input(
                "nested braces are not supported in templates",
            ));
        }

        let mut nodes = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !literal.is_empty() {
                        nodes.push(Node::Literal(std::mem::take(&mut literal)));
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(SieveError::input(format!(
                                    "unbalanced braces in template '{template}'"
                                )));
                            }
                            c => inner.push(c),
                        }
                    }
                    if !closed {
                        return Err(SieveError::input(format!(
                            "unbalanced braces in template '{template}'"
                        )));
                    }
                    nodes.push(parse_placeholder(&inner, template)?);
                }
                '}' => {
                    return Err(SieveError::input(format!(
                        "unbalanced braces in template '{template}'"
                    )));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            nodes.push(Node::Literal(literal));
        }

        Ok(Self {
            nodes,
            source: template.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of every placeholder in the template.
    pub fn required_variables(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Placeholder { name, .. } => Some(name.as_str()),
                Node::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute variables and built-ins, sanitizing each substituted
    /// value independently, and append `.pdf` when missing.
    pub fn render(&self, vars: &ScrapedVars, built_ins: &BTreeMap<&str, String>) -> String {
        let mut result = String::new();
        for node in &self.nodes {
            match node {
                Node::Literal(text) => result.push_str(text),
                Node::Placeholder { name, fallback } => {
                    let user_value = vars.get(name.as_str()).and_then(|v| v.clone());
                    let value = user_value
                        .or_else(|| built_ins.get(name.as_str()).cloned())
                        .or_else(|| fallback.clone())
                        .unwrap_or_else(|| format!("NO-{}", name.to_uppercase()));
                    result.push_str(&sanitize_filename(&value, MAX_TEMPLATE_VALUE_LEN));
                }
            }
        }
        if !result.to_ascii_lowercase().ends_with(".pdf") {
            result.push_str(".pdf");
        }
        result
    }
}

fn parse_placeholder(inner: &str, template: &str) -> Result<Node> {
    let (name, fallback) = match inner.split_once('|') {
        Some((name, fallback)) => (name.trim(), Some(fallback.to_string())),
        None => (inner.trim(), None),
    };
    if name.is_empty() {
        return Err(SieveError::input(format!(
            "empty variable name in template '{template}'"
        )));
    }
    if !is_identifier(name) {
        return Err(SieveError::input(format!(
            "invalid template variable name '{name}'"
        )));
    }
    Ok(Node::Placeholder {
        name: name.to_string(),
        fallback,
    })
}

/// The default template used when the user supplies none.
pub const DEFAULT_TEMPLATE: &str = "{original_name}_pages{range}.pdf";
