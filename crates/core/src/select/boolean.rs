//! Boolean selector expressions.
//!
//! Grammar (strictest first: parentheses, NOT, AND, OR):
//!
//! ```text
//! or   := and ('|' and)*
//! and  := not (('&' | '&!') not)*
//! not  := '!' not | atom
//! atom := '(' or ')' | operand
//! ```
//!
//! Operands evaluate to page sets: `all`, a literal page number, a single
//! predicate, or one range pattern. A plain expression yields its page set
//! regrouped into consecutive runs. When a range pattern is present the
//! expression is evaluated per section ("magazine" form): the range
//! operand stands for the pages of the current section, `&` filters the
//! section, and `|` adds pages outside it as singleton groups. More than
//! one range pattern in the same expression is an error.

use std::collections::BTreeSet;

use crate::analyzer::AnalyzerCache;
use crate::error::{Result, SieveError};
use crate::select::group::{PageGroup, consecutive_groups};
use crate::select::lexer::{Token, has_boolean_operators, has_unquoted_parens, tokenize_boolean};
use crate::select::pattern::{Predicate, looks_like_predicate};
use crate::select::range::{RangePattern, looks_like_range_pattern};

/// True when the fragment should be parsed as a boolean expression.
pub fn looks_like_boolean(s: &str) -> bool {
    has_boolean_operators(s) || has_unquoted_parens(s)
}

#[derive(Debug)]
enum Operand {
    All,
    Page(usize),
    Predicate(Predicate),
    Range(RangePattern),
}

#[derive(Debug)]
enum Expr {
    Atom(usize),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A parsed boolean expression over one document's pages.
#[derive(Debug)]
pub struct BooleanExpr {
    operands: Vec<Operand>,
    root: Expr,
    source: String,
}

impl BooleanExpr {
    pub fn parse(fragment: &str) -> Result<Self> {
        let fragment = fragment.trim();
        let tokens = tokenize_boolean(fragment);
        if tokens.is_empty() {
            return Err(SieveError::input("empty boolean expression"));
        }

        let mut parser = ExprParser {
            tokens: &tokens,
            pos: 0,
            operands: Vec::new(),
            source: fragment,
        };
        let root = parser.parse_or()?;
        if parser.pos != tokens.len() {
            return Err(SieveError::input(format!(
                "trailing tokens in boolean expression '{fragment}'"
            )));
        }

        let ranges = parser
            .operands
            .iter()
            .filter(|op| matches!(op, Operand::Range(_)))
            .count();
        if ranges > 1 {
            return Err(SieveError::evaluation(format!(
                "only one range pattern is allowed per boolean expression, found {ranges}"
            )));
        }

        Ok(Self {
            operands: parser.operands,
            root,
            source: fragment.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to the final page set plus its groups.
    pub fn evaluate(&self, doc: &AnalyzerCache<'_>) -> Result<(BTreeSet<usize>, Vec<PageGroup>)> {
        let range_idx = self
            .operands
            .iter()
            .position(|op| matches!(op, Operand::Range(_)));

        match range_idx {
            None => {
                let pages = self.eval(&self.root, doc, None)?;
                let page_vec: Vec<usize> = pages.iter().copied().collect();
                let groups = consecutive_groups(&page_vec);
                Ok((pages, groups))
            }
            Some(idx) => self.evaluate_magazine(doc, idx),
        }
    }

    /// Magazine evaluation: expand the range operand into sections, then
    /// run the rest of the expression once per section.
    fn evaluate_magazine(
        &self,
        doc: &AnalyzerCache<'_>,
        range_idx: usize,
    ) -> Result<(BTreeSet<usize>, Vec<PageGroup>)> {
        let Operand::Range(range) = &self.operands[range_idx] else {
            unreachable!("range_idx always points at a range operand");
        };
        let sections = range.section_groups(doc)?;

        let mut groups: Vec<PageGroup> = Vec::new();
        let mut extras: BTreeSet<usize> = BTreeSet::new();

        for section in sections {
            let section_pages: BTreeSet<usize> = section.pages.iter().copied().collect();
            let full = self.eval(&self.root, doc, Some((range_idx, &section_pages)))?;

            let kept: Vec<usize> = full.intersection(&section_pages).copied().collect();
            extras.extend(full.difference(&section_pages));

            if !kept.is_empty() {
                groups.push(PageGroup::new(
                    kept.clone(),
                    kept.len() > 1,
                    section.original_spec.clone(),
                ));
            }
        }

        for page in extras {
            if !groups.iter().any(|g| g.pages.contains(&page)) {
                groups.push(PageGroup::new(vec![page], false, format!("page{page}")));
            }
        }

        let pages: BTreeSet<usize> = groups.iter().flat_map(|g| g.pages.iter().copied()).collect();
        Ok((pages, groups))
    }

    fn eval(
        &self,
        expr: &Expr,
        doc: &AnalyzerCache<'_>,
        binding: Option<(usize, &BTreeSet<usize>)>,
    ) -> Result<BTreeSet<usize>> {
        let total = doc.page_count();
        Ok(match expr {
            Expr::Atom(idx) => self.eval_operand(*idx, doc, binding)?,
            Expr::Not(inner) => {
                let inner = self.eval(inner, doc, binding)?;
                (1..=total).filter(|p| !inner.contains(p)).collect()
            }
            Expr::And(left, right) => {
                let left = self.eval(left, doc, binding)?;
                let right = self.eval(right, doc, binding)?;
                left.intersection(&right).copied().collect()
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, doc, binding)?;
                let right = self.eval(right, doc, binding)?;
                left.union(&right).copied().collect()
            }
        })
    }

    fn eval_operand(
        &self,
        idx: usize,
        doc: &AnalyzerCache<'_>,
        binding: Option<(usize, &BTreeSet<usize>)>,
    ) -> Result<BTreeSet<usize>> {
        match &self.operands[idx] {
            Operand::All => Ok((1..=doc.page_count()).collect()),
            Operand::Page(page) => {
                if *page >= 1 && *page <= doc.page_count() {
                    Ok(BTreeSet::from([*page]))
                } else {
                    Ok(BTreeSet::new())
                }
            }
            Operand::Predicate(pred) => Ok(pred.match_pages(doc)?.into_iter().collect()),
            Operand::Range(range) => match binding {
                Some((bound_idx, pages)) if bound_idx == idx => Ok(pages.clone()),
                _ => Err(SieveError::evaluation(format!(
                    "range pattern '{}' cannot be evaluated outside its sections",
                    range.source()
                ))),
            },
        }
    }
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    operands: Vec<Operand>,
    source: &'a str,
}

impl ExprParser<'_> {
    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    let right = self.parse_not()?;
                    left = Expr::And(Box::new(left), Box::new(right));
                }
                Some(Token::AndNot) => {
                    self.pos += 1;
                    let right = self.parse_not()?;
                    left = Expr::And(Box::new(left), Box::new(Expr::Not(Box::new(right))));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if !matches!(self.peek(), Some(Token::Close)) {
                    return Err(SieveError::input(format!(
                        "mismatched parentheses in '{}'",
                        self.source
                    )));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Operand(text)) => {
                let operand = parse_operand(text)?;
                self.pos += 1;
                self.operands.push(operand);
                Ok(Expr::Atom(self.operands.len() - 1))
            }
            other => Err(SieveError::input(format!(
                "expected operand in '{}', found {other:?}",
                self.source
            ))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }
}

fn parse_operand(text: &str) -> Result<Operand> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("all") {
        return Ok(Operand::All);
    }
    if looks_like_range_pattern(text) {
        return Ok(Operand::Range(RangePattern::parse(text)?));
    }
    if looks_like_predicate(text) {
        return Ok(Operand::Predicate(Predicate::parse(text)?));
    }
    if let Ok(page) = text.parse::<usize>() {
        return Ok(Operand::Page(page));
    }
    Err(SieveError::input(format!(
        "cannot parse boolean operand '{text}'"
    )))
}
