// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Role assignment for the plotted variables.
//!
//! The textual form is `response ~ term + term | conditioning`, where a term
//! is a column name, `.` for every column not referenced elsewhere, `1` for
//! no explanatory variable, or a pair `a*b` (equivalently `a:b`). Names with
//! spaces or operator characters are written in backquotes.

use crate::dataset::Dataset;
use crate::error::{PlotError, Result, Stage};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Most distinct columns a single plot may reference.
pub const MAX_VARIABLES: usize = 3;
pub const MAX_EXPLANATORY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Column(String),
    Wildcard,
    Pair(String, String),
}
impl Term {
    fn columns(&self) -> Vec<&str> {
        match self {
            Term::Column(c) => vec![c.as_str()],
            Term::Wildcard => Vec::new(),
            Term::Pair(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}
/// Unvalidated role assignment as written by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaSpec {
    pub response: Option<Term>,
    pub explanatory: Vec<Term>,
    pub conditioning: Option<String>,
}
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Tilde,
    Plus,
    Pair,
    Bar,
    Name(String),
}
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '~' => {
                chars.next();
                tokens.push(Token::Tilde);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '*' | ':' => {
                chars.next();
                tokens.push(Token::Pair);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Bar);
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(PlotError::invalid_formula(format!(
                                "unterminated backquote in '{input}'"
                            )))
                        }
                    }
                }
                if name.is_empty() {
                    return Err(PlotError::invalid_formula("empty backquoted name"));
                }
                tokens.push(Token::Name(name));
            }
            _ => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "~+*:|`".contains(ch) {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                tokens.push(Token::Name(name));
            }
        }
    }
    Ok(tokens)
}
impl FormulaSpec {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn response(mut self, column: impl Into<String>) -> Self {
        self.response = Some(Term::Column(column.into()));
        self
    }
    pub fn explanatory(mut self, column: impl Into<String>) -> Self {
        self.explanatory.push(Term::Column(column.into()));
        self
    }
    pub fn pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.explanatory.push(Term::Pair(a.into(), b.into()));
        self
    }
    pub fn wildcard_explanatory(mut self) -> Self {
        self.explanatory.push(Term::Wildcard);
        self
    }
    pub fn wildcard_response(mut self) -> Self {
        self.response = Some(Term::Wildcard);
        self
    }
    pub fn conditioning(mut self, column: impl Into<String>) -> Self {
        self.conditioning = Some(column.into());
        self
    }
    /// Parses `response ~ terms | conditioning`. A string without `~` is
    /// read as the explanatory side alone.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let tilde = tokens.iter().position(|t| *t == Token::Tilde);
        if tokens.iter().filter(|t| **t == Token::Tilde).count() > 1 {
            return Err(PlotError::invalid_formula(format!(
                "more than one '~' in '{input}'"
            )));
        }
        let (lhs, rest) = match tilde {
            Some(i) => (&tokens[..i], &tokens[i + 1..]),
            None => (&tokens[..0], &tokens[..]),
        };
        let response = match lhs {
            [] => None,
            [Token::Name(n)] if n == "." => Some(Term::Wildcard),
            [Token::Name(n)] => Some(Term::Column(n.clone())),
            _ => {
                return Err(PlotError::invalid_formula(format!(
                    "response must be a single column in '{input}'"
                )))
            }
        };
        let (rhs, cond) = match rest.iter().position(|t| *t == Token::Bar) {
            Some(i) => (&rest[..i], Some(&rest[i + 1..])),
            None => (rest, None),
        };
        let conditioning = match cond {
            None => None,
            Some([Token::Name(n)]) if n != "." && n != "1" => Some(n.clone()),
            Some(_) => {
                return Err(PlotError::invalid_formula(format!(
                    "conditioning must be a single column in '{input}'"
                )))
            }
        };
        let mut explanatory = Vec::new();
        for chunk in rhs.split(|t| *t == Token::Plus) {
            match chunk {
                [] if rhs.is_empty() => {}
                [Token::Name(n)] if n == "1" => {}
                [Token::Name(n)] if n == "." => explanatory.push(Term::Wildcard),
                [Token::Name(n)] => explanatory.push(Term::Column(n.clone())),
                [Token::Name(a), Token::Pair, Token::Name(b)] if a != "." && b != "." => {
                    explanatory.push(Term::Pair(a.clone(), b.clone()));
                }
                _ => {
                    return Err(PlotError::invalid_formula(format!(
                        "malformed explanatory term in '{input}'"
                    )))
                }
            }
        }
        Ok(Self {
            response,
            explanatory,
            conditioning,
        })
    }
}
/// Validated role assignment with at most three distinct columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formula {
    pub response: Option<String>,
    pub explanatory: Vec<String>,
    pub conditioning: Option<String>,
}
impl Formula {
    /// Columns in role order: response, explanatory, conditioning.
    pub fn columns(&self) -> Vec<&str> {
        self.response
            .iter()
            .chain(&self.explanatory)
            .chain(&self.conditioning)
            .map(String::as_str)
            .collect()
    }
    /// Columns drawn on primary axes (response and explanatory).
    pub fn axis_columns(&self) -> Vec<&str> {
        self.response
            .iter()
            .chain(&self.explanatory)
            .map(String::as_str)
            .collect()
    }
    fn promote(mut self) -> Self {
        if self.response.is_none() && !self.explanatory.is_empty() {
            self.response = Some(self.explanatory.remove(0));
        }
        self
    }
}
impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(r) = &self.response {
            write!(f, "{r} ")?;
        }
        write!(f, "~ ")?;
        if self.explanatory.is_empty() {
            write!(f, "1")?;
        } else {
            write!(f, "{}", self.explanatory.join(" + "))?;
        }
        if let Some(c) = &self.conditioning {
            write!(f, " | {c}")?;
        }
        Ok(())
    }
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedFormula {
    Single(Formula),
    /// One formula per column matched by a wildcard, in dataset order.
    Expanded(Vec<Formula>),
}
impl NormalizedFormula {
    pub fn into_formulas(self) -> Vec<Formula> {
        match self {
            NormalizedFormula::Single(f) => vec![f],
            NormalizedFormula::Expanded(fs) => fs,
        }
    }
}
pub fn normalize(spec: &FormulaSpec, dataset: &Dataset) -> Result<NormalizedFormula> {
    let response_wild = matches!(spec.response, Some(Term::Wildcard));
    let explanatory_wild = spec.explanatory.iter().any(|t| *t == Term::Wildcard);
    if response_wild && explanatory_wild {
        return Err(PlotError::invalid_formula(
            "wildcard may appear on only one side of '~'",
        ));
    }
    if explanatory_wild && spec.explanatory.len() > 1 {
        return Err(PlotError::invalid_formula(
            "wildcard cannot be combined with explicit explanatory terms",
        ));
    }
    let response = match &spec.response {
        Some(Term::Column(c)) => Some(c.clone()),
        Some(Term::Pair(..)) => {
            return Err(PlotError::invalid_formula("response cannot be a pair of columns"))
        }
        _ => None,
    };
    let explanatory: Vec<String> = spec
        .explanatory
        .iter()
        .flat_map(Term::columns)
        .map(str::to_string)
        .collect();
    let explicit: Vec<&str> = response
        .iter()
        .map(String::as_str)
        .chain(explanatory.iter().map(String::as_str))
        .chain(spec.conditioning.iter().map(String::as_str))
        .collect();
    for column in &explicit {
        if dataset.column_index(column).is_none() {
            return Err(PlotError::invalid_formula(format!(
                "column '{column}' does not exist in the dataset"
            )));
        }
    }
    let distinct: HashSet<&str> = explicit.iter().copied().collect();
    let wildcard_slots = usize::from(response_wild || explanatory_wild);
    if distinct.len() + wildcard_slots > MAX_VARIABLES {
        return Err(PlotError::invalid_formula(format!(
            "{} distinct columns referenced, at most {MAX_VARIABLES} are supported",
            distinct.len() + wildcard_slots
        )));
    }
    if explanatory.len() + usize::from(explanatory_wild) > MAX_EXPLANATORY {
        return Err(PlotError::invalid_formula(format!(
            "at most {MAX_EXPLANATORY} explanatory columns are supported"
        )));
    }
    if distinct.len() < explicit.len() {
        return Err(PlotError::UnsupportedVariableCombination {
            stage: Stage::Formula,
            columns: explicit.iter().map(|c| c.to_string()).collect(),
            reason: "a column may play only one role".to_string(),
        });
    }
    if explicit.is_empty() && wildcard_slots == 0 {
        return Err(PlotError::invalid_formula("formula references no columns"));
    }
    if explicit.len() == spec.conditioning.iter().count() && wildcard_slots == 0 {
        return Err(PlotError::invalid_formula(
            "a conditioning variable needs at least one plotted variable",
        ));
    }
    let candidates: Vec<String> = dataset
        .column_names()
        .iter()
        .filter(|c| !distinct.contains(c.as_str()))
        .cloned()
        .collect();
    let base = Formula {
        response,
        explanatory,
        conditioning: spec.conditioning.clone(),
    };
    if wildcard_slots == 0 {
        return Ok(NormalizedFormula::Single(base.promote()));
    }
    if candidates.is_empty() {
        return Err(PlotError::invalid_formula(
            "wildcard matches no unreferenced column",
        ));
    }
    let formulas = candidates
        .into_iter()
        .map(|column| {
            let mut formula = base.clone();
            if response_wild {
                formula.response = Some(column);
            } else {
                formula.explanatory.push(column);
            }
            formula.promote()
        })
        .collect();
    Ok(NormalizedFormula::Expanded(formulas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn dataset() -> Dataset {
        Dataset::builder()
            .column("y", Column::numeric([1.0, 2.0]))
            .column("x", Column::numeric([3.0, 4.0]))
            .column("g", Column::categorical(["a", "b"]))
            .column("h", Column::categorical(["c", "d"]))
            .column("my col", Column::numeric([5.0, 6.0]))
            .build()
            .unwrap()
    }

    fn single(input: &str) -> Result<Formula> {
        match normalize(&FormulaSpec::parse(input)?, &dataset())? {
            NormalizedFormula::Single(f) => Ok(f),
            NormalizedFormula::Expanded(_) => panic!("unexpected expansion for {input}"),
        }
    }

    #[test]
    fn parses_roles() {
        let f = single("y ~ x | g").unwrap();
        assert_eq!(f.response.as_deref(), Some("y"));
        assert_eq!(f.explanatory, vec!["x"]);
        assert_eq!(f.conditioning.as_deref(), Some("g"));
        assert_eq!(f.to_string(), "y ~ x | g");
    }

    #[test]
    fn pair_terms_and_backquotes() {
        let f = single("y ~ x*`my col`").unwrap();
        assert_eq!(f.explanatory, vec!["x", "my col"]);
        let f = single("y ~ g:h").unwrap();
        assert_eq!(f.explanatory, vec!["g", "h"]);
    }

    #[test]
    fn lone_variable_and_promotion() {
        let f = single("~ x").unwrap();
        assert_eq!(f.response.as_deref(), Some("x"));
        assert!(f.explanatory.is_empty());
        let f = single("x + g").unwrap();
        assert_eq!(f.response.as_deref(), Some("x"));
        assert_eq!(f.explanatory, vec!["g"]);
        let f = single("y ~ 1").unwrap();
        assert_eq!(f.columns(), vec!["y"]);
    }

    #[test]
    fn wildcard_expands_to_unreferenced_columns() {
        let spec = FormulaSpec::parse("y ~ .").unwrap();
        let formulas = normalize(&spec, &dataset()).unwrap().into_formulas();
        let expl: Vec<_> = formulas.iter().map(|f| f.explanatory[0].as_str()).collect();
        assert_eq!(expl, vec!["x", "g", "h", "my col"]);
        let spec = FormulaSpec::parse(". ~ x | g").unwrap();
        let formulas = normalize(&spec, &dataset()).unwrap().into_formulas();
        assert_eq!(formulas.len(), 3);
        assert!(formulas.iter().all(|f| f.conditioning.as_deref() == Some("g")));
    }

    #[test]
    fn rejects_invalid_shapes() {
        let invalid = |input: &str| {
            matches!(
                FormulaSpec::parse(input).and_then(|s| normalize(&s, &dataset())),
                Err(PlotError::InvalidFormula { .. })
            )
        };
        assert!(invalid("y ~ x + g | h"));
        assert!(invalid("y ~ nope"));
        assert!(invalid("y ~ . + x"));
        assert!(invalid(". ~ ."));
        assert!(invalid("~ 1"));
        assert!(invalid("y ~ x ~ g"));
        assert!(invalid("y ~ `x"));
        assert!(invalid("y ~ x + g + h"));
        assert!(invalid("~ 1 | g"));
    }

    #[test]
    fn same_column_in_two_roles_is_unsupported() {
        let err = FormulaSpec::parse("y ~ y")
            .and_then(|s| normalize(&s, &dataset()))
            .unwrap_err();
        assert!(matches!(err, PlotError::UnsupportedVariableCombination { .. }));
    }

    #[test]
    fn builder_matches_parser() {
        let built = FormulaSpec::new().response("y").explanatory("x").conditioning("g");
        assert_eq!(built, FormulaSpec::parse("y ~ x | g").unwrap());
    }
}
