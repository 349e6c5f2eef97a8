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

use crate::dataset::{Column, Dataset, DeclaredType};
use crate::error::{PlotError, Result, Stage};
use crate::formula::Formula;
use crate::options::EngineOptions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub const MISSING_LEVEL: &str = "(missing)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Numeric,
    OrderedCategorical,
    UnorderedCategorical,
}
impl VariableKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, VariableKind::Numeric)
    }
    pub fn is_categorical(&self) -> bool {
        !self.is_numeric()
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: VariableKind,
    pub distinct: usize,
    pub reclassified: bool,
}
/// Declared categorical types are kept; a numeric column with fewer than
/// `few_unique_threshold` distinct values becomes ordered-categorical when
/// `few_unique_as_factor` is set.
pub fn classify_column(column: &Column, options: &EngineOptions) -> Classification {
    let distinct = column.distinct_count();
    match column.declared_type() {
        DeclaredType::OrderedCategorical => Classification {
            kind: VariableKind::OrderedCategorical,
            distinct,
            reclassified: false,
        },
        DeclaredType::UnorderedCategorical => Classification {
            kind: VariableKind::UnorderedCategorical,
            distinct,
            reclassified: false,
        },
        DeclaredType::Numeric => {
            let few = options.few_unique_as_factor
                && distinct > 0
                && distinct < options.few_unique_threshold;
            Classification {
                kind: if few {
                    VariableKind::OrderedCategorical
                } else {
                    VariableKind::Numeric
                },
                distinct,
                reclassified: few,
            }
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValues {
    Numeric(Vec<f64>),
    Categorical { levels: Vec<String>, codes: Vec<u32> },
}
/// One referenced column restricted to the complete rows of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    pub values: VariableValues,
    pub reclassified: bool,
}
impl Variable {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Numeric,
            values: VariableValues::Numeric(values),
            reclassified: false,
        }
    }
    pub fn categorical(
        name: impl Into<String>,
        levels: Vec<String>,
        codes: Vec<u32>,
        ordered: bool,
    ) -> Self {
        Self {
            name: name.into(),
            kind: if ordered {
                VariableKind::OrderedCategorical
            } else {
                VariableKind::UnorderedCategorical
            },
            values: VariableValues::Categorical { levels, codes },
            reclassified: false,
        }
    }
    pub fn len(&self) -> usize {
        match &self.values {
            VariableValues::Numeric(v) => v.len(),
            VariableValues::Categorical { codes, .. } => codes.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.values {
            VariableValues::Numeric(v) => Some(v),
            VariableValues::Categorical { .. } => None,
        }
    }
    pub fn levels(&self) -> &[String] {
        match &self.values {
            VariableValues::Numeric(_) => &[],
            VariableValues::Categorical { levels, .. } => levels,
        }
    }
    pub fn codes(&self) -> Option<&[u32]> {
        match &self.values {
            VariableValues::Numeric(_) => None,
            VariableValues::Categorical { codes, .. } => Some(codes),
        }
    }
    /// Distinct levels present in the rows (categorical) or distinct values (numeric).
    pub fn observed_count(&self) -> usize {
        match &self.values {
            VariableValues::Numeric(v) => v
                .iter()
                .map(|x| (x + 0.0).to_bits())
                .collect::<BTreeSet<_>>()
                .len(),
            VariableValues::Categorical { codes, .. } => {
                codes.iter().collect::<BTreeSet<_>>().len()
            }
        }
    }
}
/// Classified variables of one invocation, rows with missing values removed.
#[derive(Debug, Clone)]
pub struct Frame {
    pub formula: Formula,
    pub variables: Vec<Variable>,
    pub weights: Vec<f64>,
}
impl Frame {
    pub fn n_rows(&self) -> usize {
        self.weights.len()
    }
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
    pub fn response(&self) -> Option<&Variable> {
        self.formula.response.as_deref().and_then(|n| self.variable(n))
    }
    pub fn explanatory(&self) -> Vec<&Variable> {
        self.formula
            .explanatory
            .iter()
            .filter_map(|n| self.variable(n))
            .collect()
    }
    pub fn conditioning(&self) -> Option<&Variable> {
        self.formula
            .conditioning
            .as_deref()
            .and_then(|n| self.variable(n))
    }
    /// True when every remaining row carries the same weight.
    pub fn uniform_weights(&self) -> bool {
        self.weights
            .first()
            .map_or(true, |w0| self.weights.iter().all(|w| (w - w0).abs() <= 1e-12))
    }
}
fn format_level(value: f64) -> String {
    format!("{value}")
}
fn materialize(
    name: &str,
    column: &Column,
    class: Classification,
    rows: &[usize],
    options: &EngineOptions,
) -> Variable {
    let values = match (column, class.kind) {
        (Column::Numeric(values), VariableKind::Numeric) => {
            VariableValues::Numeric(rows.iter().filter_map(|&r| values[r]).collect())
        }
        (Column::Numeric(values), _) => {
            let distinct: BTreeSet<u64> = rows
                .iter()
                .filter_map(|&r| values[r])
                .map(ordered_bits)
                .collect();
            let sorted: Vec<u64> = distinct.into_iter().collect();
            let levels = sorted.iter().map(|b| format_level(from_ordered_bits(*b))).collect();
            let codes = rows
                .iter()
                .filter_map(|&r| values[r])
                .filter_map(|v| sorted.binary_search(&ordered_bits(v)).ok())
                .map(|i| i as u32)
                .collect();
            VariableValues::Categorical { levels, codes }
        }
        (Column::Categorical(cat), _) => {
            let mut levels = cat.levels().to_vec();
            let missing_code = levels.len() as u32;
            let mut used_missing = false;
            let codes = rows
                .iter()
                .filter_map(|&r| match cat.codes()[r] {
                    Some(c) => Some(c),
                    None if options.missing_as_level => {
                        used_missing = true;
                        Some(missing_code)
                    }
                    None => None,
                })
                .collect();
            if used_missing {
                levels.push(MISSING_LEVEL.to_string());
            }
            VariableValues::Categorical { levels, codes }
        }
    };
    Variable {
        name: name.to_string(),
        kind: class.kind,
        values,
        reclassified: class.reclassified,
    }
}
/// Monotone map from f64 to u64 so that numeric levels sort numerically.
fn ordered_bits(v: f64) -> u64 {
    let bits = (v + 0.0).to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}
fn from_ordered_bits(b: u64) -> f64 {
    if b >> 63 == 1 {
        f64::from_bits(b & !(1 << 63))
    } else {
        f64::from_bits(!b)
    }
}
/// Classifies every column of `formula` once and keeps the rows that are
/// complete across them and carry positive weight.
pub fn classify_formula(
    dataset: &Dataset,
    formula: &Formula,
    options: &EngineOptions,
) -> Result<Frame> {
    let mut classes: HashMap<&str, (&Column, Classification)> = HashMap::new();
    for name in formula.columns() {
        if classes.contains_key(name) {
            continue;
        }
        let column = dataset.column(name).ok_or_else(|| PlotError::InvalidFormula {
            stage: Stage::Classifier,
            reason: format!("column '{name}' does not exist in the dataset"),
        })?;
        let class = classify_column(column, options);
        debug!(
            target: "autoplot::classifier",
            column = name,
            kind = ?class.kind,
            distinct = class.distinct,
            reclassified = class.reclassified,
            "classified column"
        );
        classes.insert(name, (column, class));
    }
    let weights = dataset.weights();
    let rows: Vec<usize> = (0..dataset.n_rows())
        .filter(|&r| weights[r] > 0.0)
        .filter(|&r| {
            classes.values().all(|(column, _)| match column {
                Column::Categorical(_) if options.missing_as_level => true,
                _ => !column.is_missing(r),
            })
        })
        .collect();
    if rows.is_empty() {
        return Err(PlotError::empty(
            Stage::Classifier,
            format!("no complete rows for {}", formula.columns().join(", ")),
        ));
    }
    let variables = formula
        .columns()
        .into_iter()
        .filter_map(|name| {
            classes
                .get(name)
                .map(|(column, class)| materialize(name, column, *class, &rows, options))
        })
        .collect();
    Ok(Frame {
        formula: formula.clone(),
        variables,
        weights: rows.iter().map(|&r| weights[r]).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(response: &str, explanatory: &[&str]) -> Formula {
        Formula {
            response: Some(response.to_string()),
            explanatory: explanatory.iter().map(|s| s.to_string()).collect(),
            conditioning: None,
        }
    }

    #[test]
    fn declared_types_map_directly() {
        let options = EngineOptions::default();
        let ordered = Column::ordered(["lo", "hi"], &["lo", "hi"]);
        let unordered = Column::categorical(["x", "y"]);
        assert_eq!(
            classify_column(&ordered, &options).kind,
            VariableKind::OrderedCategorical
        );
        assert_eq!(
            classify_column(&unordered, &options).kind,
            VariableKind::UnorderedCategorical
        );
    }

    #[test]
    fn few_unique_numeric_becomes_ordered() {
        let column = Column::numeric([1.0, 2.0, 2.0, 1.0, 3.0]);
        let options = EngineOptions::default();
        let class = classify_column(&column, &options);
        assert_eq!(class.kind, VariableKind::OrderedCategorical);
        assert!(class.reclassified);
        let off = EngineOptions {
            few_unique_as_factor: false,
            ..Default::default()
        };
        assert_eq!(classify_column(&column, &off).kind, VariableKind::Numeric);
        let many = Column::numeric((0..50).map(f64::from));
        assert_eq!(classify_column(&many, &options).kind, VariableKind::Numeric);
    }

    #[test]
    fn classification_is_idempotent() {
        let column = Column::numeric([0.5, 1.5, 0.5]);
        let options = EngineOptions::default();
        assert_eq!(
            classify_column(&column, &options),
            classify_column(&column, &options)
        );
    }

    #[test]
    fn reclassified_levels_sort_numerically() {
        let ds = Dataset::builder()
            .column("n", Column::numeric([10.0, -2.0, 3.0, 10.0]))
            .build()
            .unwrap();
        let frame = classify_formula(&ds, &formula("n", &[]), &EngineOptions::default()).unwrap();
        let n = frame.response().unwrap();
        assert_eq!(n.levels(), &["-2", "3", "10"]);
        assert_eq!(n.codes().unwrap(), &[2, 0, 1, 2]);
    }

    #[test]
    fn incomplete_and_zero_weight_rows_are_dropped() {
        let ds = Dataset::builder()
            .column("y", Column::numeric_opt([Some(1.0), None, Some(3.0), Some(4.0)]))
            .column("g", Column::categorical_opt([Some("a"), Some("b"), None, Some("b")]))
            .weights(vec![1.0, 1.0, 1.0, 0.0])
            .build()
            .unwrap();
        let options = EngineOptions {
            few_unique_as_factor: false,
            ..Default::default()
        };
        let frame = classify_formula(&ds, &formula("y", &["g"]), &options).unwrap();
        assert_eq!(frame.n_rows(), 1);
        let keep_missing = EngineOptions {
            missing_as_level: true,
            ..options
        };
        let frame = classify_formula(&ds, &formula("y", &["g"]), &keep_missing).unwrap();
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.explanatory()[0].levels().last().unwrap(), MISSING_LEVEL);
    }

    #[test]
    fn all_missing_is_empty_dataset() {
        let ds = Dataset::builder()
            .column("y", Column::numeric_opt([None, None]))
            .build()
            .unwrap();
        let err = classify_formula(&ds, &formula("y", &[]), &EngineOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PlotError::EmptyDataset {
                stage: Stage::Classifier,
                ..
            }
        ));
    }
}
