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

//! Columnar, weighted, immutable dataset consumed by the decision engine.
//!
//! Columns are shared through `Arc` slices so that sampling, overviews and
//! parallel invocations can hand out cheap immutable views.

use crate::error::{DataError, DataResult};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Storage type declared by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Numeric,
    OrderedCategorical,
    UnorderedCategorical,
}
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    levels: Arc<[String]>,
    codes: Arc<[Option<u32>]>,
    ordered: bool,
}
impl CategoricalColumn {
    pub fn levels(&self) -> &[String] {
        &self.levels
    }
    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }
    pub fn level_of(&self, row: usize) -> Option<&str> {
        let code = (*self.codes.get(row)?)?;
        self.levels.get(code as usize).map(String::as_str)
    }
}
#[derive(Debug, Clone)]
pub enum Column {
    Numeric(Arc<[Option<f64>]>),
    Categorical(CategoricalColumn),
}
impl Column {
    /// Numeric column; non-finite values are stored as missing.
    pub fn numeric<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self::numeric_opt(values.into_iter().map(Some))
    }
    pub fn numeric_opt<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        Column::Numeric(
            values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
        )
    }
    /// Unordered categorical column; levels are kept in alphabetical order.
    pub fn categorical<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::categorical_opt(values.into_iter().map(Some))
    }
    pub fn categorical_opt<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let raw: Vec<Option<String>> = values
            .into_iter()
            .map(|v| v.map(|s| s.as_ref().to_string()))
            .collect();
        let levels: Vec<String> = raw
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&str, u32> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i as u32))
            .collect();
        let codes: Arc<[Option<u32>]> = raw
            .iter()
            .map(|v| v.as_deref().and_then(|s| index.get(s).copied()))
            .collect();
        Column::Categorical(CategoricalColumn {
            levels: levels.into(),
            codes,
            ordered: false,
        })
    }
    /// Ordered categorical column with a declared level order. Values that
    /// are not among `levels` are stored as missing.
    pub fn ordered<I, S, L>(values: I, levels: &[L]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        let levels: Vec<String> = levels.iter().map(|l| l.as_ref().to_string()).collect();
        let index: HashMap<&str, u32> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i as u32))
            .collect();
        let codes: Arc<[Option<u32>]> = values
            .into_iter()
            .map(|v| index.get(v.as_ref()).copied())
            .collect();
        Column::Categorical(CategoricalColumn {
            levels: levels.into(),
            codes,
            ordered: true,
        })
    }
    /// Categorical column from raw codes into `levels`.
    pub fn from_codes(
        name: &str,
        levels: Vec<String>,
        codes: Vec<Option<u32>>,
        ordered: bool,
    ) -> DataResult<Self> {
        if let Some(code) = codes.iter().flatten().find(|c| **c as usize >= levels.len()) {
            return Err(DataError::LevelOutOfRange {
                column: name.to_string(),
                code: *code,
                levels: levels.len(),
            });
        }
        Ok(Column::Categorical(CategoricalColumn {
            levels: levels.into(),
            codes: codes.into(),
            ordered,
        }))
    }
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Categorical(cat) => cat.codes.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn declared_type(&self) -> DeclaredType {
        match self {
            Column::Numeric(_) => DeclaredType::Numeric,
            Column::Categorical(cat) if cat.ordered => DeclaredType::OrderedCategorical,
            Column::Categorical(_) => DeclaredType::UnorderedCategorical,
        }
    }
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Numeric(values) => values.get(row).map_or(true, Option::is_none),
            Column::Categorical(cat) => cat.codes.get(row).map_or(true, Option::is_none),
        }
    }
    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            Column::Categorical(cat) => cat.codes.iter().filter(|v| v.is_none()).count(),
        }
    }
    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(values) => Some(values),
            Column::Categorical(_) => None,
        }
    }
    pub fn as_categorical(&self) -> Option<&CategoricalColumn> {
        match self {
            Column::Numeric(_) => None,
            Column::Categorical(cat) => Some(cat),
        }
    }
    /// Number of distinct observed (non-missing) values.
    pub fn distinct_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values
                .iter()
                .flatten()
                .map(|v| v.to_bits())
                .collect::<HashSet<_>>()
                .len(),
            Column::Categorical(cat) => cat.codes.iter().flatten().collect::<HashSet<_>>().len(),
        }
    }
    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(values) => {
                Column::Numeric(rows.iter().map(|&r| values[r]).collect())
            }
            Column::Categorical(cat) => Column::Categorical(CategoricalColumn {
                levels: Arc::clone(&cat.levels),
                codes: rows.iter().map(|&r| cat.codes[r]).collect(),
                ordered: cat.ordered,
            }),
        }
    }
}
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Arc<[String]>,
    columns: Arc<[Column]>,
    weights: Arc<[f64]>,
    uniform_weights: bool,
    rows: usize,
}
impl Dataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }
    pub fn n_rows(&self) -> usize {
        self.rows
    }
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
    pub fn column_names(&self) -> &[String] {
        &self.names
    }
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }
    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
    /// True when no explicit weights were given or all weights are equal.
    pub fn has_uniform_weights(&self) -> bool {
        self.uniform_weights
    }
    /// Rows `rows` (in the given order) with their original weights.
    pub fn subset(&self, rows: &[usize]) -> Dataset {
        let columns: Vec<Column> = self.columns.iter().map(|c| c.take(rows)).collect();
        let weights: Arc<[f64]> = rows.iter().map(|&r| self.weights[r]).collect();
        Dataset {
            names: Arc::clone(&self.names),
            columns: columns.into(),
            uniform_weights: self.uniform_weights || all_equal(&weights),
            weights,
            rows: rows.len(),
        }
    }
    #[cfg(feature = "polars")]
    pub fn from_polars(
        df: &polars::prelude::DataFrame,
        weight_column: Option<&str>,
    ) -> DataResult<Self> {
        use polars::prelude::DataType as PlDataType;
        let mut builder = Dataset::builder();
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            if weight_column == Some(name.as_str()) {
                let s_float = series.cast(&PlDataType::Float64)?;
                let weights = s_float.f64()?.into_iter().map(|w| w.unwrap_or(0.0)).collect();
                builder = builder.weights(weights);
                continue;
            }
            let converted = if series.dtype().is_primitive_numeric() {
                let s_float = series.cast(&PlDataType::Float64)?;
                let values: Vec<Option<f64>> = s_float.f64()?.into_iter().collect();
                Column::numeric_opt(values)
            } else {
                let s_str = series.cast(&PlDataType::String)?;
                let values: Vec<Option<String>> = s_str
                    .str()?
                    .into_iter()
                    .map(|v| v.map(String::from))
                    .collect();
                Column::categorical_opt(values)
            };
            builder = builder.column(name, converted);
        }
        builder.build()
    }
}
fn all_equal(weights: &[f64]) -> bool {
    weights
        .first()
        .map_or(true, |first| {
            weights
                .iter()
                .all(|w| (w - first).abs() <= f64::EPSILON * first.abs().max(1.0))
        })
}
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    names: Vec<String>,
    columns: Vec<Column>,
    weights: Option<Vec<f64>>,
}
impl DatasetBuilder {
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.names.push(name.into());
        self.columns.push(column);
        self
    }
    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn build(self) -> DataResult<Dataset> {
        let rows = self.columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for (name, column) in self.names.iter().zip(&self.columns) {
            if !seen.insert(name.as_str()) {
                return Err(DataError::DuplicateColumn {
                    column: name.clone(),
                });
            }
            if column.len() != rows {
                return Err(DataError::LengthMismatch {
                    column: name.clone(),
                    expected: rows,
                    found: column.len(),
                });
            }
        }
        let (weights, uniform_weights) = match self.weights {
            Some(weights) => {
                if weights.len() != rows {
                    return Err(DataError::WeightLengthMismatch {
                        expected: rows,
                        found: weights.len(),
                    });
                }
                if let Some((row, value)) = weights
                    .iter()
                    .enumerate()
                    .find(|(_, w)| !w.is_finite() || **w < 0.0)
                {
                    return Err(DataError::InvalidWeight { row, value: *value });
                }
                if rows > 0 && weights.iter().sum::<f64>() <= 0.0 {
                    return Err(DataError::ZeroTotalWeight);
                }
                let uniform = all_equal(&weights);
                (weights, uniform)
            }
            None => (vec![1.0; rows], true),
        };
        Ok(Dataset {
            names: self.names.into(),
            columns: self.columns.into(),
            weights: weights.into(),
            uniform_weights,
            rows,
        })
    }
}
