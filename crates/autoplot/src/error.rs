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

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error or trace entry originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sampler,
    Formula,
    Classifier,
    Informativeness,
    Selector,
    Ordering,
    Transform,
    Discretize,
    Overplot,
    Emitter,
}
impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sampler => "sampler",
            Stage::Formula => "formula",
            Stage::Classifier => "classifier",
            Stage::Informativeness => "informativeness",
            Stage::Selector => "selector",
            Stage::Ordering => "ordering",
            Stage::Transform => "transform",
            Stage::Discretize => "discretize",
            Stage::Overplot => "overplot",
            Stage::Emitter => "emitter",
        }
    }
}
impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("[{stage}] invalid formula: {reason}")]
    InvalidFormula { stage: Stage, reason: String },
    #[error("[{stage}] unsupported variable combination {columns:?}: {reason}")]
    UnsupportedVariableCombination {
        stage: Stage,
        columns: Vec<String>,
        reason: String,
    },
    #[error("[{stage}] dataset has no weighted rows{}", .context.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    EmptyDataset {
        stage: Stage,
        context: Option<String>,
    },
    #[error("[{stage}] column '{column}' has a degenerate distribution: {reason}")]
    DegenerateDistribution {
        stage: Stage,
        column: String,
        reason: String,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Dataset error: {0}")]
    Data(#[from] DataError),
}
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid option '{field}': {reason}")]
    InvalidOption { field: String, reason: String },
    #[error("Conflicting configuration options: {details}")]
    ConflictingOptions { details: String },
    #[error("Failed to read options file '{path}': {source}")]
    OptionsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML options: {source}")]
    YamlParse {
        #[from]
        source: serde_yaml::Error,
    },
}
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Weight vector has {found} entries, expected {expected}")]
    WeightLengthMismatch { expected: usize, found: usize },
    #[error("Weight at row {row} is invalid: {value}")]
    InvalidWeight { row: usize, value: f64 },
    #[error("Total weight must be positive")]
    ZeroTotalWeight,
    #[error("Duplicate column name '{column}'")]
    DuplicateColumn { column: String },
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },
    #[error("Level code {code} out of range for column '{column}' with {levels} levels")]
    LevelOutOfRange {
        column: String,
        code: u32,
        levels: usize,
    },
    #[cfg(feature = "polars")]
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
pub type Result<T> = std::result::Result<T, PlotError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
pub type DataResult<T> = std::result::Result<T, DataError>;
impl PlotError {
    pub fn invalid_formula(reason: impl Into<String>) -> Self {
        PlotError::InvalidFormula {
            stage: Stage::Formula,
            reason: reason.into(),
        }
    }
    pub fn degenerate(stage: Stage, column: &str, reason: impl Into<String>) -> Self {
        PlotError::DegenerateDistribution {
            stage,
            column: column.to_string(),
            reason: reason.into(),
        }
    }
    pub fn empty(stage: Stage, context: impl Into<String>) -> Self {
        PlotError::EmptyDataset {
            stage,
            context: Some(context.into()),
        }
    }
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PlotError::InvalidFormula { stage, .. }
            | PlotError::UnsupportedVariableCombination { stage, .. }
            | PlotError::EmptyDataset { stage, .. }
            | PlotError::DegenerateDistribution { stage, .. } => Some(*stage),
            PlotError::Config(_) | PlotError::Data(_) => None,
        }
    }
    /// Only a degenerate distribution is handled locally, by skipping the
    /// optional step that needed the statistic.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlotError::DegenerateDistribution { .. })
    }
    pub fn category(&self) -> &'static str {
        match self {
            PlotError::InvalidFormula { .. } => "Formula",
            PlotError::UnsupportedVariableCombination { .. } => "Variables",
            PlotError::EmptyDataset { .. } => "Data",
            PlotError::DegenerateDistribution { .. } => "Distribution",
            PlotError::Config(_) => "Configuration",
            PlotError::Data(_) => "Dataset",
        }
    }
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            PlotError::InvalidFormula { .. } => vec![
                "Check the column names against the dataset".to_string(),
                "Reference at most three distinct columns".to_string(),
                "Do not combine '.' with explicit explanatory terms".to_string(),
            ],
            PlotError::UnsupportedVariableCombination { .. } => vec![
                "Use each column in a single role".to_string(),
                "Split the request into several plots".to_string(),
            ],
            PlotError::EmptyDataset { .. } => vec![
                "Check for columns that are entirely missing".to_string(),
                "Check that weights are not all zero".to_string(),
            ],
            PlotError::Config(_) => vec!["Compare the options against their documented ranges".to_string()],
            _ => vec!["Check the error message for specific guidance".to_string()],
        }
    }
    pub fn user_message(&self) -> String {
        match self {
            PlotError::EmptyDataset { .. } => {
                "Nothing left to plot: every row was removed or carries zero weight.".to_string()
            }
            PlotError::InvalidFormula { reason, .. } => {
                format!("The plot request could not be understood: {reason}")
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn messages_name_the_stage() {
        let err = PlotError::degenerate(Stage::Transform, "price", "single observed value");
        let msg = err.to_string();
        assert!(msg.contains("[transform]"));
        assert!(msg.contains("price"));
        assert!(err.is_recoverable());
        assert_eq!(err.stage(), Some(Stage::Transform));
    }
    #[test]
    fn empty_dataset_context_is_optional() {
        let bare = PlotError::EmptyDataset {
            stage: Stage::Sampler,
            context: None,
        };
        assert_eq!(bare.to_string(), "[sampler] dataset has no weighted rows");
        let with = PlotError::empty(Stage::Classifier, "all rows missing");
        assert!(with.to_string().ends_with("(all rows missing)"));
        assert!(!with.is_recoverable());
        assert_eq!(with.category(), "Data");
    }
}
