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

//! Automatic plot selection: a formula over the columns of a weighted
//! dataset goes in, an abstract [`PlotSpec`] for a grammar-of-graphics
//! renderer comes out.
//!
//! ```no_run
//! use autoplot::{Column, Dataset, PlotEngine};
//!
//! let data = Dataset::builder()
//!     .column("price", Column::numeric([1.0, 3.5, 12.0, 40.0, 150.0]))
//!     .column("cut", Column::categorical(["a", "b", "a", "c", "b"]))
//!     .build()?;
//! let spec = PlotEngine::new().plot(&data, "price ~ cut")?;
//! println!("{}", spec.to_json()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod classifier;
pub mod dataset;
pub mod discretize;
pub mod engine;
pub mod error;
pub mod formula;
pub mod informativeness;
pub mod options;
pub mod ordering;
pub mod overplot;
pub mod sampler;
pub mod selector;
pub mod spec;
pub mod stats;
pub mod trace;
pub mod transform;

pub use classifier::{classify_column, classify_formula, Variable, VariableKind, VariableValues};
pub use dataset::{Column, Dataset, DatasetBuilder, DeclaredType};
pub use discretize::{equal_weight_bins, summarise_grid, Bins, CellValue, HeatmapGrid};
pub use engine::PlotEngine;
pub use error::{ConfigError, DataError, PlotError, Result, Stage};
pub use formula::{normalize, Formula, FormulaSpec, NormalizedFormula, Term};
pub use informativeness::{conditional_entropy, rank_by_informativeness};
pub use options::{EngineOptions, OverplotOverride, DEFAULT_OPTIONS};
pub use ordering::{lump_levels, order_levels, LevelOrder};
pub use overplot::{duplicate_rate, jitter_offsets, select_remedy, OverplotRemedy};
pub use sampler::{weighted_sample, SampleOutcome};
pub use selector::{
    resolve_conditioning, select_archetype, ConditioningBinding, FacetLayout, PlotArchetype, Selection,
    SelectionInput,
};
pub use spec::{emit, AxisSpec, Channels, Decorations, PlotSpec};
pub use trace::{DecisionTrace, TraceEntry};
pub use transform::{select_transform, AxisTransform, TransformDecision};
