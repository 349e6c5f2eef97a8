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

//! The abstract plot description handed to a renderer.

use crate::classifier::VariableKind;
use crate::discretize::HeatmapGrid;
use crate::error::{PlotError, Result, Stage};
use crate::ordering::LevelOrder;
use crate::overplot::OverplotRemedy;
use crate::selector::{Channel, FacetLayout, PlotArchetype};
use crate::transform::AxisTransform;
use serde::Serialize;

/// Channel value standing for the summed row weight rather than a column.
pub const WEIGHT_CHANNEL: &str = "(weight)";
const RUG_MAX_ROWS: usize = 1_000;
const SMOOTH_MIN_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSpec {
    pub column: String,
    pub kind: VariableKind,
    pub transform: AxisTransform,
    /// Bin edges when a numeric column plays a categorical role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discretization: Option<Vec<f64>>,
}
impl AxisSpec {
    pub fn new(column: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            column: column.into(),
            kind,
            transform: AxisTransform::None,
            discretization: None,
        }
    }
    pub fn with_transform(mut self, transform: AxisTransform) -> Self {
        self.transform = transform;
        self
    }
    pub fn with_bins(mut self, edges: &[f64]) -> Self {
        self.discretization = Some(edges.to_vec());
        self
    }
}
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Channels {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
    pub facet_row: Option<String>,
    pub facet_col: Option<String>,
    pub size: Option<String>,
}
impl Channels {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::X => self.x.as_deref(),
            Channel::Y => self.y.as_deref(),
            Channel::Color => self.color.as_deref(),
            Channel::FacetRow => self.facet_row.as_deref(),
            Channel::FacetCol => self.facet_col.as_deref(),
            Channel::Size => self.size.as_deref(),
        }
    }
}
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Decorations {
    pub median_line: bool,
    pub rug: bool,
    pub smooth: bool,
    pub median_marker: bool,
    pub value_labels: bool,
    /// Bins per axis of a heat map, `(x, y)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_resolution: Option<(usize, usize)>,
}
impl Decorations {
    pub fn for_archetype(archetype: PlotArchetype, rows: usize, heatmap: Option<&HeatmapGrid>) -> Self {
        let mut d = Decorations::default();
        match archetype {
            PlotArchetype::Density => {
                d.median_line = true;
                d.rug = rows <= RUG_MAX_ROWS;
            }
            PlotArchetype::Scatter => {
                d.smooth = rows >= SMOOTH_MIN_ROWS;
                d.rug = rows <= RUG_MAX_ROWS;
            }
            PlotArchetype::Hexbin => d.smooth = true,
            PlotArchetype::Violin | PlotArchetype::Boxplot => d.median_marker = true,
            PlotArchetype::Bar => d.value_labels = true,
            PlotArchetype::Heatmap => {
                d.heatmap_resolution = heatmap.map(|g| (g.x_levels.len(), g.y_levels.len()));
            }
            PlotArchetype::DotChart | PlotArchetype::Spine => {}
        }
        d
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSpec {
    pub formula: String,
    pub archetype: PlotArchetype,
    /// Archetype the decision table matched before falling back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<PlotArchetype>,
    pub axes: Vec<AxisSpec>,
    pub channels: Channels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetLayout>,
    pub level_orders: Vec<LevelOrder>,
    pub overplot: OverplotRemedy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<HeatmapGrid>,
    pub decorations: Decorations,
    pub coord_flip: bool,
    pub rows: usize,
    pub total_weight: f64,
    /// Row count before sampling, when the data was sampled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_from: Option<usize>,
}
impl PlotSpec {
    pub fn axis(&self, column: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.column == column)
    }
    pub fn level_order(&self, column: &str) -> Option<&LevelOrder> {
        self.level_orders.iter().find(|o| o.column == column)
    }
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
/// Everything the earlier stages decided for one plot.
#[derive(Debug, Clone)]
pub struct EmitInput {
    pub formula: String,
    pub archetype: PlotArchetype,
    pub primary: PlotArchetype,
    pub axes: Vec<AxisSpec>,
    pub channels: Channels,
    pub facets: Option<FacetLayout>,
    pub level_orders: Vec<LevelOrder>,
    pub overplot: OverplotRemedy,
    pub heatmap: Option<HeatmapGrid>,
    pub coord_flip: bool,
    pub rows: usize,
    pub total_weight: f64,
    pub sampled_from: Option<usize>,
}
/// Assembles the final spec, adding the archetype's decorations. Fails
/// when a channel the archetype requires is unbound or a bound column has
/// neither an axis spec, a level order nor the weight placeholder.
pub fn emit(input: EmitInput) -> Result<PlotSpec> {
    let missing: Vec<&str> = input
        .archetype
        .required_channels()
        .iter()
        .filter(|c| input.channels.get(**c).is_none())
        .map(|c| match c {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Color => "color",
            Channel::FacetRow => "facet_row",
            Channel::FacetCol => "facet_col",
            Channel::Size => "size",
        })
        .collect();
    if !missing.is_empty() {
        return Err(PlotError::UnsupportedVariableCombination {
            stage: Stage::Emitter,
            columns: input.axes.iter().map(|a| a.column.clone()).collect(),
            reason: format!("{} needs unbound channels: {}", input.archetype, missing.join(", ")),
        });
    }
    let described = |column: &str| {
        column == WEIGHT_CHANNEL
            || input.axes.iter().any(|a| a.column == column)
            || input.level_orders.iter().any(|o| o.column == column)
    };
    if let Some(unknown) = [&input.channels.x, &input.channels.y, &input.channels.color]
        .into_iter()
        .flatten()
        .find(|c| !described(c))
    {
        return Err(PlotError::UnsupportedVariableCombination {
            stage: Stage::Emitter,
            columns: vec![unknown.clone()],
            reason: "bound column has no axis or level order".to_string(),
        });
    }
    let decorations = Decorations::for_archetype(input.archetype, input.rows, input.heatmap.as_ref());
    Ok(PlotSpec {
        formula: input.formula,
        archetype: input.archetype,
        fallback_from: (input.primary != input.archetype).then_some(input.primary),
        axes: input.axes,
        channels: input.channels,
        facets: input.facets,
        level_orders: input.level_orders,
        overplot: input.overplot,
        heatmap: input.heatmap,
        decorations,
        coord_flip: input.coord_flip,
        rows: input.rows,
        total_weight: input.total_weight,
        sampled_from: input.sampled_from,
    })
}
