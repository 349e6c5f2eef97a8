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

//! Chart archetype decision table.
//!
//! The table is keyed on the kinds of the plotted variables (response
//! first, then the explanatory variables in informativeness order). Each
//! row names a primary archetype and at most one fallback; the fallback is
//! only considered once the primary row has matched.
//!
//! | response    | explanatory             | primary | fallback                                   |
//! |-------------|-------------------------|---------|--------------------------------------------|
//! | numeric     | -                       | density | -                                          |
//! | categorical | -                       | dot     | bar, few levels                            |
//! | numeric     | numeric                 | scatter | hexbin, many rows                          |
//! | categorical | categorical             | spine   | heatmap, too many levels                   |
//! | numeric     | categorical (or mirror) | violin  | bar, one row per level; boxplot, too many/small groups |
//! | any         | two categorical         | spine   | heatmap, non-categorical response or many levels |
//! | any         | two, mixed              | heatmap | -                                          |

use crate::classifier::VariableKind;
use crate::options::EngineOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotArchetype {
    Density,
    DotChart,
    Bar,
    Scatter,
    Hexbin,
    Spine,
    Heatmap,
    Violin,
    Boxplot,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    X,
    Y,
    Color,
    FacetRow,
    FacetCol,
    Size,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetOrientation {
    /// Panels stacked vertically, sharing the x axis.
    Rows,
    /// Panels side by side, sharing the y axis.
    Columns,
    Wrap,
}
impl PlotArchetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlotArchetype::Density => "density",
            PlotArchetype::DotChart => "dot_chart",
            PlotArchetype::Bar => "bar",
            PlotArchetype::Scatter => "scatter",
            PlotArchetype::Hexbin => "hexbin",
            PlotArchetype::Spine => "spine",
            PlotArchetype::Heatmap => "heatmap",
            PlotArchetype::Violin => "violin",
            PlotArchetype::Boxplot => "boxplot",
        }
    }
    /// Channels the archetype binds before any conditioning.
    pub fn required_channels(&self) -> &'static [Channel] {
        match self {
            PlotArchetype::Density | PlotArchetype::DotChart => &[Channel::X],
            PlotArchetype::Bar => &[Channel::X, Channel::Y],
            PlotArchetype::Scatter => &[Channel::X, Channel::Y],
            PlotArchetype::Hexbin => &[Channel::X, Channel::Y, Channel::Color],
            PlotArchetype::Spine => &[Channel::X, Channel::Color],
            PlotArchetype::Heatmap => &[Channel::X, Channel::Y, Channel::Color],
            PlotArchetype::Violin | PlotArchetype::Boxplot => &[Channel::X, Channel::Y],
        }
    }
    /// Whether a conditioning variable can still be mapped to color.
    pub fn has_free_color_channel(&self) -> bool {
        !self.required_channels().contains(&Channel::Color)
    }
    /// Whether one axis is categorical so the chart may be drawn flipped.
    pub fn has_factor_axis(&self) -> bool {
        matches!(
            self,
            PlotArchetype::DotChart
                | PlotArchetype::Bar
                | PlotArchetype::Violin
                | PlotArchetype::Boxplot
        )
    }
    pub fn facet_orientation(&self, flipped: bool) -> FacetOrientation {
        match self {
            PlotArchetype::Density => FacetOrientation::Rows,
            PlotArchetype::DotChart => FacetOrientation::Columns,
            a if a.has_factor_axis() && flipped => FacetOrientation::Columns,
            a if a.has_factor_axis() => FacetOrientation::Rows,
            _ => FacetOrientation::Wrap,
        }
    }
}
impl fmt::Display for PlotArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariableSummary {
    pub kind: VariableKind,
    /// Observed levels for categorical variables, distinct values otherwise.
    pub levels: usize,
}
/// Row counts per level of the categorical variable in a numeric/categorical pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupSizes {
    pub min: usize,
    pub median: usize,
    pub max: usize,
}
impl GroupSizes {
    pub fn from_counts(counts: &[usize]) -> Option<Self> {
        let mut sorted: Vec<usize> = counts.iter().copied().filter(|c| *c > 0).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_unstable();
        Some(Self {
            min: sorted[0],
            median: sorted[(sorted.len() - 1) / 2],
            max: sorted[sorted.len() - 1],
        })
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionInput {
    /// Response first, then explanatory variables in informativeness order.
    pub variables: Vec<VariableSummary>,
    pub has_conditioning: bool,
    pub rows: usize,
    pub non_uniform_weights: bool,
    pub groups: Option<GroupSizes>,
}
/// Indices into `SelectionInput::variables` for the primary channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Roles {
    pub x: Option<usize>,
    pub y: Option<usize>,
    pub fill: Option<usize>,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub archetype: PlotArchetype,
    /// Table entry that matched before any fallback.
    pub primary: PlotArchetype,
    pub fallback_reason: Option<String>,
    pub rule: &'static str,
    pub roles: Roles,
    pub coord_flip: bool,
    pub weighted: bool,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    NoVariables,
    TooManyVariables(usize),
}
impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::NoVariables => write!(f, "no plotted variables"),
            SelectionError::TooManyVariables(n) => {
                write!(f, "{n} plotted variables, at most 3 are supported")
            }
        }
    }
}
struct Decision {
    primary: PlotArchetype,
    fallback: Option<(PlotArchetype, String)>,
    rule: &'static str,
    roles: Roles,
}
impl Decision {
    fn new(primary: PlotArchetype, rule: &'static str, roles: Roles) -> Self {
        Self {
            primary,
            fallback: None,
            rule,
            roles,
        }
    }
    fn or_fallback(mut self, trigger: bool, fallback: PlotArchetype, reason: impl FnOnce() -> String) -> Self {
        if trigger && self.fallback.is_none() {
            self.fallback = Some((fallback, reason()));
        }
        self
    }
}
fn roles(x: Option<usize>, y: Option<usize>, fill: Option<usize>) -> Roles {
    Roles { x, y, fill }
}
fn single(v: VariableSummary, options: &EngineOptions) -> Decision {
    if v.kind.is_numeric() {
        return Decision::new(PlotArchetype::Density, "one numeric variable", roles(Some(0), None, None));
    }
    Decision::new(PlotArchetype::DotChart, "one categorical variable", roles(Some(0), None, None))
        .or_fallback(v.levels <= options.bar_max_levels, PlotArchetype::Bar, || {
            format!("{} levels <= bar_max_levels {}", v.levels, options.bar_max_levels)
        })
}
fn pair(input: &SelectionInput, options: &EngineOptions) -> Decision {
    let (response, explanatory) = (input.variables[0], input.variables[1]);
    match (response.kind.is_numeric(), explanatory.kind.is_numeric()) {
        (true, true) => Decision::new(PlotArchetype::Scatter, "numeric ~ numeric", roles(Some(1), Some(0), None))
            .or_fallback(input.rows > options.min_points_hexbin, PlotArchetype::Hexbin, || {
                format!("{} rows > min_points_hexbin {}", input.rows, options.min_points_hexbin)
            }),
        (false, false) => {
            Decision::new(PlotArchetype::Spine, "categorical ~ categorical", roles(Some(1), None, Some(0)))
                .or_fallback(explanatory.levels > options.max_spine_levels, PlotArchetype::Heatmap, || {
                    format!(
                        "{} explanatory levels exceed max_spine_levels {}",
                        explanatory.levels, options.max_spine_levels
                    )
                })
                .map_heatmap_roles()
        }
        (numeric_response, _) => {
            let (factor, value) = if numeric_response { (1, 0) } else { (0, 1) };
            let groups = input.variables[factor].levels;
            let sizes = input.groups;
            Decision::new(PlotArchetype::Violin, "numeric ~ categorical", roles(Some(factor), Some(value), None))
                .or_fallback(sizes.is_some_and(|g| g.max <= 1), PlotArchetype::Bar, || {
                    "at most one row per level".to_string()
                })
                .or_fallback(groups > options.max_violins, PlotArchetype::Boxplot, || {
                    format!("{groups} groups > max_violins {}", options.max_violins)
                })
                .or_fallback(
                    sizes.is_some_and(|g| g.median < options.min_points_violin),
                    PlotArchetype::Boxplot,
                    || format!("median group below min_points_violin {}", options.min_points_violin),
                )
        }
    }
}
impl Decision {
    /// A categorical pair drawn as a heat map puts the response on y and
    /// colors cells by weight instead of filling spines.
    fn map_heatmap_roles(mut self) -> Self {
        if matches!(self.fallback, Some((PlotArchetype::Heatmap, _))) {
            self.roles = roles(Some(1), Some(0), None);
        }
        self
    }
}
fn triple(input: &SelectionInput, options: &EngineOptions) -> Decision {
    let [response, first, second] = [input.variables[0], input.variables[1], input.variables[2]];
    let axes = roles(Some(1), Some(2), Some(0));
    if first.kind.is_categorical() && second.kind.is_categorical() {
        let widest = response.levels.max(first.levels).max(second.levels);
        return Decision::new(PlotArchetype::Spine, "any ~ categorical + categorical", axes)
            .or_fallback(response.kind.is_numeric(), PlotArchetype::Heatmap, || {
                "numeric response".to_string()
            })
            .or_fallback(widest > options.max_spine_levels, PlotArchetype::Heatmap, || {
                format!("{widest} levels exceed max_spine_levels {}", options.max_spine_levels)
            });
    }
    Decision::new(PlotArchetype::Heatmap, "any ~ two variables, not all categorical", axes)
}
/// Picks the archetype for the given variable kinds and counts. Pure and
/// deterministic in `input` and `options`.
pub fn select_archetype(input: &SelectionInput, options: &EngineOptions) -> Result<Selection, SelectionError> {
    let decision = match input.variables.len() {
        0 => return Err(SelectionError::NoVariables),
        1 => single(input.variables[0], options),
        2 => pair(input, options),
        3 => triple(input, options),
        n => return Err(SelectionError::TooManyVariables(n)),
    };
    let (archetype, fallback_reason) = match decision.fallback {
        Some((fallback, reason)) => (fallback, Some(reason)),
        None => (decision.primary, None),
    };
    Ok(Selection {
        archetype,
        primary: decision.primary,
        fallback_reason,
        rule: decision.rule,
        roles: decision.roles,
        coord_flip: archetype.has_factor_axis() && options.prefer_factors_vertical,
        weighted: input.non_uniform_weights,
    })
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FacetLayout {
    pub orientation: FacetOrientation,
    pub rows: usize,
    pub cols: usize,
}
impl FacetLayout {
    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "binding", rename_all = "snake_case")]
pub enum ConditioningBinding {
    Color,
    Facet(FacetLayout),
}
/// Lays out `panels` facets within the configured maxima, preferring a
/// single row or column in the given orientation.
pub fn facet_layout(panels: usize, orientation: FacetOrientation, options: &EngineOptions) -> FacetLayout {
    let panels = panels.max(1);
    match orientation {
        FacetOrientation::Rows if panels <= options.facet_max_rows => FacetLayout {
            orientation,
            rows: panels,
            cols: 1,
        },
        FacetOrientation::Columns if panels <= options.facet_max_cols => FacetLayout {
            orientation,
            rows: 1,
            cols: panels,
        },
        _ => {
            let cols = ((panels as f64).sqrt().ceil() as usize).clamp(1, options.facet_max_cols);
            let rows = panels.div_ceil(cols).min(options.facet_max_rows);
            FacetLayout {
                orientation: FacetOrientation::Wrap,
                rows,
                cols,
            }
        }
    }
}
/// Color when the archetype leaves color free and the (categorical)
/// conditioning variable has fewer than `max_colors` levels; facets
/// otherwise. Numeric conditioning is always faceted over
/// `facet_num_bins` bins.
pub fn resolve_conditioning(
    selection: &Selection,
    conditioning: VariableSummary,
    options: &EngineOptions,
) -> ConditioningBinding {
    if conditioning.kind.is_categorical()
        && selection.archetype.has_free_color_channel()
        && conditioning.levels < options.max_colors
    {
        return ConditioningBinding::Color;
    }
    let panels = if conditioning.kind.is_numeric() {
        options.facet_num_bins
    } else {
        conditioning.levels
    };
    let orientation = selection.archetype.facet_orientation(selection.coord_flip);
    ConditioningBinding::Facet(facet_layout(panels, orientation, options))
}
