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

use crate::classifier::{classify_formula, Frame, Variable, VariableKind};
use crate::dataset::Dataset;
use crate::discretize::{discretize_variable, summarise_grid, weight_grid, Bins};
use crate::error::{PlotError, Result, Stage};
use crate::formula::{normalize, Formula, FormulaSpec, NormalizedFormula, MAX_VARIABLES};
use crate::informativeness::{conditional_entropy, rank_by_informativeness};
use crate::options::{EngineOptions, DEFAULT_OPTIONS};
use crate::ordering::{lump_levels, order_levels, LevelOrder};
use crate::overplot::{select_remedy, OverplotRemedy};
use crate::sampler::{weighted_sample, SampleOutcome};
use crate::selector::{
    resolve_conditioning, select_archetype, ConditioningBinding, FacetLayout, FacetOrientation, GroupSizes,
    PlotArchetype, Selection, SelectionInput, VariableSummary,
};
use crate::spec::{emit, AxisSpec, Channels, EmitInput, PlotSpec, WEIGHT_CHANNEL};
use crate::trace::DecisionTrace;
use crate::transform::{select_transform, AxisTransform};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_json::json;
use tracing::{debug, info, warn};

/// Entry point: turns a dataset and a formula into a [`PlotSpec`].
#[derive(Debug, Clone)]
pub struct PlotEngine {
    options: EngineOptions,
}
impl Default for PlotEngine {
    fn default() -> Self {
        Self {
            options: DEFAULT_OPTIONS.clone(),
        }
    }
}
fn summary(variable: &Variable) -> VariableSummary {
    VariableSummary {
        kind: variable.kind,
        levels: variable.observed_count(),
    }
}
fn group_sizes(factor: &Variable) -> Option<GroupSizes> {
    let codes = factor.codes()?;
    let mut counts = vec![0usize; factor.levels().len()];
    for c in codes {
        counts[*c as usize] += 1;
    }
    GroupSizes::from_counts(&counts)
}
/// One categorical or binned axis of the chart.
struct PreparedAxis {
    spec: AxisSpec,
    order: Option<LevelOrder>,
    variable: Variable,
}
impl PlotEngine {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_options(options: EngineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
    pub fn plot(&self, dataset: &Dataset, formula: &str) -> Result<PlotSpec> {
        self.plot_formula(dataset, &FormulaSpec::parse(formula)?)
    }
    pub fn plot_formula(&self, dataset: &Dataset, formula: &FormulaSpec) -> Result<PlotSpec> {
        let mut trace = DecisionTrace::new(self.options.verbose);
        self.run(dataset, formula, self.options.seed, &mut trace)
    }
    /// Like [`plot`](Self::plot), also returning every recorded decision.
    pub fn plot_with_trace(&self, dataset: &Dataset, formula: &str) -> Result<(PlotSpec, DecisionTrace)> {
        let spec = FormulaSpec::parse(formula)?;
        let mut trace = DecisionTrace::new(true);
        let plot = self.run(dataset, &spec, self.options.seed, &mut trace)?;
        Ok((plot, trace))
    }
    /// One plot per formula of a wildcard expansion (every column on its
    /// own when `formula` is `None`), most informative first. Items fail
    /// independently.
    pub fn overview(&self, dataset: &Dataset, formula: Option<&str>) -> Result<Vec<Result<PlotSpec>>> {
        let mut trace = DecisionTrace::new(self.options.verbose);
        let sample = self.sample(dataset, self.options.seed, &mut trace)?;
        let spec = match formula {
            Some(text) => FormulaSpec::parse(text)?,
            None => FormulaSpec::new().wildcard_response(),
        };
        let formulas = normalize(&spec, &sample.dataset)?.into_formulas();
        let mut scored: Vec<(f64, Formula)> = formulas
            .into_par_iter()
            .map(|f| (self.informativeness(&sample.dataset, &f), f))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        info!(
            target: "autoplot::engine",
            plots = scored.len(),
            "building overview"
        );
        Ok(scored
            .par_iter()
            .map(|(_, f)| {
                let mut item_trace = DecisionTrace::new(self.options.verbose);
                self.decide(&sample, f, self.options.seed, &mut item_trace)
            })
            .collect())
    }
    /// Plots one to three distinct columns drawn with `seed`; the first
    /// drawn column is the response.
    pub fn random_plot(&self, dataset: &Dataset, seed: u64) -> Result<PlotSpec> {
        let names = dataset.column_names();
        if names.is_empty() {
            return Err(PlotError::invalid_formula("dataset has no columns"));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let k = rng.gen_range(1..=names.len().min(MAX_VARIABLES));
        let picked = index::sample(&mut rng, names.len(), k).into_vec();
        let spec = picked[1..]
            .iter()
            .fold(FormulaSpec::new().response(names[picked[0]].clone()), |s, &i| {
                s.explanatory(names[i].clone())
            });
        debug!(
            target: "autoplot::engine",
            seed,
            columns = ?picked.iter().map(|&i| names[i].as_str()).collect::<Vec<_>>(),
            "drew random formula"
        );
        let mut trace = DecisionTrace::new(self.options.verbose);
        self.run(dataset, &spec, seed, &mut trace)
    }
    fn run(&self, dataset: &Dataset, formula: &FormulaSpec, seed: u64, trace: &mut DecisionTrace) -> Result<PlotSpec> {
        let sample = self.sample(dataset, seed, trace)?;
        let formula = match normalize(formula, &sample.dataset)? {
            NormalizedFormula::Single(f) => f,
            NormalizedFormula::Expanded(fs) => {
                return Err(PlotError::invalid_formula(format!(
                    "wildcard expands to {} plots, use overview",
                    fs.len()
                )))
            }
        };
        self.decide(&sample, &formula, seed, trace)
    }
    fn sample(&self, dataset: &Dataset, seed: u64, trace: &mut DecisionTrace) -> Result<SampleOutcome> {
        if !self.options.sampling {
            return Ok(SampleOutcome {
                dataset: dataset.clone(),
                indices: None,
                original_rows: dataset.n_rows(),
            });
        }
        let outcome = weighted_sample(dataset, self.options.sample_max_rows, seed)?;
        if outcome.was_sampled() {
            trace.record_with(
                Stage::Sampler,
                format!("sampled {} of {} rows", outcome.dataset.n_rows(), outcome.original_rows),
                [("seed", json!(seed)), ("ceiling", json!(self.options.sample_max_rows))],
            );
        }
        Ok(outcome)
    }
    /// `H(response | first explanatory)`, or zero for single-variable formulas.
    fn informativeness(&self, dataset: &Dataset, formula: &Formula) -> f64 {
        let Some(candidate) = formula.explanatory.first() else {
            return 0.0;
        };
        let Ok(frame) = classify_formula(dataset, formula, &self.options) else {
            return f64::INFINITY;
        };
        match (frame.response(), frame.variable(candidate)) {
            (Some(r), Some(c)) => conditional_entropy(c, r, &frame.weights, self.options.entropy_bins),
            _ => f64::INFINITY,
        }
    }
    fn plotted_variables(&self, frame: &Frame, trace: &mut DecisionTrace) -> Result<Vec<Variable>> {
        let response = frame
            .response()
            .ok_or_else(|| PlotError::invalid_formula("no response or explanatory column"))?;
        let mut explanatory = frame.explanatory();
        if explanatory.len() == 2 {
            let ranked = rank_by_informativeness(response, &explanatory, &frame.weights, self.options.entropy_bins);
            trace.record_with(
                Stage::Informativeness,
                "ranked explanatory variables by conditional entropy",
                ranked.iter().map(|(i, h)| (explanatory[*i].name.clone(), json!(h))),
            );
            let ordered: Vec<&Variable> = ranked.iter().map(|(i, _)| explanatory[*i]).collect();
            explanatory = ordered;
        }
        let mut plotted: Vec<Variable> = std::iter::once(response).chain(explanatory).cloned().collect();
        for variable in plotted.iter_mut().filter(|v| v.kind == VariableKind::UnorderedCategorical) {
            if let Some((lumped, n)) = lump_levels(variable, &frame.weights, self.options.max_factor_levels) {
                trace.record(
                    Stage::Ordering,
                    format!("lumped {n} light levels of '{}' into \"(other)\"", variable.name),
                );
                *variable = lumped;
            }
        }
        Ok(plotted)
    }
    fn select(&self, frame: &Frame, plotted: &[Variable], trace: &mut DecisionTrace) -> Result<Selection> {
        let variables: Vec<VariableSummary> = plotted.iter().map(summary).collect();
        let groups = match plotted {
            [a, b] if a.kind.is_numeric() != b.kind.is_numeric() => {
                group_sizes(if a.kind.is_categorical() { a } else { b })
            }
            _ => None,
        };
        let input = SelectionInput {
            variables,
            has_conditioning: frame.conditioning().is_some(),
            rows: frame.n_rows(),
            non_uniform_weights: !frame.uniform_weights(),
            groups,
        };
        let selection = select_archetype(&input, &self.options).map_err(|e| PlotError::UnsupportedVariableCombination {
            stage: Stage::Selector,
            columns: plotted.iter().map(|v| v.name.clone()).collect(),
            reason: e.to_string(),
        })?;
        trace.record_with(
            Stage::Selector,
            format!("{} ({})", selection.archetype, selection.rule),
            [
                ("primary", json!(selection.primary)),
                ("fallback_reason", json!(selection.fallback_reason)),
                ("rows", json!(input.rows)),
                ("coord_flip", json!(selection.coord_flip)),
            ],
        );
        Ok(selection)
    }
    fn axis_transform(&self, variable: &Variable, weights: &[f64], trace: &mut DecisionTrace) -> Result<AxisTransform> {
        let values = variable.as_numeric().unwrap_or_default();
        match select_transform(&variable.name, values, weights, self.options.trans_log_threshold) {
            Ok(decision) => {
                trace.record_with(
                    Stage::Transform,
                    format!("{}: {}", decision.column, decision.reason),
                    [
                        ("transform", json!(decision.transform)),
                        ("identity_occupancy", json!(decision.identity_occupancy)),
                        ("log_occupancy", json!(decision.log_occupancy)),
                        ("log_modulus_occupancy", json!(decision.log_modulus_occupancy)),
                    ],
                );
                Ok(decision.transform)
            }
            Err(e) if e.is_recoverable() => {
                warn!(target: "autoplot::transform", column = %variable.name, error = %e, "skipping axis transform");
                trace.record(Stage::Transform, format!("{}: skipped, {e}", variable.name));
                Ok(AxisTransform::None)
            }
            Err(e) => Err(e),
        }
    }
    /// Categorical axis, or a numeric one binned for a heat map.
    fn categorical_axis(
        &self,
        variable: &Variable,
        by: Option<&Variable>,
        weights: &[f64],
        bins: Option<usize>,
        trace: &mut DecisionTrace,
    ) -> Result<PreparedAxis> {
        if let (Some(max_bins), true) = (bins, variable.kind.is_numeric()) {
            let (binned, edges) = discretize_variable(variable, weights, max_bins)?;
            trace.record_with(
                Stage::Discretize,
                format!("binned '{}' into {} equal-weight bins", variable.name, edges.len()),
                [("edges", json!(edges.edges()))],
            );
            return Ok(PreparedAxis {
                spec: AxisSpec::new(&variable.name, variable.kind).with_bins(edges.edges()),
                order: Some(LevelOrder::from_bins(&variable.name, &edges)),
                variable: binned,
            });
        }
        let order = order_levels(variable, by, weights);
        if let Some(o) = &order {
            trace.record_with(
                Stage::Ordering,
                format!("ordered '{}' by {:?}", o.column, o.method),
                [("levels", json!(o.levels))],
            );
        }
        Ok(PreparedAxis {
            spec: AxisSpec::new(&variable.name, variable.kind),
            order,
            variable: variable.clone(),
        })
    }
    fn decide(&self, sample: &SampleOutcome, formula: &Formula, seed: u64, trace: &mut DecisionTrace) -> Result<PlotSpec> {
        let frame = classify_formula(&sample.dataset, formula, &self.options)?;
        for v in &frame.variables {
            trace.record_with(
                Stage::Classifier,
                format!("'{}' is {:?}", v.name, v.kind),
                [("distinct", json!(v.observed_count())), ("reclassified", json!(v.reclassified))],
            );
        }
        let weights = frame.weights.as_slice();
        let plotted = self.plotted_variables(&frame, trace)?;
        let selection = self.select(&frame, &plotted, trace)?;
        let archetype = selection.archetype;
        let roles = selection.roles;
        let x_var = roles.x.map(|i| &plotted[i]);
        let y_var = roles.y.map(|i| &plotted[i]);
        let fill_var = roles.fill.map(|i| &plotted[i]);

        let mut axes = Vec::new();
        let mut orders = Vec::new();
        let mut channels = Channels {
            x: x_var.map(|v| v.name.clone()),
            y: y_var.map(|v| v.name.clone()),
            color: fill_var.map(|v| v.name.clone()),
            ..Channels::default()
        };
        let mut heatmap = None;
        let mut overplot = OverplotRemedy::None;

        match archetype {
            PlotArchetype::Density => {
                if let Some(x) = x_var {
                    let t = self.axis_transform(x, weights, trace)?;
                    axes.push(AxisSpec::new(&x.name, x.kind).with_transform(t));
                }
            }
            PlotArchetype::Scatter | PlotArchetype::Hexbin => {
                let (Some(x), Some(y)) = (x_var, y_var) else {
                    return Err(PlotError::degenerate(Stage::Selector, &formula.to_string(), "missing axis"));
                };
                for v in [x, y] {
                    let t = self.axis_transform(v, weights, trace)?;
                    axes.push(AxisSpec::new(&v.name, v.kind).with_transform(t));
                }
                let decision = select_remedy(
                    archetype,
                    x.as_numeric().unwrap_or_default(),
                    y.as_numeric().unwrap_or_default(),
                    frame.uniform_weights(),
                    &self.options,
                    seed,
                );
                trace.record_with(
                    Stage::Overplot,
                    decision.reason.clone(),
                    [
                        ("duplicate_rate", json!(decision.duplicate_rate)),
                        ("max_multiplicity", json!(decision.max_multiplicity)),
                    ],
                );
                if matches!(decision.remedy, OverplotRemedy::SizeByWeight { .. }) {
                    channels.size = Some(WEIGHT_CHANNEL.to_string());
                }
                if archetype == PlotArchetype::Hexbin {
                    channels.color = Some(WEIGHT_CHANNEL.to_string());
                }
                overplot = decision.remedy;
            }
            PlotArchetype::Heatmap => {
                let (Some(x), Some(y)) = (x_var, y_var) else {
                    return Err(PlotError::degenerate(Stage::Selector, &formula.to_string(), "missing axis"));
                };
                let bins = Some(self.options.heatmap_bins);
                let px = self.categorical_axis(x, fill_var.or(Some(y)), weights, bins, trace)?;
                let py = self.categorical_axis(y, fill_var.or(Some(x)), weights, bins, trace)?;
                let grid = match fill_var {
                    Some(color) => {
                        if color.kind.is_numeric() {
                            axes.push(AxisSpec::new(&color.name, color.kind));
                        } else if let Some(o) = order_levels(color, None, weights) {
                            orders.push(o);
                        }
                        summarise_grid(&px.variable, &py.variable, color, weights)?
                    }
                    None => {
                        channels.color = Some(WEIGHT_CHANNEL.to_string());
                        weight_grid(&px.variable, &py.variable, weights)?
                    }
                };
                trace.record(
                    Stage::Discretize,
                    format!("heat map with {} of {} cells filled", grid.filled_cells(), px.variable.levels().len() * py.variable.levels().len()),
                );
                heatmap = Some(grid);
                for p in [px, py] {
                    axes.push(p.spec);
                    orders.extend(p.order);
                }
            }
            PlotArchetype::Spine => {
                let Some(fill) = fill_var else {
                    return Err(PlotError::degenerate(Stage::Selector, &formula.to_string(), "missing fill"));
                };
                for v in [x_var, y_var].into_iter().flatten() {
                    let p = self.categorical_axis(v, Some(fill), weights, None, trace)?;
                    axes.push(p.spec);
                    orders.extend(p.order);
                }
                orders.extend(order_levels(fill, None, weights));
            }
            PlotArchetype::DotChart | PlotArchetype::Bar | PlotArchetype::Violin | PlotArchetype::Boxplot => {
                let Some(factor) = x_var else {
                    return Err(PlotError::degenerate(Stage::Selector, &formula.to_string(), "missing axis"));
                };
                let p = self.categorical_axis(factor, y_var, weights, None, trace)?;
                axes.push(p.spec);
                orders.extend(p.order);
                match y_var {
                    Some(value) => {
                        let t = self.axis_transform(value, weights, trace)?;
                        axes.push(AxisSpec::new(&value.name, value.kind).with_transform(t));
                    }
                    None => channels.y = Some(WEIGHT_CHANNEL.to_string()),
                }
            }
        }

        let facets = match frame.conditioning() {
            Some(cond) => self.condition(cond, &plotted[0], &selection, weights, &mut channels, &mut orders, trace)?,
            None => None,
        };
        info!(
            target: "autoplot::engine",
            formula = %formula,
            archetype = %archetype,
            fallback_from = ?(selection.primary != archetype).then_some(selection.primary),
            rows = frame.n_rows(),
            "selected plot"
        );
        emit(EmitInput {
            formula: formula.to_string(),
            archetype,
            primary: selection.primary,
            axes,
            channels,
            facets,
            level_orders: orders,
            overplot,
            heatmap,
            coord_flip: selection.coord_flip,
            rows: frame.n_rows(),
            total_weight: frame.total_weight(),
            sampled_from: sample.was_sampled().then_some(sample.original_rows),
        })
    }
    /// Binds the conditioning variable to color or to facets.
    #[allow(clippy::too_many_arguments)]
    fn condition(
        &self,
        cond: &Variable,
        response: &Variable,
        selection: &Selection,
        weights: &[f64],
        channels: &mut Channels,
        orders: &mut Vec<LevelOrder>,
        trace: &mut DecisionTrace,
    ) -> Result<Option<FacetLayout>> {
        match resolve_conditioning(selection, summary(cond), &self.options) {
            ConditioningBinding::Color => {
                trace.record(Stage::Selector, format!("'{}' bound to color", cond.name));
                channels.color = Some(cond.name.clone());
                orders.extend(order_levels(cond, Some(response), weights));
                Ok(None)
            }
            ConditioningBinding::Facet(layout) => {
                let (mut panels, mut bins): (Variable, Option<Bins>) = if cond.kind.is_numeric() {
                    let (binned, edges) = discretize_variable(cond, weights, self.options.facet_num_bins)?;
                    (binned, Some(edges))
                } else {
                    (cond.clone(), None)
                };
                if let Some((lumped, n)) = lump_levels(&panels, weights, layout.capacity()) {
                    trace.record(
                        Stage::Ordering,
                        format!("lumped {n} facet levels of '{}' to fit {} panels", cond.name, layout.capacity()),
                    );
                    panels = lumped;
                    bins = None;
                }
                let order = match &bins {
                    Some(edges) => Some(LevelOrder::from_bins(&cond.name, edges)),
                    None => order_levels(&panels, Some(response), weights),
                };
                orders.extend(order);
                match layout.orientation {
                    FacetOrientation::Rows => channels.facet_row = Some(cond.name.clone()),
                    FacetOrientation::Columns | FacetOrientation::Wrap => channels.facet_col = Some(cond.name.clone()),
                }
                trace.record_with(
                    Stage::Selector,
                    format!("'{}' faceted {:?}", cond.name, layout.orientation),
                    [("rows", json!(layout.rows)), ("cols", json!(layout.cols))],
                );
                Ok(Some(layout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn mixed() -> Dataset {
        let n = 200;
        Dataset::builder()
            .column("x", Column::numeric((0..n).map(|i| f64::from(i) * 1.5)))
            .column("y", Column::numeric((0..n).map(|i| f64::from(i % 37) + 0.25)))
            .column("g", Column::categorical((0..n).map(|i| ["a", "b", "c"][i as usize % 3])))
            .column("h", Column::categorical((0..n).map(|i| format!("h{}", i % 9))))
            .build()
            .unwrap()
    }

    #[test]
    fn conditioning_with_few_levels_goes_to_color() {
        let spec = PlotEngine::new().plot(&mixed(), "y ~ x | g").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Scatter);
        assert_eq!(spec.channels.color.as_deref(), Some("g"));
        assert!(spec.facets.is_none());
        assert!(spec.level_order("g").is_some());
    }

    #[test]
    fn conditioning_with_many_levels_facets() {
        let spec = PlotEngine::new().plot(&mixed(), "x ~ 1 | h").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Density);
        let facets = spec.facets.unwrap();
        assert!(facets.capacity() >= 9);
        assert!(spec.channels.facet_row.is_some() || spec.channels.facet_col.is_some());
    }

    #[test]
    fn numeric_conditioning_is_binned_into_facets() {
        let spec = PlotEngine::new().plot(&mixed(), "g ~ 1 | x").unwrap();
        assert_eq!(spec.channels.facet_col.as_deref(), Some("x"));
        assert_eq!(spec.level_order("x").unwrap().len(), 4);
    }

    #[test]
    fn violin_orders_groups_by_median() {
        let spec = PlotEngine::new().plot(&mixed(), "y ~ g").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Violin);
        assert!(spec.coord_flip);
        assert!(spec.decorations.median_marker);
        assert_eq!(spec.level_order("g").unwrap().len(), 3);
    }

    fn categories() -> Dataset {
        let n = 240;
        Dataset::builder()
            .column("g", Column::categorical((0..n).map(|i| ["a", "b", "c"][i % 3])))
            .column("h", Column::categorical((0..n).map(|i| format!("h{}", i % 5))))
            .column("k", Column::categorical((0..n).map(|i| ["u", "v"][(i / 7) % 2])))
            .column("x", Column::numeric((0..n).map(|i| i as f64 * 0.5)))
            .build()
            .unwrap()
    }

    #[test]
    fn heatmap_with_numeric_response_colors_by_it() {
        let spec = PlotEngine::new().plot(&mixed(), "y ~ x + g").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Heatmap);
        assert_eq!(spec.fallback_from, None);
        assert_eq!(spec.channels.color.as_deref(), Some("y"));
        assert_eq!(spec.axis("y").unwrap().kind, VariableKind::Numeric);
        assert!(spec.axis("x").unwrap().discretization.is_some());
        assert!(spec.heatmap.as_ref().unwrap().filled_cells() > 0);
    }

    #[test]
    fn categorical_pair_with_numeric_response_falls_back_to_heatmap() {
        let spec = PlotEngine::new().plot(&mixed(), "y ~ g + h").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Heatmap);
        assert_eq!(spec.fallback_from, Some(PlotArchetype::Spine));
        assert_eq!(spec.channels.color.as_deref(), Some("y"));
        assert!(spec.axis("y").is_some());
        assert!(spec.level_order("g").is_some());
        assert!(spec.level_order("h").is_some());
    }

    #[test]
    fn factor_pair_is_a_spine() {
        let spec = PlotEngine::new().plot(&categories(), "g ~ h").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Spine);
        assert_eq!(spec.channels.x.as_deref(), Some("h"));
        assert_eq!(spec.channels.color.as_deref(), Some("g"));
        assert_eq!(spec.level_order("h").unwrap().len(), 5);
        assert_eq!(spec.level_order("g").unwrap().len(), 3);
        assert!(spec.heatmap.is_none());
    }

    #[test]
    fn three_factors_make_a_spine() {
        let spec = PlotEngine::new().plot(&categories(), "g ~ h + k").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Spine);
        assert_eq!(spec.channels.color.as_deref(), Some("g"));
        let mut bound = vec![spec.channels.x.clone().unwrap(), spec.channels.y.clone().unwrap()];
        bound.sort();
        assert_eq!(bound, vec!["h", "k"]);
        for column in ["g", "h", "k"] {
            assert!(spec.level_order(column).is_some(), "no order for {column}");
        }
    }

    #[test]
    fn spine_facets_numeric_conditioning() {
        let spec = PlotEngine::new().plot(&categories(), "g ~ h | x").unwrap();
        assert_eq!(spec.archetype, PlotArchetype::Spine);
        assert_eq!(spec.channels.color.as_deref(), Some("g"));
        assert_eq!(spec.channels.facet_col.as_deref(), Some("x"));
        let facets = spec.facets.unwrap();
        assert_eq!(facets.orientation, FacetOrientation::Wrap);
        assert!(facets.capacity() >= 4);
        assert_eq!(spec.level_order("x").unwrap().len(), 4);
    }

    #[test]
    fn wildcard_needs_overview() {
        let err = PlotEngine::new().plot(&mixed(), "y ~ .").unwrap_err();
        assert!(matches!(err, PlotError::InvalidFormula { .. }));
        let all = PlotEngine::new().overview(&mixed(), Some("y ~ .")).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn trace_records_each_stage() {
        let (_, trace) = PlotEngine::new().plot_with_trace(&mixed(), "y ~ x").unwrap();
        assert!(trace.for_stage(Stage::Classifier).count() >= 2);
        assert_eq!(trace.for_stage(Stage::Selector).count(), 1);
        assert!(trace.for_stage(Stage::Transform).count() >= 2);
    }

    #[test]
    fn rejects_invalid_options() {
        let options = EngineOptions {
            max_colors: 0,
            ..EngineOptions::default()
        };
        assert!(PlotEngine::with_options(options).is_err());
    }
}
