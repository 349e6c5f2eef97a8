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

//! Equal-weight binning of numeric variables and per-cell summaries for
//! heat maps.
//!
//! Bin `0` is closed on both ends, `[e0, e1]`; every later bin is
//! `(e[i], e[i+1]]`. A first edge equal to the minimum therefore yields a
//! point bin holding exactly the minimum, which keeps zero-inflated columns
//! from smearing their mass into the next interval.

use crate::classifier::{Variable, VariableKind, VariableValues};
use crate::error::{PlotError, Result, Stage};
use crate::stats::{level_weights, weighted_mode, WeightedSample};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bins {
    edges: Vec<f64>,
}
impl Bins {
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Bin holding `value`, or `None` outside the binned range.
    pub fn assign(&self, value: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        let last = *self.edges.last()?;
        if !(first..=last).contains(&value) {
            return None;
        }
        // first i with value <= edges[i + 1]
        let upper = &self.edges[1..];
        Some(upper.partition_point(|e| *e < value).min(self.len() - 1))
    }
    pub fn label(&self, bin: usize) -> String {
        self.label_at(bin, self.label_precision())
    }
    /// One label per bin, printed with just enough digits to keep them distinct.
    pub fn labels(&self) -> Vec<String> {
        self.labels_at(self.label_precision())
    }
    fn label_at(&self, bin: usize, extra: Option<usize>) -> String {
        let lo = compact(self.edges[bin], extra);
        let hi = compact(self.edges[bin + 1], extra);
        if bin == 0 {
            format!("[{lo}, {hi}]")
        } else {
            format!("({lo}, {hi}]")
        }
    }
    fn labels_at(&self, extra: Option<usize>) -> Vec<String> {
        (0..self.len()).map(|b| self.label_at(b, extra)).collect()
    }
    /// Extra decimals needed for distinct labels; `None` means full precision.
    fn label_precision(&self) -> Option<usize> {
        (0..=MAX_EXTRA_DECIMALS).find(|&extra| {
            let labels = self.labels_at(Some(extra));
            let mut seen = HashSet::with_capacity(labels.len());
            labels.iter().all(|l| seen.insert(l.as_str()))
        })
    }
    /// Ordered-categorical stand-in for `variable` with one level per bin.
    pub fn to_variable(&self, variable: &Variable) -> Option<Variable> {
        let values = variable.as_numeric()?;
        let codes = values
            .iter()
            .map(|v| self.assign(*v).map(|b| b as u32))
            .collect::<Option<Vec<u32>>>()?;
        Some(Variable {
            name: variable.name.clone(),
            kind: VariableKind::OrderedCategorical,
            values: VariableValues::Categorical {
                levels: self.labels(),
                codes,
            },
            reclassified: true,
        })
    }
}
const MAX_EXTRA_DECIMALS: usize = 12;
fn compact(value: f64, extra: Option<usize>) -> String {
    let Some(extra) = extra else {
        return format!("{value}");
    };
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{value:.0}");
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (3 - magnitude).clamp(0, 12) as usize + extra;
    let text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
/// Partitions the observed range into at most `max_bins` bins of
/// near-equal weight.
pub fn equal_weight_bins(sample: &WeightedSample, max_bins: usize) -> Option<Bins> {
    let min = sample.min()?;
    let max = sample.max()?;
    let max_bins = max_bins.max(1);
    let mut edges = vec![min];
    for k in 1..max_bins {
        let Some(cut) = sample.quantile(k as f64 / max_bins as f64) else {
            continue;
        };
        let last = *edges.last().unwrap_or(&min);
        let point_bin = edges.len() == 1 && cut == min;
        if cut < max && (cut > last || point_bin) {
            edges.push(cut);
        }
    }
    edges.push(max);
    Some(Bins { edges })
}
/// Bins a numeric variable for use as a categorical axis or facet.
pub fn discretize_variable(variable: &Variable, weights: &[f64], max_bins: usize) -> Result<(Variable, Bins)> {
    let values = variable.as_numeric().ok_or_else(|| {
        PlotError::degenerate(Stage::Discretize, &variable.name, "not a numeric variable")
    })?;
    let sample = WeightedSample::from_slices(values, weights);
    let bins = equal_weight_bins(&sample, max_bins)
        .ok_or_else(|| PlotError::empty(Stage::Discretize, format!("no weighted values in '{}'", variable.name)))?;
    let binned = bins.to_variable(variable).ok_or_else(|| {
        PlotError::degenerate(Stage::Discretize, &variable.name, "value outside the binned range")
    })?;
    Ok((binned, bins))
}
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    NoData,
    Numeric(f64),
    Level(String),
}
/// Grid of per-cell color summaries; `cells[row][col]` with rows along `y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapGrid {
    pub x_levels: Vec<String>,
    pub y_levels: Vec<String>,
    pub cells: Vec<Vec<CellValue>>,
}
impl HeatmapGrid {
    pub fn filled_cells(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| **c != CellValue::NoData)
            .count()
    }
}
/// Central tendency of `color` within each `(x, y)` cell: weighted median
/// for numeric, nearest-to-median level for ordered, mode for unordered.
/// Cells without weight stay `NoData`.
pub fn summarise_grid(x: &Variable, y: &Variable, color: &Variable, weights: &[f64]) -> Result<HeatmapGrid> {
    let (Some(x_codes), Some(y_codes)) = (x.codes(), y.codes()) else {
        return Err(PlotError::UnsupportedVariableCombination {
            stage: Stage::Discretize,
            columns: vec![x.name.clone(), y.name.clone()],
            reason: "heat map axes must be categorical or binned".to_string(),
        });
    };
    let nx = x.levels().len();
    let ny = y.levels().len();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); nx * ny];
    for row in 0..weights.len() {
        if weights[row] > 0.0 {
            members[y_codes[row] as usize * nx + x_codes[row] as usize].push(row);
        }
    }
    let cell_value = |rows: &[usize]| -> CellValue {
        if rows.is_empty() {
            return CellValue::NoData;
        }
        let w: Vec<f64> = rows.iter().map(|&r| weights[r]).collect();
        match (&color.values, color.kind) {
            (VariableValues::Numeric(values), _) => {
                let v: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                WeightedSample::from_slices(&v, &w)
                    .median()
                    .map_or(CellValue::NoData, CellValue::Numeric)
            }
            (VariableValues::Categorical { levels, codes }, VariableKind::OrderedCategorical) => {
                let ranks: Vec<f64> = rows.iter().map(|&r| f64::from(codes[r])).collect();
                WeightedSample::from_slices(&ranks, &w)
                    .median()
                    .and_then(|m| levels.get(m.round() as usize))
                    .map_or(CellValue::NoData, |l| CellValue::Level(l.clone()))
            }
            (VariableValues::Categorical { levels, codes }, _) => {
                let c: Vec<u32> = rows.iter().map(|&r| codes[r]).collect();
                weighted_mode(&c, &w, levels.len())
                    .and_then(|m| levels.get(m as usize))
                    .map_or(CellValue::NoData, |l| CellValue::Level(l.clone()))
            }
        }
    };
    let cells = (0..ny)
        .map(|j| (0..nx).map(|i| cell_value(&members[j * nx + i])).collect())
        .collect();
    Ok(HeatmapGrid {
        x_levels: x.levels().to_vec(),
        y_levels: y.levels().to_vec(),
        cells,
    })
}
/// Summed weight per `(x, y)` cell, for heat maps without a color variable.
pub fn weight_grid(x: &Variable, y: &Variable, weights: &[f64]) -> Result<HeatmapGrid> {
    let (Some(x_codes), Some(y_codes)) = (x.codes(), y.codes()) else {
        return Err(PlotError::UnsupportedVariableCombination {
            stage: Stage::Discretize,
            columns: vec![x.name.clone(), y.name.clone()],
            reason: "heat map axes must be categorical or binned".to_string(),
        });
    };
    let nx = x.levels().len();
    let mut totals = vec![0.0; nx * y.levels().len()];
    for ((xc, yc), w) in x_codes.iter().zip(y_codes).zip(weights) {
        totals[*yc as usize * nx + *xc as usize] += w;
    }
    let cells = totals
        .chunks(nx.max(1))
        .map(|row| {
            row.iter()
                .map(|t| if *t > 0.0 { CellValue::Numeric(*t) } else { CellValue::NoData })
                .collect()
        })
        .collect();
    Ok(HeatmapGrid {
        x_levels: x.levels().to_vec(),
        y_levels: y.levels().to_vec(),
        cells,
    })
}
/// Weight per bin, for checking bin balance.
pub fn bin_weights(bins: &Bins, values: &[f64], weights: &[f64]) -> Vec<f64> {
    let codes: Vec<u32> = values
        .iter()
        .filter_map(|v| bins.assign(*v).map(|b| b as u32))
        .collect();
    level_weights(&codes, weights, bins.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bins_for(values: &[f64], n: usize) -> Bins {
        let sample = WeightedSample::from_slices(values, &vec![1.0; values.len()]);
        equal_weight_bins(&sample, n).unwrap()
    }

    #[test]
    fn bins_have_near_equal_weight() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let bins = bins_for(&values, 4);
        assert_eq!(bins.len(), 4);
        let weights = bin_weights(&bins, &values, &vec![1.0; 100]);
        assert!(weights.iter().all(|w| (*w - 25.0).abs() <= 1.0), "{weights:?}");
    }

    #[test]
    fn skewed_tail_does_not_leave_empty_bins() {
        let mut values: Vec<f64> = (0..95).map(|i| f64::from(i) / 10.0).collect();
        values.extend([1_000.0, 5_000.0, 20_000.0, 1e6, 1e7]);
        let bins = bins_for(&values, 5);
        let weights = bin_weights(&bins, &values, &vec![1.0; values.len()]);
        assert!(weights.iter().all(|w| *w > 0.0), "{weights:?}");
    }

    #[test]
    fn zero_inflated_column_gets_point_bin() {
        let mut values = vec![0.0; 60];
        values.extend((1..=40).map(f64::from));
        let bins = bins_for(&values, 4);
        assert_eq!(bins.edges()[0], 0.0);
        assert_eq!(bins.edges()[1], 0.0);
        assert_eq!(bins.assign(0.0), Some(0));
        assert_eq!(bins.assign(0.5), Some(1));
    }

    #[test]
    fn constant_column_is_one_bin() {
        let bins = bins_for(&[3.0, 3.0, 3.0], 5);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins.assign(3.0), Some(0));
        assert_eq!(bins.label(0), "[3, 3]");
    }

    #[test]
    fn labels_and_out_of_range() {
        let bins = Bins {
            edges: vec![0.0, 1.5, 3.0],
        };
        assert_eq!(bins.labels(), vec!["[0, 1.5]", "(1.5, 3]"]);
        assert_eq!(bins.assign(1.5), Some(0));
        assert_eq!(bins.assign(1.6), Some(1));
        assert_eq!(bins.assign(3.5), None);
    }

    #[test]
    fn narrow_bins_get_distinct_labels() {
        let bins = Bins {
            edges: vec![0.0, 1.0, 1.0 + 1e-14, 1.0 + 2e-14, 2.0],
        };
        let labels = bins.labels();
        assert_eq!(labels.len(), 4);
        let distinct: HashSet<&str> = labels.iter().map(String::as_str).collect();
        assert_eq!(distinct.len(), 4);
        assert_eq!(labels[0], "[0, 1]");
        assert_eq!(bins.label(2), labels[2]);

        let tiny = Bins {
            edges: vec![0.0, 1e-30, 2e-30, 3e-30],
        };
        let labels = tiny.labels();
        assert_ne!(labels[1], labels[2]);
    }

    #[test]
    fn heatmap_cells_summarise_and_leave_gaps() {
        let x = Variable::categorical("x", vec!["a".into(), "b".into()], vec![0, 0, 1, 0], false);
        let y = Variable::categorical("y", vec!["p".into(), "q".into()], vec![0, 0, 0, 0], false);
        let color = Variable::numeric("c", vec![1.0, 9.0, 4.0, 2.0]);
        let grid = summarise_grid(&x, &y, &color, &[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(grid.cells[0][0], CellValue::Numeric(2.0));
        assert_eq!(grid.cells[0][1], CellValue::Numeric(4.0));
        assert_eq!(grid.cells[1][0], CellValue::NoData);
        assert_eq!(grid.filled_cells(), 2);
    }

    #[test]
    fn heatmap_categorical_colors() {
        let x = Variable::categorical("x", vec!["a".into()], vec![0, 0, 0], false);
        let y = Variable::categorical("y", vec!["p".into()], vec![0, 0, 0], false);
        let ordered = Variable::categorical(
            "o",
            vec!["lo".into(), "mid".into(), "hi".into()],
            vec![0, 2, 2],
            true,
        );
        let grid = summarise_grid(&x, &y, &ordered, &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(grid.cells[0][0], CellValue::Level("hi".into()));
        let unordered = Variable::categorical("u", vec!["r".into(), "s".into()], vec![1, 0, 0], false);
        let grid = summarise_grid(&x, &y, &unordered, &[5.0, 1.0, 1.0]).unwrap();
        assert_eq!(grid.cells[0][0], CellValue::Level("s".into()));
    }

    #[test]
    fn weight_grid_sums_cells() {
        let x = Variable::categorical("x", vec!["a".into(), "b".into()], vec![0, 1, 1], false);
        let y = Variable::categorical("y", vec!["p".into(), "q".into()], vec![0, 0, 0], false);
        let grid = weight_grid(&x, &y, &[2.0, 1.5, 0.5]).unwrap();
        assert_eq!(grid.cells[0], vec![CellValue::Numeric(2.0), CellValue::Numeric(2.0)]);
        assert_eq!(grid.cells[1], vec![CellValue::NoData, CellValue::NoData]);
    }
}
