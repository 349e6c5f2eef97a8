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

use crate::classifier::{Variable, VariableKind, VariableValues};
use crate::discretize::Bins;
use crate::stats::{level_weights, weighted_mode, WeightedSample};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

pub const OTHER_LEVEL: &str = "(other)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMethod {
    Declared,
    ResponseMedian,
    ResponseMode,
    Frequency,
    Bins,
}
/// Display order of the observed levels of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelOrder {
    pub column: String,
    pub levels: Vec<String>,
    pub method: OrderMethod,
}
impl LevelOrder {
    pub fn from_bins(column: impl Into<String>, bins: &Bins) -> Self {
        Self {
            column: column.into(),
            levels: bins.labels(),
            method: OrderMethod::Bins,
        }
    }
    pub fn len(&self) -> usize {
        self.levels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
    pub fn position(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }
}
fn observed_codes(codes: &[u32], n_levels: usize) -> Vec<u32> {
    let mut seen = vec![false; n_levels];
    for c in codes {
        seen[*c as usize] = true;
    }
    (0..n_levels as u32).filter(|c| seen[*c as usize]).collect()
}
/// Per-level statistic of `by` within each level of `codes`.
fn keyed_by(codes: &[u32], n_levels: usize, by: &Variable, weights: &[f64]) -> (Vec<f64>, OrderMethod) {
    match &by.values {
        VariableValues::Numeric(values) => {
            let mut groups: Vec<Vec<(f64, f64)>> = vec![Vec::new(); n_levels];
            for ((c, v), w) in codes.iter().zip(values).zip(weights) {
                groups[*c as usize].push((*v, *w));
            }
            let keys = groups
                .into_iter()
                .map(|g| WeightedSample::new(g).median().unwrap_or(f64::NAN))
                .collect();
            (keys, OrderMethod::ResponseMedian)
        }
        VariableValues::Categorical { levels, codes: by_codes } => {
            let mut groups: Vec<(Vec<u32>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); n_levels];
            for ((c, b), w) in codes.iter().zip(by_codes).zip(weights) {
                groups[*c as usize].0.push(*b);
                groups[*c as usize].1.push(*w);
            }
            let keys = groups
                .iter()
                .map(|(bc, bw)| weighted_mode(bc, bw, levels.len()).map_or(f64::NAN, f64::from))
                .collect();
            (keys, OrderMethod::ResponseMode)
        }
    }
}
/// Orders the observed levels of a categorical `variable`. Ordered
/// variables keep their declared order; unordered ones are sorted by the
/// weighted median (numeric) or mode rank (categorical) of `by` per level,
/// or by decreasing weight without `by`. Ties fall back to level order.
pub fn order_levels(variable: &Variable, by: Option<&Variable>, weights: &[f64]) -> Option<LevelOrder> {
    let codes = variable.codes()?;
    let levels = variable.levels();
    let observed = observed_codes(codes, levels.len());
    let (order, method) = if variable.kind == VariableKind::OrderedCategorical {
        (observed, OrderMethod::Declared)
    } else {
        let (keys, method) = match by.map(|b| keyed_by(codes, levels.len(), b, weights)) {
            Some(found) => found,
            None => {
                let totals = level_weights(codes, weights, levels.len());
                (totals.into_iter().map(|t| -t).collect(), OrderMethod::Frequency)
            }
        };
        let mut sorted = observed;
        sorted.sort_by(|a, b| {
            keys[*a as usize].total_cmp(&keys[*b as usize]).then(a.cmp(b))
        });
        (sorted, method)
    };
    debug!(
        target: "autoplot::ordering",
        column = %variable.name,
        method = ?method,
        levels = order.len(),
        "ordered levels"
    );
    Some(LevelOrder {
        column: variable.name.clone(),
        levels: order.into_iter().map(|c| levels[c as usize].clone()).collect(),
        method,
    })
}
/// Keeps the `max_levels - 1` heaviest levels of a categorical variable and
/// folds the rest into `"(other)"`, placed last. Returns `None` when the
/// variable already fits. Kept levels stay in their original level order.
pub fn lump_levels(variable: &Variable, weights: &[f64], max_levels: usize) -> Option<(Variable, usize)> {
    let codes = variable.codes()?;
    let levels = variable.levels();
    let observed = observed_codes(codes, levels.len());
    let max_levels = max_levels.max(2);
    if observed.len() <= max_levels {
        return None;
    }
    let totals = level_weights(codes, weights, levels.len());
    let mut by_weight = observed;
    by_weight.sort_by(|a, b| {
        totals[*b as usize]
            .partial_cmp(&totals[*a as usize])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(b))
    });
    let mut kept: Vec<u32> = by_weight[..max_levels - 1].to_vec();
    kept.sort_unstable();
    let lumped = by_weight.len() - kept.len();
    let other = kept.len() as u32;
    let mut remap = vec![other; levels.len()];
    for (new, old) in kept.iter().enumerate() {
        remap[*old as usize] = new as u32;
    }
    let mut new_levels: Vec<String> = kept.iter().map(|c| levels[*c as usize].clone()).collect();
    new_levels.push(OTHER_LEVEL.to_string());
    debug!(
        target: "autoplot::ordering",
        column = %variable.name,
        kept = kept.len(),
        lumped,
        "lumped levels"
    );
    Some((
        Variable {
            name: variable.name.clone(),
            kind: variable.kind,
            values: VariableValues::Categorical {
                levels: new_levels,
                codes: codes.iter().map(|c| remap[*c as usize]).collect(),
            },
            reclassified: variable.reclassified,
        },
        lumped,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(codes: Vec<u32>, levels: &[&str], ordered: bool) -> Variable {
        Variable::categorical("c", levels.iter().map(|s| s.to_string()).collect(), codes, ordered)
    }

    #[test]
    fn orders_by_response_median() {
        let c = cat(vec![0, 0, 1, 1, 2, 2], &["a", "b", "c"], false);
        let y = Variable::numeric("y", vec![9.0, 11.0, 1.0, 2.0, 5.0, 5.0]);
        let order = order_levels(&c, Some(&y), &[1.0; 6]).unwrap();
        assert_eq!(order.levels, vec!["b", "c", "a"]);
        assert_eq!(order.method, OrderMethod::ResponseMedian);
    }

    #[test]
    fn orders_by_frequency_with_alphabetical_ties() {
        let c = cat(vec![0, 1, 1, 2, 2, 3], &["a", "b", "c", "d"], false);
        let order = order_levels(&c, None, &[1.0; 6]).unwrap();
        assert_eq!(order.levels, vec!["b", "c", "a", "d"]);
        assert_eq!(order.method, OrderMethod::Frequency);
    }

    #[test]
    fn weights_drive_frequency_order() {
        let c = cat(vec![0, 1, 1], &["a", "b"], false);
        let order = order_levels(&c, None, &[5.0, 1.0, 1.0]).unwrap();
        assert_eq!(order.levels, vec!["a", "b"]);
    }

    #[test]
    fn ordered_levels_keep_declared_order_and_drop_unobserved() {
        let c = cat(vec![2, 0, 2], &["low", "mid", "high"], true);
        let order = order_levels(&c, None, &[1.0; 3]).unwrap();
        assert_eq!(order.levels, vec!["low", "high"]);
        assert_eq!(order.method, OrderMethod::Declared);
    }

    #[test]
    fn categorical_response_orders_by_mode_rank() {
        let c = cat(vec![0, 0, 1, 1], &["a", "b"], false);
        let r = cat(vec![1, 1, 0, 0], &["x", "y"], false);
        let order = order_levels(&c, Some(&r), &[1.0; 4]).unwrap();
        assert_eq!(order.levels, vec!["b", "a"]);
        assert_eq!(order.method, OrderMethod::ResponseMode);
    }

    #[test]
    fn numeric_variable_has_no_order() {
        let y = Variable::numeric("y", vec![1.0]);
        assert!(order_levels(&y, None, &[1.0]).is_none());
    }

    #[test]
    fn lumps_light_levels_into_other() {
        let c = cat(vec![0, 1, 1, 2, 2, 2, 3], &["a", "b", "c", "d"], false);
        let (lumped, n) = lump_levels(&c, &[1.0; 7], 3).unwrap();
        assert_eq!(n, 2);
        assert_eq!(lumped.levels(), &["b", "c", OTHER_LEVEL]);
        assert_eq!(lumped.codes().unwrap(), &[2, 0, 0, 1, 1, 1, 2]);
        assert!(lump_levels(&c, &[1.0; 7], 4).is_none());
    }
}
