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

use crate::classifier::Variable;
use crate::discretize::discretize_variable;
use crate::stats::entropy;
use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::debug;

/// Level codes of `variable`, binning numeric values into `bins` intervals.
/// A numeric variable that cannot be binned collapses to a single code.
fn as_codes<'a>(variable: &'a Variable, weights: &[f64], bins: usize) -> (Cow<'a, [u32]>, usize) {
    if let Some(codes) = variable.codes() {
        return (Cow::Borrowed(codes), variable.levels().len());
    }
    match discretize_variable(variable, weights, bins) {
        Ok((binned, _)) => {
            let n = binned.levels().len();
            let codes = binned.codes().map(<[u32]>::to_vec).unwrap_or_default();
            (Cow::Owned(codes), n)
        }
        Err(_) => (Cow::Owned(vec![0; variable.len()]), 1),
    }
}
/// Weighted conditional entropy `H(B | A)` in nats over the joint empirical
/// distribution. Numeric sides are binned with equal-weight bins first.
pub fn conditional_entropy(a: &Variable, b: &Variable, weights: &[f64], bins: usize) -> f64 {
    let (a_codes, na) = as_codes(a, weights, bins);
    let (b_codes, nb) = as_codes(b, weights, bins);
    let mut joint = vec![0.0; na.max(1) * nb.max(1)];
    let mut marginal = vec![0.0; na.max(1)];
    for ((ac, bc), w) in a_codes.iter().zip(b_codes.iter()).zip(weights) {
        if *w <= 0.0 {
            continue;
        }
        joint[*ac as usize * nb + *bc as usize] += w;
        marginal[*ac as usize] += w;
    }
    let total: f64 = marginal.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    marginal
        .iter()
        .enumerate()
        .filter(|(_, m)| **m > 0.0)
        .map(|(i, m)| (m / total) * entropy(&joint[i * nb..(i + 1) * nb]))
        .sum()
}
/// Candidates sorted by how well each explains `target` (ascending
/// `H(target | candidate)`), ties kept in input order.
pub fn rank_by_informativeness(
    target: &Variable,
    candidates: &[&Variable],
    weights: &[f64],
    bins: usize,
) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, conditional_entropy(c, target, weights, bins)))
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    debug!(
        target: "autoplot::informativeness",
        response = %target.name,
        scores = ?scored
            .iter()
            .map(|(i, s)| (candidates[*i].name.as_str(), *s))
            .collect::<Vec<_>>(),
        "ranked candidates"
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(name: &str, codes: Vec<u32>, n: usize) -> Variable {
        let levels = (0..n).map(|i| format!("l{i}")).collect();
        Variable::categorical(name, levels, codes, false)
    }

    #[test]
    fn determined_variable_has_zero_entropy() {
        let a = cat("a", vec![0, 0, 1, 1], 2);
        let b = cat("b", vec![1, 1, 0, 0], 2);
        let h = conditional_entropy(&a, &b, &[1.0; 4], 10);
        assert!(h.abs() < 1e-12);
    }

    #[test]
    fn independent_variable_keeps_full_entropy() {
        let a = cat("a", vec![0, 1, 0, 1], 2);
        let b = cat("b", vec![0, 0, 1, 1], 2);
        let h = conditional_entropy(&a, &b, &[1.0; 4], 10);
        assert!((h - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn weights_shift_the_estimate() {
        let a = cat("a", vec![0, 0, 0], 1);
        let b = cat("b", vec![0, 1, 1], 2);
        let even = conditional_entropy(&a, &b, &[2.0, 1.0, 1.0], 10);
        let skewed = conditional_entropy(&a, &b, &[100.0, 1.0, 1.0], 10);
        assert!(skewed < even);
    }

    #[test]
    fn numeric_target_is_binned_and_ranking_is_stable() {
        let y = Variable::numeric("y", (0..40).map(f64::from).collect());
        let good = cat("good", (0..40).map(|i| (i / 10) as u32).collect(), 4);
        let noise = cat("noise", (0..40).map(|i| (i % 2) as u32).collect(), 2);
        let noise2 = cat("noise2", (0..40).map(|i| (i % 2) as u32).collect(), 2);
        let ranked = rank_by_informativeness(&y, &[&noise, &good, &noise2], &[1.0; 40], 4);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 0);
        assert_eq!(ranked[2].0, 2);
    }
}
