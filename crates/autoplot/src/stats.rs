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

//! Weighted summary statistics shared by the decision stages.

use std::cmp::Ordering;

/// `(value, weight)` pairs sorted by value, zero weights removed.
#[derive(Debug, Clone, Default)]
pub struct WeightedSample {
    pairs: Vec<(f64, f64)>,
    total: f64,
}
impl WeightedSample {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pairs: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|(v, w)| v.is_finite() && *w > 0.0)
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let total = pairs.iter().map(|(_, w)| w).sum();
        Self { pairs, total }
    }
    pub fn from_slices(values: &[f64], weights: &[f64]) -> Self {
        Self::new(values.iter().copied().zip(weights.iter().copied()))
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    pub fn total_weight(&self) -> f64 {
        self.total
    }
    pub fn pairs(&self) -> &[(f64, f64)] {
        &self.pairs
    }
    pub fn min(&self) -> Option<f64> {
        self.pairs.first().map(|p| p.0)
    }
    pub fn max(&self) -> Option<f64> {
        self.pairs.last().map(|p| p.0)
    }
    /// Smallest observed value whose cumulative weight reaches `p` of the total.
    pub fn quantile(&self, p: f64) -> Option<f64> {
        if self.pairs.is_empty() {
            return None;
        }
        let target = p.clamp(0.0, 1.0) * self.total;
        let mut cumulative = 0.0;
        for (value, weight) in &self.pairs {
            cumulative += weight;
            if cumulative >= target - self.total * 1e-12 {
                return Some(*value);
            }
        }
        self.max()
    }
    pub fn median(&self) -> Option<f64> {
        self.quantile(0.5)
    }
    pub fn quartiles(&self) -> Option<(f64, f64)> {
        Some((self.quantile(0.25)?, self.quantile(0.75)?))
    }
    /// Number of distinct observed values.
    pub fn distinct(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for (value, _) in &self.pairs {
            if last != Some(*value) {
                count += 1;
                last = Some(*value);
            }
        }
        count
    }
    pub fn mapped<F>(&self, f: F) -> WeightedSample
    where
        F: Fn(f64) -> f64,
    {
        WeightedSample::new(self.pairs.iter().map(|(v, w)| (f(*v), *w)))
    }
}
/// Total weight per level code.
pub fn level_weights(codes: &[u32], weights: &[f64], n_levels: usize) -> Vec<f64> {
    let mut totals = vec![0.0; n_levels];
    for (code, weight) in codes.iter().zip(weights) {
        if let Some(slot) = totals.get_mut(*code as usize) {
            *slot += weight;
        }
    }
    totals
}
/// Heaviest level; ties resolve to the lowest code.
pub fn weighted_mode(codes: &[u32], weights: &[f64], n_levels: usize) -> Option<u32> {
    level_weights(codes, weights, n_levels)
        .into_iter()
        .enumerate()
        .filter(|(_, w)| *w > 0.0)
        .fold(None, |best: Option<(usize, f64)>, (i, w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((i, w)),
        })
        .map(|(i, _)| i as u32)
}
/// Shannon entropy (nats) of a weight distribution.
pub fn entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    weights
        .iter()
        .filter(|w| **w > 0.0)
        .map(|w| {
            let p = w / total;
            -p * p.ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_quantiles() {
        let s = WeightedSample::from_slices(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(s.median(), Some(2.0));
        assert_eq!(s.quartiles(), Some((1.0, 3.0)));
        let heavy = WeightedSample::from_slices(&[1.0, 2.0, 3.0], &[1.0, 1.0, 10.0]);
        assert_eq!(heavy.median(), Some(3.0));
    }

    #[test]
    fn zero_weights_are_ignored() {
        let s = WeightedSample::from_slices(&[5.0, 1.0, 9.0], &[0.0, 1.0, 1.0]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.min(), Some(1.0));
        assert_eq!(s.distinct(), 2);
    }

    #[test]
    fn mode_prefers_lowest_code_on_ties() {
        assert_eq!(weighted_mode(&[0, 1, 1, 0], &[1.0; 4], 3), Some(0));
        assert_eq!(weighted_mode(&[2, 1, 2], &[1.0, 5.0, 1.0], 3), Some(1));
        assert_eq!(weighted_mode(&[], &[], 3), None);
    }

    #[test]
    fn entropy_of_uniform() {
        let h = entropy(&[1.0, 1.0, 1.0, 1.0]);
        assert!((h - 4f64.ln()).abs() < 1e-12);
        assert_eq!(entropy(&[3.0, 0.0]), 0.0);
    }
}
