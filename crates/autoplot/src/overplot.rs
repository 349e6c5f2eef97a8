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

use crate::options::{EngineOptions, OverplotOverride};
use crate::selector::PlotArchetype;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "remedy", rename_all = "snake_case")]
pub enum OverplotRemedy {
    None,
    /// Point size follows the summed weight of coincident rows; `alpha` is
    /// lowered so stacked points darken.
    SizeByWeight { alpha: f64 },
    /// Uniform offsets in `[-amount, amount]` per axis.
    Jitter { x_amount: f64, y_amount: f64, seed: u64 },
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemedyDecision {
    pub remedy: OverplotRemedy,
    pub duplicate_rate: f64,
    pub max_multiplicity: usize,
    pub reason: String,
}
fn key(x: f64, y: f64) -> (u64, u64) {
    ((x + 0.0).to_bits(), (y + 0.0).to_bits())
}
/// Share of rows whose coordinate pair already occurred at an earlier row,
/// together with the largest number of rows sharing one pair.
pub fn duplicate_stats(x: &[f64], y: &[f64]) -> (f64, usize) {
    let n = x.len().min(y.len());
    if n == 0 {
        return (0.0, 0);
    }
    let mut counts: HashMap<(u64, u64), usize> = HashMap::with_capacity(n);
    for (a, b) in x.iter().zip(y) {
        *counts.entry(key(*a, *b)).or_default() += 1;
    }
    let duplicates = n - counts.len();
    let max = counts.values().copied().max().unwrap_or(0);
    (duplicates as f64 / n as f64, max)
}
pub fn duplicate_rate(x: &[f64], y: &[f64]) -> f64 {
    duplicate_stats(x, y).0
}
fn range(values: &[f64]) -> f64 {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if hi > lo {
        hi - lo
    } else {
        0.0
    }
}
/// Picks the remedy for coincident points. Only scatter plots are
/// remedied; hexbins already aggregate.
pub fn select_remedy(
    archetype: PlotArchetype,
    x: &[f64],
    y: &[f64],
    uniform_weights: bool,
    options: &EngineOptions,
    seed: u64,
) -> RemedyDecision {
    if archetype != PlotArchetype::Scatter {
        return RemedyDecision {
            remedy: OverplotRemedy::None,
            duplicate_rate: 0.0,
            max_multiplicity: 0,
            reason: format!("{archetype} needs no point remedy"),
        };
    }
    let (rate, max_multiplicity) = duplicate_stats(x, y);
    let alpha = (1.0 / (max_multiplicity.max(1) as f64).sqrt()).max(0.1);
    let jitter = OverplotRemedy::Jitter {
        x_amount: range(x) * options.jitter_fraction,
        y_amount: range(y) * options.jitter_fraction,
        seed,
    };
    let (remedy, reason) = match options.overplot {
        OverplotOverride::None => (OverplotRemedy::None, "disabled by option".to_string()),
        OverplotOverride::Jitter => (jitter, "jitter requested".to_string()),
        OverplotOverride::SizeByWeight => (OverplotRemedy::SizeByWeight { alpha }, "size by weight requested".to_string()),
        OverplotOverride::Auto if rate > options.duplicate_rate_threshold => (
            OverplotRemedy::SizeByWeight { alpha },
            format!("duplicate rate {rate:.4} > {}", options.duplicate_rate_threshold),
        ),
        OverplotOverride::Auto if !uniform_weights => (
            OverplotRemedy::SizeByWeight { alpha },
            "non-uniform weights".to_string(),
        ),
        OverplotOverride::Auto => (OverplotRemedy::None, format!("duplicate rate {rate:.4} is negligible")),
    };
    debug!(
        target: "autoplot::overplot",
        rate,
        max_multiplicity,
        remedy = ?remedy,
        "selected overplot remedy"
    );
    RemedyDecision {
        remedy,
        duplicate_rate: rate,
        max_multiplicity,
        reason,
    }
}
/// Deterministic per-row offsets for a jitter remedy.
pub fn jitter_offsets(n: usize, x_amount: f64, y_amount: f64, seed: u64) -> Vec<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let dx = (rng.gen::<f64>() * 2.0 - 1.0) * x_amount;
            let dy = (rng.gen::<f64>() * 2.0 - 1.0) * y_amount;
            (dx, dy)
        })
        .collect()
}
