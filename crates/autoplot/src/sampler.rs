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

use crate::dataset::Dataset;
use crate::error::{PlotError, Result, Stage};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub dataset: Dataset,
    /// Sorted source rows kept, `None` when the dataset was passed through.
    pub indices: Option<Vec<usize>>,
    pub original_rows: usize,
}
impl SampleOutcome {
    pub fn was_sampled(&self) -> bool {
        self.indices.is_some()
    }
}
/// Draws at most `max_rows` distinct rows, each positive-weight row with
/// equal probability. Kept rows carry their original weights, so weighted
/// shares are preserved in expectation. Zero-weight rows are never drawn.
pub fn weighted_sample(dataset: &Dataset, max_rows: usize, seed: u64) -> Result<SampleOutcome> {
    let rows = dataset.n_rows();
    if rows == 0 {
        return Err(PlotError::empty(Stage::Sampler, "dataset has no rows"));
    }
    if rows <= max_rows {
        return Ok(SampleOutcome {
            dataset: dataset.clone(),
            indices: None,
            original_rows: rows,
        });
    }
    let pool: Vec<usize> = dataset
        .weights()
        .iter()
        .enumerate()
        .filter(|(_, w)| **w > 0.0)
        .map(|(i, _)| i)
        .collect();
    let mut indices = if pool.len() <= max_rows {
        pool
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        index::sample(&mut rng, pool.len(), max_rows)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    };
    indices.sort_unstable();
    if indices.is_empty() {
        return Err(PlotError::empty(Stage::Sampler, "every row has zero weight"));
    }
    debug!(
        target: "autoplot::sampler",
        original = rows,
        kept = indices.len(),
        seed,
        "sampled dataset"
    );
    Ok(SampleOutcome {
        dataset: dataset.subset(&indices),
        indices: Some(indices),
        original_rows: rows,
    })
}
