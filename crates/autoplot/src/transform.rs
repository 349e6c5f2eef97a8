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

//! Axis scale selection from quartile concentration.
//!
//! The inter-quartile occupancy of a scale is the share of the displayed
//! range taken up by the box between the weighted quartiles. A skewed
//! distribution squeezes that box into a sliver under identity scaling; a
//! transform is picked when it widens the box by more than
//! `trans_log_threshold` times.

use crate::error::{PlotError, Result, Stage};
use crate::stats::WeightedSample;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisTransform {
    #[default]
    None,
    Log,
    /// `sign(x) * ln(1 + |x|)`, defined on the whole real line.
    LogModulus,
}
impl AxisTransform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            AxisTransform::None => value,
            AxisTransform::Log => value.ln(),
            AxisTransform::LogModulus => value.signum() * value.abs().ln_1p(),
        }
    }
    pub fn is_identity(&self) -> bool {
        matches!(self, AxisTransform::None)
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformDecision {
    pub column: String,
    pub transform: AxisTransform,
    pub identity_occupancy: f64,
    /// Absent when some observed value is not strictly positive.
    pub log_occupancy: Option<f64>,
    pub log_modulus_occupancy: f64,
    pub reason: String,
}
fn occupancy(f: impl Fn(f64) -> f64, min: f64, q1: f64, q3: f64, max: f64) -> f64 {
    let span = f(max) - f(min);
    if span > 0.0 {
        (f(q3) - f(q1)) / span
    } else {
        0.0
    }
}
/// Chooses the scale for a numeric axis. Fails with a recoverable
/// `DegenerateDistribution` when the range or quartile span is zero.
pub fn select_transform(column: &str, values: &[f64], weights: &[f64], threshold: f64) -> Result<TransformDecision> {
    let sample = WeightedSample::from_slices(values, weights);
    let (Some(min), Some(max), Some((q1, q3))) = (sample.min(), sample.max(), sample.quartiles()) else {
        return Err(PlotError::empty(Stage::Transform, format!("no weighted values in '{column}'")));
    };
    if max <= min {
        return Err(PlotError::degenerate(Stage::Transform, column, "single observed value"));
    }
    if q3 <= q1 {
        return Err(PlotError::degenerate(Stage::Transform, column, "zero interquartile span"));
    }
    let identity = occupancy(|x| x, min, q1, q3, max);
    let log = (min > 0.0).then(|| occupancy(f64::ln, min, q1, q3, max));
    let modulus = occupancy(|x| AxisTransform::LogModulus.apply(x), min, q1, q3, max);
    let (transform, reason) = match log {
        Some(l) if l > threshold * identity => (
            AxisTransform::Log,
            format!("log occupancy {l:.3} > {threshold} x identity {identity:.3}"),
        ),
        None if modulus > threshold * identity => (
            AxisTransform::LogModulus,
            format!("log-modulus occupancy {modulus:.3} > {threshold} x identity {identity:.3}"),
        ),
        _ => (
            AxisTransform::None,
            format!("no transform widens the quartile span {threshold} x beyond {identity:.3}"),
        ),
    };
    debug!(
        target: "autoplot::transform",
        column,
        transform = ?transform,
        identity,
        log = ?log,
        modulus,
        "selected axis transform"
    );
    Ok(TransformDecision {
        column: column.to_string(),
        transform,
        identity_occupancy: identity,
        log_occupancy: log,
        log_modulus_occupancy: modulus,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(n: usize) -> Vec<f64> {
        vec![1.0; n]
    }

    #[test]
    fn skewed_positive_data_gets_log() {
        let values: Vec<f64> = (0..100).map(|i| 10f64.powf(i as f64 / 10.0)).collect();
        let d = select_transform("x", &values, &ones(100), 2.0).unwrap();
        assert_eq!(d.transform, AxisTransform::Log);
        assert!(d.log_occupancy.unwrap() > d.identity_occupancy);
    }

    #[test]
    fn uniform_data_keeps_identity() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let d = select_transform("x", &values, &ones(100), 2.0).unwrap();
        assert_eq!(d.transform, AxisTransform::None);
    }

    #[test]
    fn signed_heavy_tails_get_log_modulus() {
        let values: Vec<f64> = (0..60)
            .map(|i| {
                let m = 10f64.powf(i as f64 / 6.0);
                if i % 2 == 0 { m } else { -m }
            })
            .chain(std::iter::once(0.0))
            .collect();
        let d = select_transform("x", &values, &ones(values.len()), 2.0).unwrap();
        assert!(d.log_occupancy.is_none());
        assert_eq!(d.transform, AxisTransform::LogModulus);
    }

    #[test]
    fn positive_data_never_falls_through_to_log_modulus() {
        let values = [0.001, 1.0, 1.0, 5.0, 10.0, 10.0, 10_000.0];
        let baseline = select_transform("x", &values, &ones(values.len()), 1.0).unwrap();
        let log = baseline.log_occupancy.unwrap();
        assert!(baseline.log_modulus_occupancy > log);
        let threshold = (log + baseline.log_modulus_occupancy) / 2.0 / baseline.identity_occupancy;
        let d = select_transform("x", &values, &ones(values.len()), threshold).unwrap();
        assert_eq!(d.transform, AxisTransform::None);
    }

    #[test]
    fn constant_column_is_degenerate() {
        let err = select_transform("x", &[3.0; 5], &ones(5), 2.0).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.stage(), Some(Stage::Transform));
    }

    #[test]
    fn log_modulus_is_odd_and_finite_at_zero() {
        let t = AxisTransform::LogModulus;
        assert_eq!(t.apply(0.0), 0.0);
        assert!((t.apply(-9.0) + t.apply(9.0)).abs() < 1e-12);
    }
}
