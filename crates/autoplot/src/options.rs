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

use crate::error::{ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Process-wide defaults; read-only after first access.
pub static DEFAULT_OPTIONS: Lazy<EngineOptions> = Lazy::new(EngineOptions::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverplotOverride {
    #[default]
    Auto,
    SizeByWeight,
    Jitter,
    None,
}
/// Every threshold the decision stages consult. The numeric defaults are
/// tuning heuristics, not derived constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub verbose: bool,
    pub sampling: bool,
    pub sample_max_rows: usize,
    pub seed: u64,
    pub few_unique_as_factor: bool,
    pub few_unique_threshold: usize,
    pub max_colors: usize,
    pub facet_max_rows: usize,
    pub facet_max_cols: usize,
    pub facet_num_bins: usize,
    pub trans_log_threshold: f64,
    pub overplot: OverplotOverride,
    pub duplicate_rate_threshold: f64,
    pub jitter_fraction: f64,
    pub min_points_hexbin: usize,
    pub bar_max_levels: usize,
    pub max_spine_levels: usize,
    pub max_violins: usize,
    pub min_points_violin: usize,
    pub max_factor_levels: usize,
    pub heatmap_bins: usize,
    pub entropy_bins: usize,
    pub prefer_factors_vertical: bool,
    pub missing_as_level: bool,
}
impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            sampling: true,
            sample_max_rows: 100_000,
            seed: 0,
            few_unique_as_factor: true,
            few_unique_threshold: 5,
            max_colors: 5,
            facet_max_rows: 6,
            facet_max_cols: 6,
            facet_num_bins: 4,
            trans_log_threshold: 2.0,
            overplot: OverplotOverride::Auto,
            duplicate_rate_threshold: 0.01,
            jitter_fraction: 0.02,
            min_points_hexbin: 5_000,
            bar_max_levels: 3,
            max_spine_levels: 12,
            max_violins: 8,
            min_points_violin: 10,
            max_factor_levels: 30,
            heatmap_bins: 20,
            entropy_bins: 10,
            prefer_factors_vertical: true,
            missing_as_level: false,
        }
    }
}
impl EngineOptions {
    pub fn validate(&self) -> ConfigResult<()> {
        fn invalid(field: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidOption {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }
        if self.sampling && self.sample_max_rows == 0 {
            return Err(invalid("sample_max_rows", "must be greater than 0 when sampling is enabled"));
        }
        if self.few_unique_as_factor && self.few_unique_threshold < 2 {
            return Err(invalid("few_unique_threshold", "must be at least 2"));
        }
        if self.max_colors < 2 {
            return Err(invalid("max_colors", "must be at least 2"));
        }
        if self.facet_max_rows == 0 || self.facet_max_cols == 0 {
            return Err(invalid("facet_max_rows/facet_max_cols", "must be greater than 0"));
        }
        if self.facet_num_bins < 2 {
            return Err(invalid("facet_num_bins", "must be at least 2"));
        }
        if !self.trans_log_threshold.is_finite() || self.trans_log_threshold < 1.0 {
            return Err(invalid("trans_log_threshold", "must be a finite value >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.duplicate_rate_threshold) {
            return Err(invalid("duplicate_rate_threshold", "must be between 0.0 and 1.0"));
        }
        if !(0.0..=0.5).contains(&self.jitter_fraction) {
            return Err(invalid("jitter_fraction", "must be between 0.0 and 0.5"));
        }
        if self.max_factor_levels < 2 {
            return Err(invalid("max_factor_levels", "must be at least 2"));
        }
        if self.heatmap_bins < 2 || self.entropy_bins < 2 {
            return Err(invalid("heatmap_bins/entropy_bins", "must be at least 2"));
        }
        if self.max_violins == 0 {
            return Err(invalid("max_violins", "must be greater than 0"));
        }
        if self.max_spine_levels > self.max_factor_levels {
            return Err(ConfigError::ConflictingOptions {
                details: format!(
                    "max_spine_levels ({}) exceeds max_factor_levels ({})",
                    self.max_spine_levels, self.max_factor_levels
                ),
            });
        }
        Ok(())
    }
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let options: EngineOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::OptionsFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
    /// Larger samples and grids, every decision traced.
    pub fn for_exploration() -> Self {
        Self {
            verbose: true,
            sample_max_rows: 250_000,
            max_colors: 8,
            facet_max_rows: 8,
            facet_max_cols: 8,
            ..Default::default()
        }
    }
    /// Fewer colors and panels, stricter readability fallbacks.
    pub fn for_presentation() -> Self {
        Self {
            max_colors: 4,
            facet_max_rows: 4,
            facet_max_cols: 4,
            max_spine_levels: 8,
            max_violins: 6,
            max_factor_levels: 15,
            ..Default::default()
        }
    }
    pub fn for_performance() -> Self {
        Self {
            sample_max_rows: 20_000,
            min_points_hexbin: 2_000,
            heatmap_bins: 12,
            entropy_bins: 6,
            ..Default::default()
        }
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_presets_validate() {
        assert!(EngineOptions::default().validate().is_ok());
        assert!(EngineOptions::for_exploration().validate().is_ok());
        assert!(EngineOptions::for_presentation().validate().is_ok());
        assert!(EngineOptions::for_performance().validate().is_ok());
        assert_eq!(*DEFAULT_OPTIONS, EngineOptions::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let options = EngineOptions {
            trans_log_threshold: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidOption { ref field, .. }) if field == "trans_log_threshold"
        ));
        let options = EngineOptions {
            max_spine_levels: 40,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ConflictingOptions { .. })
        ));
    }

    #[test]
    fn yaml_overrides_fill_in_defaults() {
        let options = EngineOptions::from_yaml_str(
            "verbose: true\nmax_colors: 3\noverplot: jitter\nseed: 42\n",
        )
        .unwrap();
        assert!(options.verbose);
        assert_eq!(options.max_colors, 3);
        assert_eq!(options.overplot, OverplotOverride::Jitter);
        assert_eq!(options.seed, 42);
        assert_eq!(options.sample_max_rows, 100_000);
        assert!(EngineOptions::from_yaml_str("max_colors: [1").is_err());
        assert!(EngineOptions::from_yaml_str("max_colors: 1").is_err());
    }
}
