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

use autoplot::selector::{GroupSizes, VariableSummary};
use autoplot::stats::WeightedSample;
use autoplot::{
    classify_column, equal_weight_bins, normalize, order_levels, select_archetype, select_transform,
    weighted_sample, AxisTransform, Column, Dataset, EngineOptions, FormulaSpec, PlotError, SelectionInput, Variable,
    VariableKind,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn kind() -> impl Strategy<Value = VariableKind> {
    prop_oneof![
        Just(VariableKind::Numeric),
        Just(VariableKind::OrderedCategorical),
        Just(VariableKind::UnorderedCategorical),
    ]
}

proptest! {
    #[test]
    fn bins_cover_every_value_once(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..300),
        max_bins in 1usize..15,
    ) {
        let weights = vec![1.0; values.len()];
        let sample = WeightedSample::from_slices(&values, &weights);
        let bins = equal_weight_bins(&sample, max_bins).unwrap();
        let edges = bins.edges();
        prop_assert!(bins.len() <= max_bins);
        prop_assert_eq!(edges[0], sample.min().unwrap());
        prop_assert_eq!(*edges.last().unwrap(), sample.max().unwrap());
        prop_assert!(edges.windows(2).all(|w| w[0] <= w[1]));
        for v in &values {
            let b = bins.assign(*v);
            prop_assert!(b.is_some());
            let b = b.unwrap();
            let lo = edges[b];
            let hi = edges[b + 1];
            prop_assert!(*v <= hi);
            let above_lower = if b == 0 { *v >= lo } else { *v > lo };
            prop_assert!(above_lower, "{} below bin {} lower edge {}", v, b, lo);
        }
    }

    #[test]
    fn level_order_is_a_permutation_of_observed_levels(
        codes in prop::collection::vec(0u32..12, 1..200),
        ordered in any::<bool>(),
        with_response in any::<bool>(),
    ) {
        let levels: Vec<String> = (0..12).map(|i| format!("l{i}")).collect();
        let weights: Vec<f64> = codes.iter().map(|c| f64::from(c % 3 + 1)).collect();
        let variable = Variable::categorical("c", levels.clone(), codes.clone(), ordered);
        let response = Variable::numeric("y", codes.iter().map(|c| f64::from(*c) * 0.5).collect());
        let order = order_levels(&variable, with_response.then_some(&response), &weights).unwrap();
        let observed: BTreeSet<String> = codes.iter().map(|c| levels[*c as usize].clone()).collect();
        let listed: BTreeSet<String> = order.levels.iter().cloned().collect();
        prop_assert_eq!(listed.len(), order.levels.len());
        prop_assert_eq!(listed, observed);
    }

    #[test]
    fn sampler_never_grows_the_dataset(
        rows in 1usize..3_000,
        max_rows in 1usize..1_500,
        seed in any::<u64>(),
    ) {
        let data = Dataset::builder()
            .column("x", Column::numeric((0..rows).map(|i| i as f64)))
            .build()
            .unwrap();
        let out = weighted_sample(&data, max_rows, seed).unwrap();
        prop_assert!(out.dataset.n_rows() <= rows);
        prop_assert_eq!(out.dataset.n_rows(), rows.min(max_rows));
    }

    #[test]
    fn classification_is_idempotent(
        values in prop::collection::vec(prop::option::of(-50i32..50), 0..100),
        threshold in 2usize..10,
    ) {
        let column = Column::numeric_opt(values.iter().map(|v| v.map(f64::from)));
        let options = EngineOptions { few_unique_threshold: threshold, ..EngineOptions::default() };
        prop_assert_eq!(classify_column(&column, &options), classify_column(&column, &options));
    }

    #[test]
    fn selection_is_deterministic(
        kinds in prop::collection::vec((kind(), 1usize..40), 1..4),
        rows in 1usize..20_000,
        weighted in any::<bool>(),
        group_min in 1usize..30,
    ) {
        let input = SelectionInput {
            variables: kinds.iter().map(|(kind, levels)| VariableSummary { kind: *kind, levels: *levels }).collect(),
            has_conditioning: false,
            rows,
            non_uniform_weights: weighted,
            groups: GroupSizes::from_counts(&[group_min, group_min + 3, group_min * 2]),
        };
        let options = EngineOptions::default();
        let first = select_archetype(&input, &options).unwrap();
        let second = select_archetype(&input, &options).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn log_is_never_chosen_for_nonpositive_values(
        mut values in prop::collection::vec(-1.0e4f64..1.0e6, 4..200),
        floor in -1.0e3f64..=0.0,
    ) {
        values.push(floor);
        let weights = vec![1.0; values.len()];
        match select_transform("x", &values, &weights, 1.0) {
            Ok(decision) => {
                prop_assert_ne!(decision.transform, AxisTransform::Log);
                prop_assert!(decision.log_occupancy.is_none());
            }
            Err(e) => {
                prop_assert!(e.is_recoverable());
            }
        }
    }

    #[test]
    fn more_than_three_columns_is_an_invalid_formula(extra in 1usize..4) {
        let mut builder = Dataset::builder();
        let names: Vec<String> = (0..3 + extra).map(|i| format!("c{i}")).collect();
        for name in &names {
            builder = builder.column(name.clone(), Column::numeric([1.0, 2.0]));
        }
        let data = builder.build().unwrap();
        let spec = names[1..]
            .iter()
            .fold(FormulaSpec::new().response(names[0].clone()), |s, n| s.explanatory(n.clone()));
        let err = normalize(&spec, &data).unwrap_err();
        prop_assert!(matches!(err, PlotError::InvalidFormula { .. }), "unexpected {:?}", err);
    }
}
