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

use crate::error::Stage;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, Value>,
}
/// Ordered record of the decisions taken for one plot. Recording is a
/// no-op unless the trace was created enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecisionTrace {
    #[serde(skip)]
    enabled: bool,
    entries: Vec<TraceEntry>,
}
impl DecisionTrace {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }
    pub fn record(&mut self, stage: Stage, message: impl Into<String>) {
        self.record_with(stage, message, std::iter::empty::<(&str, Value)>());
    }
    pub fn record_with<I, K>(&mut self, stage: Stage, message: impl Into<String>, detail: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        if !self.enabled {
            return;
        }
        let entry = TraceEntry {
            stage,
            message: message.into(),
            detail: detail.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        info!(
            target: "autoplot::trace",
            stage = %entry.stage,
            detail = %serde_json::to_string(&entry.detail).unwrap_or_default(),
            "{}",
            entry.message
        );
        self.entries.push(entry);
    }
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disabled_trace_records_nothing() {
        let mut trace = DecisionTrace::new(false);
        trace.record(Stage::Selector, "picked scatter");
        assert!(trace.is_empty());
    }

    #[test]
    fn entries_keep_order_and_detail() {
        let mut trace = DecisionTrace::new(true);
        trace.record(Stage::Sampler, "kept all rows");
        trace.record_with(Stage::Selector, "picked hexbin", [("rows", json!(9000))]);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.entries()[1].detail["rows"], json!(9000));
        assert_eq!(trace.for_stage(Stage::Selector).count(), 1);
        let text = trace.to_json().unwrap();
        assert!(text.contains("\"selector\""));
        assert!(!text.contains("\"detail\": {}"));
    }
}
