// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What counts as an anomalous batch outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FuzzMode {
    /// Look for reflected markers; anomaly = control marker missing
    Reflection,
    /// Only look at the response status; anomaly = non-2xx
    Status,
}

impl Default for FuzzMode {
    fn default() -> Self {
        FuzzMode::Reflection
    }
}

impl std::fmt::Display for FuzzMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FuzzMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuzzMode::Reflection => "reflection",
            FuzzMode::Status => "status",
        }
    }
}

/// Page lifecycle event a navigation waits for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadCondition {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl Default for LoadCondition {
    fn default() -> Self {
        LoadCondition::DomContentLoaded
    }
}

pub fn is_success_status(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// An immutable group of parameters tested together in one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    params: Arc<[String]>,
    encoded_len: usize,
    over_budget: bool,
}

impl Batch {
    pub fn new(index: usize, params: Vec<String>, encoded_len: usize, over_budget: bool) -> Self {
        Self {
            index,
            params: params.into(),
            encoded_len,
            over_budget,
        }
    }

    /// Position of this batch in the plan it came from
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Planned length of the full test URL, control entry included
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// True only for a lone parameter whose entry alone exceeds the budget
    pub fn over_budget(&self) -> bool {
        self.over_budget
    }
}

/// Everything observed for one batch attempt
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub target: String,
    pub batch_index: usize,
    pub test_url: String,
    pub final_url: String,
    pub status: u16,
    pub content: String,
    pub stabilization_rounds: u32,
    pub redirect: Option<String>,
    pub reflected: Vec<String>,
    pub anomalous: bool,
}

/// Screenshot captured for a batch that produced reflections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenshotHit {
    pub parameters: Vec<String>,
    pub url: String,
    pub image: String,
}

/// Final per-target facts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub reflected: BTreeSet<String>,
    pub redirect: Option<String>,
    pub bad_parameters: BTreeSet<String>,
    pub batches_planned: usize,
    pub batches_tested: usize,
    pub batches_failed: usize,
    pub unlocalized_anomalies: usize,
    pub retried: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<ScreenshotHit>,
}

impl TargetReport {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }
}

/// Whole-run summary written to the JSON output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: FuzzMode,
    pub started_at: String,
    pub finished_at: String,
    pub parameters_loaded: usize,
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn total_reflected(&self) -> usize {
        self.targets.iter().map(|t| t.reflected.len()).sum()
    }

    /// Union of conflicting parameters across all targets
    pub fn all_bad_parameters(&self) -> BTreeSet<String> {
        self.targets
            .iter()
            .flat_map(|t| t.bad_parameters.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_status_range() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(299));
        assert!(!is_success_status(301));
        assert!(!is_success_status(500));
        assert!(!is_success_status(199));
    }

    #[test]
    fn test_fuzz_mode_serde() {
        let json = serde_json::to_string(&FuzzMode::Status).unwrap();
        assert_eq!(json, "\"status\"");
        let mode: FuzzMode = serde_json::from_str("\"reflection\"").unwrap();
        assert_eq!(mode, FuzzMode::Reflection);
    }

    #[test]
    fn test_run_report_aggregates() {
        let mut a = TargetReport::new("http://a/");
        a.reflected.insert("q".into());
        a.bad_parameters.insert("debug".into());
        let mut b = TargetReport::new("http://b/");
        b.reflected.insert("id".into());
        b.reflected.insert("q".into());
        b.bad_parameters.insert("debug".into());
        b.bad_parameters.insert("cmd".into());

        let report = RunReport {
            mode: FuzzMode::Reflection,
            started_at: String::new(),
            finished_at: String::new(),
            parameters_loaded: 10,
            targets: vec![a, b],
        };

        assert_eq!(report.total_reflected(), 3);
        assert_eq!(report.all_bad_parameters().len(), 2);
    }
}
