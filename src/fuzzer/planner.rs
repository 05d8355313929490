// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Batch Planner
 * Greedy packing of candidate parameters into URL-length-bounded requests
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use super::marker::MarkerCodec;
use crate::types::Batch;
use tracing::{debug, warn};

/// Default URL-length budget
pub const DEFAULT_MAX_URL_LENGTH: usize = 2000;

/// Packs parameters into batches whose test URL stays within `max_url_length`.
///
/// Running length starts at `len(base) + 1` for the query separator and
/// every entry is charged `len(entry) + 1`. When a control parameter is
/// configured its entry is reserved up front in every batch and the control
/// name itself is never packed. Output is a pure function of the inputs.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    codec: MarkerCodec,
    max_url_length: usize,
    control: Option<String>,
}

impl BatchPlanner {
    pub fn new(codec: MarkerCodec, max_url_length: usize, control: Option<String>) -> Self {
        Self {
            codec,
            max_url_length,
            control,
        }
    }

    pub fn max_url_length(&self) -> usize {
        self.max_url_length
    }

    /// Fixed cost paid by every batch before any parameter is added
    pub fn base_cost(&self, base_url: &str) -> usize {
        let reserved = self
            .control
            .as_deref()
            .map(|c| self.codec.entry(c).len() + 1)
            .unwrap_or(0);
        base_url.len() + 1 + reserved
    }

    pub fn entry_cost(&self, parameter: &str) -> usize {
        self.codec.entry(parameter).len() + 1
    }

    pub fn plan(&self, parameters: &[String], base_url: &str) -> Vec<Batch> {
        let base = self.base_cost(base_url);
        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut length = base;

        let packable = parameters
            .iter()
            .filter(|p| self.control.as_deref() != Some(p.as_str()));

        for param in packable {
            let cost = self.entry_cost(param);

            if length + cost > self.max_url_length && !current.is_empty() {
                self.close_batch(&mut batches, std::mem::take(&mut current), length);
                length = base;
            }

            current.push(param.clone());
            length += cost;
        }

        if !current.is_empty() {
            self.close_batch(&mut batches, current, length);
        }

        debug!(
            "[Planner] {} params -> {} batches (budget {}, base cost {})",
            parameters.len(),
            batches.len(),
            self.max_url_length,
            base
        );

        batches
    }

    fn close_batch(&self, batches: &mut Vec<Batch>, params: Vec<String>, length: usize) {
        let over_budget = length > self.max_url_length;
        if over_budget {
            warn!(
                "[Planner] Parameter '{}' alone needs {} chars, over the {} budget; testing it on its own",
                params.first().map(|s| s.as_str()).unwrap_or(""),
                length,
                self.max_url_length
            );
        }
        let index = batches.len();
        batches.push(Batch::new(index, params, length, over_budget));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(budget: usize, control: Option<&str>) -> BatchPlanner {
        BatchPlanner::new(
            MarkerCodec::default(),
            budget,
            control.map(|c| c.to_string()),
        )
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("param{}", i)).collect()
    }

    fn flatten(batches: &[Batch]) -> Vec<String> {
        batches.iter().flat_map(|b| b.params().to_vec()).collect()
    }

    #[test]
    fn test_every_batch_within_budget() {
        let base = "https://example.com/search";
        let codec = MarkerCodec::default();
        for budget in [200, 500, 2000] {
            let p = planner(budget, Some("name"));
            let params = names(500);
            for batch in p.plan(&params, base) {
                assert!(batch.encoded_len() <= budget);
                assert!(!batch.over_budget());
                let url = codec.build_url(base, batch.params(), Some("name"));
                assert!(url.len() <= budget, "{} > {}", url.len(), budget);
            }
        }
    }

    #[test]
    fn test_order_preserved_without_omissions() {
        let params = names(1234);
        let batches = planner(600, None).plan(&params, "http://t/");
        assert_eq!(flatten(&batches), params);
        for (i, b) in batches.iter().enumerate() {
            assert_eq!(b.index(), i);
            assert!(!b.is_empty());
        }
    }

    #[test]
    fn test_control_parameter_reserved_and_not_packed() {
        let mut params = names(50);
        params.insert(10, "name".to_string());
        let p = planner(300, Some("name"));
        let batches = p.plan(&params, "http://t/");

        let flat = flatten(&batches);
        assert!(!flat.contains(&"name".to_string()));
        assert_eq!(flat.len(), 50);

        let without = planner(300, None).plan(&names(50), "http://t/");
        assert!(batches.len() >= without.len());
    }

    #[test]
    fn test_oversized_parameter_forms_own_batch() {
        let huge = "x".repeat(300);
        let params = vec!["a".to_string(), huge.clone(), "b".to_string()];
        let batches = planner(100, None).plan(&params, "http://t/");

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].params(), &[huge]);
        assert!(batches[1].over_budget());
        assert!(!batches[0].over_budget());
        assert!(!batches[2].over_budget());
    }

    #[test]
    fn test_oversized_first_parameter_does_not_emit_empty_batch() {
        let params = vec!["y".repeat(500), "a".to_string()];
        let batches = planner(100, None).plan(&params, "http://t/");
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_replanning_is_deterministic() {
        let params = names(800);
        let p = planner(2000, Some("name"));
        assert_eq!(p.plan(&params, "http://t/a"), p.plan(&params, "http://t/a"));
    }

    #[test]
    fn test_empty_input() {
        assert!(planner(2000, None).plan(&[], "http://t/").is_empty());
    }

    #[test]
    fn test_ten_thousand_parameters() {
        let base = "http://target.tld/x/"; // 20 chars
        assert_eq!(base.len(), 20);
        let params = names(10_000);
        let batches = planner(2000, None).plan(&params, base);

        assert!(batches.len() > 1);
        assert!(batches.iter().all(|b| b.encoded_len() <= 2000));
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 10_000);
    }
}
