//! Dynamic distance filtering.
//!
//! Reduces an oversampled, distance-sorted candidate list to the passages
//! worth handing to the generator. Three criteria run in sequence, each on the
//! survivors of the previous one:
//!
//! 1. a hard ceiling (`base_threshold`),
//! 2. a ceiling relative to the best survivor (`best / dynamic_ratio`),
//! 3. a cutoff at the first large jump between neighbouring distances.
//!
//! If the compound filter leaves nothing, a single permissive ceiling
//! (`fallback_threshold`) is applied to the original list instead.
//!
//! The filter is a pure function of its inputs: no I/O, no hidden state.
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Candidate;
use crate::config::ConfigError;

/// A jump between consecutive distances larger than
/// `base_threshold * GAP_RATIO` marks the start of an unrelated cluster.
pub const GAP_RATIO: f64 = 0.25;

fn default_true() -> bool {
    true
}

fn default_base_threshold() -> f64 {
    0.8
}

fn default_dynamic_ratio() -> f64 {
    0.7
}

fn default_min_results() -> usize {
    2
}

fn default_fallback_threshold() -> f64 {
    1.0
}

/// Filtering policy. Validated once at load time and never mutated while a
/// query runs.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_base_threshold")]
    pub base_threshold: f64,

    #[serde(default = "default_dynamic_ratio")]
    pub dynamic_ratio: f64,

    #[serde(default = "default_min_results")]
    pub min_results_for_filtering: usize,

    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,

    /// Log a per-query summary and show distances to the user.
    #[serde(default)]
    pub debug: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_threshold: default_base_threshold(),
            dynamic_ratio: default_dynamic_ratio(),
            min_results_for_filtering: default_min_results(),
            fallback_threshold: default_fallback_threshold(),
            debug: false,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dynamic_ratio > 0.0 && self.dynamic_ratio <= 1.0) {
            return Err(ConfigError::InvalidDynamicRatio(self.dynamic_ratio));
        }
        check_threshold("base_threshold", self.base_threshold)?;
        check_threshold("fallback_threshold", self.fallback_threshold)?;
        if self.min_results_for_filtering < 1 {
            return Err(ConfigError::InvalidMinResults);
        }
        Ok(())
    }

    /// Smallest jump between consecutive distances treated as a cluster break.
    #[must_use]
    pub fn gap_threshold(&self) -> f64 {
        self.base_threshold * GAP_RATIO
    }
}

fn check_threshold(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

/// Why filtering was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BypassReason {
    Disabled,
    TooFewCandidates { found: usize, required: usize },
}

/// Which stages changed the candidate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StagesApplied {
    pub base_threshold: bool,
    pub dynamic_ratio: bool,
    pub gap_cutoff: bool,
    /// The compound filter came up empty and the fallback ceiling was used.
    pub fallback: bool,
}

impl StagesApplied {
    /// Names of the stages that fired, in pipeline order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.base_threshold {
            names.push("base threshold");
        }
        if self.dynamic_ratio {
            names.push("dynamic ratio");
        }
        if self.gap_cutoff {
            names.push("gap cutoff");
        }
        if self.fallback {
            names.push("fallback");
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterResult {
    pub accepted: Vec<Candidate>,
    pub original_count: usize,
    pub filtered_count: usize,
    /// (min, max) distance over `accepted`.
    pub distance_range: Option<(f64, f64)>,
    /// Nearest distance in the unfiltered input.
    pub best_distance: Option<f64>,
    pub stages: StagesApplied,
    pub bypass: Option<BypassReason>,
}

impl FilterResult {
    fn new(
        accepted: Vec<Candidate>,
        original: &[Candidate],
        stages: StagesApplied,
        bypass: Option<BypassReason>,
    ) -> Self {
        let distance_range = match (accepted.first(), accepted.last()) {
            (Some(first), Some(last)) => Some((first.distance, last.distance)),
            _ => None,
        };
        Self {
            filtered_count: accepted.len(),
            original_count: original.len(),
            best_distance: original.first().map(|c| c.distance),
            distance_range,
            accepted,
            stages,
            bypass,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Filter a candidate list sorted ascending by distance.
///
/// Never reorders and never returns more than `requested_n` candidates. An
/// empty result is a valid outcome ("no relevant context"). `config` is
/// expected to have passed [`FilterConfig::validate`].
pub fn filter(candidates: &[Candidate], requested_n: usize, config: &FilterConfig) -> FilterResult {
    debug_assert!(
        candidates.windows(2).all(|w| w[0].distance <= w[1].distance),
        "candidates must be sorted ascending by distance"
    );

    if !config.enabled {
        return bypass(candidates, requested_n, BypassReason::Disabled);
    }
    if candidates.len() < config.min_results_for_filtering {
        let reason = BypassReason::TooFewCandidates {
            found: candidates.len(),
            required: config.min_results_for_filtering,
        };
        return bypass(candidates, requested_n, reason);
    }

    let mut stages = StagesApplied::default();

    let mut kept: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.distance <= config.base_threshold)
        .collect();
    stages.base_threshold = kept.len() < candidates.len();

    if kept.len() > 1 {
        let ceiling = kept[0].distance / config.dynamic_ratio;
        let before = kept.len();
        kept.retain(|c| c.distance <= ceiling);
        stages.dynamic_ratio = kept.len() < before;
    }

    if kept.len() > 1 {
        if let Some(cut) = first_gap(&kept, config.gap_threshold()) {
            kept.truncate(cut + 1);
            stages.gap_cutoff = true;
        }
    }

    if kept.is_empty() && !candidates.is_empty() {
        kept = candidates
            .iter()
            .filter(|c| c.distance <= config.fallback_threshold)
            .collect();
        stages.fallback = true;
    }

    kept.truncate(requested_n);
    let accepted: Vec<Candidate> = kept.into_iter().cloned().collect();
    let result = FilterResult::new(accepted, candidates, stages, None);

    if config.debug {
        debug!(
            original = result.original_count,
            accepted = result.filtered_count,
            best = ?result.best_distance,
            range = ?result.distance_range,
            stages = ?result.stages.names(),
            "distance filter applied"
        );
    }

    result
}

fn bypass(candidates: &[Candidate], requested_n: usize, reason: BypassReason) -> FilterResult {
    let accepted = candidates.iter().take(requested_n).cloned().collect();
    debug!(?reason, "distance filter bypassed");
    FilterResult::new(accepted, candidates, StagesApplied::default(), Some(reason))
}

/// Index of the last candidate before the first significant jump.
///
/// Equal distances have a zero gap, so a run of ties is never split.
fn first_gap(kept: &[&Candidate], min_gap: f64) -> Option<usize> {
    kept.windows(2)
        .position(|pair| pair[1].distance - pair[0].distance > min_gap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(distances: &[(&str, f64)]) -> Vec<Candidate> {
        distances
            .iter()
            .enumerate()
            .map(|(rank, (id, distance))| Candidate {
                id: id.to_string(),
                content: format!("content of {id}"),
                distance: *distance,
                rank,
            })
            .collect()
    }

    fn ids(result: &FilterResult) -> Vec<&str> {
        result.accepted.iter().map(|c| c.id.as_str()).collect()
    }

    fn config(base: f64, ratio: f64, min: usize) -> FilterConfig {
        FilterConfig {
            base_threshold: base,
            dynamic_ratio: ratio,
            min_results_for_filtering: min,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_ratio_stage_tightens_around_excellent_match() {
        let list = candidates(&[("A", 0.2), ("B", 0.3), ("C", 0.4), ("D", 0.9)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 2));

        assert_eq!(ids(&result), vec!["A"]);
        assert_eq!(result.filtered_count, 1);
        assert_eq!(result.original_count, 4);
        assert!(result.stages.base_threshold);
        assert!(result.stages.dynamic_ratio);
        assert!(!result.stages.fallback);
        assert_eq!(result.distance_range, Some((0.2, 0.2)));
    }

    #[test]
    fn test_ratio_stage_keeps_comparable_neighbours() {
        let list = candidates(&[("A", 0.5), ("B", 0.55), ("C", 0.95)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 2));

        assert_eq!(ids(&result), vec!["A", "B"]);
        assert!(result.stages.base_threshold);
        assert!(!result.stages.dynamic_ratio);
        assert!(!result.stages.gap_cutoff);
        assert_eq!(result.distance_range, Some((0.5, 0.55)));
    }

    #[test]
    fn test_nothing_under_fallback_is_empty_not_error() {
        let list = candidates(&[("A", 1.2), ("B", 1.3), ("C", 1.5)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 2));

        assert!(result.is_empty());
        assert_eq!(result.filtered_count, 0);
        assert_eq!(result.original_count, 3);
        assert_eq!(result.distance_range, None);
        assert_eq!(result.best_distance, Some(1.2));
        assert!(result.stages.fallback);
    }

    #[test]
    fn test_disabled_returns_prefix_verbatim() {
        let list = candidates(&[
            ("A", 0.1),
            ("B", 0.9),
            ("C", 1.4),
            ("D", 1.8),
            ("E", 1.9),
        ]);
        let cfg = FilterConfig {
            enabled: false,
            ..FilterConfig::default()
        };
        let result = filter(&list, 3, &cfg);

        assert_eq!(result.accepted, list[..3].to_vec());
        assert_eq!(result.bypass, Some(BypassReason::Disabled));
        assert_eq!(result.stages, StagesApplied::default());
    }

    #[test]
    fn test_disabled_with_fewer_than_requested() {
        let list = candidates(&[("A", 0.1), ("B", 1.9)]);
        let cfg = FilterConfig {
            enabled: false,
            ..FilterConfig::default()
        };
        assert_eq!(filter(&list, 5, &cfg).filtered_count, 2);
    }

    #[test]
    fn test_too_few_candidates_bypasses() {
        let list = candidates(&[("A", 1.7), ("B", 1.9)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 3));

        assert_eq!(ids(&result), vec!["A", "B"]);
        assert_eq!(
            result.bypass,
            Some(BypassReason::TooFewCandidates {
                found: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_single_candidate_only_base_threshold_applies() {
        let list = candidates(&[("A", 0.6)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 1));
        assert_eq!(ids(&result), vec!["A"]);
        assert_eq!(result.stages, StagesApplied::default());

        let list = candidates(&[("A", 0.9)]);
        let cfg = FilterConfig {
            fallback_threshold: 0.85,
            ..config(0.8, 0.7, 1)
        };
        let result = filter(&list, 3, &cfg);
        assert!(result.is_empty());
        assert!(result.stages.base_threshold);
    }

    #[test]
    fn test_gap_cutoff_drops_distant_cluster() {
        // ratio 0.2 lets everything under 0.5 through; the jump from 0.15 to
        // 0.45 exceeds 0.8 * 0.25 = 0.2.
        let list = candidates(&[("A", 0.1), ("B", 0.15), ("C", 0.45), ("D", 0.48)]);
        let result = filter(&list, 10, &config(0.8, 0.2, 2));

        assert_eq!(ids(&result), vec!["A", "B"]);
        assert!(result.stages.gap_cutoff);
        assert!(!result.stages.dynamic_ratio);
    }

    #[test]
    fn test_gap_cutoff_never_splits_ties() {
        let list = candidates(&[("A", 0.1), ("B", 0.1), ("C", 0.5), ("D", 0.5)]);
        let result = filter(&list, 10, &config(0.8, 0.1, 2));

        assert_eq!(ids(&result), vec!["A", "B"]);

        let tied = candidates(&[("A", 0.3), ("B", 0.3), ("C", 0.3)]);
        let result = filter(&tied, 10, &config(0.0, 0.5, 2));
        // base 0.0 rejects all, fallback keeps the whole tie
        assert_eq!(ids(&result), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_fallback_rescues_over_aggressive_filtering() {
        let list = candidates(&[("A", 0.85), ("B", 0.9), ("C", 1.1)]);
        let result = filter(&list, 3, &config(0.8, 0.7, 2));

        assert_eq!(ids(&result), vec!["A", "B"]);
        assert!(result.stages.fallback);
        assert!(result.stages.base_threshold);
        assert!(!result.stages.dynamic_ratio);
    }

    #[test]
    fn test_fallback_respects_requested_n() {
        let list = candidates(&[("A", 0.85), ("B", 0.86), ("C", 0.87), ("D", 0.88)]);
        let result = filter(&list, 2, &config(0.8, 0.7, 2));
        assert_eq!(ids(&result), vec!["A", "B"]);
    }

    #[test]
    fn test_truncates_to_requested_n() {
        let list = candidates(&[("A", 0.30), ("B", 0.31), ("C", 0.32), ("D", 0.33)]);
        let result = filter(&list, 2, &config(0.8, 0.7, 2));
        assert_eq!(ids(&result), vec!["A", "B"]);
        assert_eq!(result.distance_range, Some((0.30, 0.31)));
    }

    #[test]
    fn test_empty_input() {
        let result = filter(&[], 3, &config(0.8, 0.7, 1));
        assert!(result.is_empty());
        assert_eq!(result.original_count, 0);
        assert_eq!(result.best_distance, None);
        assert!(!result.stages.fallback);
    }

    #[test]
    fn test_zero_best_distance_keeps_only_exact_matches() {
        let list = candidates(&[("A", 0.0), ("B", 0.0), ("C", 0.05)]);
        let result = filter(&list, 5, &config(0.8, 0.7, 2));
        assert_eq!(ids(&result), vec!["A", "B"]);
    }

    #[test]
    fn test_never_exceeds_n_nor_reorders() {
        let list = candidates(&[
            ("A", 0.05),
            ("B", 0.07),
            ("C", 0.2),
            ("D", 0.21),
            ("E", 0.6),
            ("F", 0.95),
            ("G", 1.05),
        ]);
        for n in 0..=8 {
            for &base in &[0.0, 0.1, 0.3, 0.8, 2.0] {
                for &ratio in &[0.1, 0.5, 0.7, 1.0] {
                    for min in 1..=8 {
                        let result = filter(&list, n, &config(base, ratio, min));
                        assert!(result.filtered_count <= n);
                        assert!(
                            result.accepted.windows(2).all(|w| w[0].rank < w[1].rank),
                            "reordered for n={n} base={base} ratio={ratio} min={min}"
                        );
                        for c in &result.accepted {
                            assert_eq!(&list[c.rank], c);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_raising_base_threshold_is_monotone() {
        let list = candidates(&[
            ("A", 0.1),
            ("B", 0.15),
            ("C", 0.3),
            ("D", 0.32),
            ("E", 0.6),
            ("F", 0.65),
            ("G", 0.9),
        ]);
        for &ratio in &[0.1, 0.2, 0.5, 1.0] {
            let mut previous = 0;
            for step in 0..=40 {
                let base = f64::from(step) * 0.05;
                let cfg = FilterConfig {
                    fallback_threshold: 0.0,
                    ..config(base, ratio, 2)
                };
                let count = filter(&list, 10, &cfg).filtered_count;
                assert!(
                    count >= previous,
                    "count dropped from {previous} to {count} at base={base} ratio={ratio}"
                );
                previous = count;
            }
        }
    }

    #[test]
    fn test_fallback_guarantee() {
        let list = candidates(&[("A", 0.95), ("B", 1.5)]);
        for &base in &[0.0, 0.5, 0.9] {
            let cfg = FilterConfig {
                fallback_threshold: 1.0,
                ..config(base, 0.7, 2)
            };
            assert!(!filter(&list, 1, &cfg).is_empty());
        }
    }

    #[test]
    fn test_filter_is_pure() {
        let list = candidates(&[("A", 0.2), ("B", 0.25), ("C", 0.7), ("D", 0.9)]);
        let cfg = config(0.8, 0.7, 2);
        assert_eq!(filter(&list, 3, &cfg), filter(&list, 3, &cfg));
    }

    #[test]
    fn test_validate() {
        assert!(FilterConfig::default().validate().is_ok());

        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let cfg = FilterConfig {
                dynamic_ratio: ratio,
                ..FilterConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::InvalidDynamicRatio(_))
            ));
        }

        let cfg = FilterConfig {
            fallback_threshold: f64::INFINITY,
            ..FilterConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidThreshold {
                field: "fallback_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_stage_names() {
        let stages = StagesApplied {
            base_threshold: true,
            gap_cutoff: true,
            ..StagesApplied::default()
        };
        assert_eq!(stages.names(), vec!["base threshold", "gap cutoff"]);
    }
}
