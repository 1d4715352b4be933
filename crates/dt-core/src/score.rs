//! Scoring — turns per-optimizer gains into one comparable number.

use crate::result::OptimizationResult;
use std::collections::BTreeMap;

/// Combines efficiency gains into a single aggregate. Must be pure.
pub trait Scorer: Send + Sync {
    fn score(&self, results: &[OptimizationResult]) -> f64;
}

/// Arithmetic mean of all gains. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanScorer;

impl Scorer for MeanScorer {
    fn score(&self, results: &[OptimizationResult]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let total: f64 = results.iter().map(OptimizationResult::efficiency_gain).sum();
        total / results.len() as f64
    }
}

/// Weighted mean keyed by optimizer name. Unlisted optimizers get `default_weight`.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    pub weights: BTreeMap<String, f64>,
    pub default_weight: f64,
}

impl WeightedScorer {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self { weights, default_weight: 1.0 }
    }

    pub fn with_weight(mut self, optimizer: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(optimizer.into(), weight);
        self
    }

    pub fn weight_of(&self, optimizer: &str) -> f64 {
        self.weights
            .get(optimizer)
            .copied()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .unwrap_or(self.default_weight)
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, results: &[OptimizationResult]) -> f64 {
        let (weighted, total_weight) = results.iter().fold((0.0, 0.0), |(sum, weights), r| {
            let w = self.weight_of(r.optimizer_name());
            (sum + r.efficiency_gain() * w, weights + w)
        });
        if total_weight == 0.0 {
            0.0
        } else {
            weighted / total_weight
        }
    }
}

/// Results ordered by descending gain; ties keep their original order.
pub fn rank(results: &[OptimizationResult]) -> Vec<&OptimizationResult> {
    let mut ranked: Vec<&OptimizationResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.efficiency_gain().total_cmp(&a.efficiency_gain()));
    ranked
}

/// Regression gate: true when `score` reaches `minimum`.
pub fn meets_threshold(score: f64, minimum: f64) -> bool {
    score >= minimum
}
