//! Standardized before/after record emitted by every optimizer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lower bound for a reported gain. Only reachable by an optimizer that
/// expands its measurement more than tenfold.
pub const MIN_EFFICIENCY_GAIN: f64 = -1000.0;

/// Metric key every built-in optimizer uses to name its measurement unit.
pub const UNIT_KEY: &str = "unit";

/// Metric key carrying the cause of a best-effort failure.
pub const ERROR_KEY: &str = "error";

/// Free-form supplementary measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Percentage improvement of `optimized` over `original`.
///
/// Zero when `original` is zero, clamped to `[MIN_EFFICIENCY_GAIN, 100]`.
pub fn efficiency_gain(original: f64, optimized: f64) -> f64 {
    if original <= 0.0 || !original.is_finite() || !optimized.is_finite() {
        return 0.0;
    }
    ((original - optimized) / original * 100.0).clamp(MIN_EFFICIENCY_GAIN, 100.0)
}

/// Outcome of one optimizer invocation. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    optimizer_name: String,
    original_value: f64,
    optimized_value: f64,
    efficiency_gain: f64,
    #[serde(default)]
    metrics: BTreeMap<String, MetricValue>,
}

impl OptimizationResult {
    /// Record a measurement pair; the gain is derived.
    pub fn new(optimizer_name: impl Into<String>, original_value: f64, optimized_value: f64) -> Self {
        Self {
            optimizer_name: optimizer_name.into(),
            original_value,
            optimized_value,
            efficiency_gain: efficiency_gain(original_value, optimized_value),
            metrics: BTreeMap::new(),
        }
    }

    /// Rebuild a record from stored parts, trusting the stored gain.
    pub fn from_parts(
        optimizer_name: impl Into<String>,
        original_value: f64,
        optimized_value: f64,
        efficiency_gain: f64,
        metrics: BTreeMap<String, MetricValue>,
    ) -> Self {
        Self {
            optimizer_name: optimizer_name.into(),
            original_value,
            optimized_value,
            efficiency_gain,
            metrics,
        }
    }

    /// Zero-gain placeholder for an optimizer that failed in best-effort mode.
    pub fn failed(optimizer_name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(optimizer_name, 0.0, 0.0).with_metric(ERROR_KEY, cause.into())
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    pub fn with_unit(self, unit: &str) -> Self {
        self.with_metric(UNIT_KEY, unit)
    }

    pub fn optimizer_name(&self) -> &str {
        &self.optimizer_name
    }

    pub fn original_value(&self) -> f64 {
        self.original_value
    }

    pub fn optimized_value(&self) -> f64 {
        self.optimized_value
    }

    pub fn efficiency_gain(&self) -> f64 {
        self.efficiency_gain
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }

    /// Numeric metric, or `None` if absent or textual.
    pub fn metric_f64(&self, key: &str) -> Option<f64> {
        self.metric(key).and_then(MetricValue::as_f64)
    }

    pub fn unit(&self) -> Option<&str> {
        self.metric(UNIT_KEY).and_then(MetricValue::as_str)
    }

    pub fn is_failure(&self) -> bool {
        self.metrics.contains_key(ERROR_KEY)
    }
}
