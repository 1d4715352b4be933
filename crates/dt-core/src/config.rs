//! Engine configuration.
//!
//! Built from defaults, optionally overlaid with a JSON file body and then
//! environment variables. Reading files is the host's job; this module only
//! sees text.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

/// What the engine does when an optimizer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Abort the run on the first failure.
    #[default]
    Strict,
    /// Record a zero-gain placeholder and keep going with the last good document.
    BestEffort,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Some(Self::Strict),
            "best_effort" | "besteffort" => Some(Self::BestEffort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: RunMode,
    pub cost: CostModel,
    pub calls: CallConventions,
    pub formulas: FormulaSettings,
    /// Per-optimizer score weights. Empty means a plain mean.
    pub weights: BTreeMap<String, f64>,
}

/// Unit prices for the cost-per-execution model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Price of one discrete request.
    pub call_unit_price: f64,
    /// Surcharge per item carried inside a batched request.
    pub batch_item_price: f64,
    /// Price of one evaluation step.
    pub compute_unit_price: f64,
}

/// Keys that identify call sites inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConventions {
    pub call_key: String,
    pub params_key: String,
    pub batch_key: String,
    pub method_key: String,
    /// Methods whose repeated identical invocation has no additional effect.
    pub read_only_methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaSettings {
    /// Leading marker of a formula string.
    pub prefix: String,
    /// Functions where `F(F(a, b), c) == F(a, b, c)`.
    pub flattenable_functions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Strict,
            cost: CostModel::default(),
            calls: CallConventions::default(),
            formulas: FormulaSettings::default(),
            weights: BTreeMap::new(),
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            call_unit_price: 1.0,
            batch_item_price: 0.1,
            compute_unit_price: 0.01,
        }
    }
}

impl Default for CallConventions {
    fn default() -> Self {
        Self {
            call_key: "call".into(),
            params_key: "params".into(),
            batch_key: "batch".into(),
            method_key: "method".into(),
            read_only_methods: ["GET", "HEAD", "LOOKUP", "READ", "SEARCH", "LIST"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CallConventions {
    pub fn is_read_only(&self, method: &str) -> bool {
        self.read_only_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl Default for FormulaSettings {
    fn default() -> Self {
        Self {
            prefix: "=".into(),
            flattenable_functions: vec!["SUM".into()],
        }
    }
}

impl FormulaSettings {
    pub fn is_flattenable(&self, function: &str) -> bool {
        self.flattenable_functions.iter().any(|f| f.eq_ignore_ascii_case(function))
    }
}

// ============================================================================
// Loading
// ============================================================================

pub const ENV_MODE: &str = "DOCTUNE_MODE";
pub const ENV_CALL_UNIT_PRICE: &str = "DOCTUNE_CALL_UNIT_PRICE";
pub const ENV_BATCH_ITEM_PRICE: &str = "DOCTUNE_BATCH_ITEM_PRICE";
pub const ENV_COMPUTE_UNIT_PRICE: &str = "DOCTUNE_COMPUTE_UNIT_PRICE";

impl EngineConfig {
    /// Parse a JSON body; missing fields fall back to defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse engine configuration")
    }

    /// Defaults overlaid with `DOCTUNE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `DOCTUNE_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment, secrets store, test map).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MODE) {
            self.mode = RunMode::parse(&raw)
                .with_context(|| format!("Invalid {ENV_MODE} value: {raw:?}"))?;
        }
        if let Some(v) = parse_price(&lookup, ENV_CALL_UNIT_PRICE)? {
            self.cost.call_unit_price = v;
        }
        if let Some(v) = parse_price(&lookup, ENV_BATCH_ITEM_PRICE)? {
            self.cost.batch_item_price = v;
        }
        if let Some(v) = parse_price(&lookup, ENV_COMPUTE_UNIT_PRICE)? {
            self.cost.compute_unit_price = v;
        }
        tracing::debug!(mode = ?self.mode, cost = ?self.cost, "engine configuration loaded");
        Ok(self)
    }
}

fn parse_price<F>(lookup: &F, key: &str) -> Result<Option<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid {key} value: {raw:?}"))?;
    anyhow::ensure!(value.is_finite() && value >= 0.0, "{key} must be a non-negative number");
    Ok(Some(value))
}
