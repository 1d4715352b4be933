//! Cost per execution — drop billable work that cannot change the outcome.
//!
//! Cost model: `requests × call_unit_price + batch items × batch_item_price
//! + evaluation steps × compute_unit_price`.
//!
//! A read-only call repeated with identical inputs returns the same answer
//! and has no extra effect, so exact duplicate read-only call sites among
//! siblings are removed, as are exact duplicate items inside a read-only
//! batch. Calls without a method, or with a writing method, are never touched
//! and act as barriers: a read after one is kept even if it repeats a read
//! from before it.

use crate::call_site;
use crate::measure::evaluation_steps;
use dt_core::{
    CallConventions, CostModel, Document, EngineConfig, FormulaSettings, OptimizationError,
    OptimizationResult, Optimized, Optimizer,
};

pub const NAME: &str = "cost_per_execution";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupStats {
    pub duplicate_calls: usize,
    pub duplicate_batch_items: usize,
}

/// Keep the first occurrence of every exact duplicate selected by `eligible`.
/// Duplicates are only looked for since the last item matching `barrier`.
fn dedup_by<F, B>(items: &mut Vec<Document>, eligible: F, barrier: B) -> usize
where
    F: Fn(&Document) -> bool,
    B: Fn(&Document) -> bool,
{
    let mut keep = vec![true; items.len()];
    let mut window = 0;
    for j in 0..items.len() {
        if barrier(&items[j]) {
            window = j + 1;
            continue;
        }
        if !eligible(&items[j]) {
            continue;
        }
        if (window..j).any(|i| keep[i] && items[i] == items[j]) {
            keep[j] = false;
        }
    }
    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        let mut flags = keep.into_iter();
        items.retain(|_| flags.next().unwrap_or(true));
    }
    removed
}

/// Remove redundant read-only calls everywhere in `doc`.
pub fn dedup_read_only(doc: &mut Document, conv: &CallConventions, stats: &mut DedupStats) {
    let read_only_batch = call_site::is_read_only(doc, conv);
    match doc {
        Document::Sequence(items) => {
            for item in items.iter_mut() {
                dedup_read_only(item, conv, stats);
            }
            stats.duplicate_calls += dedup_by(
                items,
                |d| call_site::is_read_only(d, conv),
                |d| call_site::has_side_effects(d, conv),
            );
        }
        Document::Mapping(map) => {
            for value in map.values_mut() {
                dedup_read_only(value, conv, stats);
            }
            if read_only_batch {
                if let Some(Document::Sequence(batch)) = map.get_mut(&conv.batch_key) {
                    stats.duplicate_batch_items += dedup_by(batch, |_| true, |_| false);
                }
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub requests: usize,
    pub batch_items: usize,
    pub steps: usize,
    pub total: f64,
}

pub fn estimate(
    doc: &Document,
    model: &CostModel,
    conv: &CallConventions,
    settings: &FormulaSettings,
) -> CostBreakdown {
    let (requests, batch_items) = call_site::billable(doc, conv);
    let steps = evaluation_steps(doc, settings, conv);
    let total = requests as f64 * model.call_unit_price
        + batch_items as f64 * model.batch_item_price
        + steps as f64 * model.compute_unit_price;
    CostBreakdown { requests, batch_items, steps, total }
}

#[derive(Debug, Clone, Default)]
pub struct CostPerExecution {
    model: CostModel,
    calls: CallConventions,
    formulas: FormulaSettings,
}

impl CostPerExecution {
    pub fn new(model: CostModel, calls: CallConventions, formulas: FormulaSettings) -> Self {
        Self { model, calls, formulas }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cost.clone(), config.calls.clone(), config.formulas.clone())
    }
}

impl Optimizer for CostPerExecution {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Removes duplicate read-only calls and reports the per-execution cost"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let before = estimate(document, &self.model, &self.calls, &self.formulas);
        let mut output = document.clone();
        let mut stats = DedupStats::default();
        dedup_read_only(&mut output, &self.calls, &mut stats);
        let after = estimate(&output, &self.model, &self.calls, &self.formulas);

        if !before.total.is_finite() || !after.total.is_finite() {
            return Err(OptimizationError::new(NAME, "cost model produced a non-finite total"));
        }
        tracing::debug!(
            optimizer = NAME,
            cost_before = before.total,
            cost_after = after.total,
            duplicates = stats.duplicate_calls,
            "cost pass done"
        );

        let result = OptimizationResult::new(NAME, before.total, after.total)
            .with_unit("cost_units")
            .with_metric("duplicate_calls_removed", stats.duplicate_calls)
            .with_metric("duplicate_batch_items_removed", stats.duplicate_batch_items)
            .with_metric("billable_calls", after.requests)
            .with_metric("batch_items", after.batch_items)
            .with_metric("compute_steps", after.steps);
        Ok((output, result))
    }
}
