//! Call aggregation — merge batchable call sites into one batched descriptor.
//!
//! # Example
//!
//! **Before**:
//! ```text
//! [ {"call": "crm.lookup", "method": "GET", "params": {"id": 1}},
//!   {"note": "x"},
//!   {"call": "crm.lookup", "method": "GET", "params": {"id": 2}} ]
//! ```
//!
//! **After**:
//! ```text
//! [ {"call": "crm.lookup", "method": "GET", "batch": [{"id": 1}, {"id": 2}]},
//!   {"note": "x"} ]
//! ```
//!
//! # Grouping rules
//! - Only siblings of the same sequence are merged.
//! - Members share the target and every non-payload key (their shape).
//! - Members form a run: a sibling holding any other call site ends the
//!   group, so calls never move past one another.
//! - The batch takes the position of the first member; later members leave
//!   their slots, so plain data between members ends up after the batch.

use crate::call_site;
use dt_core::{
    CallConventions, Document, EngineConfig, Mapping, OptimizationError, OptimizationResult,
    Optimized, Optimizer,
};
use std::collections::HashSet;

pub const NAME: &str = "call_aggregation";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregationStats {
    pub batches_formed: usize,
    pub calls_merged: usize,
}

/// A run of sibling call sites with equal shape.
#[derive(Debug, Clone)]
struct CallGroup {
    shape: Mapping,
    indices: Vec<usize>,
}

fn find_groups(items: &[Document], conv: &CallConventions) -> Vec<CallGroup> {
    let mut groups: Vec<CallGroup> = Vec::new();
    let mut open = false;
    for (idx, item) in items.iter().enumerate() {
        let Some(shape) = call_site::shape(item, conv) else {
            if call_site::count(item, conv) > 0 {
                open = false;
            }
            continue;
        };
        match groups.last_mut() {
            Some(group) if open && group.shape == shape => group.indices.push(idx),
            _ => {
                groups.push(CallGroup { shape, indices: vec![idx] });
                open = true;
            }
        }
    }
    groups.retain(|g| g.indices.len() > 1);
    groups
}

fn merge_siblings(items: &mut Vec<Document>, conv: &CallConventions, stats: &mut AggregationStats) {
    let groups = find_groups(items, conv);
    if groups.is_empty() {
        return;
    }

    let mut replacements: Vec<(usize, Document)> = Vec::with_capacity(groups.len());
    let mut absorbed: HashSet<usize> = HashSet::new();
    for group in groups {
        let batch: Vec<Document> = group
            .indices
            .iter()
            .flat_map(|&idx| call_site::payloads(&items[idx], conv))
            .collect();
        let mut descriptor = group.shape;
        descriptor.insert(conv.batch_key.clone(), Document::Sequence(batch));

        stats.batches_formed += 1;
        stats.calls_merged += group.indices.len() - 1;
        replacements.push((group.indices[0], Document::Mapping(descriptor)));
        absorbed.extend(group.indices.iter().skip(1).copied());
    }

    let old = std::mem::take(items);
    for (idx, item) in old.into_iter().enumerate() {
        if absorbed.contains(&idx) {
            continue;
        }
        match replacements.iter().position(|(first, _)| *first == idx) {
            Some(pos) => items.push(replacements.swap_remove(pos).1),
            None => items.push(item),
        }
    }
}

/// Merge batchable call sites everywhere in `doc`, innermost sequences first.
pub fn aggregate(doc: &mut Document, conv: &CallConventions, stats: &mut AggregationStats) {
    match doc {
        Document::Sequence(items) => {
            for item in items.iter_mut() {
                aggregate(item, conv, stats);
            }
            merge_siblings(items, conv, stats);
        }
        Document::Mapping(map) => {
            for value in map.values_mut() {
                aggregate(value, conv, stats);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallAggregation {
    calls: CallConventions,
}

impl CallAggregation {
    pub fn new(calls: CallConventions) -> Self {
        Self { calls }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.calls.clone())
    }
}

impl Optimizer for CallAggregation {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Merges sibling calls to the same target into a single batched call"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let original = call_site::count(document, &self.calls);
        let mut output = document.clone();
        let mut stats = AggregationStats::default();
        aggregate(&mut output, &self.calls, &mut stats);
        let optimized = call_site::count(&output, &self.calls);

        tracing::debug!(
            optimizer = NAME,
            batches = stats.batches_formed,
            merged = stats.calls_merged,
            call_sites_before = original,
            call_sites_after = optimized,
            "aggregation pass done"
        );

        let result = OptimizationResult::new(NAME, original as f64, optimized as f64)
            .with_unit("call_sites")
            .with_metric("call_sites_before", original)
            .with_metric("call_sites_after", optimized)
            .with_metric("batches_created", stats.batches_formed)
            .with_metric("calls_merged", stats.calls_merged);
        Ok((output, result))
    }
}
