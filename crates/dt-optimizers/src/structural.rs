//! Structural redundancy — strip mapping entries that carry no information.
//!
//! Removed: entries whose value is `null`, `[]` or `{}`. Children are pruned
//! before their parent, so a mapping emptied by pruning is removed in the
//! same pass. `0`, `false` and `""` are data and always kept; sequence
//! elements are never removed because position is meaningful.

use dt_core::{Document, OptimizationError, OptimizationResult, Optimized, Optimizer};

pub const NAME: &str = "structural_redundancy";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub nulls: usize,
    pub empty_sequences: usize,
    pub empty_mappings: usize,
}

impl PruneStats {
    pub fn total(&self) -> usize {
        self.nulls + self.empty_sequences + self.empty_mappings
    }
}

/// Prune `doc` in place. The root itself is never removed.
pub fn prune(doc: &mut Document, stats: &mut PruneStats) {
    match doc {
        Document::Mapping(map) => {
            for value in map.values_mut() {
                prune(value, stats);
            }
            map.retain(|_, value| {
                if value.is_null() {
                    stats.nulls += 1;
                    false
                } else if value.is_empty_sequence() {
                    stats.empty_sequences += 1;
                    false
                } else if value.is_empty_mapping() {
                    stats.empty_mappings += 1;
                    false
                } else {
                    true
                }
            });
        }
        Document::Sequence(items) => {
            for item in items.iter_mut() {
                prune(item, stats);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralRedundancy;

impl StructuralRedundancy {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for StructuralRedundancy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Removes null, empty-sequence and empty-mapping entries from mappings"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let original = document.serialized_size();
        let nodes_before = document.node_count();

        let mut output = document.clone();
        let mut stats = PruneStats::default();
        prune(&mut output, &mut stats);

        let optimized = output.serialized_size();
        tracing::debug!(
            optimizer = NAME,
            removed = stats.total(),
            bytes_before = original,
            bytes_after = optimized,
            "structural pass done"
        );

        let result = OptimizationResult::new(NAME, original as f64, optimized as f64)
            .with_unit("bytes")
            .with_metric("fields_removed", stats.total())
            .with_metric("nulls_removed", stats.nulls)
            .with_metric("empty_sequences_removed", stats.empty_sequences)
            .with_metric("empty_mappings_removed", stats.empty_mappings)
            .with_metric("nodes_before", nodes_before)
            .with_metric("nodes_after", output.node_count());
        Ok((output, result))
    }
}
