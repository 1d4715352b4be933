//! Memory footprint — release over-allocated capacity held by the tree.
//!
//! Parsers and builders grow vectors, strings and maps geometrically, so a
//! freshly built document usually holds more memory than its content needs.
//! The rewrite compacts every node to its exact size; values are unchanged.

use dt_core::{Document, OptimizationError, OptimizationResult, Optimized, Optimizer};

pub const NAME: &str = "memory_footprint";

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryFootprint;

impl MemoryFootprint {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for MemoryFootprint {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Compacts the in-memory document to its exact working-set size"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let original = document.heap_footprint();
        let mut output = document.clone();
        output.shrink_to_fit();
        let optimized = output.heap_footprint();

        if optimized > original {
            return Err(OptimizationError::new(
                NAME,
                format!("compaction grew the working set from {original} to {optimized} bytes"),
            ));
        }
        tracing::debug!(optimizer = NAME, bytes_before = original, bytes_after = optimized, "memory pass done");

        let result = OptimizationResult::new(NAME, original as f64, optimized as f64)
            .with_unit("bytes")
            .with_metric("bytes_reclaimed", original - optimized)
            .with_metric("nodes", output.node_count());
        Ok((output, result))
    }
}
