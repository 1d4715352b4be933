//! doctune optimizers — one strategy per measurable dimension.
//!
//! Optimizers, in their default pipeline order:
//! 1. Structural redundancy — drop null/empty entries (bytes)
//! 2. Formula efficiency — fold constants, drop identities (expression nodes)
//! 3. Call aggregation — batch sibling calls to one target (call sites)
//! 4. Computation speed — flatten nested aggregates (evaluation steps)
//! 5. Memory footprint — compact allocations (bytes)
//! 6. Cost per execution — drop duplicate read-only calls (cost units)

pub mod call_site;
pub mod calls;
pub mod cost;
pub mod expr;
pub mod formula;
pub mod measure;
pub mod memory;
pub mod speed;
pub mod structural;

pub use calls::CallAggregation;
pub use cost::CostPerExecution;
pub use formula::FormulaEfficiency;
pub use memory::MemoryFootprint;
pub use speed::ComputationSpeed;
pub use structural::StructuralRedundancy;

use dt_core::{EngineConfig, Optimizer};
use std::sync::Arc;

/// The six built-in optimizers in their default pipeline order.
pub fn standard_optimizers(config: &EngineConfig) -> Vec<Arc<dyn Optimizer>> {
    vec![
        Arc::new(StructuralRedundancy::new()),
        Arc::new(FormulaEfficiency::new(config.formulas.clone())),
        Arc::new(CallAggregation::from_config(config)),
        Arc::new(ComputationSpeed::from_config(config)),
        Arc::new(MemoryFootprint::new()),
        Arc::new(CostPerExecution::from_config(config)),
    ]
}

#[cfg(test)]
mod tests;
