//! Computation speed — fewer evaluation steps per document execution.
//!
//! Nested calls to associative aggregate functions are spliced into their
//! parent (`SUM(SUM(A1,B1),C1)` → `SUM(A1,B1,C1)`). Only functions listed in
//! [`FormulaSettings::flattenable_functions`] are touched.

use crate::expr;
use crate::measure::evaluation_steps;
use dt_core::{
    CallConventions, Document, EngineConfig, FormulaSettings, OptimizationError,
    OptimizationResult, Optimized, Optimizer,
};

pub const NAME: &str = "computation_speed";

#[derive(Debug, Clone, Default)]
pub struct ComputationSpeed {
    settings: FormulaSettings,
    calls: CallConventions,
}

impl ComputationSpeed {
    pub fn new(settings: FormulaSettings, calls: CallConventions) -> Self {
        Self { settings, calls }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.formulas.clone(), config.calls.clone())
    }
}

impl Optimizer for ComputationSpeed {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Flattens nested aggregate calls to cut formula evaluation steps"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let original = evaluation_steps(document, &self.settings, &self.calls);
        let prefix = self.settings.prefix.as_str();
        let flattenable = |name: &str| self.settings.is_flattenable(name);

        let mut output = document.clone();
        let mut flattened = 0usize;
        let mut rewritten = 0usize;
        let mut skipped = 0usize;
        output.visit_strings_mut(&mut |_, text| {
            let Some(body) = expr::formula_body(text, prefix) else {
                return;
            };
            let Ok(parsed) = expr::parse(body) else {
                skipped += 1;
                return;
            };
            let (flat, removed) = expr::flatten_calls(parsed, &flattenable);
            if removed > 0 {
                flattened += removed;
                rewritten += 1;
                *text = format!("{prefix}{}", flat.render());
            }
        });

        let optimized = evaluation_steps(&output, &self.settings, &self.calls);
        tracing::debug!(optimizer = NAME, flattened, steps_before = original, steps_after = optimized, "speed pass done");

        let result = OptimizationResult::new(NAME, original as f64, optimized as f64)
            .with_unit("evaluation_steps")
            .with_metric("calls_flattened", flattened)
            .with_metric("formulas_rewritten", rewritten)
            .with_metric("skipped", skipped);
        Ok((output, result))
    }
}
