//! Formula efficiency — canonicalize spreadsheet formulas without changing
//! what they evaluate to.
//!
//! Constant sub-expressions are folded, numeric identities (`x+0`, `x*1`, ...)
//! are dropped where `x` cannot be text, and redundant parentheses go away.
//! A formula that cannot be parsed confidently is left exactly as it was and
//! counted under `skipped`.

use crate::expr::{self, SimplifyStats};
use dt_core::{
    display_path, Document, FormulaSettings, OptimizationError, OptimizationResult, Optimized,
    Optimizer,
};

pub const NAME: &str = "formula_efficiency";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FormulaStats {
    seen: usize,
    rewritten: usize,
    skipped: usize,
    duplicates: usize,
    nodes_before: usize,
    nodes_after: usize,
    simplify: SimplifyStats,
}

#[derive(Debug, Clone, Default)]
pub struct FormulaEfficiency {
    settings: FormulaSettings,
}

impl FormulaEfficiency {
    pub fn new(settings: FormulaSettings) -> Self {
        Self { settings }
    }
}

impl Optimizer for FormulaEfficiency {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Folds constants and removes numeric identities in embedded formulas"
    }

    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError> {
        let prefix = self.settings.prefix.as_str();
        let mut stats = FormulaStats::default();
        let mut output = document.clone();

        output.visit_strings_mut(&mut |path, text| {
            let Some(body) = expr::formula_body(text, prefix) else {
                return;
            };
            stats.seen += 1;
            let parsed = match expr::parse(body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    stats.skipped += 1;
                    tracing::warn!(optimizer = NAME, path = %display_path(path), %err, "formula skipped");
                    return;
                }
            };
            stats.nodes_before += parsed.node_count();
            stats.duplicates += parsed.duplicate_subexpressions();

            let simplified = expr::simplify(parsed, &mut stats.simplify);
            stats.nodes_after += simplified.node_count();

            let rendered = format!("{prefix}{}", simplified.render());
            if rendered != *text {
                stats.rewritten += 1;
                *text = rendered;
            }
        });

        tracing::debug!(
            optimizer = NAME,
            formulas = stats.seen,
            rewritten = stats.rewritten,
            skipped = stats.skipped,
            "formula pass done"
        );

        let result = OptimizationResult::new(NAME, stats.nodes_before as f64, stats.nodes_after as f64)
            .with_unit("expression_nodes")
            .with_metric("formulas_seen", stats.seen)
            .with_metric("formulas_rewritten", stats.rewritten)
            .with_metric("skipped", stats.skipped)
            .with_metric("constants_folded", stats.simplify.constants_folded)
            .with_metric("identities_removed", stats.simplify.identities_removed)
            .with_metric("duplicate_subexpressions", stats.duplicates);
        Ok((output, result))
    }
}
