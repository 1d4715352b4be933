//! Shared measurements over formulas and call sites.

use crate::{call_site, expr};
use dt_core::{CallConventions, Document, FormulaSettings};

/// Formula census of a document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormulaCensus {
    /// Strings carrying the formula prefix.
    pub formulas: usize,
    /// Formulas that could not be parsed.
    pub unparsed: usize,
    /// Total AST nodes over all parsed formulas.
    pub nodes: usize,
}

pub fn formula_census(doc: &Document, settings: &FormulaSettings) -> FormulaCensus {
    let mut census = FormulaCensus::default();
    for text in doc.strings() {
        let Some(body) = expr::formula_body(text, &settings.prefix) else {
            continue;
        };
        census.formulas += 1;
        match expr::parse(body) {
            Ok(e) => census.nodes += e.node_count(),
            Err(_) => census.unparsed += 1,
        }
    }
    census
}

/// Estimated evaluation steps: formula nodes, one step per unparsed formula
/// and one per call site.
pub fn evaluation_steps(doc: &Document, settings: &FormulaSettings, conv: &CallConventions) -> usize {
    let census = formula_census(doc, settings);
    census.nodes + census.unparsed + call_site::count(doc, conv)
}
