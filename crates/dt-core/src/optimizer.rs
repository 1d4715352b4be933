//! The strategy contract every optimizer variant implements.

use crate::document::Document;
use crate::error::OptimizationError;
use crate::result::OptimizationResult;

/// Output of one optimizer invocation: the rewritten document and its measurements.
pub type Optimized = (Document, OptimizationResult);

/// A stateless strategy that improves one measurable dimension of a document.
///
/// Implementations are shared across concurrent runs, so they must not keep
/// per-run state and must not hold on to the document after returning.
pub trait Optimizer: Send + Sync {
    /// Unique name used for registration, selection and result labelling.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Produce an optimized copy of `document` plus the before/after record.
    fn optimize(&self, document: &Document) -> Result<Optimized, OptimizationError>;
}
