//! doctune core — document model, optimizer contract, results, errors,
//! configuration and scoring shared by the optimizers and the engine.

pub mod config;
pub mod document;
pub mod error;
pub mod optimizer;
pub mod result;
pub mod score;

pub use config::{CallConventions, CostModel, EngineConfig, FormulaSettings, RunMode};
pub use document::{display_path, Document, Mapping, Number, PathSegment};
pub use error::{ConfigurationError, DocumentError, EngineError, OptimizationError, Result};
pub use optimizer::{Optimized, Optimizer};
pub use result::{efficiency_gain, MetricValue, OptimizationResult, MIN_EFFICIENCY_GAIN};
pub use score::{meets_threshold, rank, MeanScorer, Scorer, WeightedScorer};
