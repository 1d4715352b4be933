//! doctune engine — registers optimizers, runs them over a document in
//! order, and reports per-optimizer results with an aggregate score.
//!
//! ```text
//! Document → [structural → formula → calls → speed → memory → cost] → RunReport
//! ```

pub mod cancel;
pub mod engine;
pub mod observer;
pub mod report;

pub use cancel::CancelToken;
pub use engine::{Engine, Selection};
pub use observer::{NoopObserver, RunObserver, TracingObserver};
pub use report::{RunReport, RunStatus, RunSummary};

pub use dt_core::{
    Document, EngineConfig, EngineError, OptimizationError, OptimizationResult, Optimizer, RunMode,
};
