use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data-shape errors, raised while a document is being built.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Duplicate key `{key}` in mapping at {path}")]
    DuplicateKey { path: String, key: String },
    #[error("Non-finite number {0} has no JSON representation")]
    NonFiniteNumber(f64),
    #[error("Malformed document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Invalid engine setup: duplicate or unknown optimizer name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error for optimizer `{name}`: {cause}")]
pub struct ConfigurationError {
    pub name: String,
    pub cause: String,
}

impl ConfigurationError {
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self { name: name.into(), cause: cause.into() }
    }
}

/// A single optimizer failed to complete.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Optimizer `{optimizer}` failed: {cause}")]
pub struct OptimizationError {
    pub optimizer: String,
    pub cause: String,
}

impl OptimizationError {
    pub fn new(optimizer: impl Into<String>, cause: impl Into<String>) -> Self {
        Self { optimizer: optimizer.into(), cause: cause.into() }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
