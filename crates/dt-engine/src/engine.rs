//! Engine — runs registered optimizers over a document, in registration order.
//!
//! Each optimizer sees the output of the one before it. In strict mode the
//! first failure stops the run and the report keeps the last good document;
//! in best-effort mode the failure is recorded as a zero-gain placeholder and
//! the run continues.

use crate::cancel::CancelToken;
use crate::observer::{RunObserver, TracingObserver};
use crate::report::{RunReport, RunStatus};
use chrono::Utc;
use dt_core::{
    ConfigurationError, Document, EngineConfig, MeanScorer, OptimizationResult, Optimizer,
    Result, RunMode, Scorer, WeightedScorer,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Which registered optimizers a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    /// The named optimizers. They still run in registration order.
    Only(Vec<String>),
}

impl Selection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }
}

pub struct Engine {
    config: EngineConfig,
    optimizers: Vec<Arc<dyn Optimizer>>,
    scorer: Box<dyn Scorer>,
    observer: Arc<dyn RunObserver>,
}

impl Engine {
    /// Empty engine. Scores with a weighted mean when `config.weights` is set.
    pub fn new(config: EngineConfig) -> Self {
        let scorer: Box<dyn Scorer> = if config.weights.is_empty() {
            Box::new(MeanScorer)
        } else {
            Box::new(WeightedScorer::new(config.weights.clone()))
        };
        Self {
            config,
            optimizers: Vec::new(),
            scorer,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Engine with the six built-in optimizers in their default order.
    pub fn with_standard_optimizers(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.optimizers = dt_optimizers::standard_optimizers(&engine.config);
        engine
    }

    /// Defaults overlaid with `DOCTUNE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::with_standard_optimizers(EngineConfig::from_env()?))
    }

    pub fn with_scorer(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register<O: Optimizer + 'static>(&mut self, optimizer: O) -> Result<()> {
        self.register_arc(Arc::new(optimizer))
    }

    /// Append an optimizer to the pipeline. Names must be unique and non-empty.
    pub fn register_arc(&mut self, optimizer: Arc<dyn Optimizer>) -> Result<()> {
        let name = optimizer.name();
        if name.trim().is_empty() {
            return Err(ConfigurationError::new(name, "optimizer name must not be empty").into());
        }
        if self.optimizers.iter().any(|o| o.name() == name) {
            return Err(ConfigurationError::new(name, "an optimizer with this name is already registered").into());
        }
        tracing::debug!(optimizer = name, position = self.optimizers.len(), "optimizer registered");
        self.optimizers.push(optimizer);
        Ok(())
    }

    /// `(name, description)` pairs in registration order.
    pub fn list_optimizers(&self) -> Vec<(&str, &str)> {
        self.optimizers.iter().map(|o| (o.name(), o.description())).collect()
    }

    pub fn optimizer_names(&self) -> Vec<&str> {
        self.optimizers.iter().map(|o| o.name()).collect()
    }

    pub fn score(&self, results: &[OptimizationResult]) -> f64 {
        self.scorer.score(results)
    }

    pub fn run(&self, document: Document, selection: Selection) -> Result<RunReport> {
        self.execute(document, &selection, None)
    }

    /// Like [`Engine::run`], stopping at the next optimizer boundary once
    /// `cancel` is triggered.
    pub fn run_with_cancel(
        &self,
        document: Document,
        selection: Selection,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        self.execute(document, &selection, Some(cancel))
    }

    /// Resolve a selection into the optimizers to run, in registration order.
    fn plan(&self, selection: &Selection) -> Result<Vec<&Arc<dyn Optimizer>>> {
        match selection {
            Selection::All => Ok(self.optimizers.iter().collect()),
            Selection::Only(names) => {
                let registered = self.optimizer_names();
                if let Some(unknown) = names.iter().find(|n| !registered.contains(&n.as_str())) {
                    return Err(ConfigurationError::new(unknown.as_str(), "no optimizer registered under this name").into());
                }
                let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
                Ok(self.optimizers.iter().filter(|o| wanted.contains(o.name())).collect())
            }
        }
    }

    fn execute(&self, document: Document, selection: &Selection, cancel: Option<&CancelToken>) -> Result<RunReport> {
        let plan = self.plan(selection)?;
        let names: Vec<&str> = plan.iter().map(|o| o.name()).collect();

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut status = RunStatus::Pending;
        self.observer.on_run_start(run_id, &names);
        advance(&mut status, RunStatus::Running);

        let mut current = document;
        let mut results = Vec::with_capacity(plan.len());
        let mut error = None;
        let mut stopped_at = None;

        for (idx, optimizer) in plan.iter().enumerate() {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                advance(&mut status, RunStatus::Cancelled);
                stopped_at = Some(idx);
                break;
            }
            match optimizer.optimize(&current) {
                Ok((next, result)) => {
                    self.observer.on_optimizer_finished(run_id, &result);
                    current = next;
                    results.push(result);
                }
                Err(err) => {
                    self.observer.on_optimizer_failed(run_id, &err);
                    match self.config.mode {
                        RunMode::Strict => {
                            advance(&mut status, RunStatus::Failed);
                            stopped_at = Some(idx);
                            error = Some(err);
                            break;
                        }
                        RunMode::BestEffort => {
                            results.push(OptimizationResult::failed(optimizer.name(), err.cause));
                        }
                    }
                }
            }
        }
        if status == RunStatus::Running {
            advance(&mut status, RunStatus::Completed);
        }

        let not_attempted = stopped_at
            .map(|idx| names[idx..].iter().map(|n| n.to_string()).collect())
            .unwrap_or_default();
        let score = self.score(&results);
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            document: current,
            results,
            score,
            not_attempted,
            error,
        };
        self.observer.on_run_finished(&report);
        Ok(report)
    }
}

fn advance(status: &mut RunStatus, next: RunStatus) {
    debug_assert!(status.can_transition_to(next), "invalid run transition {status:?} -> {next:?}");
    *status = next;
}
