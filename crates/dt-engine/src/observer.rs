//! Run observers. The host decides where run events go; the engine only
//! reports them.

use crate::report::RunReport;
use dt_core::{OptimizationError, OptimizationResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Receives run events in order. Every method defaults to a no-op.
pub trait RunObserver: Send + Sync {
    fn on_run_start(&self, _run_id: Uuid, _optimizers: &[&str]) {}

    fn on_optimizer_finished(&self, _run_id: Uuid, _result: &OptimizationResult) {}

    fn on_optimizer_failed(&self, _run_id: Uuid, _error: &OptimizationError) {}

    fn on_run_finished(&self, _report: &RunReport) {}
}

/// Default observer: emits `tracing` events. Installs no subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_run_start(&self, run_id: Uuid, optimizers: &[&str]) {
        info!(%run_id, optimizers = ?optimizers, "optimization run started");
    }

    fn on_optimizer_finished(&self, run_id: Uuid, result: &OptimizationResult) {
        debug!(
            %run_id,
            optimizer = result.optimizer_name(),
            original = result.original_value(),
            optimized = result.optimized_value(),
            gain = result.efficiency_gain(),
            "optimizer finished"
        );
    }

    fn on_optimizer_failed(&self, run_id: Uuid, error: &OptimizationError) {
        warn!(%run_id, optimizer = %error.optimizer, cause = %error.cause, "optimizer failed");
    }

    fn on_run_finished(&self, report: &RunReport) {
        info!(
            run_id = %report.run_id,
            status = ?report.status,
            score = report.score,
            optimizers = report.results.len(),
            duration_ms = report.duration_ms(),
            "optimization run finished"
        );
    }
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
