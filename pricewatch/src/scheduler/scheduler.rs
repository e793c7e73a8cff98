//! Fixed-interval driver for the reconciliation engine.
//!
//! Responsibilities:
//! - Trigger one cycle per interval (first tick fires immediately).
//! - Never overlap cycles: ticks missed while a cycle runs are skipped, and
//!   manual triggers during a run are refused by the engine.
//!
//! Non-responsibilities:
//! - Retrying failed cycles (the next tick is the retry).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::reconcile::engine::ReconciliationEngine;
use crate::reconcile::types::CycleReport;

#[derive(Clone)]
pub struct Scheduler {
    engine: Arc<ReconciliationEngine>,
    every: Duration,
}

impl Scheduler {
    pub fn new(engine: Arc<ReconciliationEngine>, every: Duration) -> Self {
        Self { engine, every }
    }

    /// Runs one cycle now. `None` when it was skipped or aborted.
    pub async fn trigger(&self) -> Option<CycleReport> {
        match self.engine.run_cycle().await {
            Ok(report) => Some(report),
            Err(PipelineError::AlreadyRunning) => {
                debug!("cycle in flight; trigger dropped");
                None
            }
            Err(e) => {
                error!(error = %e, "reconciliation cycle failed");
                None
            }
        }
    }

    /// Ticks until `shutdown` resolves. An in-progress cycle is finished first.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(every_secs = self.every.as_secs(), "price reconciliation scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.trigger().await;
                }
            }
        }

        info!("price reconciliation scheduler stopped");
    }
}
