//! testim-qase-sync -- reports finished Testim executions to Qase.
//!
//! Executions labelled `qase/<PROJECT>` become Qase test runs; tests labelled
//! `qase/<PROJECT>-<caseId>` become results on the matching Qase cases.

pub mod config;
pub mod error;
pub mod labels;
pub mod runner;
pub mod scheduler;
pub mod sync;
pub mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SyncConfig;
use crate::sync::{PassReport, Reconciler};

/// Start the daemon: optional startup pass, then the cron-driven loop until Ctrl-C.
pub async fn serve(config: SyncConfig) -> Result<()> {
    // 1. Validate before anything is scheduled
    config.validate().context("invalid configuration")?;
    let schedule = config.schedule()?;

    // 2. Build the engine
    let reconciler = Arc::new(Reconciler::from_config(&config)?);

    // 3. Run the scheduler until interrupted
    tokio::select! {
        _ = scheduler::run_scheduler_loop(reconciler, schedule, config.schedule.run_on_start) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
        }
    }

    Ok(())
}

/// Run exactly one sync pass and return its report.
pub async fn sync_once(config: &SyncConfig) -> Result<PassReport> {
    config.validate().context("invalid configuration")?;
    let reconciler = Reconciler::from_config(config)?;
    Ok(reconciler.synchronize().await)
}
