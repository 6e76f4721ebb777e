//! Fires sync passes on a cron cadence.

pub mod cron;

pub use self::cron::SyncSchedule;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::sync::Reconciler;

/// Main scheduler loop. Runs until the schedule has no future fire times.
///
/// Each pass is spawned so the loop keeps its cadence; a tick that lands
/// while the previous pass is still running is dropped by the engine.
pub async fn run_scheduler_loop(reconciler: Arc<Reconciler>, schedule: SyncSchedule, run_on_start: bool) {
    run_with_clock(reconciler, schedule, run_on_start, Utc::now).await
}

async fn run_with_clock<C>(
    reconciler: Arc<Reconciler>,
    schedule: SyncSchedule,
    run_on_start: bool,
    clock: C,
) where
    C: Fn() -> DateTime<Utc>,
{
    info!(cron = %schedule.expression(), %run_on_start, "Scheduler started");

    if run_on_start {
        spawn_pass(&reconciler);
    }

    loop {
        let now = clock();
        let Some(next) = schedule.next_after(&now) else {
            warn!(cron = %schedule.expression(), "Schedule has no upcoming fire times, stopping");
            return;
        };

        let wait = (next.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        info!(next = %next.to_rfc3339(), "Next sync scheduled");
        tokio::time::sleep(wait).await;

        spawn_pass(&reconciler);
    }
}

fn spawn_pass(reconciler: &Arc<Reconciler>) {
    let reconciler = Arc::clone(reconciler);
    tokio::spawn(async move {
        reconciler.synchronize().await;
    });
}
