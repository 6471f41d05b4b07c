//! Cron job that refreshes every platform snapshot.

use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use tracing::{error, info};

use crate::{
    application::refresh::{RefreshCoordinator, RefreshError, RefreshTrigger},
    infra::shutdown::{Shutdown, supervise},
};

/// Marker struct for the cron-triggered refresh.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct RefreshProfilesJob;

impl From<chrono::DateTime<chrono::Utc>> for RefreshProfilesJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct RefreshJobContext {
    pub coordinator: Arc<RefreshCoordinator>,
}

/// Run one refresh cycle. A tick that lands on a running cycle is skipped.
pub async fn process_refresh_profiles_job(
    _job: RefreshProfilesJob,
    ctx: Data<RefreshJobContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.coordinator.run_now(RefreshTrigger::Schedule).await {
        Ok(report) => {
            info!(
                target = "codefolio::jobs::refresh",
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "scheduled refresh completed"
            );
        }
        Err(RefreshError::AlreadyRunning) => {
            info!(
                target = "codefolio::jobs::refresh",
                "previous refresh still running, skipping tick"
            );
        }
    }
    Ok(())
}

/// Register the cron worker with an apalis monitor and run it in the background.
///
/// The monitor should outlive the server; if it stops, `shutdown` is requested.
pub fn spawn_refresh_monitor(
    coordinator: Arc<RefreshCoordinator>,
    schedule: Schedule,
    shutdown: Shutdown,
) -> tokio::task::JoinHandle<()> {
    let worker = WorkerBuilder::new("refresh-profiles-worker")
        .data(RefreshJobContext { coordinator })
        .backend(CronStream::new(schedule))
        .build_fn(process_refresh_profiles_job);

    let monitor = Monitor::new().register(worker);

    supervise("job monitor", shutdown, async move {
        if let Err(err) = monitor.run().await {
            error!(
                target = "codefolio::jobs::refresh",
                error = %err,
                "job monitor failed"
            );
        }
    })
}
