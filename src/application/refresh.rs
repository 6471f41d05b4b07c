//! Refresh cycles: scrape every platform concurrently, one cycle at a time.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use apalis_cron::Schedule;
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    application::{error::AppError, scrape::ScrapeService},
    domain::types::{Platform, RefreshOutcome},
};

const METRIC_REFRESH_RUNS: &str = "codefolio_refresh_runs_total";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("a refresh is already running")]
    AlreadyRunning,
}

/// What started a refresh cycle; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Schedule,
    Manual,
    Command,
}

impl RefreshTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshTrigger::Startup => "startup",
            RefreshTrigger::Schedule => "schedule",
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::Command => "command",
        }
    }
}

/// Per-platform results of one cycle, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub trigger: RefreshTrigger,
    pub succeeded: Vec<Platform>,
    pub failed: Vec<Platform>,
}

impl RefreshReport {
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// One cycle over `platforms` (all of them when empty) for the `scrape` command.
///
/// Fails when every selected platform failed.
pub async fn scrape_once(
    scrapes: &ScrapeService,
    platforms: &[Platform],
) -> Result<RefreshReport, AppError> {
    let coordinator = RefreshCoordinator::new(scrapes.restricted_to(platforms));
    let report = coordinator.run_now(RefreshTrigger::Command).await?;

    if report.all_failed() {
        let failed: Vec<&str> = report.failed.iter().map(|platform| platform.as_str()).collect();
        return Err(AppError::unexpected(format!(
            "every selected platform failed: {}",
            failed.join(", ")
        )));
    }
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRefreshStatus {
    pub outcome: RefreshOutcome,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

/// Snapshot served by the admin status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub is_running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_finished_at: Option<OffsetDateTime>,
    pub total_runs: u64,
    pub schedule: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_run_at: Option<OffsetDateTime>,
    pub platforms: BTreeMap<Platform, PlatformRefreshStatus>,
}

#[derive(Debug, Default)]
struct RefreshState {
    last_started_at: Option<OffsetDateTime>,
    last_finished_at: Option<OffsetDateTime>,
    total_runs: u64,
    platforms: BTreeMap<Platform, PlatformRefreshStatus>,
}

/// Clears the running flag when the cycle ends, including by panic.
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    scrapes: ScrapeService,
    running: Arc<AtomicBool>,
    state: Mutex<RefreshState>,
    schedule: Option<(String, Schedule)>,
}

impl RefreshCoordinator {
    pub fn new(scrapes: ScrapeService) -> Self {
        Self {
            scrapes,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(RefreshState::default()),
            schedule: None,
        }
    }

    /// Attach the cron schedule so status can report the next fire time.
    pub fn with_schedule(mut self, expression: impl Into<String>, schedule: Schedule) -> Self {
        self.schedule = Some((expression.into(), schedule));
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, trigger: RefreshTrigger) -> Result<RunGuard, RefreshError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RefreshError::AlreadyRunning);
        }

        let mut state = self.state();
        state.last_started_at = Some(OffsetDateTime::now_utc());
        state.total_runs += 1;
        drop(state);

        counter!(METRIC_REFRESH_RUNS, "trigger" => trigger.as_str()).increment(1);
        Ok(RunGuard {
            running: Arc::clone(&self.running),
        })
    }

    /// Run one cycle on the current task.
    pub async fn run_now(&self, trigger: RefreshTrigger) -> Result<RefreshReport, RefreshError> {
        let guard = self.begin(trigger)?;
        Ok(self.run_cycle(guard, trigger).await)
    }

    /// Claim the run slot now and run the cycle in the background.
    ///
    /// The claim is synchronous, so a concurrent caller is rejected before this returns.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        trigger: RefreshTrigger,
    ) -> Result<JoinHandle<RefreshReport>, RefreshError> {
        let guard = self.begin(trigger)?;
        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            coordinator.run_cycle(guard, trigger).await
        }))
    }

    async fn run_cycle(&self, guard: RunGuard, trigger: RefreshTrigger) -> RefreshReport {
        let started_at = Instant::now();
        let platforms = self.scrapes.platforms();
        info!(
            target = "codefolio::refresh",
            trigger = trigger.as_str(),
            platforms = platforms.len(),
            "refresh started"
        );

        let results = join_all(
            platforms
                .iter()
                .map(|platform| self.scrapes.refresh(*platform)),
        )
        .await;

        let finished_at = OffsetDateTime::now_utc();
        let mut report = RefreshReport {
            trigger,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        let mut state = self.state();
        for (platform, result) in platforms.into_iter().zip(results) {
            let (outcome, last_updated) = match result {
                Some(profile) => {
                    report.succeeded.push(platform);
                    (RefreshOutcome::Succeeded, Some(profile.last_updated))
                }
                None => {
                    report.failed.push(platform);
                    (RefreshOutcome::Failed, None)
                }
            };
            state.platforms.insert(
                platform,
                PlatformRefreshStatus {
                    outcome,
                    last_updated,
                    finished_at,
                },
            );
        }
        state.last_finished_at = Some(finished_at);
        drop(state);
        drop(guard);

        let failed = report
            .failed
            .iter()
            .map(|platform| platform.as_str())
            .collect::<Vec<_>>();
        if failed.is_empty() {
            info!(
                target = "codefolio::refresh",
                trigger = trigger.as_str(),
                succeeded = report.succeeded.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "refresh finished"
            );
        } else {
            warn!(
                target = "codefolio::refresh",
                trigger = trigger.as_str(),
                succeeded = report.succeeded.len(),
                failed = %failed.join(", "),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "refresh finished with failures"
            );
        }
        report
    }

    pub fn status(&self) -> RefreshStatus {
        let state = self.state();
        let (schedule, next_run_at) = match &self.schedule {
            Some((expression, schedule)) => (
                Some(expression.clone()),
                schedule
                    .upcoming(chrono::Utc)
                    .next()
                    .and_then(|next| OffsetDateTime::from_unix_timestamp(next.timestamp()).ok()),
            ),
            None => (None, None),
        };

        RefreshStatus {
            is_running: self.is_running(),
            last_started_at: state.last_started_at,
            last_finished_at: state.last_finished_at,
            total_runs: state.total_runs,
            schedule,
            next_run_at,
            platforms: state.platforms.clone(),
        }
    }
}
