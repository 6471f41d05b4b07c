use std::{process, sync::Arc, time::Duration};

use codefolio::{
    application::{
        error::AppError,
        jobs::spawn_refresh_monitor,
        profiles::ProfileFormatter,
        refresh::{RefreshCoordinator, RefreshError, RefreshTrigger, scrape_once},
        scrape::ScrapeService,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        shutdown::{Shutdown, ShutdownReason},
        store::ProfileStore,
        telemetry,
    },
};
use tokio::{signal, task::JoinHandle, time::sleep};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        Some(config::Command::Scrape(args)) => run_scrape(settings, args).await,
        _ => run_serve(settings).await,
    }
}

fn open_store(settings: &config::Settings) -> Result<ProfileStore, AppError> {
    ProfileStore::new(settings.storage.data_dir.clone())
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let shutdown = Shutdown::new();
    telemetry::route_panics_to(shutdown.clone());

    let store = open_store(&settings)?;
    let scrapes = ScrapeService::from_settings(&settings, store.clone())?;
    let formatter = ProfileFormatter::new(store, |platform| {
        scrapes
            .handle_for(platform)
            .unwrap_or_default()
            .to_string()
    });

    let scheduler = &settings.scheduler;
    let coordinator = Arc::new(
        RefreshCoordinator::new(scrapes)
            .with_schedule(scheduler.cron.clone(), scheduler.schedule.clone()),
    );

    let monitor = spawn_refresh_monitor(
        coordinator.clone(),
        scheduler.schedule.clone(),
        shutdown.clone(),
    );
    info!(cron = %scheduler.cron, "refresh schedule registered");

    let startup = scheduler
        .run_on_startup
        .then(|| spawn_startup_refresh(coordinator.clone(), scheduler.startup_delay));

    let state = HttpState::new(formatter, coordinator);
    let router = http::build_router(state, &settings.server.allowed_origins);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    spawn_signal_listener(shutdown.clone());
    spawn_force_exit(shutdown.clone(), settings.server.graceful_shutdown);

    let drain = shutdown.clone();
    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            drain.requested().await;
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    monitor.abort();
    if let Some(startup) = startup {
        startup.abort();
    }
    info!("server stopped");
    served?;

    match shutdown.reason() {
        Some(reason) if reason.is_fatal() => Err(AppError::unexpected(format!(
            "server shut down after {reason}"
        ))),
        _ => Ok(()),
    }
}

fn spawn_startup_refresh(coordinator: Arc<RefreshCoordinator>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        match coordinator.run_now(RefreshTrigger::Startup).await {
            Ok(report) => info!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "startup refresh completed"
            ),
            Err(RefreshError::AlreadyRunning) => {
                info!("startup refresh skipped, a cycle is already running")
            }
        }
    })
}

fn spawn_signal_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.request(ShutdownReason::Signal);
    });
}

/// Once shutdown is requested for any reason, force exit if the drain overruns `grace`.
fn spawn_force_exit(shutdown: Shutdown, grace: Duration) {
    tokio::spawn(async move {
        let reason = shutdown.requested().await;
        info!(
            reason = %reason,
            grace_seconds = grace.as_secs(),
            "draining connections"
        );

        sleep(grace).await;
        error!(
            grace_seconds = grace.as_secs(),
            "graceful shutdown timed out, forcing exit"
        );
        process::exit(1);
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}

async fn run_scrape(settings: config::Settings, args: config::ScrapeArgs) -> Result<(), AppError> {
    let store = open_store(&settings)?;
    let scrapes = ScrapeService::from_settings(&settings, store)?;

    let report = scrape_once(&scrapes, &args.platforms).await?;
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "scrape finished"
    );
    Ok(())
}
