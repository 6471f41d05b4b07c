use std::{
    panic,
    sync::{Once, OnceLock},
};

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::{
    error::InfraError,
    shutdown::{Shutdown, ShutdownReason},
};

static METRIC_DESCRIPTIONS: Once = Once::new();
static PANIC_HOOK: Once = Once::new();
static PANIC_SHUTDOWN: OnceLock<Shutdown> = OnceLock::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })?;

    install_panic_hook();
    Ok(())
}

/// Make any later panic also request a graceful shutdown.
///
/// Returns `false` if panics were already routed to another handle.
pub fn route_panics_to(shutdown: Shutdown) -> bool {
    install_panic_hook();
    PANIC_SHUTDOWN.set(shutdown).is_ok()
}

/// Route panics through tracing before the default hook prints them.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_default();
            error!(
                target = "codefolio::panic",
                location = %location,
                panic = %info,
                "task panicked"
            );
            default_hook(info);
            if let Some(shutdown) = PANIC_SHUTDOWN.get() {
                shutdown.request(ShutdownReason::Panic);
            }
        }));
    });
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "codefolio_scrape_success_total",
            Unit::Count,
            "Total number of platform scrapes persisted to the cache."
        );
        describe_counter!(
            "codefolio_scrape_failure_total",
            Unit::Count,
            "Total number of platform scrapes that failed or were rejected."
        );
        describe_histogram!(
            "codefolio_scrape_ms",
            Unit::Milliseconds,
            "Platform scrape latency in milliseconds."
        );
        describe_counter!(
            "codefolio_refresh_runs_total",
            Unit::Count,
            "Total number of refresh cycles started."
        );
    });
}
