use std::path::PathBuf;

use clap::{Args, FromArgMatches, Parser, Subcommand, builder::BoolishValueParser};

use crate::domain::types::Platform;

/// Command-line arguments for the codefolio binary.
#[derive(Debug, Parser)]
#[command(
    name = "codefolio",
    version,
    about = "Coding-platform profile cache and API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CODEFOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the profile API and run the refresh schedule.
    Serve(Box<ServeArgs>),
    /// Refresh cached profiles once and exit.
    Scrape(ScrapeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

impl ServeArgs {
    /// Serve arguments for a bare invocation. Flags backed by environment variables
    /// (`PORT`, `ALLOWED_ORIGINS`) are still read.
    pub fn from_env() -> Result<Self, clap::Error> {
        let command = Self::augment_args(clap::Command::new("serve"));
        let matches = command.try_get_matches_from(["serve"])?;
        Self::from_arg_matches(&matches)
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverride {
    /// Override the directory holding cached profile snapshots.
    #[arg(long = "data-dir", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub storage: StorageOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", env = "PORT", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Comma-separated list of origins allowed by CORS.
    #[arg(
        long = "allowed-origins",
        env = "ALLOWED_ORIGINS",
        value_name = "ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Option<Vec<String>>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the refresh cron expression (six fields, seconds first).
    #[arg(long = "scheduler-cron", value_name = "EXPR")]
    pub scheduler_cron: Option<String>,

    /// Toggle the refresh that runs shortly after startup.
    #[arg(
        long = "scheduler-run-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub scheduler_run_on_startup: Option<bool>,

    /// Override the delay before the startup refresh.
    #[arg(long = "scheduler-startup-delay-seconds", value_name = "SECONDS")]
    pub scheduler_startup_delay_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ScrapeArgs {
    #[command(flatten)]
    pub storage: StorageOverride,

    /// Platform to refresh; repeat to select several. Defaults to all of them.
    #[arg(long = "platform", value_name = "PLATFORM", value_parser = parse_platform)]
    pub platforms: Vec<Platform>,
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse().map_err(|err| format!("{err}"))
}
