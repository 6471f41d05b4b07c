//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use apalis_cron::Schedule;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ScrapeArgs, ServeArgs, ServeOverrides, StorageOverride};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "codefolio";
const ENV_PREFIX: &str = "CODEFOLIO";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_REFRESH_CRON: &str = "0 0 */6 * * *";
const DEFAULT_STARTUP_DELAY_SECS: u64 = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CODEFORCES_RETRY_AFTER_MS: u64 = 2_000;

const DEFAULT_LEETCODE_HANDLE: &str = "codefolio";
const DEFAULT_CODEFORCES_HANDLE: &str = "codefolio";
const DEFAULT_CODECHEF_HANDLE: &str = "codefolio";
const DEFAULT_GFG_HANDLE: &str = "codefolio";

const DEFAULT_LEETCODE_BASE_URL: &str = "https://leetcode.com";
const DEFAULT_CODEFORCES_BASE_URL: &str = "https://codeforces.com";
const DEFAULT_CODECHEF_BASE_URL: &str = "https://www.codechef.com";
const DEFAULT_GFG_BASE_URL: &str = "https://www.geeksforgeeks.org";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub scheduler: SchedulerSettings,
    pub http: HttpClientSettings,
    pub platforms: PlatformSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    /// Empty means any origin is allowed.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cron: String,
    pub schedule: Schedule,
    pub run_on_startup: bool,
    pub startup_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    pub timeout: NonZeroU64,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub leetcode: LeetCodeSettings,
    pub codeforces: CodeforcesSettings,
    pub codechef: ScrapedSiteSettings,
    pub gfg: ScrapedSiteSettings,
}

#[derive(Debug, Clone)]
pub struct LeetCodeSettings {
    pub handle: String,
    pub base_url: Url,
    pub session: Option<String>,
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CodeforcesSettings {
    pub handle: String,
    pub base_url: Url,
    pub credentials: Option<CodeforcesCredentials>,
    pub retry_after: Duration,
}

#[derive(Debug, Clone)]
pub struct CodeforcesCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Settings for platforms read by scraping their public HTML profile page.
#[derive(Debug, Clone)]
pub struct ScrapedSiteSettings {
    pub handle: String,
    pub base_url: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("failed to read command-line arguments: {0}")]
    Cli(#[from] clap::Error),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Scrape(args)) => raw.apply_storage_override(&args.storage),
        None => raw.apply_serve_overrides(&ServeArgs::from_env()?.overrides),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let mut args = CliArgs::parse();
    if args.command.is_none() {
        args.command = Some(Command::Serve(Box::new(ServeArgs::from_env()?)));
    }
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    scheduler: RawSchedulerSettings,
    http: RawHttpSettings,
    platforms: RawPlatformSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(origins) = overrides.allowed_origins.as_ref() {
            self.server.allowed_origins = Some(origins.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(cron) = overrides.scheduler_cron.as_ref() {
            self.scheduler.cron = Some(cron.clone());
        }
        if let Some(enabled) = overrides.scheduler_run_on_startup {
            self.scheduler.run_on_startup = Some(enabled);
        }
        if let Some(delay) = overrides.scheduler_startup_delay_seconds {
            self.scheduler.startup_delay_seconds = Some(delay);
        }

        self.apply_storage_override(&overrides.storage);
    }

    fn apply_storage_override(&mut self, overrides: &StorageOverride) {
        if let Some(dir) = overrides.data_dir.as_ref() {
            self.storage.data_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            scheduler,
            http,
            platforms,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            scheduler: build_scheduler_settings(scheduler)?,
            http: build_http_settings(http)?,
            platforms: build_platform_settings(platforms)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let allowed_origins = server
        .allowed_origins
        .unwrap_or_default()
        .into_iter()
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            Url::parse(&origin)
                .map(|_| origin.clone())
                .map_err(|err| {
                    LoadError::invalid(
                        "server.allowed_origins",
                        format!("invalid origin `{origin}`: {err}"),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        allowed_origins,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let data_dir = storage
        .data_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    if data_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.data_dir",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings { data_dir })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let cron = scheduler
        .cron
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_REFRESH_CRON.to_string());
    let schedule = Schedule::from_str(&cron).map_err(|err| {
        LoadError::invalid("scheduler.cron", format!("invalid cron `{cron}`: {err}"))
    })?;

    let startup_delay = Duration::from_secs(
        scheduler
            .startup_delay_seconds
            .unwrap_or(DEFAULT_STARTUP_DELAY_SECS),
    );

    Ok(SchedulerSettings {
        cron,
        schedule,
        run_on_startup: scheduler.run_on_startup.unwrap_or(true),
        startup_delay,
    })
}

fn build_http_settings(http: RawHttpSettings) -> Result<HttpClientSettings, LoadError> {
    let timeout_secs = http.timeout_seconds.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    let timeout = NonZeroU64::new(timeout_secs)
        .ok_or_else(|| LoadError::invalid("http.timeout_seconds", "must be greater than zero"))?;

    let user_agent = http
        .user_agent
        .and_then(non_blank)
        .unwrap_or_else(|| concat!("codefolio/", env!("CARGO_PKG_VERSION")).to_string());

    Ok(HttpClientSettings {
        timeout,
        user_agent,
    })
}

fn build_platform_settings(platforms: RawPlatformSettings) -> Result<PlatformSettings, LoadError> {
    let RawPlatformSettings {
        leetcode,
        codeforces,
        codechef,
        gfg,
    } = platforms;

    let leetcode = LeetCodeSettings {
        handle: resolve_handle(
            leetcode.handle,
            DEFAULT_LEETCODE_HANDLE,
            "platforms.leetcode.handle",
        )?,
        base_url: resolve_base_url(
            leetcode.base_url,
            DEFAULT_LEETCODE_BASE_URL,
            "platforms.leetcode.base_url",
        )?,
        session: leetcode.session.and_then(non_blank),
        csrf_token: leetcode.csrf_token.and_then(non_blank),
    };

    let credentials = match (
        codeforces.api_key.and_then(non_blank),
        codeforces.api_secret.and_then(non_blank),
    ) {
        (Some(api_key), Some(api_secret)) => Some(CodeforcesCredentials {
            api_key,
            api_secret,
        }),
        (None, None) => None,
        _ => {
            return Err(LoadError::invalid(
                "platforms.codeforces.api_key",
                "api_key and api_secret must be configured together",
            ));
        }
    };

    let codeforces = CodeforcesSettings {
        handle: resolve_handle(
            codeforces.handle,
            DEFAULT_CODEFORCES_HANDLE,
            "platforms.codeforces.handle",
        )?,
        base_url: resolve_base_url(
            codeforces.base_url,
            DEFAULT_CODEFORCES_BASE_URL,
            "platforms.codeforces.base_url",
        )?,
        credentials,
        retry_after: Duration::from_millis(
            codeforces
                .retry_after_ms
                .unwrap_or(DEFAULT_CODEFORCES_RETRY_AFTER_MS),
        ),
    };

    let codechef = ScrapedSiteSettings {
        handle: resolve_handle(
            codechef.handle,
            DEFAULT_CODECHEF_HANDLE,
            "platforms.codechef.handle",
        )?,
        base_url: resolve_base_url(
            codechef.base_url,
            DEFAULT_CODECHEF_BASE_URL,
            "platforms.codechef.base_url",
        )?,
    };

    let gfg = ScrapedSiteSettings {
        handle: resolve_handle(gfg.handle, DEFAULT_GFG_HANDLE, "platforms.gfg.handle")?,
        base_url: resolve_base_url(
            gfg.base_url,
            DEFAULT_GFG_BASE_URL,
            "platforms.gfg.base_url",
        )?,
    };

    Ok(PlatformSettings {
        leetcode,
        codeforces,
        codechef,
        gfg,
    })
}

fn resolve_handle(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        Some(handle) => non_blank(handle)
            .ok_or_else(|| LoadError::invalid(key, "handle must not be empty")),
        None => Ok(default.to_string()),
    }
}

fn resolve_base_url(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<Url, LoadError> {
    let raw = value.and_then(non_blank).unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw)
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{raw}`: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(key, format!("`{raw}` cannot be a base url")));
    }
    Ok(url)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    cron: Option<String>,
    run_on_startup: Option<bool>,
    startup_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHttpSettings {
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPlatformSettings {
    leetcode: RawLeetCodeSettings,
    codeforces: RawCodeforcesSettings,
    codechef: RawScrapedSiteSettings,
    gfg: RawScrapedSiteSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLeetCodeSettings {
    handle: Option<String>,
    base_url: Option<String>,
    session: Option<String>,
    csrf_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCodeforcesSettings {
    handle: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScrapedSiteSettings {
    handle: Option<String>,
    base_url: Option<String>,
}

#[cfg(test)]
mod tests;
