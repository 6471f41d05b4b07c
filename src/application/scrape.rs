//! Scrape-and-persist: runs a platform scraper and writes its snapshot.

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    application::scrapers::{
        CodeChefScraper, CodeforcesScraper, GfgScraper, LeetCodeScraper, PlatformScraper,
    },
    config::Settings,
    domain::{entities::PlatformProfile, types::Platform},
    infra::{client::build_client, error::InfraError, store::ProfileStore},
};

pub(crate) const METRIC_SCRAPE_SUCCESS: &str = "codefolio_scrape_success_total";
pub(crate) const METRIC_SCRAPE_FAILURE: &str = "codefolio_scrape_failure_total";
pub(crate) const METRIC_SCRAPE_MS: &str = "codefolio_scrape_ms";

#[derive(Clone)]
struct Registration {
    handle: String,
    scraper: Arc<dyn PlatformScraper>,
}

/// Owns the configured scrapers and the store they write to.
///
/// Every failure is absorbed here: callers get `None` and the cause is logged.
#[derive(Clone)]
pub struct ScrapeService {
    store: ProfileStore,
    registrations: Arc<BTreeMap<Platform, Registration>>,
}

impl ScrapeService {
    pub fn builder(store: ProfileStore) -> ScrapeServiceBuilder {
        ScrapeServiceBuilder {
            store,
            registrations: BTreeMap::new(),
        }
    }

    /// Wire the four real scrapers from deployment settings.
    pub fn from_settings(settings: &Settings, store: ProfileStore) -> Result<Self, InfraError> {
        let client = build_client(&settings.http)?;
        let platforms = &settings.platforms;

        Ok(Self::builder(store)
            .register(
                platforms.leetcode.handle.clone(),
                Arc::new(LeetCodeScraper::new(client.clone(), &platforms.leetcode)),
            )
            .register(
                platforms.codeforces.handle.clone(),
                Arc::new(CodeforcesScraper::new(client.clone(), &platforms.codeforces)),
            )
            .register(
                platforms.codechef.handle.clone(),
                Arc::new(CodeChefScraper::new(client.clone(), &platforms.codechef)),
            )
            .register(
                platforms.gfg.handle.clone(),
                Arc::new(GfgScraper::new(client, &platforms.gfg)),
            )
            .build())
    }

    /// The same service limited to `platforms`; an empty selection keeps every platform.
    pub fn restricted_to(&self, platforms: &[Platform]) -> Self {
        if platforms.is_empty() {
            return self.clone();
        }
        let registrations = self
            .registrations
            .iter()
            .filter(|(platform, _)| platforms.contains(platform))
            .map(|(platform, registration)| (*platform, registration.clone()))
            .collect();
        Self {
            store: self.store.clone(),
            registrations: Arc::new(registrations),
        }
    }

    /// Platforms with a registered scraper, in canonical order.
    pub fn platforms(&self) -> Vec<Platform> {
        self.registrations.keys().copied().collect()
    }

    pub fn handle_for(&self, platform: Platform) -> Option<&str> {
        self.registrations
            .get(&platform)
            .map(|registration| registration.handle.as_str())
    }

    /// Scrape the configured handle of `platform`.
    pub async fn refresh(&self, platform: Platform) -> Option<PlatformProfile> {
        let handle = self.handle_for(platform)?.to_string();
        self.scrape(platform, &handle).await
    }

    /// Fetch `handle` on `platform` and persist the snapshot.
    ///
    /// Only the configured handle is accepted. Any other handle, scraper error or
    /// write failure yields `None`.
    pub async fn scrape(&self, platform: Platform, handle: &str) -> Option<PlatformProfile> {
        let Some(registration) = self.registrations.get(&platform) else {
            warn!(
                target = "codefolio::scrape",
                platform = platform.as_str(),
                "no scraper registered for platform"
            );
            counter!(METRIC_SCRAPE_FAILURE, "platform" => platform.as_str()).increment(1);
            return None;
        };

        if handle != registration.handle {
            warn!(
                target = "codefolio::scrape",
                platform = platform.as_str(),
                handle,
                configured = %registration.handle,
                "refusing to scrape a handle other than the configured one"
            );
            counter!(METRIC_SCRAPE_FAILURE, "platform" => platform.as_str()).increment(1);
            return None;
        }

        let started_at = Instant::now();
        let result = registration.scraper.fetch(handle).await;
        histogram!(METRIC_SCRAPE_MS, "platform" => platform.as_str())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        let mut profile = match result {
            Ok(profile) => profile,
            Err(err) => {
                warn!(
                    target = "codefolio::scrape",
                    platform = platform.as_str(),
                    handle,
                    error = %err,
                    "scrape failed"
                );
                counter!(METRIC_SCRAPE_FAILURE, "platform" => platform.as_str()).increment(1);
                return None;
            }
        };

        let previous = self.store.last_updated(platform).await;
        profile.last_updated = next_timestamp(OffsetDateTime::now_utc(), previous);

        match self.store.write(platform, &profile).await {
            Ok(path) => {
                info!(
                    target = "codefolio::scrape",
                    platform = platform.as_str(),
                    handle,
                    path = %path.display(),
                    solved = profile.problems_solved.total,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "snapshot written"
                );
                counter!(METRIC_SCRAPE_SUCCESS, "platform" => platform.as_str()).increment(1);
                Some(profile)
            }
            Err(err) => {
                error!(
                    target = "codefolio::scrape",
                    platform = platform.as_str(),
                    error = %err,
                    "failed to write snapshot"
                );
                counter!(METRIC_SCRAPE_FAILURE, "platform" => platform.as_str()).increment(1);
                None
            }
        }
    }
}

/// `now`, or one millisecond past `previous` when the clock has not moved beyond it.
pub(crate) fn next_timestamp(
    now: OffsetDateTime,
    previous: Option<OffsetDateTime>,
) -> OffsetDateTime {
    match previous {
        Some(previous) if now <= previous => previous + Duration::milliseconds(1),
        _ => now,
    }
}

pub struct ScrapeServiceBuilder {
    store: ProfileStore,
    registrations: BTreeMap<Platform, Registration>,
}

impl ScrapeServiceBuilder {
    /// Register `scraper` for its platform, replacing any earlier registration.
    pub fn register(mut self, handle: impl Into<String>, scraper: Arc<dyn PlatformScraper>) -> Self {
        self.registrations.insert(
            scraper.platform(),
            Registration {
                handle: handle.into(),
                scraper,
            },
        );
        self
    }

    pub fn build(self) -> ScrapeService {
        ScrapeService {
            store: self.store,
            registrations: Arc::new(self.registrations),
        }
    }
}
