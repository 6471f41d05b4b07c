//! CodeChef profile scraped from the public user page.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use crate::{
    config::ScrapedSiteSettings,
    domain::{entities::PlatformProfile, types::Platform},
};

use super::{
    PlatformScraper, ScrapeError, endpoint, ensure_success,
    html::{
        capture_number, clamp_u32, document_text, element_text, first_number, select_text, selector,
    },
};

static RATING_HEADER: Lazy<Selector> = Lazy::new(|| selector(".rating-header"));
static RATING_NUMBER: Lazy<Selector> = Lazy::new(|| selector(".rating-number"));
static RATING_STARS: Lazy<Selector> = Lazy::new(|| selector(".rating-star span"));
static HIGHEST_RATING: Lazy<Selector> = Lazy::new(|| selector(".rating-header small"));
static RANKS: Lazy<Selector> = Lazy::new(|| selector(".rating-ranks li"));
static RANK_VALUE: Lazy<Selector> = Lazy::new(|| selector("strong"));
static USER_DETAILS: Lazy<Selector> = Lazy::new(|| selector(".user-details"));
static USER_DETAIL_ITEMS: Lazy<Selector> = Lazy::new(|| selector(".user-details li"));
static COUNTRY: Lazy<Selector> = Lazy::new(|| selector(".user-country-name"));
static BADGES: Lazy<Selector> = Lazy::new(|| selector(".badge__title"));

static TOTAL_SOLVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Total Problems Solved:?\s*([\d,]+)").expect("total solved pattern")
});
static CONTESTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)No\.? of Contests Participated:?\s*([\d,]+)").expect("contests pattern")
});
static HIGHEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Highest Rating\s*([\d,]+)").expect("highest rating pattern"));

pub struct CodeChefScraper {
    client: Client,
    base_url: Url,
}

impl CodeChefScraper {
    pub fn new(client: Client, settings: &ScrapedSiteSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
        }
    }
}

#[async_trait]
impl PlatformScraper for CodeChefScraper {
    fn platform(&self) -> Platform {
        Platform::CodeChef
    }

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError> {
        let url = endpoint(&self.base_url, &format!("users/{handle}"))?;
        let response = ensure_success(
            Platform::CodeChef,
            handle,
            self.client.get(url).send().await?,
        )?;
        let body = response.text().await?;
        debug!(
            target = "codefolio::scrape::codechef",
            handle,
            bytes = body.len(),
            "fetched profile page"
        );
        parse_profile(handle, &body, OffsetDateTime::now_utc())
    }
}

fn parse_profile(
    handle: &str,
    body: &str,
    fetched_at: OffsetDateTime,
) -> Result<PlatformProfile, ScrapeError> {
    let document = Html::parse_document(body);
    let has_header = document.select(&RATING_HEADER).next().is_some();
    let has_details = document.select(&USER_DETAILS).next().is_some();
    if !has_header && !has_details {
        return Err(ScrapeError::not_found(Platform::CodeChef, handle));
    }

    let text = document_text(&document);
    let mut profile = PlatformProfile::seed_for(Platform::CodeChef, handle);
    profile.last_updated = fetched_at;

    let rating = select_text(&document, &RATING_NUMBER)
        .and_then(|raw| first_number(&raw))
        .map(|value| value as i64);
    let highest = select_text(&document, &HIGHEST_RATING)
        .and_then(|raw| first_number(&raw))
        .or_else(|| capture_number(&HIGHEST, &text))
        .map(|value| value as i64);

    let stars = document.select(&RATING_STARS).count();
    let stars = (stars > 0).then(|| u8::try_from(stars).unwrap_or(u8::MAX));

    let mut global_rank = None;
    let mut country_rank = None;
    for item in document.select(&RANKS) {
        let label = element_text(item).to_ascii_lowercase();
        let value = item
            .select(&RANK_VALUE)
            .next()
            .map(element_text)
            .and_then(|raw| first_number(&raw));
        if label.contains("global") {
            global_rank = value;
        } else if label.contains("country") {
            country_rank = value;
        }
    }

    let institution = document.select(&USER_DETAIL_ITEMS).find_map(|item| {
        let line = element_text(item);
        line.strip_prefix("Institution:")
            .map(|rest| rest.trim().to_string())
            .filter(|rest| !rest.is_empty())
    });

    profile.profile.rating = rating;
    profile.profile.max_rating = highest;
    profile.profile.rank = stars.map(|count| format!("{count}★"));
    profile.profile.country = select_text(&document, &COUNTRY);
    profile.profile.organization = institution;
    profile.profile.ranking = global_rank;

    if let Some(total) = capture_number(&TOTAL_SOLVED, &text) {
        profile.problems_solved.total = clamp_u32(total);
    }

    profile.contests.attended = capture_number(&CONTESTS, &text)
        .map(clamp_u32)
        .unwrap_or_default();
    profile.contests.rating = rating;
    profile.contests.highest_rating = highest;
    profile.contests.best_rank = global_rank.or(country_rank);

    profile.achievements.stars = stars;
    profile.achievements.badges = document
        .select(&BADGES)
        .map(element_text)
        .filter(|title| !title.is_empty())
        .collect();

    Ok(profile)
}
