//! GeeksForGeeks profile scraped from the public user page.
//!
//! The page layout changes often, so extraction runs three passes and keeps the
//! first value each pass finds: the embedded `__NEXT_DATA__` payload, score-card
//! class fragments, then regexes over the flattened page text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use crate::{
    config::ScrapedSiteSettings,
    domain::{entities::PlatformProfile, types::Platform},
};

use super::{
    PlatformScraper, ScrapeError, endpoint, ensure_success,
    html::{capture_number, clamp_u32, document_text, element_text, first_number, selector},
};

static NEXT_DATA: Lazy<Selector> = Lazy::new(|| selector("script#__NEXT_DATA__"));
static SCORE_CARDS: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="scoreCard_head_card"]"#));
static INSTITUTE: Lazy<Selector> =
    Lazy::new(|| selector(r#"[class*="educationDetails_head_left--text"]"#));

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern is valid")
}

static CODING_SCORE: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)Coding Score\s*:?\s*([\d,]+)"));
static PROBLEMS_SOLVED: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)Problems? Solved\s*:?\s*([\d,]+)"));
static INSTITUTE_RANK: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)Institute Rank\s*:?\s*([\d,]+)"));
static POTD_STREAK: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)POTD Streak\s*:?\s*([\d,]+)"));
static LONGEST_STREAK: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)Longest Streak\s*:?\s*([\d,]+)"));
static TIER_COUNT: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)\b(SCHOOL|BASIC|EASY|MEDIUM|HARD)\s*\(\s*(\d+)\s*\)"));

pub struct GfgScraper {
    client: Client,
    base_url: Url,
}

impl GfgScraper {
    pub fn new(client: Client, settings: &ScrapedSiteSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
        }
    }
}

#[async_trait]
impl PlatformScraper for GfgScraper {
    fn platform(&self) -> Platform {
        Platform::Gfg
    }

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError> {
        let url = endpoint(&self.base_url, &format!("user/{handle}/"))?;
        let response = ensure_success(Platform::Gfg, handle, self.client.get(url).send().await?)?;
        let body = response.text().await?;
        debug!(
            target = "codefolio::scrape::gfg",
            handle,
            bytes = body.len(),
            "fetched profile page"
        );
        parse_profile(handle, &body, OffsetDateTime::now_utc())
    }
}

/// Values recovered from the page; `None` means no pass found it.
#[derive(Debug, Default, PartialEq)]
struct Extracted {
    total: Option<u64>,
    coding_score: Option<u64>,
    institute_rank: Option<u64>,
    institute: Option<String>,
    school: Option<u64>,
    basic: Option<u64>,
    easy: Option<u64>,
    medium: Option<u64>,
    hard: Option<u64>,
    streak: Option<u64>,
    longest_streak: Option<u64>,
}

impl Extracted {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fill gaps from a lower-priority pass.
    fn or(self, other: Self) -> Self {
        Self {
            total: self.total.or(other.total),
            coding_score: self.coding_score.or(other.coding_score),
            institute_rank: self.institute_rank.or(other.institute_rank),
            institute: self.institute.or(other.institute),
            school: self.school.or(other.school),
            basic: self.basic.or(other.basic),
            easy: self.easy.or(other.easy),
            medium: self.medium.or(other.medium),
            hard: self.hard.or(other.hard),
            streak: self.streak.or(other.streak),
            longest_streak: self.longest_streak.or(other.longest_streak),
        }
    }

    fn set_tier(&mut self, tier: &str, count: u64) {
        let slot = match tier.to_ascii_lowercase().as_str() {
            "school" => &mut self.school,
            "basic" => &mut self.basic,
            "easy" => &mut self.easy,
            "medium" => &mut self.medium,
            "hard" => &mut self.hard,
            _ => return,
        };
        slot.get_or_insert(count);
    }
}

fn json_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => first_number(text),
        _ => None,
    }
}

fn from_next_data(document: &Html) -> Extracted {
    let Some(script) = document.select(&NEXT_DATA).next() else {
        return Extracted::default();
    };
    let raw: String = script.text().collect();
    let Ok(payload) = serde_json::from_str::<Value>(&raw) else {
        return Extracted::default();
    };

    let props = &payload["props"]["pageProps"];
    let info = &props["userInfo"];
    let mut extracted = Extracted {
        total: json_number(&info["total_problems_solved"]),
        coding_score: json_number(&info["score"]),
        institute_rank: json_number(&info["institute_rank"]),
        institute: info["institute_name"]
            .as_str()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        streak: json_number(&info["pod_solved_current_streak"]),
        longest_streak: json_number(&info["pod_solved_longest_streak"]),
        ..Extracted::default()
    };

    if let Some(tiers) = props["userSubmissionsInfo"].as_object() {
        for (tier, problems) in tiers {
            let count = problems.as_object().map_or(0, |map| map.len() as u64);
            extracted.set_tier(tier, count);
        }
    }
    extracted
}

fn from_labelled_text(text: &str) -> Extracted {
    let mut extracted = Extracted {
        total: capture_number(&PROBLEMS_SOLVED, text),
        coding_score: capture_number(&CODING_SCORE, text),
        institute_rank: capture_number(&INSTITUTE_RANK, text),
        streak: capture_number(&POTD_STREAK, text),
        longest_streak: capture_number(&LONGEST_STREAK, text),
        ..Extracted::default()
    };
    for caps in TIER_COUNT.captures_iter(text) {
        if let Ok(count) = caps[2].parse::<u64>() {
            extracted.set_tier(&caps[1], count);
        }
    }
    extracted
}

fn from_score_cards(document: &Html) -> Extracted {
    let cards = document
        .select(&SCORE_CARDS)
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    let mut extracted = from_labelled_text(&cards);
    extracted.institute = document
        .select(&INSTITUTE)
        .map(element_text)
        .find(|name| !name.is_empty());
    extracted
}

fn parse_profile(
    handle: &str,
    body: &str,
    fetched_at: OffsetDateTime,
) -> Result<PlatformProfile, ScrapeError> {
    let document = Html::parse_document(body);
    let extracted = from_next_data(&document)
        .or(from_score_cards(&document))
        .or(from_labelled_text(&document_text(&document)));

    if extracted.is_empty() {
        return Err(ScrapeError::parse(
            Platform::Gfg,
            "no profile statistics found on page",
        ));
    }

    let mut profile = PlatformProfile::seed_for(Platform::Gfg, handle);
    profile.last_updated = fetched_at;

    let solved = &mut profile.problems_solved;
    solved.school = Some(extracted.school.map_or(0, clamp_u32));
    solved.basic = Some(extracted.basic.map_or(0, clamp_u32));
    solved.easy = extracted.easy.map_or(0, clamp_u32);
    solved.medium = extracted.medium.map_or(0, clamp_u32);
    solved.hard = extracted.hard.map_or(0, clamp_u32);
    solved.total = extracted.total.map_or(0, clamp_u32);
    profile.problems_solved = profile.problems_solved.with_total_fallback();

    profile.profile.ranking = extracted.institute_rank;
    profile.profile.organization = extracted.institute;
    profile.achievements.coding_score = extracted.coding_score;
    profile.achievements.streak = extracted.streak.map(clamp_u32);
    profile.achievements.longest_streak = extracted.longest_streak.map(clamp_u32);

    Ok(profile)
}
