//! LeetCode profile via the public GraphQL endpoint.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{COOKIE, HeaderValue, REFERER},
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use crate::{
    config::LeetCodeSettings,
    domain::{
        entities::{Achievements, ContestStats, PlatformProfile, ProblemsSolved, ProfileDetails},
        types::Platform,
    },
};

use super::{PlatformScraper, ScrapeError, endpoint, ensure_success};

const PROFILE_QUERY: &str = r#"
query userProfile($username: String!) {
  matchedUser(username: $username) {
    username
    profile { ranking countryName company school }
    submitStatsGlobal { acSubmissionNum { difficulty count } }
    badges { displayName }
    userCalendar { streak totalActiveDays }
  }
  userContestRanking(username: $username) {
    attendedContestsCount
    rating
    globalRanking
    topPercentage
    badge { name }
  }
  userContestRankingHistory(username: $username) {
    attended
    rating
    ranking
  }
}
"#;

pub struct LeetCodeScraper {
    client: Client,
    base_url: Url,
    session: Option<String>,
    csrf_token: Option<String>,
}

impl LeetCodeScraper {
    pub fn new(client: Client, settings: &LeetCodeSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            session: settings.session.clone(),
            csrf_token: settings.csrf_token.clone(),
        }
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        let mut parts = Vec::new();
        if let Some(session) = &self.session {
            parts.push(format!("LEETCODE_SESSION={session}"));
        }
        if let Some(csrf) = &self.csrf_token {
            parts.push(format!("csrftoken={csrf}"));
        }
        if parts.is_empty() {
            return None;
        }
        HeaderValue::from_str(&parts.join("; ")).ok()
    }
}

#[async_trait]
impl PlatformScraper for LeetCodeScraper {
    fn platform(&self) -> Platform {
        Platform::LeetCode
    }

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError> {
        let url = endpoint(&self.base_url, "graphql")?;
        let referer = endpoint(&self.base_url, &format!("u/{handle}/"))?;

        let mut request = self
            .client
            .post(url)
            .header(REFERER, referer.as_str())
            .json(&json!({
                "operationName": "userProfile",
                "query": PROFILE_QUERY,
                "variables": { "username": handle },
            }));
        if let Some(cookie) = self.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(csrf) = &self.csrf_token {
            request = request.header("x-csrftoken", csrf.as_str());
        }

        let response = ensure_success(Platform::LeetCode, handle, request.send().await?)?;
        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|err| ScrapeError::parse(Platform::LeetCode, err.to_string()))?;

        debug!(
            target = "codefolio::scrape::leetcode",
            handle,
            "received graphql response"
        );
        normalize(handle, body, OffsetDateTime::now_utc())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ProfileData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileData {
    matched_user: Option<MatchedUser>,
    user_contest_ranking: Option<ContestRanking>,
    #[serde(default)]
    user_contest_ranking_history: Option<Vec<ContestHistoryEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    username: String,
    profile: Option<UserProfile>,
    submit_stats_global: Option<SubmitStats>,
    #[serde(default)]
    badges: Vec<Badge>,
    user_calendar: Option<UserCalendar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    ranking: Option<u64>,
    country_name: Option<String>,
    company: Option<String>,
    school: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    #[serde(default)]
    ac_submission_num: Vec<DifficultyCount>,
}

#[derive(Debug, Deserialize)]
struct DifficultyCount {
    difficulty: String,
    count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Badge {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCalendar {
    streak: Option<u32>,
    total_active_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContestRanking {
    attended_contests_count: Option<u32>,
    rating: Option<f64>,
    global_ranking: Option<u64>,
    top_percentage: Option<f64>,
    badge: Option<ContestBadge>,
}

#[derive(Debug, Deserialize)]
struct ContestBadge {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContestHistoryEntry {
    attended: bool,
    rating: Option<f64>,
    ranking: Option<u64>,
}

fn normalize(
    handle: &str,
    body: GraphQlResponse,
    fetched_at: OffsetDateTime,
) -> Result<PlatformProfile, ScrapeError> {
    if let Some(data) = body.data.as_ref()
        && data.matched_user.is_none()
    {
        return Err(ScrapeError::not_found(Platform::LeetCode, handle));
    }

    if !body.errors.is_empty() {
        let message = body
            .errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        if message.to_ascii_lowercase().contains("does not exist") {
            return Err(ScrapeError::not_found(Platform::LeetCode, handle));
        }
        return Err(ScrapeError::upstream(Platform::LeetCode, message));
    }

    let data = body
        .data
        .ok_or_else(|| ScrapeError::parse(Platform::LeetCode, "response carried no data"))?;
    let user = data
        .matched_user
        .ok_or_else(|| ScrapeError::not_found(Platform::LeetCode, handle))?;

    let mut solved = ProblemsSolved::default();
    for entry in user
        .submit_stats_global
        .map(|stats| stats.ac_submission_num)
        .unwrap_or_default()
    {
        match entry.difficulty.as_str() {
            "All" => solved.total = entry.count,
            "Easy" => solved.easy = entry.count,
            "Medium" => solved.medium = entry.count,
            "Hard" => solved.hard = entry.count,
            _ => {}
        }
    }

    let ranking = data.user_contest_ranking;
    let history = data.user_contest_ranking_history.unwrap_or_default();
    let attended: Vec<&ContestHistoryEntry> = history.iter().filter(|h| h.attended).collect();

    let rating = ranking
        .as_ref()
        .and_then(|r| r.rating)
        .map(|rating| rating.round() as i64);
    let highest_rating = attended
        .iter()
        .filter_map(|h| h.rating)
        .fold(None, |best: Option<f64>, rating| {
            Some(best.map_or(rating, |b| b.max(rating)))
        })
        .map(|rating| rating.round() as i64)
        .or(rating);
    let best_rank = attended
        .iter()
        .filter_map(|h| h.ranking)
        .filter(|rank| *rank > 0)
        .min();

    let user_profile = user.profile;
    let organization = user_profile
        .as_ref()
        .and_then(|p| p.company.clone().or_else(|| p.school.clone()))
        .filter(|value| !value.trim().is_empty());

    let profile = ProfileDetails {
        rating,
        max_rating: highest_rating,
        rank: ranking
            .as_ref()
            .and_then(|r| r.badge.as_ref())
            .map(|b| b.name.clone()),
        max_rank: None,
        country: user_profile
            .as_ref()
            .and_then(|p| p.country_name.clone())
            .filter(|value| !value.trim().is_empty()),
        organization,
        ranking: user_profile.as_ref().and_then(|p| p.ranking),
    };

    let contests = ContestStats {
        attended: ranking
            .as_ref()
            .and_then(|r| r.attended_contests_count)
            .unwrap_or(attended.len() as u32),
        rating,
        highest_rating,
        best_rank: best_rank.or_else(|| ranking.as_ref().and_then(|r| r.global_ranking)),
        top_percentage: ranking.as_ref().and_then(|r| r.top_percentage),
    };

    let calendar = user.user_calendar;
    let achievements = Achievements {
        stars: None,
        badges: user
            .badges
            .into_iter()
            .filter_map(|badge| badge.display_name)
            .collect(),
        streak: calendar.as_ref().and_then(|c| c.streak),
        longest_streak: None,
        coding_score: None,
    };

    Ok(PlatformProfile {
        handle: user.username,
        profile,
        problems_solved: solved.with_total_fallback(),
        contests,
        achievements,
        last_updated: fetched_at,
    })
}
