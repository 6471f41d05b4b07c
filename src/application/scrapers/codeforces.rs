//! Codeforces profile via the official REST API.
//!
//! Three calls make up a profile: `user.info` for identity and rating,
//! `user.rating` for contest history and `user.status` for solved problems.
//! When credentials are configured every call is signed with `apiSig`.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::{Digest, Sha512};
use time::OffsetDateTime;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::{CodeforcesCredentials, CodeforcesSettings},
    domain::{
        entities::{Achievements, ContestStats, PlatformProfile, ProblemsSolved, ProfileDetails},
        types::Platform,
    },
};

use super::{PlatformScraper, ScrapeError, endpoint};

const EASY_CEILING: u32 = 1200;
const MEDIUM_CEILING: u32 = 1900;

pub struct CodeforcesScraper {
    client: Client,
    base_url: Url,
    credentials: Option<CodeforcesCredentials>,
    retry_after: Duration,
}

impl CodeforcesScraper {
    pub fn new(client: Client, settings: &CodeforcesSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            credentials: settings.credentials.clone(),
            retry_after: settings.retry_after,
        }
    }

    fn method_url(&self, method: &str, params: &[(&str, &str)]) -> Result<Url, ScrapeError> {
        let mut url = endpoint(&self.base_url, &format!("api/{method}"))?;
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        if let Some(credentials) = &self.credentials {
            pairs.push(("apiKey".to_string(), credentials.api_key.clone()));
            pairs.push((
                "time".to_string(),
                OffsetDateTime::now_utc().unix_timestamp().to_string(),
            ));
            let rand = six_digit_nonce();
            let signature = sign_request(method, &pairs, &credentials.api_secret, &rand);
            pairs.push(("apiSig".to_string(), signature));
        }

        url.query_pairs_mut().extend_pairs(pairs);
        Ok(url)
    }

    /// Call one API method, retrying a single time when throttled.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        handle: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ScrapeError> {
        let mut retried = false;
        loop {
            // Signed URLs embed the current time, so rebuild per attempt.
            let url = self.method_url(method, params)?;
            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retried {
                    return Err(ScrapeError::RateLimited {
                        platform: Platform::Codeforces.as_str(),
                    });
                }
                warn!(
                    target = "codefolio::scrape::codeforces",
                    method,
                    retry_after_ms = self.retry_after.as_millis() as u64,
                    "rate limited, retrying once"
                );
                retried = true;
                sleep(self.retry_after).await;
                continue;
            }

            let body = response.bytes().await?;
            let envelope: Envelope<T> = match serde_json::from_slice(&body) {
                Ok(envelope) => envelope,
                Err(_) if !status.is_success() => {
                    return Err(ScrapeError::Status {
                        platform: Platform::Codeforces.as_str(),
                        status,
                    });
                }
                Err(err) => return Err(ScrapeError::parse(Platform::Codeforces, err.to_string())),
            };

            debug!(
                target = "codefolio::scrape::codeforces",
                method,
                status = %status,
                "api call completed"
            );
            return envelope.into_result(handle);
        }
    }
}

#[async_trait]
impl PlatformScraper for CodeforcesScraper {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError> {
        let users: Vec<UserInfo> = self.call("user.info", handle, &[("handles", handle)]).await?;
        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::not_found(Platform::Codeforces, handle))?;
        let rating_changes: Vec<RatingChange> =
            self.call("user.rating", handle, &[("handle", handle)]).await?;
        let submissions: Vec<Submission> =
            self.call("user.status", handle, &[("handle", handle)]).await?;

        Ok(assemble(
            user,
            &rating_changes,
            &submissions,
            OffsetDateTime::now_utc(),
        ))
    }
}

/// `apiSig` for a Codeforces call: the nonce followed by the SHA-512 hex digest of
/// `"{rand}/{method}?{sorted params}#{secret}"`.
///
/// `params` must already contain `apiKey` and `time`; they are sorted by key, then value.
pub fn sign_request(method: &str, params: &[(String, String)], secret: &str, rand: &str) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha512::digest(format!("{rand}/{method}?{query}#{secret}").as_bytes());
    format!("{rand}{}", hex::encode(&digest[..]))
}

fn six_digit_nonce() -> String {
    let value = Uuid::new_v4().as_u128() % 900_000 + 100_000;
    value.to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    comment: Option<String>,
    result: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self, handle: &str) -> Result<T, ScrapeError> {
        if self.status != "OK" {
            let comment = self.comment.unwrap_or_else(|| self.status.clone());
            if comment.to_ascii_lowercase().contains("not found") {
                return Err(ScrapeError::not_found(Platform::Codeforces, handle));
            }
            return Err(ScrapeError::upstream(Platform::Codeforces, comment));
        }
        self.result
            .ok_or_else(|| ScrapeError::parse(Platform::Codeforces, "OK response without result"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    handle: String,
    rating: Option<i64>,
    max_rating: Option<i64>,
    rank: Option<String>,
    max_rank: Option<String>,
    country: Option<String>,
    organization: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingChange {
    rank: u64,
    new_rating: i64,
}

#[derive(Debug, Deserialize)]
struct Submission {
    verdict: Option<String>,
    problem: Problem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Problem {
    contest_id: Option<u64>,
    #[serde(default)]
    problemset_name: Option<String>,
    index: String,
    rating: Option<u32>,
}

fn count_solved(submissions: &[Submission]) -> ProblemsSolved {
    let mut seen = HashSet::new();
    let mut solved = ProblemsSolved {
        unrated: Some(0),
        ..ProblemsSolved::default()
    };

    for submission in submissions {
        if submission.verdict.as_deref() != Some("OK") {
            continue;
        }
        let problem = &submission.problem;
        let key = (
            problem.contest_id,
            problem.problemset_name.clone(),
            problem.index.clone(),
        );
        if !seen.insert(key) {
            continue;
        }
        match problem.rating {
            Some(rating) if rating < EASY_CEILING => solved.easy += 1,
            Some(rating) if rating < MEDIUM_CEILING => solved.medium += 1,
            Some(_) => solved.hard += 1,
            None => {
                if let Some(unrated) = solved.unrated.as_mut() {
                    *unrated += 1;
                }
            }
        }
    }

    solved.total = seen.len() as u32;
    solved
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn assemble(
    user: UserInfo,
    rating_changes: &[RatingChange],
    submissions: &[Submission],
    fetched_at: OffsetDateTime,
) -> PlatformProfile {
    let highest_from_history = rating_changes.iter().map(|c| c.new_rating).max();

    let profile = ProfileDetails {
        rating: user.rating,
        max_rating: user.max_rating,
        rank: non_empty(user.rank),
        max_rank: non_empty(user.max_rank),
        country: non_empty(user.country),
        organization: non_empty(user.organization),
        ranking: None,
    };

    let contests = ContestStats {
        attended: rating_changes.len() as u32,
        rating: user.rating,
        highest_rating: user.max_rating.or(highest_from_history),
        best_rank: rating_changes.iter().map(|c| c.rank).min(),
        top_percentage: None,
    };

    PlatformProfile {
        handle: user.handle,
        profile,
        problems_solved: count_solved(submissions),
        contests,
        achievements: Achievements::default(),
        last_updated: fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_reference_vector() {
        let params = vec![
            ("time".to_string(), "1700000000".to_string()),
            ("handle".to_string(), "alice".to_string()),
            ("apiKey".to_string(), "key123".to_string()),
        ];
        let sig = sign_request("user.status", &params, "s3cret", "123456");
        assert_eq!(
            sig,
            "12345673ff59705d6aa214d7ae19a0591b49a5507e18b37c6b75fbf4dc573e7e84ee3b50\
             aec44d1017bd99b96c1b7ab594537555acb7565fa1221e70f09abf1fd1df52"
        );
    }

    #[test]
    fn nonce_is_six_digits() {
        for _ in 0..32 {
            let nonce = six_digit_nonce();
            assert_eq!(nonce.len(), 6);
            assert!(nonce.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn solved_problems_are_unique_and_bucketed_by_rating() {
        let submissions: Vec<Submission> = serde_json::from_str(
            r#"[
              { "verdict": "OK", "problem": { "contestId": 1, "index": "A", "rating": 800 } },
              { "verdict": "OK", "problem": { "contestId": 1, "index": "A", "rating": 800 } },
              { "verdict": "WRONG_ANSWER", "problem": { "contestId": 1, "index": "B", "rating": 1300 } },
              { "verdict": "OK", "problem": { "contestId": 1, "index": "C", "rating": 1200 } },
              { "verdict": "OK", "problem": { "contestId": 2, "index": "D", "rating": 2100 } },
              { "verdict": "OK", "problem": { "contestId": 3, "index": "A" } },
              { "problem": { "contestId": 4, "index": "A", "rating": 900 } }
            ]"#,
        )
        .unwrap();

        let solved = count_solved(&submissions);
        assert_eq!(solved.total, 4);
        assert_eq!(solved.easy, 1);
        assert_eq!(solved.medium, 1);
        assert_eq!(solved.hard, 1);
        assert_eq!(solved.unrated, Some(1));
    }

    #[test]
    fn assembles_contest_stats_from_rating_history() {
        let user: UserInfo = serde_json::from_str(
            r#"{ "handle": "Alice", "rating": 1650, "maxRating": 1720,
                 "rank": "expert", "maxRank": "expert", "country": "",
                 "organization": "MIT" }"#,
        )
        .unwrap();
        let changes: Vec<RatingChange> = serde_json::from_str(
            r#"[
              { "contestId": 1, "rank": 900, "oldRating": 0, "newRating": 1400 },
              { "contestId": 2, "rank": 120, "oldRating": 1400, "newRating": 1720 },
              { "contestId": 3, "rank": 450, "oldRating": 1720, "newRating": 1650 }
            ]"#,
        )
        .unwrap();

        let profile = assemble(user, &changes, &[], OffsetDateTime::UNIX_EPOCH);
        assert_eq!(profile.handle, "Alice");
        assert_eq!(profile.contests.attended, 3);
        assert_eq!(profile.contests.best_rank, Some(120));
        assert_eq!(profile.contests.highest_rating, Some(1720));
        assert_eq!(profile.contests.rating, Some(1650));
        assert_eq!(profile.profile.rank.as_deref(), Some("expert"));
        assert_eq!(profile.profile.country, None);
        assert_eq!(profile.profile.organization.as_deref(), Some("MIT"));
        assert_eq!(profile.problems_solved.total, 0);
        assert_eq!(profile.problems_solved.unrated, Some(0));
    }

    #[test]
    fn unrated_user_has_no_contest_history() {
        let user: UserInfo = serde_json::from_str(r#"{ "handle": "newbie" }"#).unwrap();
        let profile = assemble(user, &[], &[], OffsetDateTime::UNIX_EPOCH);
        assert_eq!(profile.contests.attended, 0);
        assert_eq!(profile.contests.best_rank, None);
        assert_eq!(profile.contests.highest_rating, None);
    }

    #[test]
    fn failed_envelope_maps_not_found_and_upstream() {
        let missing: Envelope<Vec<UserInfo>> = serde_json::from_str(
            r#"{ "status": "FAILED", "comment": "handles: User with handle ghost not found" }"#,
        )
        .unwrap();
        assert!(matches!(
            missing.into_result("ghost"),
            Err(ScrapeError::NotFound { .. })
        ));

        let limited: Envelope<Vec<UserInfo>> = serde_json::from_str(
            r#"{ "status": "FAILED", "comment": "Call limit exceeded" }"#,
        )
        .unwrap();
        assert!(matches!(
            limited.into_result("alice"),
            Err(ScrapeError::Upstream { message, .. }) if message == "Call limit exceeded"
        ));
    }
}
