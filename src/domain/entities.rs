//! Normalized profile snapshot shared by every platform.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::types::Platform;

/// One platform's profile, in the shape served to clients and written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProfile {
    pub handle: String,
    pub profile: ProfileDetails,
    pub problems_solved: ProblemsSolved,
    pub contests: ContestStats,
    pub achievements: Achievements,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

/// Platform-specific identity fields; anything a platform lacks stays `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub rating: Option<i64>,
    pub max_rating: Option<i64>,
    pub rank: Option<String>,
    pub max_rank: Option<String>,
    pub country: Option<String>,
    pub organization: Option<String>,
    pub ranking: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemsSolved {
    pub total: u32,
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unrated: Option<u32>,
}

impl ProblemsSolved {
    /// Sum of every tier, including the platform-specific extras.
    pub fn tier_sum(&self) -> u32 {
        [
            self.easy,
            self.medium,
            self.hard,
            self.school.unwrap_or(0),
            self.basic.unwrap_or(0),
            self.unrated.unwrap_or(0),
        ]
        .iter()
        .fold(0u32, |acc, count| acc.saturating_add(*count))
    }

    /// Fill `total` from the tiers when the platform did not report it.
    pub fn with_total_fallback(mut self) -> Self {
        if self.total == 0 {
            self.total = self.tier_sum();
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestStats {
    pub attended: u32,
    pub rating: Option<i64>,
    pub highest_rating: Option<i64>,
    pub best_rank: Option<u64>,
    pub top_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievements {
    pub stars: Option<u8>,
    pub badges: Vec<String>,
    pub streak: Option<u32>,
    pub longest_streak: Option<u32>,
    pub coding_score: Option<u64>,
}

impl PlatformProfile {
    /// Baseline record for a platform: zero counts, `null` details, epoch timestamp.
    ///
    /// Cached snapshots are merged over this so a response is always fully populated.
    pub fn seed(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            profile: ProfileDetails::default(),
            problems_solved: ProblemsSolved::default(),
            contests: ContestStats::default(),
            achievements: Achievements::default(),
            last_updated: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Seed whose difficulty extras match what the platform reports.
    pub fn seed_for(platform: Platform, handle: impl Into<String>) -> Self {
        let mut seed = Self::seed(handle);
        match platform {
            Platform::Codeforces => seed.problems_solved.unrated = Some(0),
            Platform::Gfg => {
                seed.problems_solved.school = Some(0);
                seed.problems_solved.basic = Some(0);
            }
            Platform::LeetCode | Platform::CodeChef => {}
        }
        seed
    }
}
