//! Shared domain enumerations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// External coding platform whose profile is mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "leetcode")]
    LeetCode,
    Codeforces,
    #[serde(rename = "codechef")]
    CodeChef,
    Gfg,
}

impl Platform {
    /// Every platform, in the order responses and warnings list them.
    pub const ALL: [Platform; 4] = [
        Platform::LeetCode,
        Platform::Codeforces,
        Platform::CodeChef,
        Platform::Gfg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::LeetCode => "leetcode",
            Platform::Codeforces => "codeforces",
            Platform::CodeChef => "codechef",
            Platform::Gfg => "gfg",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::LeetCode => "LeetCode",
            Platform::Codeforces => "Codeforces",
            Platform::CodeChef => "CodeChef",
            Platform::Gfg => "GeeksForGeeks",
        }
    }

    /// File name of the cached snapshot inside the data directory.
    pub fn cache_file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leetcode" => Ok(Platform::LeetCode),
            "codeforces" => Ok(Platform::Codeforces),
            "codechef" => Ok(Platform::CodeChef),
            "gfg" | "geeksforgeeks" => Ok(Platform::Gfg),
            other => Err(DomainError::unknown_platform(other)),
        }
    }
}

/// Outcome of a single platform refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Succeeded,
    Failed,
}
