//! Per-platform profile scrapers and the contract they share.

mod codechef;
mod codeforces;
mod gfg;
mod html;
mod leetcode;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use thiserror::Error;
use url::Url;

use crate::domain::{entities::PlatformProfile, types::Platform};

pub use codechef::CodeChefScraper;
pub use codeforces::{CodeforcesScraper, sign_request};
pub use gfg::GfgScraper;
pub use leetcode::LeetCodeScraper;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("{platform} answered with status {status}")]
    Status {
        platform: &'static str,
        status: StatusCode,
    },
    #[error("{platform} kept rate limiting after a retry")]
    RateLimited { platform: &'static str },
    #[error("failed to parse {platform} response: {message}")]
    Parse {
        platform: &'static str,
        message: String,
    },
    #[error("{platform} reported an error: {message}")]
    Upstream {
        platform: &'static str,
        message: String,
    },
    #[error("{platform} has no profile for `{handle}`")]
    NotFound {
        platform: &'static str,
        handle: String,
    },
}

impl ScrapeError {
    pub(crate) fn parse(platform: Platform, message: impl Into<String>) -> Self {
        Self::Parse {
            platform: platform.as_str(),
            message: message.into(),
        }
    }

    pub(crate) fn upstream(platform: Platform, message: impl Into<String>) -> Self {
        Self::Upstream {
            platform: platform.as_str(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(platform: Platform, handle: &str) -> Self {
        Self::NotFound {
            platform: platform.as_str(),
            handle: handle.to_string(),
        }
    }
}

/// Fetches one platform's profile and normalizes it into a [`PlatformProfile`].
///
/// Implementations never touch the cache; persisting the result is the caller's job.
#[async_trait]
pub trait PlatformScraper: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(&self, handle: &str) -> Result<PlatformProfile, ScrapeError>;
}

/// Resolve `path` against a configured base URL, keeping any base path prefix.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ScrapeError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

/// Map 404 to [`ScrapeError::NotFound`] and any other non-success status to [`ScrapeError::Status`].
pub(crate) fn ensure_success(
    platform: Platform,
    handle: &str,
    response: Response,
) -> Result<Response, ScrapeError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ScrapeError::not_found(platform, handle));
    }
    if !status.is_success() {
        return Err(ScrapeError::Status {
            platform: platform.as_str(),
            status,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:8080/mirror").unwrap();
        let url = endpoint(&base, "/users/alice").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/mirror/users/alice");
    }

    #[test]
    fn endpoint_joins_onto_root() {
        let base = Url::parse("https://leetcode.com").unwrap();
        let url = endpoint(&base, "graphql").unwrap();
        assert_eq!(url.as_str(), "https://leetcode.com/graphql");
    }
}
