//! Read-only profile endpoints backed by the snapshot cache.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    application::error::{AppError, HttpError},
    domain::{entities::PlatformProfile, types::Platform},
};

use super::HttpState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub data: PlatformProfile,
}

#[derive(Debug, Default, Serialize)]
pub struct AllPlatformsData {
    pub leetcode: Option<PlatformProfile>,
    pub codeforces: Option<PlatformProfile>,
    pub codechef: Option<PlatformProfile>,
    pub gfg: Option<PlatformProfile>,
}

impl AllPlatformsData {
    fn slot(&mut self, platform: Platform) -> &mut Option<PlatformProfile> {
        match platform {
            Platform::LeetCode => &mut self.leetcode,
            Platform::Codeforces => &mut self.codeforces,
            Platform::CodeChef => &mut self.codechef,
            Platform::Gfg => &mut self.gfg,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AllPlatformsResponse {
    pub success: bool,
    pub data: AllPlatformsData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let platform: Platform = slug.parse()?;
    let data = state.profiles.load(platform).await?;
    Ok(Json(ProfileResponse {
        success: true,
        data,
    }))
}

pub(super) async fn all_profiles(State(state): State<HttpState>) -> Response {
    let all = state.profiles.load_all().await;

    if all.all_failed() {
        return HttpError::new(
            "infra::http::platforms::all_profiles",
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to fetch data from all platforms",
            "no platform snapshot could be loaded",
        )
        .into_response();
    }

    let warnings = (!all.failed.is_empty()).then(|| warning_for(&all.failed));
    let mut data = AllPlatformsData::default();
    for (platform, profile) in all.loaded {
        *data.slot(platform) = Some(profile);
    }

    Json(AllPlatformsResponse {
        success: true,
        data,
        warnings,
    })
    .into_response()
}

/// `Failed to fetch data from: a, b` over slugs in canonical order.
pub(crate) fn warning_for(failed: &[Platform]) -> String {
    let names = failed
        .iter()
        .map(|platform| platform.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Failed to fetch data from: {names}")
}
