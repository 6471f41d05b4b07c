mod admin;
mod health;
mod middleware;
mod platforms;

use std::{sync::Arc, time::Instant};

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::application::{
    error::HttpError, profiles::ProfileFormatter, refresh::RefreshCoordinator,
};

pub use health::{HealthResponse, MemorySampler, MemoryUsage};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use platforms::{AllPlatformsData, AllPlatformsResponse, ProfileResponse};

#[derive(Clone)]
pub struct HttpState {
    pub profiles: Arc<ProfileFormatter>,
    pub refresh: Arc<RefreshCoordinator>,
    pub memory: MemorySampler,
    pub started_at: Instant,
}

impl HttpState {
    pub fn new(profiles: ProfileFormatter, refresh: Arc<RefreshCoordinator>) -> Self {
        Self {
            profiles: Arc::new(profiles),
            refresh,
            memory: MemorySampler::new(),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: HttpState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/codingPlatforms/all", get(platforms::all_profiles))
        .route("/api/codingPlatforms/{platform}", get(platforms::profile))
        .route("/api/admin/update-status", get(admin::update_status))
        .route("/api/admin/trigger-update", post(admin::trigger_update))
        .route("/health", get(health::health))
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}

/// Restrict to the configured origins, or allow any origin when none are set.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(origin = %origin, error = %err, "skipping unusable CORS origin");
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

async fn not_found() -> HttpError {
    HttpError::new(
        "infra::http::not_found",
        StatusCode::NOT_FOUND,
        "Route not found",
        "no route matched the request",
    )
}
