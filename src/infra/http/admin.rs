//! Refresh control: status and manual trigger.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::info;

use crate::application::{
    error::AppError,
    refresh::{RefreshStatus, RefreshTrigger},
};

use super::HttpState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: RefreshStatus,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: &'static str,
}

pub(super) async fn update_status(State(state): State<HttpState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        data: state.refresh.status(),
    })
}

pub(super) async fn trigger_update(
    State(state): State<HttpState>,
) -> Result<(StatusCode, Json<TriggerResponse>), AppError> {
    // The cycle runs detached; progress is visible through update-status.
    let _cycle = state.refresh.spawn_refresh(RefreshTrigger::Manual)?;
    info!(target = "codefolio::http::admin", "manual refresh started");

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            success: true,
            message: "Refresh started",
        }),
    ))
}
