//! Health and status handlers

use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use review_storage::QueryWindow;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub active_workflows: usize,
    pub events_published: u64,
    pub event_subscribers: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthCheckResponse>> {
    let active = state
        .engine
        .list_active_workflows(QueryWindow::all())?
        .len();
    let stats = state.engine.event_stats();

    Ok(Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        active_workflows: active,
        events_published: stats.published,
        event_subscribers: stats.subscriber_count,
    }))
}

/// Registered workflow types
pub async fn list_workflow_types(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .engine
            .resolver()
            .workflow_types()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )
}
