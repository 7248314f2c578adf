//! Deliverable and version handlers

use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use review_types::{Deliverable, DeliverableId, Version, VersionId, Workflow};
use serde::Deserialize;

/// Register deliverable request
#[derive(Debug, Deserialize)]
pub struct RegisterDeliverableRequest {
    pub title: String,
    #[serde(default)]
    pub deliverable_type: String,
}

/// Register a deliverable
pub async fn register_deliverable(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeliverableRequest>,
) -> ApiResult<(StatusCode, Json<Deliverable>)> {
    let deliverable = state
        .engine
        .register_deliverable(request.title, request.deliverable_type)?;
    Ok((StatusCode::CREATED, Json(deliverable)))
}

/// Create version request
#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub file_url: String,
    #[serde(default)]
    pub change_log: String,
}

/// Upload a new version of a deliverable
pub async fn create_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CreateVersionRequest>,
) -> ApiResult<(StatusCode, Json<Version>)> {
    let version = state.engine.create_version(
        &DeliverableId::new(id),
        request.file_url,
        request.change_log,
    )?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// List versions of a deliverable, oldest first
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Version>>> {
    Ok(Json(state.engine.list_versions(&DeliverableId::new(id))?))
}

/// Get a version
pub async fn get_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Version>> {
    Ok(Json(state.engine.get_version(&VersionId::new(id))?))
}

/// Full nested workflow state for a version
pub async fn get_workflow_for_version(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.engine.get_workflow(&VersionId::new(id))?))
}
