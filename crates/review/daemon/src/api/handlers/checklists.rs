//! Checklist handlers

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use review_types::{Checklist, ChecklistId, ChecklistItemId, ChecklistItemStatus};
use serde::Deserialize;

/// Set checklist item request
#[derive(Debug, Deserialize)]
pub struct SetChecklistItemRequest {
    pub status: ChecklistItemStatus,
    pub checked_by: String,
}

/// Update one checklist item and re-evaluate
pub async fn set_checklist_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetChecklistItemRequest>,
) -> ApiResult<Json<Checklist>> {
    if request.checked_by.trim().is_empty() {
        return Err(ApiError::BadRequest("checked_by is required".to_string()));
    }
    let checklist = state.engine.set_checklist_item_status(
        &ChecklistItemId::new(id),
        request.status,
        &request.checked_by,
    )?;
    Ok(Json(checklist))
}

/// Recompute a checklist's status and score
pub async fn evaluate_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Checklist>> {
    Ok(Json(state.engine.evaluate_checklist(&ChecklistId::new(id))?))
}
