//! Level comment and deadline handlers

use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use review_engine::OverdueLevel;
use review_types::{Comment, CommentType, LevelId};
use serde::Deserialize;

/// Add comment request
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    #[serde(default)]
    pub comment_type: CommentType,
    pub content: String,
    pub author_name: String,
}

/// Add a comment to a level thread
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state.engine.add_comment(
        &LevelId::new(id),
        request.comment_type,
        request.content,
        request.author_name,
    )?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Levels past their deadline
pub async fn list_overdue_levels(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<OverdueLevel>>> {
    Ok(Json(state.engine.overdue_levels(chrono::Utc::now())?))
}
