//! Workflow command and query handlers

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use review_engine::{ChainVerification, DecisionOutcome};
use review_storage::{AuditRecord, QueryWindow};
use review_types::{
    ApproverId, ChecklistItemDefinition, Decision, LevelId, VersionId, Workflow, WorkflowId,
};
use serde::Deserialize;

/// Create workflow request
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub version_id: String,
    pub workflow_type: String,
}

/// Create a draft workflow for a version
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = state
        .engine
        .create_workflow(&VersionId::new(request.version_id), &request.workflow_type)?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// List workflows query params
#[derive(Debug, Deserialize)]
pub struct ListWorkflowsQuery {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

/// List non-terminal workflows, oldest first
pub async fn list_active_workflows(
    State(state): State<AppState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> ApiResult<Json<Vec<Workflow>>> {
    let window = QueryWindow {
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.engine.list_active_workflows(window)?))
}

/// Get a workflow by id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.engine.get_workflow_by_id(&WorkflowId::new(id))?))
}

/// Move a draft workflow into review
pub async fn start_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.engine.start_review(&WorkflowId::new(id))?))
}

/// Record decision request
#[derive(Debug, Deserialize)]
pub struct RecordDecisionRequest {
    pub level_id: String,
    pub approver_id: String,
    pub decision: Decision,
    pub comment: Option<String>,
}

/// Record an approver decision
pub async fn record_decision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordDecisionRequest>,
) -> ApiResult<Json<DecisionOutcome>> {
    if request.approver_id.trim().is_empty() {
        return Err(ApiError::BadRequest("approver_id is required".to_string()));
    }
    let outcome = state.engine.record_approver_decision(
        &WorkflowId::new(id),
        &LevelId::new(request.level_id),
        &ApproverId::new(request.approver_id),
        request.decision,
        request.comment,
    )?;
    Ok(Json(outcome))
}

/// Resubmit request. Send `{}` to resubmit the same version.
#[derive(Debug, Default, Deserialize)]
pub struct ResubmitRequest {
    #[serde(default)]
    pub version_id: Option<String>,
}

/// Resubmit after a revision request
pub async fn resubmit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ResubmitRequest>,
) -> ApiResult<Json<Workflow>> {
    let version = request.version_id.map(VersionId::new);
    let workflow = state
        .engine
        .resubmit_after_revision(&WorkflowId::new(id), version.as_ref())?;
    Ok(Json(workflow))
}

/// Cancel request
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Cancel a workflow
pub async fn cancel_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(
        state
            .engine
            .cancel_workflow(&WorkflowId::new(id), request.reason)?,
    ))
}

/// Attempt final approval
pub async fn finalize_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.engine.finalize_approval(&WorkflowId::new(id))?))
}

/// Attach checklist request
#[derive(Debug, Deserialize)]
pub struct AttachChecklistRequest {
    pub items: Vec<ChecklistItemDefinition>,
}

/// Attach a checklist to a workflow
pub async fn attach_checklist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AttachChecklistRequest>,
) -> ApiResult<(StatusCode, Json<Workflow>)> {
    let workflow = state
        .engine
        .attach_checklist(&WorkflowId::new(id), request.items)?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// Ordered audit history of a workflow
pub async fn get_audit_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AuditRecord>>> {
    Ok(Json(state.engine.get_audit_trail(&WorkflowId::new(id))?))
}

/// Recompute a workflow's audit hash chain
pub async fn verify_audit_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChainVerification>> {
    Ok(Json(state.engine.verify_audit_chain(&WorkflowId::new(id))?))
}
