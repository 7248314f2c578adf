//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        .route("/workflow-types", get(handlers::list_workflow_types))
        // Deliverables and versions
        .route("/deliverables", post(handlers::register_deliverable))
        .route(
            "/deliverables/:id/versions",
            get(handlers::list_versions).post(handlers::create_version),
        )
        .route("/versions/:id", get(handlers::get_version))
        .route("/versions/:id/workflow", get(handlers::get_workflow_for_version))
        // Workflows
        .route(
            "/workflows",
            get(handlers::list_active_workflows).post(handlers::create_workflow),
        )
        .route("/workflows/:id", get(handlers::get_workflow))
        .route("/workflows/:id/start", post(handlers::start_review))
        .route("/workflows/:id/decisions", post(handlers::record_decision))
        .route("/workflows/:id/resubmit", post(handlers::resubmit))
        .route("/workflows/:id/cancel", post(handlers::cancel_workflow))
        .route("/workflows/:id/finalize", post(handlers::finalize_approval))
        .route("/workflows/:id/checklist", post(handlers::attach_checklist))
        .route("/workflows/:id/audit", get(handlers::get_audit_trail))
        .route("/workflows/:id/audit/verify", get(handlers::verify_audit_chain))
        // Levels
        .route("/levels/overdue", get(handlers::list_overdue_levels))
        .route("/levels/:id/comments", post(handlers::add_comment))
        // Checklists
        .route("/checklists/:id/evaluate", post(handlers::evaluate_checklist))
        .route("/checklist-items/:id", put(handlers::set_checklist_item))
        // Events
        .route("/events/stream", get(handlers::stream_events));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
