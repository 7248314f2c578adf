//! Review daemon library
//!
//! This module provides the core components for `reviewd`:
//! - REST API handlers over the review engine
//! - SSE stream of emitted review events
//! - Layered configuration
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::{create_router, AppState};
pub use config::DaemonConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
