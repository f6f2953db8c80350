//! Helpdesk API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Exposes the support chat endpoint, session lifecycle and transcript
//! routes, a per-session message stream, the FAQ listing and a health check.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
