//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use helpdesk_core::config::{HelpdeskConfig, ServerConfig};
use helpdesk_core::error::HelpdeskError;

use crate::handlers;
use crate::state::AppState;

/// Build the CORS layer from the configured origins.
///
/// `"*"` anywhere in the list allows any origin. Unparsable origins are
/// skipped with a warning.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origin = if server.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = server
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);
    let body_limit = state.config.server.body_limit_bytes;

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/chat-support", post(handlers::chat_support))
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/active", get(handlers::active_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/messages", get(handlers::session_messages))
        .route("/sessions/{id}/stream", get(handlers::session_stream))
        .route("/faqs", get(handlers::list_faqs))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Runs until `shutdown` resolves.
pub async fn start_server<F>(
    config: &HelpdeskConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), HelpdeskError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HelpdeskError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
