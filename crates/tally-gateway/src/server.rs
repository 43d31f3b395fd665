// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tally_core::TallyError;
use tally_sequencer::Sequencer;
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The numbering pipeline.
    pub sequencer: Sequencer,
    /// Optional Prometheus render function for `/metrics`.
    pub metrics: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl GatewayState {
    pub fn new(sequencer: Sequencer) -> Self {
        Self {
            sequencer,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.metrics = Some(render);
        self
    }
}

/// Server settings (mirrors `[server]` from tally-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests handled at once; further requests wait.
    pub max_concurrent_requests: usize,
}

/// Build the application router.
///
/// Routes:
/// - `GET|POST /applications`
/// - `GET|PUT|PATCH /applications/{token}`
/// - `GET|POST /applications/{token}/chats`
/// - `GET /applications/{token}/chats/{number}`
/// - `GET|POST /applications/{token}/chats/{number}/messages`
/// - `GET /applications/{token}/chats/{number}/messages/search`
/// - `GET|PUT|PATCH /applications/{token}/chats/{number}/messages/{message}`
/// - `GET /up`, `GET /metrics`
pub fn router(state: GatewayState, max_concurrent_requests: usize) -> Router {
    let api = Router::new()
        .route(
            "/applications",
            get(handlers::list_applications).post(handlers::create_application),
        )
        .route(
            "/applications/{token}",
            get(handlers::show_application)
                .put(handlers::update_application)
                .patch(handlers::update_application),
        )
        .route(
            "/applications/{token}/chats",
            get(handlers::list_chats).post(handlers::create_chat),
        )
        .route("/applications/{token}/chats/{number}", get(handlers::show_chat))
        .route(
            "/applications/{token}/chats/{number}/messages",
            get(handlers::list_messages).post(handlers::create_message),
        )
        .route(
            "/applications/{token}/chats/{number}/messages/search",
            get(handlers::search_messages),
        )
        .route(
            "/applications/{token}/chats/{number}/messages/{message}",
            get(handlers::show_message)
                .put(handlers::update_message)
                .patch(handlers::update_message),
        )
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests));

    Router::new()
        .merge(api)
        .route("/up", get(handlers::up))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `cancel` fires, then drain in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), TallyError> {
    let app = router(state, config.max_concurrent_requests);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TallyError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| TallyError::Internal(format!("server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_concurrent_requests: 25,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
