//! Axum HTTP server for the REST API.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::ControllerState;
use crate::error::{Error, Result};

use super::handlers;

/// Run the REST API server on `state.config.bind_addr`.
pub async fn run_server(state: Arc<ControllerState>) -> Result<()> {
    let addr = state.config.bind_addr;

    #[cfg_attr(not(feature = "metrics"), allow(unused_mut))]
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/instances", get(handlers::list_instances).post(handlers::create_instance))
        .route(
            "/api/v1/instances/:name",
            get(handlers::get_instance)
                .patch(handlers::patch_instance)
                .delete(handlers::delete_instance),
        );

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(handlers::metrics));
    }

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    info!("REST API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {e}")))?;

    Ok(())
}
