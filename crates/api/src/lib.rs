pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod payload;
pub mod routes;
pub mod state;

pub use error::*;
pub use handlers::*;
pub use middleware::*;
pub use payload::*;
pub use routes::*;
pub use state::*;

use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use study_control::ControlPlane;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// The router with tracing, CORS and the request body limit applied.
pub fn build_app(control: Arc<ControlPlane>) -> Router {
    let state = AppState::new(control);
    let body_limit = state.config.server.max_request_body_size_mb as usize * 1024 * 1024;

    Router::new()
        .merge(build_router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

pub async fn start_server(
    control: Arc<ControlPlane>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bind = control.config().server.bind.clone();
    let port = control.config().server.port;
    let app = build_app(control);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
    info!("StudyForge API listening on {}:{}", bind, port);

    axum::serve(listener, app).await?;
    Ok(())
}
