mod handlers;
mod state;

use axum::routing::get;
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::compare::ComparisonCoordinator;

pub fn build_router(coordinator: Arc<ComparisonCoordinator>) -> Router {
    let state = Arc::new(AppState { coordinator });

    Router::new()
        .route("/api/compare", get(handlers::compare))
        .route("/api/resolve", get(handlers::resolve))
        .route("/api/areas", get(handlers::area_list))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the process is stopped. The reference tables inside
/// `coordinator` are fully built before the listener binds.
pub async fn start(coordinator: Arc<ComparisonCoordinator>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(coordinator);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot bind to {}: {}", addr, e))?;

    info!("CPI Compass server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
