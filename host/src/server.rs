//! ==============================================================================
//! server.rs - json api for the dashboard renderer
//! ==============================================================================
//!
//! routes:
//!     GET  /api          -> DashboardView (everything a renderer draws)
//!     GET  /api/readings -> current + previous reading
//!     POST /api/reload   -> out-of-schedule refresh of every resource
//!
//! ==============================================================================

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::dashboard::Dashboard;
use crate::domain::Reading;
use crate::snapshot::SnapshotPair;
use crate::view::DashboardView;

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/api", get(dashboard_handler))
        .route("/api/readings", get(readings_handler))
        .route("/api/reload", post(reload_handler))
        .layer(CorsLayer::permissive())
        .with_state(dashboard)
}

/// Serve until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, dashboard: Arc<Dashboard>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("[STARTUP] ✓ Dashboard API live at http://{}/api", addr);
    }
    axum::serve(listener, router(dashboard))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn dashboard_handler(State(dashboard): State<Arc<Dashboard>>) -> Json<DashboardView> {
    Json(dashboard.view().await)
}

async fn readings_handler(State(dashboard): State<Arc<Dashboard>>) -> Json<SnapshotPair<Reading>> {
    Json(dashboard.readings().await)
}

/// the dashboard's "Recargar" button
async fn reload_handler(State(dashboard): State<Arc<Dashboard>>) -> Json<serde_json::Value> {
    let started = dashboard.reload_all();
    tracing::debug!(started, "[API] manual reload");
    Json(serde_json::json!({"status": "ok", "started": started}))
}
