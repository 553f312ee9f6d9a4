use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tokio::sync::watch;
use tracing::info;

use crate::models::StatusSnapshot;
use crate::snapshot::SharedSnapshot;
use crate::utils::unix_now;

pub async fn get_status(State(state): State<SharedSnapshot>) -> Json<StatusSnapshot> {
    Json(state.read_at(unix_now()).await)
}

pub fn create_router(state: SharedSnapshot) -> Router {
    Router::new()
        .route("/", get(get_status))
        .route("/api/status", get(get_status))
        .with_state(state)
}

/// Serves the status API on `addr` until `shutdown` fires.
pub async fn start_server(
    addr: &str,
    state: SharedSnapshot,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status API: http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
