//! Read-only HTTP boundary over the status store.
//!
//! ## Endpoints
//!
//! - `GET /state`: JSON object with `narration`, `quest`, `villager` and
//!   `quest_check` string fields.
//!
//! CORS is open to any origin so a browser overlay can poll the state.

use crate::config::StatusConfig;
use crate::error::OverlayError;
use crate::status::{StatusSnapshot, StatusStore};
use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the status router for `store`.
pub fn router(store: StatusStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/state", get(handle_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn handle_state(State(store): State<StatusStore>) -> Json<StatusSnapshot> {
    Json(store.snapshot())
}

/// Running status server.
///
/// The server task is aborted when this handle is dropped.
pub struct StatusServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl StatusServer {
    /// Bind the configured address and start serving in the background.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Server`] if the address cannot be bound.
    pub async fn start(store: StatusStore, config: &StatusConfig) -> crate::error::Result<Self> {
        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| OverlayError::Server(format!("status server bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| OverlayError::Server(format!("failed to get local addr: {e}")))?;

        info!("status server listening on http://{addr}/state");

        let app = router(store);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("status server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
