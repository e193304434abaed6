//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: cluster RPC endpoint plus admin API
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown signal fires

use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::cluster::{ClusterRequest, ClusterResponse, RPC_PATH};
use crate::service::ProxyService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProxyService>,
}

/// HTTP server for cluster RPC and administration.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(service: Arc<ProxyService>) -> Self {
        let router = Self::build_router(AppState { service });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let config = state.service.config().load();
        // Admin calls may fan out to the cluster, so allow for one RPC round trip.
        let request_timeout = Duration::from_millis(config.cluster.rpc_timeout_ms.saturating_mul(2).max(1000));

        let mut router = Router::new()
            .route(RPC_PATH, post(cluster_rpc))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Inbound cluster call from a peer; an absent reply is serialized as `null`.
async fn cluster_rpc(
    State(state): State<AppState>,
    Json(request): Json<ClusterRequest>,
) -> Json<Option<ClusterResponse>> {
    Json(state.service.handle_rpc(request).await)
}
