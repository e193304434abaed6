pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/proxies", get(get_proxies).post(add_proxy))
        .route("/admin/proxies/{address}", delete(remove_proxy))
        .route("/admin/health", get(get_health))
        .route("/admin/reset", post(reset))
        .route("/admin/refresh", post(refresh))
        .route("/admin/contexts/{action}", post(context_action))
        .route("/admin/requests", post(send_request))
        .route("/admin/ping", post(ping))
        .route("/admin/election", post(set_election))
        .route("/admin/discovery-events", get(get_discovery_events))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
