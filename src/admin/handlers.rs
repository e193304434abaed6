use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::config::validation::is_host_port;
use crate::handler::HandlerError;
use crate::http::server::AppState;
use crate::model::ProxyCommand;
use crate::service::{ContextAction, ContextSelector};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionRequest {
    pub master: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ElectionResponse {
    pub previous: bool,
    pub master: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PingRequest {
    pub route: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
}

fn handler_failure(operation: &str, e: HandlerError) -> Response {
    tracing::error!(operation, error = %e, "Admin operation failed");
    let status = match e {
        HandlerError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
        HandlerError::InvalidCommand { .. } => StatusCode::BAD_REQUEST,
        HandlerError::Proxy { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.status())
}

pub async fn get_proxies(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.coordinator().get_proxy_states())
}

pub async fn add_proxy(
    State(state): State<AppState>,
    Json(request): Json<ProxyRequest>,
) -> impl IntoResponse {
    if !is_host_port(&request.address) {
        return (StatusCode::BAD_REQUEST, "Proxy address must be host:port").into_response();
    }

    match state.service.add_proxy(&request.address).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => handler_failure("add_proxy", e),
    }
}

pub async fn remove_proxy(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    match state.service.remove_proxy(&address).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => handler_failure("remove_proxy", e),
    }
}

pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: state.service.is_proxy_health_ok().await,
    })
}

pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.reset().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => handler_failure("reset", e),
    }
}

pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.refresh().await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => handler_failure("refresh", e),
    }
}

pub async fn context_action(
    State(state): State<AppState>,
    Path(action): Path<ContextAction>,
    Json(selector): Json<ContextSelector>,
) -> impl IntoResponse {
    match state.service.apply_context_action(action, &selector).await {
        Ok(responses) => (StatusCode::OK, Json(responses)).into_response(),
        Err(e) => handler_failure("context_action", e),
    }
}

pub async fn send_request(
    State(state): State<AppState>,
    Json(command): Json<ProxyCommand>,
) -> impl IntoResponse {
    match state.service.send_request(command).await {
        Ok(responses) => (StatusCode::OK, Json(responses)).into_response(),
        Err(e) => handler_failure("send_request", e),
    }
}

pub async fn set_election(
    State(state): State<AppState>,
    Json(request): Json<ElectionRequest>,
) -> impl IntoResponse {
    let previous = state.service.set_master(request.master);
    Json(ElectionResponse {
        previous,
        master: request.master,
    })
}

pub async fn get_discovery_events(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.discovery_events())
}

pub async fn ping(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> impl IntoResponse {
    match state.service.ping(request.route.as_deref()).await {
        Ok(responses) => (StatusCode::OK, Json(responses)).into_response(),
        Err(e) => handler_failure("ping", e),
    }
}
