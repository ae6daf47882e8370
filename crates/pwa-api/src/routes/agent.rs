//! Agent lifecycle and client endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use pwa_core::{ClientId, ClientInfo, ControllerStats, SignalOutcome, UpdateOutcome};
use serde::Serialize;
use tracing::info;

use super::metrics::record_install;
use crate::error::ApiError;
use crate::state::AppState;

/// Agent status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub bucket: String,
    pub buckets: Vec<String>,
    pub cached_entries: usize,
    pub clients: usize,
    pub stats: ControllerStats,
}

/// Client registration response
#[derive(Serialize)]
pub struct ClientResponse {
    pub id: ClientId,
    pub controller: Option<String>,
}

/// Background signal response
#[derive(Serialize)]
pub struct SignalResponse {
    pub tag: String,
    pub outcome: SignalOutcome,
}

/// GET /_agent/status
async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let registration = state.registration.status();
    let bucket = state.controller.bucket_name().to_string();
    let buckets = state.store.keys().await?;

    let cached_entries = if buckets.contains(&bucket) {
        state.store.entries(&bucket).await?.len()
    } else {
        0
    };

    Ok(Json(StatusResponse {
        active_version: registration.active_version,
        waiting_version: registration.waiting_version,
        bucket,
        buckets,
        cached_entries,
        clients: registration.clients,
        stats: state.controller.stats(),
    }))
}

/// POST /_agent/install - re-run install and activate for the configured controller
async fn install(State(state): State<AppState>) -> Result<Json<UpdateOutcome>, ApiError> {
    let outcome = state.registration.update(state.controller.clone()).await?;

    let report = match &outcome {
        UpdateOutcome::Activated { install, .. } | UpdateOutcome::Waiting { install } => install,
    };
    record_install(report);

    Ok(Json(outcome))
}

/// GET /_agent/clients
async fn list_clients(State(state): State<AppState>) -> Json<Vec<ClientInfo>> {
    Json(state.registration.clients().list())
}

/// POST /_agent/clients
async fn open_client(State(state): State<AppState>) -> (StatusCode, Json<ClientResponse>) {
    let id = state.registration.register_client();
    let controller = state
        .registration
        .clients()
        .get(&id)
        .and_then(|c| c.controller);

    (StatusCode::CREATED, Json(ClientResponse { id, controller }))
}

/// DELETE /_agent/clients/{id}
async fn close_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ClientId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid client id: {}", id)))?;

    if state.registration.clients().get(&id).is_none() {
        return Err(ApiError::NotFound(format!("client {}", id)));
    }

    if let Some(report) = state.registration.release_client(&id).await? {
        info!("Waiting controller activated on client release ({})", report.bucket);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /_agent/sync/{tag}
async fn sync(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<SignalResponse>, ApiError> {
    let outcome = state.registration.dispatch_signal(&tag).await?;
    Ok(Json(SignalResponse { tag, outcome }))
}

/// Create agent routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/_agent/status", get(status))
        .route("/_agent/install", post(install))
        .route("/_agent/clients", get(list_clients).post(open_client))
        .route("/_agent/clients/{id}", delete(close_client))
        .route("/_agent/sync/{tag}", post(sync))
}
