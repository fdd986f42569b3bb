use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use airdry_common::{ConfigUpdate, DocumentError, GatewayConfig};

use crate::restart::RestartHandle;
use crate::sensor::SensorReader;
use crate::store::{ConfigStore, FileEntry};

/// Both restart paths hold off this long so the acknowledgement can flush
/// before the listener goes away.
const RESTART_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Mutex<GatewayConfig>>,
    pub store: ConfigStore,
    pub reader: Arc<Mutex<SensorReader>>,
    pub restart: RestartHandle,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct RestartAck {
    restarting: bool,
}

#[derive(Debug, Serialize)]
struct FilesResponse {
    files: Vec<FileEntry>,
}

pub fn router(state: AppState, web_root: &str) -> Router {
    let static_files = ServeDir::new(web_root).not_found_service(redirect_to_index.into_service());

    Router::new()
        .route(
            "/api/config",
            get(handle_get_config).post(handle_post_config),
        )
        .route("/api/data", get(handle_get_data))
        .route("/api/restart", post(handle_restart))
        .route("/api/files", get(handle_get_files))
        .fallback_service(static_files)
        .with_state(state)
}

/// Unknown paths land on the settings page, not a 404.
async fn redirect_to_index() -> Redirect {
    Redirect::to("/")
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.lock().await;
    Json(config.redacted())
}

async fn handle_post_config(
    State(state): State<AppState>,
    body: Bytes,
) -> axum::response::Response {
    let update = match ConfigUpdate::from_document(&body) {
        Ok(update) => update,
        Err(err @ DocumentError::Oversized { .. }) => {
            warn!("rejected config update: {err}");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, &err.to_string());
        }
        Err(err) => {
            warn!("rejected config update: {err}");
            return error_response(StatusCode::BAD_REQUEST, "invalid settings document");
        }
    };

    {
        let mut config = state.config.lock().await;
        if let Err(err) = state.store.apply_update(&mut config, update).await {
            warn!("settings merged but not persisted: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist settings",
            );
        }
    }

    info!("configuration updated, restarting to apply");
    state.restart.schedule(RESTART_DELAY);
    Json(RestartAck { restarting: true }).into_response()
}

async fn handle_get_data(State(state): State<AppState>) -> impl IntoResponse {
    let mut reader = state.reader.lock().await;
    Json(reader.read())
}

async fn handle_restart(State(state): State<AppState>) -> impl IntoResponse {
    state.restart.schedule(RESTART_DELAY);
    Json(RestartAck { restarting: true })
}

async fn handle_get_files(State(state): State<AppState>) -> axum::response::Response {
    match state.store.list_files().await {
        Ok(files) => Json(FilesResponse { files }).into_response(),
        Err(err) => {
            warn!("file listing failed: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list files")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
