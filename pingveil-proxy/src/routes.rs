use crate::AppState;
use crate::error::AppError;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_macros::debug_handler;
use pingveil_core::{ConfigView, Mode, ProtocolSource};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    backend: String,
    mode: Mode,
    protocol_source: ProtocolSource,
    version: String,
    protocol: i32,
    online_players: u32,
    max_players: u32,
    favicon_configured: bool,
    active_sessions: u32,
}

impl StatusResponse {
    fn new(state: &AppState, view: &ConfigView) -> Self {
        Self {
            backend: state.engine.backend().to_string(),
            mode: view.mode,
            protocol_source: view.protocol_source,
            version: view.version.clone(),
            protocol: view.protocol,
            online_players: view.online_players,
            max_players: view.max_players,
            favicon_configured: view.favicon_payload().is_some(),
            active_sessions: state.active_sessions(),
        }
    }
}

pub(crate) async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let view = state.engine.snapshot();
    Json(StatusResponse::new(&state, &view))
}

#[debug_handler]
pub(crate) async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.reload_rewrite_config().await?;
    tracing::info!(mode = ?view.mode, "ping rewrite config reloaded");
    Ok((StatusCode::OK, Json(StatusResponse::new(&state, &view))))
}
