//! Upgrades HTTP requests to WebSockets and hands each socket to a bridge.

use super::bridge::run_bridge;
use crate::state::AppState;
use axum::{
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user: Option<String>,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user = params
        .user
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_USER.to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

#[instrument(name = "ws_session", skip_all, fields(user = %user, session_id, mode, persona))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: String) {
    let (sink, stream) = socket.split();
    run_bridge(state, sink, stream, user).await;
}
