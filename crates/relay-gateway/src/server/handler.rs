//! HTTP and WebSocket handlers
//!
//! Token validation happens before the upgrade; the hub receives only
//! authenticated connections with a resolved user id.

use axum::{
    extract::{ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use relay_common::{AppError, ErrorResponse};
use relay_core::{RoomId, UserId};

use crate::connection::{read_pump, write_pump, Connection};
use crate::server::GatewayState;

/// `AppError` wrapper carrying the HTTP mapping
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    token: String,
}

/// WebSocket entry point: validate the token, then upgrade
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = match (state.auth())(&query.token) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!(error = %e, "websocket auth rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(state, socket, user_id))
        .into_response()
}

/// Drive an upgraded socket until either pump exits, then unregister
async fn handle_socket(state: GatewayState, socket: WebSocket, user_id: UserId) {
    let hub = state.hub().clone();
    let (connection, receiver) = Connection::new(user_id, hub.send_queue_capacity());
    if hub.register(&connection).is_err() {
        tracing::debug!(user_id = %connection.user_id(), "connection refused during shutdown");
        return;
    }

    let (sink, stream) = socket.split();
    let mut write_task = tokio::spawn(write_pump(sink, receiver, connection.clone()));
    let mut read_task = tokio::spawn(read_pump(stream, hub.clone(), connection.clone()));

    tokio::select! {
        _ = &mut write_task => {
            read_task.abort();
        }
        _ = &mut read_task => {
            // Let the write pump flush a close frame before it exits
            connection.close();
            let _ = write_task.await;
        }
    }

    hub.unregister(connection.id());
}

/// Response body for the presence read-side
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub room_id: String,
    pub users: Vec<String>,
    pub count: usize,
}

/// List users with a fresh presence marker in a room
pub async fn room_presence(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
) -> Result<Json<PresenceResponse>, ApiError> {
    if room_id.is_empty() {
        return Err(AppError::InvalidInput("room id is required".to_string()).into());
    }
    let room = RoomId::from(room_id.as_str());
    let users = state
        .presence()
        .list(&room, state.config().presence.list_limit)
        .await
        .map_err(AppError::from)?;

    Ok(Json(PresenceResponse {
        room_id,
        count: users.len(),
        users: users.into_iter().map(|u| u.as_str().to_string()).collect(),
    }))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
