use crate::error::Error;
use crate::models::Coordinate;
use crate::navigation::position::GeoPosition;
use crate::shift::Shift;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Deserialize)]
pub struct ShiftRequest {
    pub shift: Shift,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRouteRequest {
    #[serde(default)]
    pub origin: Option<Coordinate>,
    #[serde(default)]
    pub destination: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub granted: bool,
}

pub fn error_response(error: Error) -> Response {
    let status = match &error {
        Error::InvalidShift { .. } => StatusCode::CONFLICT,
        Error::RoutingFailure(_)
        | Error::Persistence(_)
        | Error::Backend(_)
        | Error::UnexpectedResponseShape(_) => StatusCode::BAD_GATEWAY,
        Error::PositionUnavailable(_) | Error::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
        Error::NoRoute => StatusCode::BAD_REQUEST,
        Error::UnknownWaypoint(_) => StatusCode::NOT_FOUND,
    };

    if status.is_server_error() {
        tracing::warn!(status = %status, error = %error, "Driver request failed");
    } else {
        tracing::info!(status = %status, error = %error, "Driver request rejected");
    }

    (
        status,
        Json(serde_json::json!({
            "error": error.to_string()
        })),
    )
        .into_response()
}

fn success(message: &str) -> Response {
    Json(serde_json::json!({
        "status": "success",
        "message": message
    }))
    .into_response()
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Response {
    match state.session.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn select_shift(State(state): State<Arc<AppState>>, Json(payload): Json<ShiftRequest>) -> Response {
    match state.session.select_shift(payload.shift).await {
        Ok(()) => success("Shift selected"),
        Err(e) => error_response(e),
    }
}

pub async fn generate_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRouteRequest>,
) -> Response {
    match state
        .session
        .generate_route(payload.origin, payload.destination)
        .await
    {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn start_navigation(State(state): State<Arc<AppState>>) -> Response {
    match state.session.start_navigation().await {
        Ok(()) => success("Navigation started"),
        Err(e) => error_response(e),
    }
}

pub async fn stop_navigation(State(state): State<Arc<AppState>>, Json(payload): Json<StopRequest>) -> Response {
    if !payload.confirm {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Stopping navigation must be confirmed"
            })),
        )
            .into_response();
    }

    match state.session.stop_navigation().await {
        Ok(()) => success("Navigation stopped"),
        Err(e) => error_response(e),
    }
}

pub async fn skip_segment(State(state): State<Arc<AppState>>) -> Response {
    match state.session.skip_segment().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn toggle_bin(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.session.toggle_collection(id.clone()).await {
        Ok(collection) => Json(serde_json::json!({
            "id": id,
            "collection": collection
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn push_position(State(state): State<Arc<AppState>>, Json(position): Json<GeoPosition>) -> Response {
    match state.positions.push(position).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn set_permission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PermissionRequest>,
) -> Response {
    state.positions.set_permission(payload.granted).await;
    success(if payload.granted {
        "Location permission granted"
    } else {
        "Location permission revoked"
    })
}

pub async fn navigation_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_navigation_socket(socket, state))
}

/// Streams session updates to the driver device. Text frames sent by the
/// device are read as position fixes.
async fn handle_navigation_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.session.subscribe();

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => {
                    if let Ok(msg) = serde_json::to_string(&update) {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Navigation socket lagged behind updates");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<GeoPosition>(&text) {
                    Ok(position) => {
                        if let Err(e) = state.positions.push(position).await {
                            tracing::debug!(error = %e, "Position from socket rejected");
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "Ignoring unreadable socket message"),
                },
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
