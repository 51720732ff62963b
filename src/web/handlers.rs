//! HTTP API handlers

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::audio::device::{list_devices, DeviceInfo};
use crate::web::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Embedded viewer client
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/viewer.html"))
}

/// Accept a viewer's offer and answer it from a freshly negotiated session
pub async fn offer(
    State(state): State<Arc<AppState>>,
    Json(offer): Json<RTCSessionDescription>,
) -> Result<Json<RTCSessionDescription>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.manager.clone().negotiate(offer).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            tracing::warn!(error = %e, "negotiation failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::error(e.to_string())),
            ))
        }
    }
}

#[derive(serde::Serialize)]
pub struct SystemStatus {
    pub active_sessions: usize,
    pub uptime_seconds: u64,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    Json(ApiResponse::ok(SystemStatus {
        active_sessions: state.manager.active_sessions(),
        uptime_seconds: state.started.elapsed().as_secs(),
    }))
}

pub async fn devices() -> Json<ApiResponse<Vec<DeviceInfo>>> {
    Json(ApiResponse::ok(list_devices()))
}
