use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
    #[serde(rename = "rokuIp")]
    roku_ip: Option<String>,
    uptime_seconds: u64,
    controllers: usize,
}

/// GET /health - liveness plus the currently selected target.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        roku_ip: state.target.get().await,
        uptime_seconds: state.uptime_seconds(),
        controllers: state.registry.len(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SetTargetRequest {
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct SetTargetResponse {
    #[serde(rename = "rokuIp")]
    pub roku_ip: String,
}

#[derive(Debug, Serialize)]
pub struct TargetErrorBody {
    pub error: String,
}

pub struct TargetErrorResponse {
    status: StatusCode,
    body: TargetErrorBody,
}

impl IntoResponse for TargetErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// POST /roku-ip - point the relay at a different set-top box.
pub async fn set_roku_ip(
    State(state): State<AppState>,
    Json(payload): Json<SetTargetRequest>,
) -> Result<Json<SetTargetResponse>, TargetErrorResponse> {
    match state.target.set(&payload.ip).await {
        Ok(ip) => {
            info!(roku_ip = %ip, "target updated over http");
            Ok(Json(SetTargetResponse { roku_ip: ip }))
        }
        Err(err) => {
            warn!(error = %err, "rejecting target update");
            Err(TargetErrorResponse {
                status: StatusCode::BAD_REQUEST,
                body: TargetErrorBody {
                    error: err.to_string(),
                },
            })
        }
    }
}

/// GET /metrics - Prometheus exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
