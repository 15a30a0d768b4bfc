//! 健康检查 API

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// 当前队列后端："redis" 或 "memory"
    pub queue_backend: String,
    pub timestamp: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/health（免签名）
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        queue_backend: state.dispatcher.backend_name().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
