//! 提现 API
//! 提交在入口做同步校验，执行异步；状态经 /withdraw/:job_id 轮询

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    domain::WithdrawalJob,
    error::{AppError, AppErrorCode},
};

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub to: String,
    pub amount: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawAcceptedResponse {
    pub status: String,
    pub job_id: String,
    pub timestamp: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/withdraw", post(withdraw))
        .route("/withdraw/:job_id", get(withdraw_status))
}

/// POST /api/withdraw
///
/// 地址/金额/国库余额任一不过关都同步 4xx，不创建任务。
async fn withdraw(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawAcceptedResponse>, AppError> {
    let job_id = state
        .dispatcher
        .submit(&req.to, &req.amount, &req.user_id)
        .await?;

    Ok(Json(WithdrawAcceptedResponse {
        status: "processing".into(),
        job_id: job_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/withdraw/:job_id
async fn withdraw_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<WithdrawalJob>, AppError> {
    let id = Uuid::parse_str(&job_id).map_err(|_| AppError {
        code: AppErrorCode::NotFound,
        message: format!("unknown job id: {}", job_id),
        status: StatusCode::NOT_FOUND,
    })?;

    match state.dispatcher.job_status(id).await? {
        Some(job) => Ok(Json(job)),
        None => Err(AppError {
            code: AppErrorCode::NotFound,
            message: format!("unknown job id: {}", job_id),
            status: StatusCode::NOT_FOUND,
        }),
    }
}
