//! 错误类型定义
//!
//! 分两层：`WalletError` 是资金调度各服务的业务错误分类，
//! `AppError` 是 API 层的统一 HTTP 错误响应。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 资金调度业务错误
///
/// 任务创建前发现的错误同步返回给调用方；任务创建后发现的错误
/// 只记录在任务上，通过状态查询接口和 webhook 上报。
#[derive(Debug, Error)]
pub enum WalletError {
    /// 用户标识无法解析为非负整数派生索引
    #[error("invalid derivation index: {0}")]
    InvalidIndex(String),

    /// 目标地址格式非法
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// 金额非法（必须是 18 位小数定点、大于 0）
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// 国库代币余额不足（同步报错，不创建任务）
    #[error("insufficient treasury balance: available {available}, required {required}")]
    InsufficientTreasuryBalance { available: String, required: String },

    /// 国库原生币余额不足以完成 Gas 充值
    #[error("insufficient treasury funds for gas top-up: {0}")]
    InsufficientTreasuryFunds(String),

    /// 链 RPC 通信失败
    #[error("chain communication error: {0}")]
    ChainCommunication(String),

    /// 转账或确认超过时限。链上结果未知，不代表已回滚
    #[error("operation timed out after {0}s (on-chain outcome unknown)")]
    Timeout(u64),

    /// 任务队列后端不可用（触发内存降级，不暴露给调用方）
    #[error("job queue unavailable: {0}")]
    QueueUnavailable(String),

    /// 任务状态机非法迁移
    #[error("illegal job transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// webhook 投递失败（仅记录日志，不向上传播）
    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub enum AppErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Internal,
    InvalidAddress,
    InvalidAmount,
    InsufficientBalance,
    RpcError,
    Timeout,
}

/// API 层统一错误响应
#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code_str = match self.code {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Internal => "internal",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidAmount => "invalid_amount",
            AppErrorCode::InsufficientBalance => "insufficient_balance",
            AppErrorCode::RpcError => "rpc_error",
            AppErrorCode::Timeout => "timeout",
        };
        let body = ErrorBody {
            code: code_str,
            message: &self.message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::BadRequest,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Unauthorized,
            message: msg.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::NotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Internal,
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InvalidAddress,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InvalidAmount,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn insufficient_balance(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InsufficientBalance,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::RpcError,
            message: msg.into(),
            status: StatusCode::BAD_GATEWAY,
        }
    }
}

/// 业务错误到 HTTP 错误的映射
///
/// 同步路径（任务创建前）才会走到这里；任务内的错误已经落在任务记录上。
impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match &err {
            WalletError::InvalidIndex(_) => Self::bad_request(err.to_string()),
            WalletError::InvalidAddress(_) => Self::invalid_address(err.to_string()),
            WalletError::InvalidAmount(_) => Self::invalid_amount(err.to_string()),
            WalletError::InsufficientTreasuryBalance { .. }
            | WalletError::InsufficientTreasuryFunds(_) => {
                Self::insufficient_balance(err.to_string())
            }
            WalletError::ChainCommunication(_) => Self::rpc_error(err.to_string()),
            WalletError::Timeout(_) => Self {
                code: AppErrorCode::Timeout,
                message: err.to_string(),
                status: StatusCode::GATEWAY_TIMEOUT,
            },
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}
