//! 钱包 API
//! 地址派生、余额查询、归集触发、批量信息查询

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::AppError,
    service::webhook_notifier::{EventKind, NotificationEvent},
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct GenerateAddressResponse {
    pub address: String,
    /// "sufficient" 或 "topped_up"
    pub gas_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    /// 代币余额（18 位小数的十进制字符串）
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct SweepAcceptedResponse {
    pub status: String,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchWalletInfoRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WalletInfoEntry {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// 原生币余额
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    /// 代币余额
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate-address/:user_id", get(generate_address))
        .route("/balance/:user_id", get(balance))
        .route("/sweep/:user_id", post(sweep))
        .route("/batch-wallet-info", post(batch_wallet_info))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /api/generate-address/:user_id
///
/// 派生用户的存款地址，余额低于阈值时顺带充一笔 Gas。
async fn generate_address(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<GenerateAddressResponse>, AppError> {
    let wallet = state.deriver.derive_for_user(&user_id)?;
    let address = wallet.address_hex();

    let tx_hash = state.gas.ensure_gas(wallet.address).await?;
    let gas_status = if tx_hash.is_some() {
        "topped_up"
    } else {
        "sufficient"
    };

    tracing::info!(user_id = %user_id, address = %address, gas_status, "Deposit address generated");
    Ok(Json(GenerateAddressResponse {
        address,
        gas_status: gas_status.to_string(),
        tx_hash,
    }))
}

/// GET /api/balance/:user_id
async fn balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let wallet = state.deriver.derive_for_user(&user_id)?;
    let raw = state.ledger.token_balance(wallet.address).await?;
    let balance = ethers::utils::format_units(raw, 18)
        .map_err(|e| crate::error::WalletError::Internal(e.to_string()))?;

    Ok(Json(BalanceResponse {
        address: wallet.address_hex(),
        balance,
    }))
}

/// POST /api/sweep/:user_id
///
/// 立即返回 202 语义的 processing，归集在后台执行。
/// 终态（成交/失败）通过 deposit webhook 通知；零余额只记日志。
async fn sweep(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SweepAcceptedResponse>, AppError> {
    // 索引非法属于同步可拒绝错误，入后台前就报
    let index = crate::domain::AddressDeriver::parse_index(&user_id)?;
    let request_id = Uuid::new_v4();

    let sweeper = state.sweeper.clone();
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        match sweeper.sweep_with_gas(index).await {
            Ok(Some(outcome)) => {
                tracing::info!(
                    user_id = %user_id,
                    tx_hash = %outcome.tx_hash,
                    amount = %outcome.amount,
                    "Sweep completed"
                );
                notifier
                    .notify(NotificationEvent {
                        kind: EventKind::Deposit,
                        user_id: user_id.clone(),
                        status: if outcome.confirmed {
                            "completed".into()
                        } else {
                            "failed".into()
                        },
                        amount: Some(outcome.amount),
                        tx_hash: Some(outcome.tx_hash),
                        from: Some(outcome.from),
                        to: Some(outcome.to),
                        error: None,
                    })
                    .await;
            }
            Ok(None) => {
                tracing::info!(user_id = %user_id, "Sweep skipped: no token balance");
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Sweep failed");
                notifier
                    .notify(NotificationEvent {
                        kind: EventKind::Deposit,
                        user_id: user_id.clone(),
                        status: "failed".into(),
                        amount: None,
                        tx_hash: None,
                        from: None,
                        to: None,
                        error: Some(e.to_string()),
                    })
                    .await;
            }
        }
    });

    Ok(Json(SweepAcceptedResponse {
        status: "processing".into(),
        request_id: request_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /api/batch-wallet-info
///
/// 并发查询一批用户的地址和余额，单项失败不影响其余。
async fn batch_wallet_info(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchWalletInfoRequest>,
) -> Result<Json<Vec<WalletInfoEntry>>, AppError> {
    let tasks = req.user_ids.into_iter().map(|user_id| {
        let state = state.clone();
        async move {
            match wallet_info(&state, &user_id).await {
                Ok(entry) => entry,
                Err(e) => WalletInfoEntry {
                    user_id,
                    address: None,
                    gas: None,
                    token: None,
                    error: Some(e.to_string()),
                },
            }
        }
    });

    let entries = futures::future::join_all(tasks).await;
    Ok(Json(entries))
}

async fn wallet_info(
    state: &AppState,
    user_id: &str,
) -> Result<WalletInfoEntry, crate::error::WalletError> {
    let wallet = state.deriver.derive_for_user(user_id)?;
    let native = state.ledger.native_balance(wallet.address).await?;
    let token = state.ledger.token_balance(wallet.address).await?;
    Ok(WalletInfoEntry {
        user_id: user_id.to_string(),
        address: Some(wallet.address_hex()),
        gas: Some(
            ethers::utils::format_units(native, 18).unwrap_or_else(|_| native.to_string()),
        ),
        token: Some(
            ethers::utils::format_units(token, 18).unwrap_or_else(|_| token.to_string()),
        ),
        error: None,
    })
}
