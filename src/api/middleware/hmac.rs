//! 入站 HMAC 验证中间件
//!
//! 调用方在 `X-Timestamp` / `X-Hmac-Signature` 头中携带签名：
//! - GET 请求签 timestamp 本身
//! - 其他方法签 raw_body || timestamp
//! 签名不合法统一返回 401，不区分缺头/错签。

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app_state::AppState, security::hmac_signature};

/// 请求体上限，防止恶意大包撑爆内存
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn hmac_auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let secret = match &state.config.webhook.secret {
        Some(secret) => secret.clone(),
        None => {
            // 未配置共享密钥时放行并告警（本地开发场景）
            tracing::warn!("HMAC_SECRET not configured, skipping inbound verification");
            return next.run(req).await;
        }
    };

    let timestamp = match header_str(&req, "X-Timestamp") {
        Some(v) => v,
        None => return unauthorized("missing X-Timestamp header"),
    };
    let signature = match header_str(&req, "X-Hmac-Signature") {
        Some(v) => v,
        None => return unauthorized("missing X-Hmac-Signature header"),
    };

    if req.method() == Method::GET {
        if !hmac_signature::verify(b"", &timestamp, &signature, &secret) {
            return unauthorized("invalid signature");
        }
        return next.run(req).await;
    }

    // 非 GET 需要消费 body 计算签名，验证后重建请求
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body for HMAC check");
            return unauthorized("unreadable request body");
        }
    };

    if !hmac_signature::verify(&bytes, &timestamp, &signature, &secret) {
        return unauthorized("invalid signature");
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    next.run(req).await
}

fn header_str(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn unauthorized(reason: &str) -> Response {
    tracing::warn!(reason, "Rejected request with invalid HMAC credentials");
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({
            "code": "UNAUTHORIZED",
            "message": "invalid or missing HMAC credentials",
        })),
    )
        .into_response()
}
