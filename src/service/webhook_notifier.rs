//! Webhook 通知服务
//!
//! 每个终态资金变动恰好触发一次投递尝试（内部至多 3 次 HTTP 重试）。
//! 投递失败只记日志，从不反向影响已完成的资金操作。

use std::time::Duration;

use serde::Serialize;

use crate::{config::WebhookConfig, security::hmac_signature};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Deposit,
    Withdrawal,
}

/// 终态资金变动事件（不含时间戳，时间戳在发送时生成）
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub user_id: String,
    pub status: String,
    pub amount: Option<String>,
    pub tx_hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub error: Option<String>,
}

/// 对端消费的 JSON 载荷
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(rename = "userId")]
    user_id: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<&'a str>,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    tx_hash: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    timestamp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Option<String>,
    secret: Option<String>,
    max_attempts: u32,
}

impl WebhookNotifier {
    pub fn new(cfg: &WebhookConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        if cfg.url.is_none() || cfg.secret.is_none() {
            tracing::warn!("Webhook url/secret not configured, notifications will be dropped");
        }

        Self {
            http,
            url: cfg.url.clone(),
            secret: cfg.secret.clone(),
            max_attempts: cfg.max_attempts.max(1),
        }
    }

    /// 投递一个事件。调用方视角 fire-and-forget：任何失败都在内部消化。
    pub async fn notify(&self, event: NotificationEvent) {
        let (url, secret) = match (&self.url, &self.secret) {
            (Some(url), Some(secret)) => (url, secret),
            _ => {
                tracing::info!(
                    kind = ?event.kind,
                    user_id = %event.user_id,
                    "Webhook unconfigured, dropping notification"
                );
                return;
            }
        };

        // 时间戳在发送时生成，不用事件自身的时间
        let timestamp = chrono::Utc::now().to_rfc3339();
        let payload = WebhookPayload {
            kind: event.kind,
            user_id: &event.user_id,
            status: &event.status,
            amount: event.amount.as_deref(),
            tx_hash: event.tx_hash.as_deref(),
            from: event.from.as_deref(),
            to: event.to.as_deref(),
            timestamp: &timestamp,
            error: event.error.as_deref(),
        };

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Webhook payload serialization failed");
                return;
            }
        };

        let signature = hmac_signature::sign(&body, &timestamp, secret);

        for attempt in 1..=self.max_attempts {
            let result = self
                .http
                .post(url)
                .header("Content-Type", "application/json")
                .header("X-Timestamp", &timestamp)
                .header("X-Hmac-Signature", &signature)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(
                        kind = ?event.kind,
                        user_id = %event.user_id,
                        status = %event.status,
                        attempt,
                        "Webhook notification delivered"
                    );
                    return;
                }
                Ok(resp) => {
                    tracing::warn!(
                        kind = ?event.kind,
                        http_status = %resp.status(),
                        attempt,
                        max_attempts = self.max_attempts,
                        "Webhook endpoint returned non-success"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        kind = ?event.kind,
                        error = %e,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Webhook request failed"
                    );
                }
            }

            // 线性退避：第 n 次失败后等 n 秒
            if attempt < self.max_attempts {
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        // 重试耗尽即丢弃，事件不落盘不回queue
        tracing::error!(
            kind = ?event.kind,
            user_id = %event.user_id,
            attempts = self.max_attempts,
            "Webhook delivery exhausted retries, dropping event"
        );
    }
}
