//! 提现调度器
//!
//! 入口同步做校验和余额检查，通过后任务异步执行：
//! - Redis 可用：任务 id 入列表，由 worker 池 BRPOP 认领
//! - 内存降级：直接 spawn 执行
//!
//! 每个任务恰好被执行一次（BRPOP 原子弹出 / spawn 一次），
//! 终态恰好触发一次 webhook 通知。

use std::{sync::Arc, time::Duration};

use ethers::types::{Address, U256};
use uuid::Uuid;

use crate::{
    config::QueueConfig,
    domain::{JobStatus, TreasuryContext, WithdrawalJob},
    error::WalletError,
    infrastructure::queue::QueueBackend,
    service::{
        ledger_client::LedgerClient,
        webhook_notifier::{EventKind, NotificationEvent, WebhookNotifier},
    },
};

/// 提现调度器。全 Arc 字段，Clone 廉价，execute_job 可被 spawn。
#[derive(Clone)]
pub struct WithdrawalDispatcher {
    ledger: Arc<dyn LedgerClient>,
    treasury: Arc<TreasuryContext>,
    backend: QueueBackend,
    notifier: Arc<WebhookNotifier>,
    transfer_timeout: Duration,
}

impl WithdrawalDispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        treasury: Arc<TreasuryContext>,
        backend: QueueBackend,
        notifier: Arc<WebhookNotifier>,
        cfg: &QueueConfig,
    ) -> Self {
        Self {
            ledger,
            treasury,
            backend,
            notifier,
            transfer_timeout: Duration::from_secs(cfg.transfer_timeout_secs),
        }
    }

    /// 接收一笔提现请求。
    ///
    /// 同步阶段完成全部拒绝性检查（地址、金额、国库余额），
    /// 通过后创建任务并入队，返回任务 id。余额不足不创建任务。
    pub async fn submit(
        &self,
        to: &str,
        amount: &str,
        user_id: &str,
    ) -> Result<Uuid, WalletError> {
        let _recipient = parse_recipient(to)?;
        let required = parse_amount(amount)?;

        // 余额检查在入队前做，避免明知失败还占用 worker
        let available = self.ledger.token_balance(self.treasury.address).await?;
        if available < required {
            return Err(WalletError::InsufficientTreasuryBalance {
                available: ethers::utils::format_units(available, 18)
                    .unwrap_or_else(|_| available.to_string()),
                required: amount.to_string(),
            });
        }

        let job = WithdrawalJob::new(to.to_string(), amount.to_string(), user_id.to_string());
        let id = job.id;
        self.backend.store_job(&job).await?;

        match &self.backend {
            QueueBackend::Durable(queue) => {
                queue.push(id).await?;
                tracing::info!(job_id = %id, user_id, amount, "Withdrawal job queued (redis)");
            }
            QueueBackend::InMemory(_) => {
                let dispatcher = self.clone();
                tokio::spawn(async move { dispatcher.execute_job(id).await });
                tracing::info!(job_id = %id, user_id, amount, "Withdrawal job spawned (memory)");
            }
        }

        Ok(id)
    }

    /// 启动 worker 池（仅持久化后端）。每个 worker 循环 BRPOP 认领任务。
    pub fn start_workers(&self, count: usize) {
        let queue = match &self.backend {
            QueueBackend::Durable(queue) => queue.clone(),
            QueueBackend::InMemory(_) => return,
        };

        for worker_id in 0..count {
            let dispatcher = self.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                tracing::info!(worker_id, "Withdrawal worker started");
                loop {
                    match queue.claim().await {
                        Ok(Some(job_id)) => {
                            dispatcher.execute_job(job_id).await;
                        }
                        Ok(None) => {} // BRPOP 超时，继续轮询
                        Err(e) => {
                            tracing::error!(worker_id, error = %e, "Worker claim failed, backing off");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }
    }

    /// 查询任务当前记录
    pub async fn job_status(&self, id: Uuid) -> Result<Option<WithdrawalJob>, WalletError> {
        self.backend.load_job(id).await
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// 执行一个已入队的任务直至终态。
    ///
    /// 终态或缺失的任务直接跳过（崩溃恢复后重复认领的保护），
    /// 所有失败路径都落到 failed + 一次通知，不向调用方传播。
    pub async fn execute_job(&self, id: Uuid) {
        let mut job = match self.backend.load_job(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id = %id, "Claimed job has no record, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to load claimed job");
                return;
            }
        };
        if job.status.is_terminal() {
            tracing::warn!(job_id = %id, status = %job.status, "Job already terminal, skipping");
            return;
        }

        if let Err(e) = job.transition(JobStatus::InProgress) {
            tracing::error!(job_id = %id, error = %e, "Job transition rejected, skipping");
            return;
        }
        if let Err(e) = self.backend.store_job(&job).await {
            tracing::error!(job_id = %id, error = %e, "Failed to persist in_progress state");
        }

        match self.run_transfer(&mut job).await {
            Ok(tx_hash) => {
                tracing::info!(job_id = %id, tx_hash = %tx_hash, "Withdrawal completed");
                if let Err(e) = job.mark_completed(tx_hash) {
                    tracing::error!(job_id = %id, error = %e, "Completed transition rejected");
                }
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Withdrawal failed");
                if let Err(te) = job.mark_failed(e.to_string()) {
                    tracing::error!(job_id = %id, error = %te, "Failed transition rejected");
                }
            }
        }

        if let Err(e) = self.backend.store_job(&job).await {
            tracing::error!(job_id = %id, error = %e, "Failed to persist terminal state");
        }

        self.notifier
            .notify(NotificationEvent {
                kind: EventKind::Withdrawal,
                user_id: job.user_id.clone(),
                status: job.status.as_str().to_string(),
                amount: Some(job.amount.clone()),
                tx_hash: job.tx_hash.clone(),
                from: Some(self.treasury.address_hex()),
                to: Some(job.to.clone()),
                error: job.error.clone(),
            })
            .await;
    }

    /// 发起链上转账并等待确认。整体受 transfer_timeout 约束。
    async fn run_transfer(&self, job: &mut WithdrawalJob) -> Result<String, WalletError> {
        // 入队后余额可能被并发任务消耗，执行前再查一次
        let recipient = parse_recipient(&job.to)?;
        let required = parse_amount(&job.amount)?;
        let available = self.ledger.token_balance(self.treasury.address).await?;
        if available < required {
            return Err(WalletError::InsufficientTreasuryBalance {
                available: ethers::utils::format_units(available, 18)
                    .unwrap_or_else(|_| available.to_string()),
                required: job.amount.clone(),
            });
        }

        let transfer = async {
            let tx_hash = self
                .ledger
                .send_token(&self.treasury.signer, recipient, required)
                .await?;
            // 广播成功后先记下哈希，超时场景下留给排查
            job.tx_hash = Some(tx_hash.clone());
            let outcome = self
                .ledger
                .wait_for_confirmation(&tx_hash, self.transfer_timeout)
                .await?;
            if !outcome.success {
                return Err(WalletError::ChainCommunication(format!(
                    "transaction reverted: {}",
                    outcome.tx_hash
                )));
            }
            Ok(outcome.tx_hash)
        };

        match tokio::time::timeout(self.transfer_timeout, transfer).await {
            Ok(result) => result,
            // 超时语义是"链上结果未知"，不是已失败
            Err(_) => Err(WalletError::Timeout(self.transfer_timeout.as_secs())),
        }
    }
}

/// 解析并校验收款地址：0x 前缀、42 字符、合法十六进制
fn parse_recipient(to: &str) -> Result<Address, WalletError> {
    if !to.starts_with("0x") || to.len() != 42 {
        return Err(WalletError::InvalidAddress(to.to_string()));
    }
    to.parse::<Address>()
        .map_err(|_| WalletError::InvalidAddress(to.to_string()))
}

/// 解析并校验金额：18 位小数定点、大于 0
fn parse_amount(amount: &str) -> Result<U256, WalletError> {
    // parse_units 会把负数解析成 I256，这里必须显式拒绝
    let parsed = match ethers::utils::parse_units(amount, 18) {
        Ok(ethers::utils::ParseUnits::U256(v)) => v,
        Ok(ethers::utils::ParseUnits::I256(_)) => {
            return Err(WalletError::InvalidAmount(format!(
                "{}: must not be negative",
                amount
            )))
        }
        Err(e) => return Err(WalletError::InvalidAmount(format!("{}: {}", amount, e))),
    };
    if parsed.is_zero() {
        return Err(WalletError::InvalidAmount(format!(
            "{}: must be greater than zero",
            amount
        )));
    }
    Ok(parsed)
}
