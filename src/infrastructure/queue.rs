//! 提现任务队列后端
//!
//! 两种后端在启动时二选一，进程生命周期内不切换：
//! - Durable: Redis 列表做待处理队列，任务记录以 JSON 存键值，
//!   BRPOP 原子弹出保证每个任务只被一个 worker 认领
//! - InMemory: Redis 不可达时的降级路径，任务只存进程内存，
//!   重启后不保留

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::{config::QueueConfig, domain::WithdrawalJob, error::WalletError};

const PENDING_LIST_KEY: &str = "vaultforge:withdrawals:pending";
const JOB_KEY_PREFIX: &str = "vaultforge:withdrawals:job:";
/// 任务记录保留 7 天，之后由 Redis 过期清理
const JOB_TTL_SECS: u64 = 7 * 24 * 3600;
/// BRPOP 阻塞时长，到期返回 None 让 worker 循环检查退出条件
const CLAIM_BLOCK_SECS: f64 = 5.0;

/// Redis 持久化队列
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    /// 带重试地建立连接，全部失败后由调用方降级为内存模式
    pub async fn connect(cfg: &QueueConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(cfg.redis_url.as_str())?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match Self::try_connect(&client).await {
                Ok(queue) => {
                    tracing::info!(attempt, "Redis job queue connected");
                    return Ok(queue);
                }
                Err(e) if attempt <= cfg.connect_retries => {
                    tracing::warn!(
                        attempt,
                        max_attempts = cfg.connect_retries + 1,
                        error = %e,
                        "Redis connection failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(cfg.connect_retry_delay_secs)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_connect(client: &redis::Client) -> anyhow::Result<Self> {
        let mut conn = ConnectionManager::new(client.clone()).await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        anyhow::ensure!(pong.eq_ignore_ascii_case("PONG"), "unexpected PING reply");
        Ok(Self { conn })
    }

    fn job_key(id: Uuid) -> String {
        format!("{}{}", JOB_KEY_PREFIX, id)
    }

    /// 写入/覆盖任务记录
    pub async fn store_job(&self, job: &WithdrawalJob) -> Result<(), WalletError> {
        let json = serde_json::to_string(job)
            .map_err(|e| WalletError::Internal(format!("job serialization failed: {}", e)))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::job_key(job.id), json, JOB_TTL_SECS)
            .await
            .map_err(|e| WalletError::QueueUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn load_job(&self, id: Uuid) -> Result<Option<WithdrawalJob>, WalletError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::job_key(id))
            .await
            .map_err(|e| WalletError::QueueUnavailable(e.to_string()))?;
        match raw {
            Some(json) => {
                let job = serde_json::from_str(&json)
                    .map_err(|e| WalletError::Internal(format!("corrupt job record: {}", e)))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// 任务 id 入队
    pub async fn push(&self, id: Uuid) -> Result<(), WalletError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(PENDING_LIST_KEY, id.to_string())
            .await
            .map_err(|e| WalletError::QueueUnavailable(e.to_string()))?;
        Ok(())
    }

    /// 阻塞认领一个任务 id
    ///
    /// BRPOP 的原子性保证同一 id 只被弹出一次，worker 间天然互斥。
    pub async fn claim(&self) -> Result<Option<Uuid>, WalletError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn
            .brpop(PENDING_LIST_KEY, CLAIM_BLOCK_SECS)
            .await
            .map_err(|e| WalletError::QueueUnavailable(e.to_string()))?;
        match popped {
            Some((_list, raw_id)) => {
                let id = Uuid::parse_str(&raw_id)
                    .map_err(|e| WalletError::Internal(format!("corrupt queue entry: {}", e)))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }
}

/// 内存任务存储（降级路径）
///
/// 并发 map：不同 key 的读互不加锁，同 key 写互斥。
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<Uuid, WithdrawalJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_job(&self, job: &WithdrawalJob) {
        self.jobs.insert(job.id, job.clone());
    }

    pub fn load_job(&self, id: Uuid) -> Option<WithdrawalJob> {
        self.jobs.get(&id).map(|j| j.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// 队列后端，启动时根据 Redis 健康探测选定一次
#[derive(Clone)]
pub enum QueueBackend {
    Durable(RedisJobQueue),
    InMemory(MemoryJobStore),
}

impl QueueBackend {
    /// 探测 Redis，可达则走持久化路径，否则降级
    pub async fn select(cfg: &QueueConfig) -> Self {
        match RedisJobQueue::connect(cfg).await {
            Ok(queue) => QueueBackend::Durable(queue),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Redis unreachable after retries, falling back to in-memory job store"
                );
                QueueBackend::InMemory(MemoryJobStore::new())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueueBackend::Durable(_) => "redis",
            QueueBackend::InMemory(_) => "memory",
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(self, QueueBackend::Durable(_))
    }

    pub async fn store_job(&self, job: &WithdrawalJob) -> Result<(), WalletError> {
        match self {
            QueueBackend::Durable(q) => q.store_job(job).await,
            QueueBackend::InMemory(s) => {
                s.store_job(job);
                Ok(())
            }
        }
    }

    pub async fn load_job(&self, id: Uuid) -> Result<Option<WithdrawalJob>, WalletError> {
        match self {
            QueueBackend::Durable(q) => q.load_job(id).await,
            QueueBackend::InMemory(s) => Ok(s.load_job(id)),
        }
    }
}
