//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 链 RPC 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// 稳定币合约地址（BEP20 USDT）
    pub token_contract: String,
}

/// Gas 维护配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// 原生币余额低于该阈值时触发充值
    pub threshold: String,
    /// 每次充值的金额
    pub top_up_amount: String,
    /// 等待链上确认的时限（秒）
    pub confirmation_timeout_secs: u64,
}

/// 提现队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub redis_url: String,
    /// 持久化路径的工作协程数
    pub workers: usize,
    /// 启动时连接 Redis 的重试次数，全部失败后降级为内存模式
    pub connect_retries: u32,
    pub connect_retry_delay_secs: u64,
    /// 单笔提现转账的时限（秒）
    pub transfer_timeout_secs: u64,
}

/// Webhook 通知配置
///
/// url 或 secret 未配置时通知服务整体降级为 no-op。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("BSC_RPC")
                .unwrap_or_else(|_| "https://bsc-dataseed1.binance.org".into()),
            chain_id: std::env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(56),
            token_contract: std::env::var("TOKEN_CONTRACT")
                .unwrap_or_else(|_| "0x55d398326f99059fF775485246999027B3197955".into()),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            threshold: std::env::var("GAS_THRESHOLD").unwrap_or_else(|_| "0.0005".into()),
            top_up_amount: std::env::var("GAS_TOP_UP_AMOUNT").unwrap_or_else(|_| "0.001".into()),
            confirmation_timeout_secs: std::env::var("GAS_CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            workers: std::env::var("QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            connect_retries: std::env::var("QUEUE_CONNECT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            connect_retry_delay_secs: std::env::var("QUEUE_CONNECT_RETRY_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            transfer_timeout_secs: std::env::var("TRANSFER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("WEBHOOK_URL").ok(),
            secret: std::env::var("HMAC_SECRET").ok(),
            timeout_secs: std::env::var("WEBHOOK_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_attempts: std::env::var("WEBHOOK_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            chain: ChainConfig::default(),
            gas: GasConfig::default(),
            queue: QueueConfig::default(),
            webhook: WebhookConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        // Gas 金额必须是合法的 18 位小数定点
        ethers::utils::parse_units(&self.gas.threshold, 18)
            .map_err(|e| anyhow::anyhow!("GAS_THRESHOLD is not a valid amount: {}", e))?;
        ethers::utils::parse_units(&self.gas.top_up_amount, 18)
            .map_err(|e| anyhow::anyhow!("GAS_TOP_UP_AMOUNT is not a valid amount: {}", e))?;

        if !self.chain.token_contract.starts_with("0x") || self.chain.token_contract.len() != 42 {
            anyhow::bail!("TOKEN_CONTRACT must be a 0x-prefixed 20-byte hex address");
        }

        if self.queue.workers == 0 {
            anyhow::bail!("QUEUE_WORKERS must be at least 1");
        }

        if self.webhook.url.is_none() || self.webhook.secret.is_none() {
            tracing::warn!(
                "Webhook url or secret not configured - notifications will be dropped"
            );
        }

        Ok(())
    }
}
