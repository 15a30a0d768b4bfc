//! 集成测试公共设施：内存 Mock 链客户端和组件装配辅助
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, U256},
};
use uuid::Uuid;
use vaultforge::{
    config::{GasConfig, QueueConfig, WebhookConfig},
    domain::{TreasuryContext, WithdrawalJob},
    error::WalletError,
    infrastructure::{
        credentials::WalletCredentials,
        queue::{MemoryJobStore, QueueBackend},
    },
    service::{
        ledger_client::{LedgerClient, TxOutcome},
        webhook_notifier::WebhookNotifier,
        withdrawal_dispatcher::WithdrawalDispatcher,
    },
};

/// hardhat account #0，公开测试密钥
pub const TREASURY_PK: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TREASURY_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// BIP39 标准测试助记词
pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// 可配置行为的内存链客户端
#[derive(Default)]
pub struct MockLedger {
    native: Mutex<HashMap<Address, U256>>,
    token: Mutex<HashMap<Address, U256>>,
    /// send_token 直接报错
    pub fail_token_transfer: bool,
    /// 确认回执返回 success=false
    pub revert_on_chain: bool,
    /// 确认迟迟不返回（模拟链上拥堵）
    pub confirmation_delay: Option<Duration>,
    pub native_transfers: AtomicUsize,
    pub token_transfers: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_transfers() -> Self {
        Self {
            fail_token_transfer: true,
            ..Self::default()
        }
    }

    pub fn reverting() -> Self {
        Self {
            revert_on_chain: true,
            ..Self::default()
        }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            confirmation_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_native(&self, address: Address, amount: U256) {
        self.native.lock().unwrap().insert(address, amount);
    }

    pub fn set_token(&self, address: Address, amount: U256) {
        self.token.lock().unwrap().insert(address, amount);
    }

    fn next_hash(&self) -> String {
        format!("0xmock{:08x}", Uuid::new_v4().as_u128() as u32)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn native_balance(&self, address: Address) -> Result<U256, WalletError> {
        Ok(self
            .native
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(&self, address: Address) -> Result<U256, WalletError> {
        Ok(self
            .token
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn send_native(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError> {
        let from = signer.address();
        let mut native = self.native.lock().unwrap();
        let balance = native.get(&from).copied().unwrap_or_default();
        if balance < amount {
            return Err(WalletError::ChainCommunication(
                "mock: insufficient native balance".into(),
            ));
        }
        native.insert(from, balance - amount);
        *native.entry(to).or_default() += amount;
        self.native_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_hash())
    }

    async fn send_token(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError> {
        if self.fail_token_transfer {
            return Err(WalletError::ChainCommunication(
                "mock: transfer rejected".into(),
            ));
        }
        let from = signer.address();
        let mut token = self.token.lock().unwrap();
        let balance = token.get(&from).copied().unwrap_or_default();
        if balance < amount {
            return Err(WalletError::ChainCommunication(
                "mock: insufficient token balance".into(),
            ));
        }
        token.insert(from, balance - amount);
        *token.entry(to).or_default() += amount;
        self.token_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_hash())
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        _timeout: Duration,
    ) -> Result<TxOutcome, WalletError> {
        if let Some(delay) = self.confirmation_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(TxOutcome {
            tx_hash: tx_hash.to_string(),
            success: !self.revert_on_chain,
        })
    }
}

pub fn test_credentials() -> WalletCredentials {
    WalletCredentials {
        mnemonic: TEST_MNEMONIC.to_string(),
        treasury_address: TREASURY_ADDR.parse().unwrap(),
        treasury_private_key: TREASURY_PK.to_string(),
    }
}

pub fn test_treasury() -> Arc<TreasuryContext> {
    Arc::new(TreasuryContext::new(&test_credentials(), 56).unwrap())
}

pub fn test_queue_config() -> QueueConfig {
    QueueConfig {
        redis_url: "redis://127.0.0.1:1".into(),
        workers: 1,
        connect_retries: 0,
        connect_retry_delay_secs: 0,
        transfer_timeout_secs: 5,
    }
}

pub fn test_gas_config() -> GasConfig {
    GasConfig {
        threshold: "0.0005".into(),
        top_up_amount: "0.001".into(),
        confirmation_timeout_secs: 5,
    }
}

pub fn noop_notifier() -> Arc<WebhookNotifier> {
    Arc::new(WebhookNotifier::new(&WebhookConfig {
        url: None,
        secret: None,
        timeout_secs: 1,
        max_attempts: 1,
    }))
}

/// 内存后端调度器，测试里不依赖 Redis
pub fn memory_dispatcher(ledger: Arc<MockLedger>) -> WithdrawalDispatcher {
    memory_dispatcher_with(ledger, test_queue_config())
}

pub fn memory_dispatcher_with(ledger: Arc<MockLedger>, cfg: QueueConfig) -> WithdrawalDispatcher {
    WithdrawalDispatcher::new(
        ledger,
        test_treasury(),
        QueueBackend::InMemory(MemoryJobStore::new()),
        noop_notifier(),
        &cfg,
    )
}

/// 轮询任务直到终态，超时 panic
pub async fn wait_for_terminal(dispatcher: &WithdrawalDispatcher, id: Uuid) -> WithdrawalJob {
    for _ in 0..100 {
        if let Some(job) = dispatcher.job_status(id).await.unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not reach a terminal state in time", id);
}

/// 18 位小数定点
pub fn units(amount: &str) -> U256 {
    ethers::utils::parse_units(amount, 18).unwrap().into()
}
