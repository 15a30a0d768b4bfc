//! 链客户端门面
//!
//! 资金调度引擎只通过这个窄接口碰链：两种余额查询、两种转账、
//! 确认等待。nonce 分配由底层 RPC 节点按账户串行，这里不做协调。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    contract::abigen,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::LocalWallet,
    types::{Address, TransactionRequest, TxHash, U256},
};

use crate::{config::ChainConfig, error::WalletError};

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address owner) view returns (uint256)
        function transfer(address to, uint256 amount) returns (bool)
    ]"#
);

/// 确认结果
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: String,
    pub success: bool,
}

/// 链访问契约
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// 原生币余额（wei）
    async fn native_balance(&self, address: Address) -> Result<U256, WalletError>;

    /// 稳定币余额（最小单位）
    async fn token_balance(&self, address: Address) -> Result<U256, WalletError>;

    /// 原生币转账，返回交易哈希（广播即返回，不等确认）
    async fn send_native(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError>;

    /// 稳定币转账，返回交易哈希（广播即返回，不等确认）
    async fn send_token(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError>;

    /// 轮询等待交易确认，超时返回 `WalletError::Timeout`
    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<TxOutcome, WalletError>;
}

/// 基于 JSON-RPC 的 EVM 实现
pub struct EvmLedger {
    provider: Provider<Http>,
    token: Address,
}

/// 确认轮询间隔
const POLL_INTERVAL: Duration = Duration::from_secs(2);

impl EvmLedger {
    pub fn new(cfg: &ChainConfig) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(cfg.rpc_url.as_str())
            .map_err(|e| anyhow::anyhow!("Invalid RPC url {}: {}", cfg.rpc_url, e))?;
        let token: Address = cfg
            .token_contract
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid token contract address: {}", e))?;
        Ok(Self { provider, token })
    }

    fn chain_err(e: impl std::fmt::Display) -> WalletError {
        WalletError::ChainCommunication(e.to_string())
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    async fn native_balance(&self, address: Address) -> Result<U256, WalletError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(Self::chain_err)
    }

    async fn token_balance(&self, address: Address) -> Result<U256, WalletError> {
        let contract = Erc20Token::new(self.token, Arc::new(self.provider.clone()));
        contract
            .balance_of(address)
            .call()
            .await
            .map_err(Self::chain_err)
    }

    async fn send_native(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError> {
        let client = SignerMiddleware::new(self.provider.clone(), signer.clone());
        let tx = TransactionRequest::new().to(to).value(amount);
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(Self::chain_err)?;
        Ok(format!("{:#x}", pending.tx_hash()))
    }

    async fn send_token(
        &self,
        signer: &LocalWallet,
        to: Address,
        amount: U256,
    ) -> Result<String, WalletError> {
        let client = Arc::new(SignerMiddleware::new(self.provider.clone(), signer.clone()));
        let contract = Erc20Token::new(self.token, client);
        let call = contract.transfer(to, amount);
        let pending = call.send().await.map_err(Self::chain_err)?;
        Ok(format!("{:#x}", pending.tx_hash()))
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<TxOutcome, WalletError> {
        let hash: TxHash = tx_hash
            .parse()
            .map_err(|e| WalletError::ChainCommunication(format!("bad tx hash: {}", e)))?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(Self::chain_err)?;

            if let Some(receipt) = receipt {
                return Ok(TxOutcome {
                    tx_hash: tx_hash.to_string(),
                    success: receipt.status == Some(1.into()),
                });
            }

            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Err(WalletError::Timeout(timeout.as_secs()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
