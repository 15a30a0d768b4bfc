//! Gas 阈值维护
//!
//! 派生地址发起代币转账前必须持有足够原生币付手续费。
//! 余额低于阈值时由国库充值一笔固定额度，并等确认后才返回。

use std::{sync::Arc, time::Duration};

use ethers::types::{Address, U256};

use crate::{
    config::GasConfig,
    domain::TreasuryContext,
    error::WalletError,
    service::ledger_client::LedgerClient,
};

pub struct GasMaintainer {
    ledger: Arc<dyn LedgerClient>,
    treasury: Arc<TreasuryContext>,
    threshold: U256,
    top_up_amount: U256,
    confirmation_timeout: Duration,
}

impl GasMaintainer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        treasury: Arc<TreasuryContext>,
        cfg: &GasConfig,
    ) -> anyhow::Result<Self> {
        let threshold: U256 = ethers::utils::parse_units(&cfg.threshold, 18)
            .map_err(|e| anyhow::anyhow!("invalid gas threshold: {}", e))?
            .into();
        let top_up_amount: U256 = ethers::utils::parse_units(&cfg.top_up_amount, 18)
            .map_err(|e| anyhow::anyhow!("invalid gas top-up amount: {}", e))?
            .into();
        Ok(Self {
            ledger,
            treasury,
            threshold,
            top_up_amount,
            confirmation_timeout: Duration::from_secs(cfg.confirmation_timeout_secs),
        })
    }

    /// 余额低于阈值时充值并等确认，返回交易哈希；余额充足返回 None。
    ///
    /// 每次调用至多一笔转账，失败不在内部重试，由调用方决定。
    pub async fn ensure_gas(&self, address: Address) -> Result<Option<String>, WalletError> {
        let balance = self.ledger.native_balance(address).await?;
        if balance >= self.threshold {
            return Ok(None);
        }

        // 国库原生币必须足够覆盖这笔充值
        let treasury_balance = self.ledger.native_balance(self.treasury.address).await?;
        if treasury_balance < self.top_up_amount {
            return Err(WalletError::InsufficientTreasuryFunds(format!(
                "treasury holds {} wei, top-up needs {} wei",
                treasury_balance, self.top_up_amount
            )));
        }

        let tx_hash = self
            .ledger
            .send_native(&self.treasury.signer, address, self.top_up_amount)
            .await?;

        tracing::info!(
            address = %format!("{:#x}", address),
            tx_hash = %tx_hash,
            "Gas top-up broadcast, waiting for confirmation"
        );

        let outcome = self
            .ledger
            .wait_for_confirmation(&tx_hash, self.confirmation_timeout)
            .await?;

        if !outcome.success {
            return Err(WalletError::ChainCommunication(format!(
                "gas top-up transaction reverted: {}",
                tx_hash
            )));
        }

        Ok(Some(tx_hash))
    }
}
