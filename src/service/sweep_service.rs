//! 存款归集
//!
//! 把用户派生地址上的全部代币余额转入国库，用派生私钥签名。
//! 零余额直接返回 None：不发交易、不发通知。

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
    domain::{AddressDeriver, TreasuryContext},
    error::WalletError,
    service::{gas_maintainer::GasMaintainer, ledger_client::LedgerClient},
};

/// 归集结果
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub amount: String,
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    /// 链上回执状态
    pub confirmed: bool,
}

pub struct SweepService {
    deriver: Arc<AddressDeriver>,
    ledger: Arc<dyn LedgerClient>,
    gas: Arc<GasMaintainer>,
    treasury: Arc<TreasuryContext>,
    confirmation_timeout: Duration,
}

impl SweepService {
    pub fn new(
        deriver: Arc<AddressDeriver>,
        ledger: Arc<dyn LedgerClient>,
        gas: Arc<GasMaintainer>,
        treasury: Arc<TreasuryContext>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            deriver,
            ledger,
            gas,
            treasury,
            confirmation_timeout,
        }
    }

    /// 纯归集：不碰 Gas，余额为零时无副作用
    ///
    /// 对不同索引并发调用是安全的；同一索引并发归集可能在链上竞争，
    /// 这里不做应用层互斥。
    pub async fn sweep(&self, index: u32) -> Result<Option<SweepOutcome>, WalletError> {
        let wallet = self.deriver.derive(index)?;
        let balance = self.ledger.token_balance(wallet.address).await?;

        if balance.is_zero() {
            tracing::debug!(index, address = %wallet.address_hex(), "No funds to sweep");
            return Ok(None);
        }

        let tx_hash = self
            .ledger
            .send_token(&wallet.signer, self.treasury.address, balance)
            .await?;

        let outcome = self
            .ledger
            .wait_for_confirmation(&tx_hash, self.confirmation_timeout)
            .await?;

        let amount = ethers::utils::format_units(balance, 18)
            .map_err(|e| WalletError::Internal(format!("amount formatting failed: {}", e)))?;

        tracing::info!(
            index,
            amount = %amount,
            tx_hash = %tx_hash,
            confirmed = outcome.success,
            "Sweep transfer done"
        );

        Ok(Some(SweepOutcome {
            amount,
            tx_hash,
            from: wallet.address_hex(),
            to: self.treasury.address_hex(),
            confirmed: outcome.success,
        }))
    }

    /// 组合操作：先补 Gas 再归集
    pub async fn sweep_with_gas(&self, index: u32) -> Result<Option<SweepOutcome>, WalletError> {
        let wallet = self.deriver.derive(index)?;

        // 没有可归集余额时连 Gas 都不补，避免浪费国库原生币
        let balance = self.ledger.token_balance(wallet.address).await?;
        if balance.is_zero() {
            return Ok(None);
        }

        self.gas.ensure_gas(wallet.address).await?;
        self.sweep(index).await
    }
}
