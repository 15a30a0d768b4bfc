//! 应用共享状态
//!
//! 启动时装配一次，之后以 `Arc<AppState>` 注入所有 handler。

use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    domain::{AddressDeriver, TreasuryContext},
    infrastructure::{credentials::WalletCredentials, queue::QueueBackend},
    service::{
        gas_maintainer::GasMaintainer,
        ledger_client::LedgerClient,
        sweep_service::SweepService,
        webhook_notifier::WebhookNotifier,
        withdrawal_dispatcher::WithdrawalDispatcher,
    },
};

pub struct AppState {
    pub config: Config,
    pub deriver: Arc<AddressDeriver>,
    pub treasury: Arc<TreasuryContext>,
    pub ledger: Arc<dyn LedgerClient>,
    pub gas: Arc<GasMaintainer>,
    pub sweeper: Arc<SweepService>,
    pub dispatcher: WithdrawalDispatcher,
    pub notifier: Arc<WebhookNotifier>,
}

impl AppState {
    /// 从配置和凭据装配全部服务组件。
    /// 队列后端在这里探测并固定，之后不再切换。
    pub async fn new(
        config: Config,
        credentials: &WalletCredentials,
        ledger: Arc<dyn LedgerClient>,
    ) -> anyhow::Result<Self> {
        let deriver = Arc::new(AddressDeriver::new(
            &credentials.mnemonic,
            config.chain.chain_id,
        )?);
        let treasury = Arc::new(TreasuryContext::new(credentials, config.chain.chain_id)?);

        let gas = Arc::new(GasMaintainer::new(
            ledger.clone(),
            treasury.clone(),
            &config.gas,
        )?);

        let sweeper = Arc::new(SweepService::new(
            deriver.clone(),
            ledger.clone(),
            gas.clone(),
            treasury.clone(),
            Duration::from_secs(config.gas.confirmation_timeout_secs),
        ));

        let notifier = Arc::new(WebhookNotifier::new(&config.webhook));

        let backend = QueueBackend::select(&config.queue).await;
        tracing::info!(backend = backend.name(), "Job queue backend selected");

        let dispatcher = WithdrawalDispatcher::new(
            ledger.clone(),
            treasury.clone(),
            backend,
            notifier.clone(),
            &config.queue,
        );

        Ok(Self {
            config,
            deriver,
            treasury,
            ledger,
            gas,
            sweeper,
            dispatcher,
            notifier,
        })
    }
}
