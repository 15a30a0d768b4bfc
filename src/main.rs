//! VaultForge 主入口
//! 托管热钱包资金调度引擎

use std::sync::Arc;

use anyhow::Result;
use vaultforge::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{credentials::WalletCredentials, logging::init_logging},
    service::ledger_client::EvmLedger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指定 TOML，缺省走环境变量+默认值）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // 3. 初始化日志，guard 要持有到进程结束
    let _log_guard = init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("logging initialization failed: {}", e))?;

    tracing::info!("🚀 Starting VaultForge fund movement engine");

    // 4. 加载钱包凭据并连链
    let credentials = WalletCredentials::from_env()?;
    let ledger = Arc::new(EvmLedger::new(&config.chain)?);
    tracing::info!(
        rpc_url = %config.chain.rpc_url,
        chain_id = config.chain.chain_id,
        "✅ Chain client ready"
    );

    // 5. 装配应用状态（含队列后端探测）
    let bind_addr = config.server.bind_addr.clone();
    let workers = config.queue.workers;
    let state = Arc::new(AppState::new(config, &credentials, ledger).await?);
    tracing::info!(
        treasury = %state.treasury.address_hex(),
        queue_backend = state.dispatcher.backend_name(),
        "✅ Application state assembled"
    );

    // 6. 持久化队列才有 worker 池，内存模式在 submit 时直接 spawn
    state.dispatcher.start_workers(workers);

    // 7. 启动 HTTP 服务
    let app = api::routes(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("✅ Listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
