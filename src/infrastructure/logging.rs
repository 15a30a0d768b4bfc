//! 日志系统配置模块
//! 支持结构化日志和可选的文件输出

use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 初始化日志系统
///
/// 返回的 guard 必须在 main 里持有到进程结束，否则文件日志会丢尾部。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut guard = None;

    if config.enable_file_logging {
        let log_dir = config
            .log_file_path
            .as_ref()
            .and_then(|p| Path::new(p).parent())
            .unwrap_or_else(|| Path::new("./logs"));

        std::fs::create_dir_all(log_dir)?;

        let file_appender = rolling::daily(log_dir, "vaultforge.log");
        let (non_blocking_appender, g) = non_blocking(file_appender);
        guard = Some(g);

        if config.format == "json" {
            Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_writer(non_blocking_appender).with_ansi(false))
                .with(fmt::layer().json())
                .init();
        } else {
            Registry::default()
                .with(filter)
                .with(fmt::layer().with_writer(non_blocking_appender).with_ansi(false))
                .with(fmt::layer().with_ansi(true))
                .init();
        }
    } else if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        Registry::default()
            .with(filter)
            .with(fmt::layer().with_ansi(true))
            .init();
    }

    Ok(guard)
}
