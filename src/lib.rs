//! VaultForge - 托管热钱包资金调度引擎
//!
//! 单种子派生用户充值地址、Gas 阈值维护、存款归集（sweep）与提现任务调度

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod security;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, WalletError};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{
            derivation::AddressDeriver,
            withdrawal_job::{JobStatus, WithdrawalJob},
        },
        error::{AppError, WalletError},
        service::withdrawal_dispatcher::WithdrawalDispatcher,
    };
}
