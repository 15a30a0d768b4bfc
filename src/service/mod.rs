pub mod gas_maintainer;
pub mod ledger_client;
pub mod sweep_service;
pub mod webhook_notifier;
pub mod withdrawal_dispatcher;
