//! 提现链路集成测试
//!
//! 用内存队列后端 + Mock 链客户端跑完整的 submit -> execute -> 终态流程。

mod common;

use std::sync::{atomic::Ordering, Arc};

use common::{memory_dispatcher, units, wait_for_terminal, MockLedger, TREASURY_ADDR};
use vaultforge::{
    domain::JobStatus, error::WalletError, service::ledger_client::LedgerClient,
};

const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

#[tokio::test]
async fn test_withdrawal_happy_path_reaches_completed() {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let dispatcher = memory_dispatcher(ledger.clone());

    let id = dispatcher.submit(RECIPIENT, "2.5", "7").await.unwrap();

    let job = wait_for_terminal(&dispatcher, id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.tx_hash.as_deref().is_some_and(|h| !h.is_empty()));
    assert!(job.error.is_none());
    assert!(job.completed_at.is_some());
    assert_eq!(ledger.token_transfers.load(Ordering::SeqCst), 1);

    // 收款方实际到账
    let received = ledger
        .token_balance(RECIPIENT.parse().unwrap())
        .await
        .unwrap();
    assert_eq!(received, units("2.5"));
}

#[tokio::test]
async fn test_insufficient_treasury_balance_rejects_synchronously() {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("1"));
    let dispatcher = memory_dispatcher(ledger.clone());

    let err = dispatcher
        .submit(RECIPIENT, "5", "7")
        .await
        .expect_err("submit should fail before any job is created");

    match err {
        WalletError::InsufficientTreasuryBalance { required, .. } => {
            assert_eq!(required, "5");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // 链上无任何动作
    assert_eq!(ledger.token_transfers.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_address_and_amount_reject_synchronously() {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let dispatcher = memory_dispatcher(ledger);

    assert!(matches!(
        dispatcher.submit("not-an-address", "1", "7").await,
        Err(WalletError::InvalidAddress(_))
    ));
    assert!(matches!(
        dispatcher.submit(RECIPIENT, "0", "7").await,
        Err(WalletError::InvalidAmount(_))
    ));
    assert!(matches!(
        dispatcher.submit(RECIPIENT, "-3", "7").await,
        Err(WalletError::InvalidAmount(_))
    ));
}

#[tokio::test]
async fn test_failed_transfer_marks_job_failed() {
    let ledger = Arc::new(MockLedger::failing_transfers());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let dispatcher = memory_dispatcher(ledger);

    let id = dispatcher.submit(RECIPIENT, "1", "7").await.unwrap();

    let job = wait_for_terminal(&dispatcher, id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_reverted_transaction_marks_job_failed_with_hash() {
    let ledger = Arc::new(MockLedger::reverting());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let dispatcher = memory_dispatcher(ledger);

    let id = dispatcher.submit(RECIPIENT, "1", "7").await.unwrap();

    let job = wait_for_terminal(&dispatcher, id).await;
    assert_eq!(job.status, JobStatus::Failed);
    // 已广播的哈希保留在记录上，便于排查
    assert!(job.tx_hash.is_some());
    assert!(job.error.as_deref().is_some_and(|e| e.contains("reverted")));
}

#[tokio::test]
async fn test_stalled_confirmation_times_out_and_keeps_hash() {
    // 确认环节卡住，远超 1 秒的转账时限
    let ledger = Arc::new(MockLedger::stalled(std::time::Duration::from_secs(30)));
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let mut cfg = common::test_queue_config();
    cfg.transfer_timeout_secs = 1;
    let dispatcher = common::memory_dispatcher_with(ledger.clone(), cfg);

    let id = dispatcher.submit(RECIPIENT, "1", "7").await.unwrap();

    let job = wait_for_terminal(&dispatcher, id).await;
    assert_eq!(job.status, JobStatus::Failed);
    // 超时语义是"链上结果未知"，不是已回滚
    assert!(job
        .error
        .as_deref()
        .is_some_and(|e| e.contains("outcome unknown")));
    // 广播已经发生，哈希保留在记录上
    assert!(job.tx_hash.as_deref().is_some_and(|h| !h.is_empty()));
    assert_eq!(ledger.token_transfers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_job_status_unknown_id_returns_none() {
    let ledger = Arc::new(MockLedger::new());
    let dispatcher = memory_dispatcher(ledger);

    let missing = dispatcher.job_status(uuid::Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_concurrent_submissions_each_get_distinct_jobs() {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_token(TREASURY_ADDR.parse().unwrap(), units("100"));
    let dispatcher = memory_dispatcher(ledger.clone());

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(dispatcher.submit(RECIPIENT, "1", "7").await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);

    for id in ids {
        let job = wait_for_terminal(&dispatcher, id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }
    assert_eq!(ledger.token_transfers.load(Ordering::SeqCst), 4);
}
