//! 提现任务状态机
//!
//! queued -> in_progress -> completed | failed
//! 状态只许前进，终态后不再变更。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 合法迁移：queued -> in_progress -> {completed, failed}
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提现任务记录
///
/// 入队时创建，只由当前持有它的 worker 修改，同一时刻只有一个持有者。
/// failed 状态在超时场景下含义是"链上结果未知"，并非已回滚。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalJob {
    pub id: Uuid,
    pub to: String,
    /// 18 位小数定点金额（入队时已校验）
    pub amount: String,
    pub user_id: String,
    pub status: JobStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WithdrawalJob {
    pub fn new(to: String, amount: String, user_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            to,
            amount,
            user_id,
            status: JobStatus::Queued,
            tx_hash: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 状态迁移，非法迁移返回错误
    pub fn transition(&mut self, next: JobStatus) -> Result<(), WalletError> {
        if !self.status.can_transition_to(next) {
            return Err(WalletError::IllegalTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn mark_completed(&mut self, tx_hash: String) -> Result<(), WalletError> {
        self.tx_hash = Some(tx_hash);
        self.transition(JobStatus::Completed)
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), WalletError> {
        self.error = Some(error);
        self.transition(JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> WithdrawalJob {
        WithdrawalJob::new(
            "0x000000000000000000000000000000000000dead".into(),
            "1.5".into(),
            "42".into(),
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut j = job();
        assert_eq!(j.status, JobStatus::Queued);
        j.transition(JobStatus::InProgress).unwrap();
        j.mark_completed("0xabc".into()).unwrap();
        assert_eq!(j.status, JobStatus::Completed);
        assert!(j.completed_at.is_some());
        assert_eq!(j.tx_hash.as_deref(), Some("0xabc"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut j = job();
        j.transition(JobStatus::InProgress).unwrap();
        j.mark_failed("rpc down".into()).unwrap();

        // 终态后任何迁移都被拒绝
        assert!(j.transition(JobStatus::InProgress).is_err());
        assert!(j.transition(JobStatus::Completed).is_err());
        assert_eq!(j.status, JobStatus::Failed);
    }

    #[test]
    fn test_no_skipping_in_progress() {
        let mut j = job();
        assert!(j.transition(JobStatus::Completed).is_err());
        assert!(j.transition(JobStatus::Failed).is_err());
        assert_eq!(j.status, JobStatus::Queued);
    }

    #[test]
    fn test_status_serde_roundtrip() {
        let j = job();
        let json = serde_json::to_string(&j).unwrap();
        assert!(json.contains("\"queued\""));
        let back: WithdrawalJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, JobStatus::Queued);
        assert_eq!(back.id, j.id);
    }
}
