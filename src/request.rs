//! §3 `ApprovalRequest` — the 1:1 voting envelope for a `TokenVersion`
//! pending VVB approval.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RequestId, VersionId};

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 66.67;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub token_version_id: VersionId,

    pub created_at: DateTime<Utc>,
    pub voting_window_seconds: u64,

    pub approval_threshold_percent: f64,
    pub total_validators: u32,

    pub approval_count: u32,
    pub rejection_count: u32,
    pub abstain_count: u32,

    pub status: RequestStatus,
}

impl ApprovalRequest {
    pub fn new(
        token_version_id: VersionId,
        total_validators: u32,
        voting_window_seconds: u64,
        approval_threshold_percent: f64,
    ) -> Self {
        Self {
            id: RequestId::new(),
            token_version_id,
            created_at: Utc::now(),
            voting_window_seconds,
            approval_threshold_percent,
            total_validators,
            approval_count: 0,
            rejection_count: 0,
            abstain_count: 0,
            status: RequestStatus::Pending,
        }
    }

    pub fn voting_window_end(&self) -> DateTime<Utc> {
        self.created_at + ChronoDuration::seconds(self.voting_window_seconds as i64)
    }

    /// §4.4 step 2: voting is closed once the request left PENDING or the
    /// window has elapsed. The boundary is inclusive of `voting_window_end`
    /// — a vote arriving exactly at the deadline is refused.
    pub fn voting_closed(&self, now: DateTime<Utc>) -> bool {
        self.status != RequestStatus::Pending || now >= self.voting_window_end()
    }
}
