//! §3 `TokenVersion` — the versioned entity driven through the state
//! machine. Struct shape follows `TradeDetails`'s builder idiom
//! (`src/trade.rs`) generalized from a single trade document to a
//! version-chained token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::state_machine::VersionStatus;
use crate::ids::{RequestId, TokenId, ValidatorId, VersionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenVersion {
    pub id: VersionId,
    pub parent_token_id: TokenId,
    pub version_number: u64,

    pub content: Vec<u8>,
    pub merkle_hash: Option<String>,

    pub previous_version_id: Option<VersionId>,
    pub replaced_by_version_id: Option<VersionId>,

    pub status: VersionStatus,

    pub approval_request_id: Option<RequestId>,
    pub approval_threshold_percent: Option<f64>,
    pub approved_by_count: Option<u32>,
    pub approval_timestamp: Option<DateTime<Utc>>,
    pub approver_ids: Vec<ValidatorId>,
    pub activated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub replaced_at: Option<DateTime<Utc>>,
}

impl TokenVersion {
    /// Construct a new CREATED version. `previous_version_id` chains it to
    /// a prior version of the same token, if any.
    pub fn new(parent_token_id: TokenId, version_number: u64, content: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: VersionId::new(),
            parent_token_id,
            version_number,
            content,
            merkle_hash: None,
            previous_version_id: None,
            replaced_by_version_id: None,
            status: VersionStatus::Created,
            approval_request_id: None,
            approval_threshold_percent: None,
            approved_by_count: None,
            approval_timestamp: None,
            approver_ids: Vec::new(),
            activated_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            archived_at: None,
            replaced_at: None,
        }
    }

    pub fn with_previous_version(mut self, previous: VersionId) -> Self {
        self.previous_version_id = Some(previous);
        self
    }

    /// Compute and cache the content hash, idempotently.
    pub fn ensure_merkle_hash(&mut self) {
        if self.merkle_hash.is_none() {
            self.merkle_hash = Some(sha256::digest(&self.content));
        }
    }

    /// §3 invariant checks, used by stores before a write lands. Each
    /// violation is a logic error in the core, not caller input, so these
    /// are asserted rather than surfaced as a typed error.
    pub fn check_invariants(&self) {
        match self.status {
            VersionStatus::Active => {
                debug_assert!(self.merkle_hash.is_some(), "ACTIVE version must have a merkle_hash");
            }
            VersionStatus::Replaced => {
                debug_assert!(self.replaced_at.is_some() && self.replaced_by_version_id.is_some());
            }
            VersionStatus::Rejected => {
                debug_assert!(self.rejection_reason.is_some());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_version_starts_created_without_merkle_hash() {
        let v = TokenVersion::new(TokenId::new(), 1, vec![1, 2, 3]);
        assert_eq!(v.status, VersionStatus::Created);
        assert!(v.merkle_hash.is_none());
    }

    #[test]
    fn ensure_merkle_hash_is_idempotent() {
        let mut v = TokenVersion::new(TokenId::new(), 1, vec![1, 2, 3]);
        v.ensure_merkle_hash();
        let first = v.merkle_hash.clone();
        v.ensure_merkle_hash();
        assert_eq!(v.merkle_hash, first);
    }
}
