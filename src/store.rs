//! §9 design note: "inheritance / entity frameworks" is replaced with plain
//! data types plus repository traits the core depends on. `VersionStore`,
//! `RequestStore`, and `AuditStore` are the only persistence contracts the
//! approval core knows about (§1 Non-goals: concrete persistence adapters
//! are an external collaborator).

use crate::audit::ExecutionAudit;
use crate::ids::{RequestId, TokenId, VersionId};
use crate::request::ApprovalRequest;
use crate::version::TokenVersion;
use crate::vote::ValidatorVote;

pub trait VersionStore: Send + Sync {
    fn get(&self, id: &VersionId) -> anyhow::Result<Option<TokenVersion>>;
    fn put(&self, version: &TokenVersion) -> anyhow::Result<()>;
    fn find_active_by_parent(&self, parent_token_id: &TokenId) -> anyhow::Result<Vec<TokenVersion>>;
    fn find_by_parent_and_number(
        &self,
        parent_token_id: &TokenId,
        version_number: u64,
    ) -> anyhow::Result<Option<TokenVersion>>;
    fn find_children_active(&self, previous_version_id: &VersionId) -> anyhow::Result<Vec<TokenVersion>>;
}

pub trait RequestStore: Send + Sync {
    fn get(&self, id: &RequestId) -> anyhow::Result<Option<ApprovalRequest>>;
    fn put(&self, request: &ApprovalRequest) -> anyhow::Result<()>;
    fn find_by_version(&self, version_id: &VersionId) -> anyhow::Result<Option<ApprovalRequest>>;
}

pub trait VoteStore: Send + Sync {
    /// Appends a vote. Callers (`ApprovalRegistry`) are responsible for
    /// rejecting duplicates before this is reached (§3 invariant: uniqueness
    /// of `(approval_request_id, validator_id)`).
    fn append(&self, vote: &ValidatorVote) -> anyhow::Result<()>;
    /// Chronologically ordered by `voted_at` (§6 `GET .../votes`).
    fn list_for_request(&self, request_id: &RequestId) -> anyhow::Result<Vec<ValidatorVote>>;
}

pub trait AuditStore: Send + Sync {
    /// Append-only: entries are never updated or deleted in normal operation (§3).
    fn append(&self, entry: &ExecutionAudit) -> anyhow::Result<()>;
    /// Ordered by `execution_timestamp` (§3 invariant: total order per version).
    fn list_for_version(&self, version_id: &VersionId) -> anyhow::Result<Vec<ExecutionAudit>>;
}
