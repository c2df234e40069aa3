//! `dashmap`-backed `VersionStore`/`RequestStore`/`AuditStore`, generalizing
//! an in-memory indexing idiom (§4.3 `ApprovalRegistry`) to full
//! entity persistence. Used by the test suite and as the default store for
//! in-process wiring that doesn't need a real database.

use dashmap::DashMap;

use crate::audit::ExecutionAudit;
use crate::ids::{RequestId, TokenId, VersionId};
use crate::request::ApprovalRequest;
use crate::state_machine::VersionStatus;
use crate::store::{AuditStore, RequestStore, VersionStore, VoteStore};
use crate::version::TokenVersion;
use crate::vote::ValidatorVote;

#[derive(Default)]
pub struct InMemoryVersionStore {
    by_id: DashMap<VersionId, TokenVersion>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionStore for InMemoryVersionStore {
    fn get(&self, id: &VersionId) -> anyhow::Result<Option<TokenVersion>> {
        Ok(self.by_id.get(id).map(|v| v.clone()))
    }

    fn put(&self, version: &TokenVersion) -> anyhow::Result<()> {
        version.check_invariants();
        self.by_id.insert(version.id.clone(), version.clone());
        Ok(())
    }

    fn find_active_by_parent(&self, parent_token_id: &TokenId) -> anyhow::Result<Vec<TokenVersion>> {
        Ok(self
            .by_id
            .iter()
            .filter(|v| &v.parent_token_id == parent_token_id && v.status == VersionStatus::Active)
            .map(|v| v.clone())
            .collect())
    }

    fn find_by_parent_and_number(
        &self,
        parent_token_id: &TokenId,
        version_number: u64,
    ) -> anyhow::Result<Option<TokenVersion>> {
        Ok(self
            .by_id
            .iter()
            .find(|v| &v.parent_token_id == parent_token_id && v.version_number == version_number)
            .map(|v| v.clone()))
    }

    fn find_children_active(&self, previous_version_id: &VersionId) -> anyhow::Result<Vec<TokenVersion>> {
        Ok(self
            .by_id
            .iter()
            .filter(|v| {
                v.previous_version_id.as_ref() == Some(previous_version_id)
                    && v.status == VersionStatus::Active
            })
            .map(|v| v.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryRequestStore {
    by_id: DashMap<RequestId, ApprovalRequest>,
    by_version: DashMap<VersionId, RequestId>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for InMemoryRequestStore {
    fn get(&self, id: &RequestId) -> anyhow::Result<Option<ApprovalRequest>> {
        Ok(self.by_id.get(id).map(|r| r.clone()))
    }

    fn put(&self, request: &ApprovalRequest) -> anyhow::Result<()> {
        self.by_version
            .entry(request.token_version_id.clone())
            .or_insert_with(|| request.id.clone());
        self.by_id.insert(request.id.clone(), request.clone());
        Ok(())
    }

    fn find_by_version(&self, version_id: &VersionId) -> anyhow::Result<Option<ApprovalRequest>> {
        match self.by_version.get(version_id) {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct InMemoryVoteStore {
    by_request: DashMap<RequestId, Vec<ValidatorVote>>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoteStore for InMemoryVoteStore {
    fn append(&self, vote: &ValidatorVote) -> anyhow::Result<()> {
        self.by_request
            .entry(vote.approval_request_id.clone())
            .or_default()
            .push(vote.clone());
        Ok(())
    }

    fn list_for_request(&self, request_id: &RequestId) -> anyhow::Result<Vec<ValidatorVote>> {
        Ok(self.by_request.get(request_id).map(|v| v.clone()).unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    by_version: DashMap<VersionId, Vec<ExecutionAudit>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, entry: &ExecutionAudit) -> anyhow::Result<()> {
        self.by_version
            .entry(entry.version_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn list_for_version(&self, version_id: &VersionId) -> anyhow::Result<Vec<ExecutionAudit>> {
        let mut entries = self
            .by_version
            .get(version_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        entries.sort_by_key(|e| e.execution_timestamp);
        Ok(entries)
    }
}
