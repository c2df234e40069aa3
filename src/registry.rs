//! §4.3 ApprovalRegistry — the concurrent in-memory index that vote intake
//! hits on every request. `dashmap` supplies per-key (per-request) atomicity
//! for `register_vote`, generalizing a sled-backed single-key
//! lookup (`TradeContext::load_from_db`) into a lock-striped concurrent map
//! the way the wider pack does (`other_examples` consensus modules lean on
//! `dashmap`/`DashMap` for exactly this shared-index role).

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::consensus;
use crate::error::ApprovalError;
use crate::ids::{RequestId, ValidatorId, VersionId};
use crate::request::ApprovalRequest;
use crate::request::RequestStatus;
use crate::vote::ValidatorVote;

/// Result of a single `register_vote` call: the request as it stands right
/// after this vote, the consensus tally over that state, and whether *this*
/// call was the one that flipped the request out of PENDING.
#[derive(Debug)]
pub struct VoteRegistration {
    pub request: ApprovalRequest,
    pub result: consensus::ConsensusResult,
    pub decided: bool,
}

#[derive(Default)]
pub struct ApprovalRegistry {
    requests_by_id: DashMap<RequestId, ApprovalRequest>,
    requests_by_version: DashMap<VersionId, RequestId>,
    votes_by_request: DashMap<RequestId, Vec<ValidatorVote>>,
    votes_by_validator: DashMap<ValidatorId, Vec<ValidatorVote>>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_request(&self, request: ApprovalRequest) -> Result<(), ApprovalError> {
        match self.requests_by_version.entry(request.token_version_id.clone()) {
            Entry::Occupied(_) => {
                return Err(ApprovalError::DuplicateRequestForVersion(request.token_version_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(request.id.clone());
            }
        }
        self.votes_by_request.insert(request.id.clone(), Vec::new());
        self.requests_by_id.insert(request.id.clone(), request);
        Ok(())
    }

    pub fn lookup_request(&self, id: &RequestId) -> Option<ApprovalRequest> {
        self.requests_by_id.get(id).map(|r| r.clone())
    }

    pub fn lookup_by_version(&self, version_id: &VersionId) -> Option<ApprovalRequest> {
        let id = self.requests_by_version.get(version_id)?;
        self.lookup_request(&id)
    }

    pub fn has_voted(&self, request_id: &RequestId, validator_id: &ValidatorId) -> bool {
        self.votes_by_request
            .get(request_id)
            .map(|votes| votes.iter().any(|v| &v.validator_id == validator_id))
            .unwrap_or(false)
    }

    /// Atomically: reject a duplicate vote from the same validator, append
    /// the vote, bump the request's running tally, and — still under the
    /// same `requests_by_id` shard lock — evaluate consensus and flip the
    /// request's status the moment it becomes decisive. Two concurrent votes
    /// from different validators therefore can't both observe a Pending
    /// status and both decide the same request: the shard lock serializes
    /// the tally bump and the decisive check as one step, so only the call
    /// that actually performs the flip gets `decided: true` back (§4.3
    /// concurrency contract).
    pub fn register_vote(&self, vote: ValidatorVote) -> Result<VoteRegistration, ApprovalError> {
        let mut request_ref = self
            .requests_by_id
            .get_mut(&vote.approval_request_id)
            .ok_or_else(|| ApprovalError::NotFound(vote.approval_request_id.clone()))?;

        if Utc::now() >= request_ref.voting_window_end() || request_ref.status != RequestStatus::Pending {
            return Err(ApprovalError::VotingClosed(vote.approval_request_id.clone()));
        }

        if self.has_voted(&vote.approval_request_id, &vote.validator_id) {
            return Err(ApprovalError::DuplicateVote {
                request: vote.approval_request_id.clone(),
                validator: vote.validator_id.clone(),
            });
        }

        use crate::vote::VoteChoice;
        match vote.choice {
            VoteChoice::Yes => request_ref.approval_count += 1,
            VoteChoice::No => request_ref.rejection_count += 1,
            VoteChoice::Abstain => request_ref.abstain_count += 1,
        }

        self.votes_by_request
            .entry(vote.approval_request_id.clone())
            .or_default()
            .push(vote.clone());
        self.votes_by_validator
            .entry(vote.validator_id.clone())
            .or_default()
            .push(vote.clone());

        let result = consensus::evaluate(
            request_ref.approval_count,
            request_ref.rejection_count,
            request_ref.abstain_count,
            request_ref.total_validators,
            request_ref.approval_threshold_percent,
        );

        let decided = if result.reached || result.impossible {
            request_ref.status = if result.approved {
                RequestStatus::Approved
            } else {
                RequestStatus::Rejected
            };
            true
        } else {
            false
        };

        Ok(VoteRegistration {
            request: request_ref.clone(),
            result,
            decided,
        })
    }

    pub fn update_status(&self, request_id: &RequestId, status: RequestStatus) -> Option<ApprovalRequest> {
        let mut entry = self.requests_by_id.get_mut(request_id)?;
        entry.status = status;
        Some(entry.clone())
    }

    pub fn remove(&self, request_id: &RequestId) {
        if let Some((_, request)) = self.requests_by_id.remove(request_id) {
            self.requests_by_version.remove(&request.token_version_id);
        }
        self.votes_by_request.remove(request_id);
    }

    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        self.requests_by_id
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .map(|r| r.clone())
            .collect()
    }

    pub fn expired_requests(&self) -> Vec<ApprovalRequest> {
        let now = Utc::now();
        self.pending_requests()
            .into_iter()
            .filter(|r| now >= r.voting_window_end())
            .collect()
    }

    pub fn votes_for_request(&self, request_id: &RequestId) -> Vec<ValidatorVote> {
        self.votes_by_request.get(request_id).map(|v| v.clone()).unwrap_or_default()
    }
}
