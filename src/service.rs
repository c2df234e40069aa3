//! §4.4 VoteIntake and ApprovalService — creates approval requests, accepts
//! votes, and finalizes approve/reject/expire outcomes, publishing every
//! event named in §4.4's ordering guarantee.

use std::sync::Arc;

use chrono::Utc;

use crate::consensus;
use crate::error::ApprovalError;
use crate::event::{DomainEvent, EventBus, Tallies};
use crate::ids::{RequestId, ValidatorId, VersionId};
use crate::registry::ApprovalRegistry;
use crate::request::{ApprovalRequest, RequestStatus, DEFAULT_THRESHOLD_PERCENT};
use crate::state_machine::VersionStatus;
use crate::store::{RequestStore, VersionStore, VoteStore};
use crate::vote::{SignatureVerifier, ValidatorVote, VoteChoice};

/// Outcome of `submit_vote`: the stored vote plus the consensus snapshot
/// computed immediately after it, so callers (and the `demos/sled.rs`
/// wiring) can observe whether the request just became decisive.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub vote_id: crate::ids::VoteId,
    pub tallies: Tallies,
    pub consensus: consensus::ConsensusResult,
}

pub struct ApprovalService {
    versions: Arc<dyn VersionStore>,
    requests: Arc<dyn RequestStore>,
    votes: Arc<dyn VoteStore>,
    registry: ApprovalRegistry,
    bus: Arc<EventBus>,
    verifier: Box<dyn SignatureVerifier>,
}

fn tallies_of(request: &ApprovalRequest) -> Tallies {
    Tallies {
        approval_count: request.approval_count,
        rejection_count: request.rejection_count,
        abstain_count: request.abstain_count,
        total_validators: request.total_validators,
    }
}

impl ApprovalService {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        requests: Arc<dyn RequestStore>,
        votes: Arc<dyn VoteStore>,
        bus: Arc<EventBus>,
        verifier: Box<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            versions,
            requests,
            votes,
            registry: ApprovalRegistry::new(),
            bus,
            verifier,
        }
    }

    /// §4.4 "Create approval request".
    pub fn create_request(
        &self,
        version_id: VersionId,
        validators: Vec<ValidatorId>,
        voting_window_seconds: u64,
        threshold_percent: Option<f64>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if validators.is_empty() {
            return Err(ApprovalError::EmptyValidators);
        }
        if voting_window_seconds == 0 {
            return Err(ApprovalError::InvalidWindow);
        }
        let threshold = threshold_percent.unwrap_or(DEFAULT_THRESHOLD_PERCENT);
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ApprovalError::InvalidThreshold);
        }

        let version = self
            .versions
            .get(&version_id)
            .map_err(|_| ApprovalError::VersionNotFound(version_id.clone()))?
            .ok_or_else(|| ApprovalError::VersionNotFound(version_id.clone()))?;
        if version.status != VersionStatus::PendingVvb {
            return Err(ApprovalError::NotPendingVvb(version_id));
        }
        if self.registry.lookup_by_version(&version_id).is_some()
            || self
                .requests
                .find_by_version(&version_id)
                .ok()
                .flatten()
                .is_some()
        {
            return Err(ApprovalError::DuplicateRequestForVersion(version_id));
        }

        let request = ApprovalRequest::new(
            version_id.clone(),
            validators.len() as u32,
            voting_window_seconds,
            threshold,
        );

        self.requests
            .put(&request)
            .map_err(|_| ApprovalError::VersionNotFound(version_id.clone()))?;
        self.registry.register_request(request.clone())?;

        self.bus.publish(DomainEvent::ApprovalRequestCreated {
            request_id: request.id.clone(),
            version_id: request.token_version_id.clone(),
            voting_window_end: request.voting_window_end(),
        });

        tracing::info!(request_id = %request.id, version_id = %request.token_version_id, "approval request created");
        Ok(request)
    }

    /// §4.4 "Submit vote", steps 1-7.
    pub fn submit_vote(
        &self,
        request_id: RequestId,
        validator_id: ValidatorId,
        choice: VoteChoice,
        signature: Option<String>,
        reason: Option<String>,
    ) -> Result<VoteOutcome, ApprovalError> {
        let request = self
            .registry
            .lookup_request(&request_id)
            .ok_or_else(|| ApprovalError::NotFound(request_id.clone()))?;

        if request.voting_closed(Utc::now()) {
            return Err(ApprovalError::VotingClosed(request_id));
        }
        if self.registry.has_voted(&request_id, &validator_id) {
            return Err(ApprovalError::DuplicateVote {
                request: request_id,
                validator: validator_id,
            });
        }
        if let Some(sig) = &signature {
            let payload = format!("{request_id}:{validator_id}:{choice:?}");
            if !self.verifier.verify(&validator_id, payload.as_bytes(), sig) {
                return Err(ApprovalError::InvalidSignature(request_id));
            }
        }

        let vote = ValidatorVote::new(request_id.clone(), validator_id.clone(), choice, signature, reason);
        let registration = self.registry.register_vote(vote.clone())?;
        let _ = self.votes.append(&vote);
        let _ = self.requests.put(&registration.request);

        let tallies = tallies_of(&registration.request);
        self.bus.publish(DomainEvent::VoteSubmitted {
            request_id: request_id.clone(),
            vote_id: vote.id.clone(),
            validator_id: validator_id.clone(),
            choice,
            tallies: tallies.clone(),
        });
        tracing::info!(request_id = %request_id, %validator_id, ?choice, "vote submitted");

        // `registration.decided` was computed atomically inside the
        // registry's per-request shard lock, so at most one concurrent
        // `submit_vote` call observes it as true for a given request.
        if registration.decided {
            self.finalize(&registration.request, &registration.result)?;
        }

        Ok(VoteOutcome {
            vote_id: vote.id,
            tallies,
            consensus: registration.result,
        })
    }

    /// §4.9 ExpirySweeper target: expire a single PENDING request whose
    /// voting window has elapsed. Idempotent — a request that already left
    /// PENDING is a no-op.
    pub fn expire(&self, request_id: &RequestId) -> Result<(), ApprovalError> {
        let Some(request) = self.registry.lookup_request(request_id) else {
            return Ok(());
        };
        if request.status != RequestStatus::Pending || Utc::now() < request.voting_window_end() {
            return Ok(());
        }
        let result = consensus::evaluate(
            request.approval_count,
            request.rejection_count,
            request.abstain_count,
            request.total_validators,
            request.approval_threshold_percent,
        );
        self.finalize_as(&request, RequestStatus::Expired, None, &result)
    }

    fn finalize(
        &self,
        request: &ApprovalRequest,
        result: &consensus::ConsensusResult,
    ) -> Result<(), ApprovalError> {
        let (status, reason) = if result.approved {
            (RequestStatus::Approved, None)
        } else if result.rejected {
            (RequestStatus::Rejected, Some("rejected_by_majority".to_string()))
        } else {
            // decisive only via `impossible` at this point (reached is false)
            (RequestStatus::Rejected, Some("consensus_impossible".to_string()))
        };

        self.bus.publish(DomainEvent::ConsensusReached {
            request_id: request.id.clone(),
            version_id: request.token_version_id.clone(),
            result: *result,
        });

        self.finalize_as(request, status, reason, result)
    }

    fn finalize_as(
        &self,
        request: &ApprovalRequest,
        status: RequestStatus,
        reason: Option<String>,
        _result: &consensus::ConsensusResult,
    ) -> Result<(), ApprovalError> {
        let updated = self
            .registry
            .update_status(&request.id, status)
            .unwrap_or_else(|| {
                let mut r = request.clone();
                r.status = status;
                r
            });
        let _ = self.requests.put(&updated);

        let approver_ids: Vec<ValidatorId> = self
            .registry
            .votes_for_request(&request.id)
            .into_iter()
            .filter(|v| matches!(v.choice, VoteChoice::Yes))
            .map(|v| v.validator_id)
            .collect();

        tracing::info!(request_id = %request.id, ?status, "approval request decided");

        self.bus.publish(DomainEvent::ApprovalDecided {
            request_id: request.id.clone(),
            version_id: request.token_version_id.clone(),
            status,
            tallies: tallies_of(&updated),
            approver_ids,
            reason,
        });

        Ok(())
    }

    pub fn lookup_request(&self, request_id: &RequestId) -> Option<ApprovalRequest> {
        self.registry.lookup_request(request_id)
    }

    pub fn votes_for(&self, request_id: &RequestId) -> Vec<ValidatorVote> {
        self.registry.votes_for_request(request_id)
    }

    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        self.registry.pending_requests()
    }

    pub fn expired_requests(&self) -> Vec<ApprovalRequest> {
        self.registry.expired_requests()
    }
}
