//! §3 `ValidatorVote` — a single, immutable validator ballot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RequestId, ValidatorId, VoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorVote {
    pub id: VoteId,
    pub approval_request_id: RequestId,
    pub validator_id: ValidatorId,
    pub choice: VoteChoice,
    pub signature: Option<String>,
    pub reason: Option<String>,
    pub voted_at: DateTime<Utc>,
}

impl ValidatorVote {
    pub fn new(
        approval_request_id: RequestId,
        validator_id: ValidatorId,
        choice: VoteChoice,
        signature: Option<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: VoteId::new(),
            approval_request_id,
            validator_id,
            choice,
            signature,
            reason,
            voted_at: Utc::now(),
        }
    }
}

/// Pluggable signature verification (§1 Non-goals: cryptographic protocol
/// design is out of scope — this crate only defines the seam).
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, validator_id: &ValidatorId, payload: &[u8], signature: &str) -> bool;
}

/// Accepts every signature. Used where the deployment has no PKI in place
/// yet; never the right choice once validator keys are provisioned.
pub struct AllowAllVerifier;

impl SignatureVerifier for AllowAllVerifier {
    fn verify(&self, _validator_id: &ValidatorId, _payload: &[u8], _signature: &str) -> bool {
        true
    }
}
