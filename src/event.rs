//! §4.8 EventBus — an in-process, synchronous, type-routed fan-out, and the
//! `DomainEvent` enum carrying every lifecycle event named in §4 and §6.
//!
//! §9 design note: "injected event publishers" become this abstraction —
//! `publish(event)` plus `subscribe(handler)` — generalizing the way the
//! teacher threads a single witness chain through `TradeContext` into a
//! proper fan-out primitive multiple independent subscribers can listen on.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusResult;
use crate::ids::{RequestId, ValidatorId, VersionId, VoteId};
use crate::request::RequestStatus;
use crate::vote::VoteChoice;

/// Wire event-type strings from §6.
pub const EVT_APPROVAL_REQUEST_CREATED: &str = "APPROVAL_REQUEST_CREATED";
pub const EVT_VOTE_SUBMITTED: &str = "VOTE_SUBMITTED";
pub const EVT_CONSENSUS_REACHED: &str = "CONSENSUS_REACHED";
pub const EVT_APPROVAL_EXECUTED: &str = "APPROVAL_EXECUTED";
pub const EVT_APPROVAL_REJECTED: &str = "APPROVAL_REJECTED";
pub const EVT_VOTING_WINDOW_EXPIRED: &str = "VOTING_WINDOW_EXPIRED";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tallies {
    pub approval_count: u32,
    pub rejection_count: u32,
    pub abstain_count: u32,
    pub total_validators: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    ApprovalRequestCreated {
        request_id: RequestId,
        version_id: VersionId,
        voting_window_end: DateTime<Utc>,
    },
    VoteSubmitted {
        request_id: RequestId,
        vote_id: VoteId,
        validator_id: ValidatorId,
        choice: VoteChoice,
        tallies: Tallies,
    },
    ConsensusReached {
        request_id: RequestId,
        version_id: VersionId,
        result: ConsensusResult,
    },
    ApprovalDecided {
        request_id: RequestId,
        version_id: VersionId,
        status: RequestStatus,
        tallies: Tallies,
        approver_ids: Vec<ValidatorId>,
        reason: Option<String>,
    },
    ApprovalExecutionCompleted {
        version_id: VersionId,
        request_id: RequestId,
        duration_ms: u64,
    },
    ApprovalExecutionFailed {
        request_id: RequestId,
        version_id: VersionId,
        error: String,
    },
    VersionRejected {
        version_id: VersionId,
        request_id: RequestId,
        reason: String,
    },
    VersionExpired {
        version_id: VersionId,
        request_id: RequestId,
    },
}

impl DomainEvent {
    /// The wire event-type string (§6) for webhook filtering and the
    /// `X-Aurigraph-Event` header.
    pub fn wire_type(&self) -> &'static str {
        match self {
            DomainEvent::ApprovalRequestCreated { .. } => EVT_APPROVAL_REQUEST_CREATED,
            DomainEvent::VoteSubmitted { .. } => EVT_VOTE_SUBMITTED,
            DomainEvent::ConsensusReached { .. } => EVT_CONSENSUS_REACHED,
            DomainEvent::ApprovalDecided { status, .. } => match status {
                RequestStatus::Approved => EVT_APPROVAL_EXECUTED,
                RequestStatus::Rejected => EVT_APPROVAL_REJECTED,
                RequestStatus::Expired => EVT_VOTING_WINDOW_EXPIRED,
                RequestStatus::Pending => EVT_CONSENSUS_REACHED,
            },
            DomainEvent::ApprovalExecutionCompleted { .. } => EVT_APPROVAL_EXECUTED,
            DomainEvent::ApprovalExecutionFailed { .. } => EVT_APPROVAL_REJECTED,
            DomainEvent::VersionRejected { .. } => EVT_APPROVAL_REJECTED,
            DomainEvent::VersionExpired { .. } => EVT_VOTING_WINDOW_EXPIRED,
        }
    }

    pub fn approval_id(&self) -> Option<&RequestId> {
        match self {
            DomainEvent::ApprovalRequestCreated { request_id, .. }
            | DomainEvent::VoteSubmitted { request_id, .. }
            | DomainEvent::ConsensusReached { request_id, .. }
            | DomainEvent::ApprovalDecided { request_id, .. }
            | DomainEvent::ApprovalExecutionCompleted { request_id, .. }
            | DomainEvent::ApprovalExecutionFailed { request_id, .. }
            | DomainEvent::VersionRejected { request_id, .. }
            | DomainEvent::VersionExpired { request_id, .. } => Some(request_id),
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// In-process, synchronous fan-out. A subscriber receives every event
/// published after it registers, in publication order per publisher.
/// Subscriber panics are isolated so one misbehaving handler cannot break
/// the publisher or other subscribers (§4.8).
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Subscriber) {
        self.subscribers.write().expect("event bus lock poisoned").push(handler);
    }

    pub fn publish(&self, event: DomainEvent) {
        let subscribers = self.subscribers.read().expect("event bus lock poisoned");
        for subscriber in subscribers.iter() {
            let subscriber = subscriber.clone();
            let event_ref = &event;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| subscriber(event_ref)));
            if let Err(panic) = result {
                tracing::error!(?panic, event = event.wire_type(), "event subscriber panicked; isolated");
            }
        }
    }
}
