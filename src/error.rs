//! Crate-wide error taxonomy.
//!
//! Each component gets its own `thiserror`-derived enum, composed through
//! `anyhow::Result` at the boundaries that cross components, following the
//! the per-component `src/error.rs` convention.

use crate::ids::{RequestId, VersionId};
use crate::version::VersionStatus;

#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    #[error("approval request not found: {0}")]
    NotFound(RequestId),
    #[error("version not found: {0}")]
    VersionNotFound(VersionId),
    #[error("version {0} is not in PENDING_VVB")]
    NotPendingVvb(VersionId),
    #[error("version {0} already has an approval request")]
    DuplicateRequestForVersion(VersionId),
    #[error("validators list must be non-empty")]
    EmptyValidators,
    #[error("voting_window_seconds must be > 0")]
    InvalidWindow,
    #[error("threshold_percent must be in (0,100]")]
    InvalidThreshold,
    #[error("voting is closed for request {0}")]
    VotingClosed(RequestId),
    #[error("validator {validator} already voted on {request}")]
    DuplicateVote {
        request: RequestId,
        validator: String,
    },
    #[error("signature verification failed for request {0}")]
    InvalidSignature(RequestId),
}

#[derive(thiserror::Error, Debug)]
pub enum TransitionError {
    #[error("version not found: {0}")]
    NotFound(VersionId),
    #[error("expected status {expected:?} but version {version} is {actual:?}")]
    StaleStatus {
        version: VersionId,
        expected: VersionStatus,
        actual: VersionStatus,
    },
    #[error("transition {from:?} -> {to:?} is not allowed")]
    InvalidTransition {
        from: VersionStatus,
        to: VersionStatus,
    },
    #[error("store error during transition: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("dispatcher queue is full")]
    QueueFull,
    #[error("http delivery failed: {0}")]
    Delivery(String),
}
