//! §4.1 StateMachine — the single source of truth for allowed
//! `TokenVersion` status transitions and per-status timeouts. Every other
//! component consults this before mutating `TokenVersion.status`, mirroring
//! how `TradeContext::current_state` is the sole authority on
//! trade lifecycle in `src/context.rs`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStatus {
    Created,
    PendingVvb,
    Active,
    Replaced,
    Rejected,
    Expired,
    Archived,
}

use VersionStatus::*;

const DAY: u64 = 24 * 60 * 60;

/// Returns whether a direct transition from `from` to `to` is permitted.
/// Self-transitions are always rejected.
pub fn allowed(from: VersionStatus, to: VersionStatus) -> bool {
    if from == to {
        return false;
    }
    matches!(
        (from, to),
        (Created, PendingVvb)
            | (Created, Active)
            | (Created, Rejected)
            | (Created, Expired)
            | (PendingVvb, Active)
            | (PendingVvb, Rejected)
            | (PendingVvb, Expired)
            | (Active, Replaced)
            | (Active, Archived)
            | (Active, Expired)
            | (Replaced, Archived)
            | (Rejected, Archived)
            | (Expired, Archived)
    )
}

/// The per-status voting/dwell timeout used by sweepers. `None` for
/// terminal or timeout-less statuses.
pub fn timeout(status: VersionStatus) -> Option<Duration> {
    match status {
        Created => Some(Duration::from_secs(30 * DAY)),
        PendingVvb => Some(Duration::from_secs(7 * DAY)),
        Active => Some(Duration::from_secs(365 * DAY)),
        Replaced => Some(Duration::from_secs(365 * DAY)),
        Rejected => Some(Duration::from_secs(90 * DAY)),
        Expired => Some(Duration::from_secs(0)),
        Archived => None,
    }
}

pub fn is_terminal(status: VersionStatus) -> bool {
    matches!(status, Archived)
}
