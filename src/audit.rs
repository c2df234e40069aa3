//! §3 `ExecutionAudit` — the append-only forensic record of every
//! transition attempt. Entries are never updated or deleted in normal
//! operation, generalizing a witness-chain append-only idiom
//! (`TradeContext::insert_witness`, `src/context.rs`) from a single trade's
//! narrative log to the approval core's execution log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AuditId, RequestId, VersionId};
use crate::state_machine::VersionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditPhase {
    Initiated,
    Validated,
    Transitioned,
    Completed,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAudit {
    pub audit_id: AuditId,
    pub version_id: VersionId,
    pub approval_request_id: Option<RequestId>,
    pub phase: AuditPhase,
    pub previous_status: Option<VersionStatus>,
    pub new_status: Option<VersionStatus>,
    pub executed_by: String,
    pub execution_timestamp: DateTime<Utc>,
    pub error_message: Option<String>,
    pub metadata: Value,
}

impl ExecutionAudit {
    pub fn new(
        version_id: VersionId,
        approval_request_id: Option<RequestId>,
        phase: AuditPhase,
        previous_status: Option<VersionStatus>,
        new_status: Option<VersionStatus>,
        executed_by: impl Into<String>,
        error_message: Option<String>,
        metadata: Value,
    ) -> Self {
        Self {
            audit_id: AuditId::new(),
            version_id,
            approval_request_id,
            phase,
            previous_status,
            new_status,
            executed_by: executed_by.into(),
            execution_timestamp: Utc::now(),
            error_message,
            metadata,
        }
    }
}
