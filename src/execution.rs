//! §4.6 ExecutionService — subscribes to `ApprovalDecided` and drives the
//! version through its terminal transition: lookup → transition → metadata
//! → cascade retire → event.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;

use crate::cascade::CascadeRetirement;
use crate::error::ExecutionError;
use crate::event::{DomainEvent, EventBus, Subscriber};
use crate::ids::{RequestId, ValidatorId, VersionId};
use crate::request::RequestStatus;
use crate::state_machine::VersionStatus;
use crate::transition::TransitionManager;

pub struct ExecutionService {
    transitions: Arc<TransitionManager>,
    cascade: Arc<CascadeRetirement>,
    bus: Arc<EventBus>,
}

impl ExecutionService {
    pub fn new(transitions: Arc<TransitionManager>, cascade: Arc<CascadeRetirement>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { transitions, cascade, bus })
    }

    /// Registers this service as an `ApprovalDecided` subscriber. Runs
    /// synchronously on the publishing thread/worker by default, preserving
    /// per-`approval_request_id` ordering as §5 requires.
    pub fn install(self: &Arc<Self>, bus: &EventBus) {
        let this = self.clone();
        let handler: Subscriber = Arc::new(move |event: &DomainEvent| {
            if let DomainEvent::ApprovalDecided {
                request_id,
                version_id,
                status,
                approver_ids,
                reason,
                ..
            } = event
            {
                this.on_decided(
                    request_id.clone(),
                    version_id.clone(),
                    *status,
                    approver_ids.clone(),
                    reason.clone(),
                );
            }
        });
        bus.subscribe(handler);
    }

    fn on_decided(
        &self,
        request_id: RequestId,
        version_id: VersionId,
        status: RequestStatus,
        approver_ids: Vec<ValidatorId>,
        reason: Option<String>,
    ) {
        let start = Instant::now();
        let result: Result<(), ExecutionError> = match status {
            RequestStatus::Approved => self.execute_approved(&request_id, &version_id, &approver_ids),
            RequestStatus::Rejected => self.execute_terminal(
                &request_id,
                &version_id,
                VersionStatus::Rejected,
                reason.unwrap_or_else(|| "rejected_by_majority".to_string()),
            ),
            RequestStatus::Expired => self.execute_terminal(
                &request_id,
                &version_id,
                VersionStatus::Expired,
                "voting_window_expired".to_string(),
            ),
            RequestStatus::Pending => Ok(()),
        };

        match result {
            Ok(()) if status == RequestStatus::Approved => {
                self.bus.publish(DomainEvent::ApprovalExecutionCompleted {
                    version_id,
                    request_id,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Ok(()) => {}
            Err(err) => {
                tracing::error!(%request_id, %version_id, %err, "approval execution failed");
                self.bus.publish(DomainEvent::ApprovalExecutionFailed {
                    request_id,
                    version_id,
                    error: err.to_string(),
                });
            }
        }
    }

    fn execute_approved(
        &self,
        request_id: &RequestId,
        version_id: &VersionId,
        approver_ids: &[ValidatorId],
    ) -> Result<(), ExecutionError> {
        let request_id_for_version = request_id.clone();
        let approver_ids_for_version = approver_ids.to_vec();
        let version = self.transitions.execute(
            version_id,
            VersionStatus::PendingVvb,
            VersionStatus::Active,
            Some(request_id.clone()),
            json!({ "approval_request_id": request_id.as_str() }),
            move |v| {
                v.approval_request_id = Some(request_id_for_version);
                v.approval_timestamp = Some(Utc::now());
                v.approved_by_count = Some(approver_ids_for_version.len() as u32);
                v.approver_ids = approver_ids_for_version;
            },
        )?;

        if let Some(previous_id) = version.previous_version_id.clone() {
            // §4.6 step 1d: cascade failures are non-fatal — the new
            // version is already ACTIVE, so the overall execution still
            // succeeds. Logged rather than propagated.
            if let Err(err) = self.cascade.retire(&previous_id, &version.id) {
                tracing::warn!(%err, previous_id = %previous_id, "cascade retirement failed, continuing");
            }
        }

        Ok(())
    }

    fn execute_terminal(
        &self,
        request_id: &RequestId,
        version_id: &VersionId,
        to: VersionStatus,
        reason: String,
    ) -> Result<(), ExecutionError> {
        let reason_for_version = reason.clone();
        self.transitions.execute(
            version_id,
            VersionStatus::PendingVvb,
            to,
            Some(request_id.clone()),
            json!({ "reason": reason }),
            move |v| {
                if to == VersionStatus::Rejected {
                    v.rejection_reason = Some(reason_for_version);
                }
            },
        )?;

        if to == VersionStatus::Rejected {
            self.bus.publish(DomainEvent::VersionRejected {
                version_id: version_id.clone(),
                request_id: request_id.clone(),
                reason,
            });
        } else {
            self.bus.publish(DomainEvent::VersionExpired {
                version_id: version_id.clone(),
                request_id: request_id.clone(),
            });
        }

        Ok(())
    }
}
