//! §4.5 TransitionManager — executes a single state change on a version
//! with the 5-phase audit protocol. Generalizes a witness-append
//! idiom (`TradeContext::insert_witness`) into a protocol with its own
//! validation and rollback-on-failure semantics.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::audit::{AuditPhase, ExecutionAudit};
use crate::error::TransitionError;
use crate::ids::{RequestId, VersionId};
use crate::state_machine::{self, VersionStatus};
use crate::store::{AuditStore, VersionStore};
use crate::version::TokenVersion;

pub struct TransitionManager {
    versions: Arc<dyn VersionStore>,
    audit: Arc<dyn AuditStore>,
}

impl TransitionManager {
    pub fn new(versions: Arc<dyn VersionStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self { versions, audit }
    }

    fn record(
        &self,
        version_id: &VersionId,
        approval_request_id: Option<RequestId>,
        phase: AuditPhase,
        previous: Option<VersionStatus>,
        new: Option<VersionStatus>,
        error: Option<String>,
        metadata: Value,
    ) {
        let entry = ExecutionAudit::new(
            version_id.clone(),
            approval_request_id,
            phase,
            previous,
            new,
            "transition_manager",
            error,
            metadata,
        );
        if let Err(err) = self.audit.append(&entry) {
            tracing::error!(?err, version_id = %version_id, "failed to append audit entry");
        }
    }

    /// §4.5 steps 1-9. `metadata` is attached to the `TRANSITIONED`/`COMPLETED`
    /// audit entries as opaque context (e.g. `{"approval_request_id": ...}`).
    /// `finalize` runs on the in-memory version right before the single
    /// `put()` this method performs, so a caller that needs to set
    /// status-specific fields (e.g. `rejection_reason`, `replaced_at`) can do
    /// so as part of the same write `check_invariants` validates — instead
    /// of writing an intermediate, invariant-incomplete version and
    /// back-filling it with a second `put()` afterward.
    pub fn execute(
        &self,
        version_id: &VersionId,
        expected_from: VersionStatus,
        to: VersionStatus,
        approval_request_id: Option<RequestId>,
        metadata: Value,
        finalize: impl FnOnce(&mut TokenVersion),
    ) -> Result<TokenVersion, TransitionError> {
        let Some(mut version) = self.versions.get(version_id).map_err(TransitionError::Store)? else {
            self.record(
                version_id,
                approval_request_id.clone(),
                AuditPhase::Failed,
                None,
                None,
                Some("not_found".to_string()),
                metadata.clone(),
            );
            return Err(TransitionError::NotFound(version_id.clone()));
        };

        if version.status != expected_from {
            self.record(
                version_id,
                approval_request_id.clone(),
                AuditPhase::Failed,
                Some(version.status),
                None,
                Some("status_mismatch".to_string()),
                metadata.clone(),
            );
            return Err(TransitionError::StaleStatus {
                version: version_id.clone(),
                expected: expected_from,
                actual: version.status,
            });
        }

        if !state_machine::allowed(expected_from, to) {
            self.record(
                version_id,
                approval_request_id.clone(),
                AuditPhase::Failed,
                Some(expected_from),
                Some(to),
                Some("disallowed".to_string()),
                metadata.clone(),
            );
            return Err(TransitionError::InvalidTransition { from: expected_from, to });
        }

        self.record(
            version_id,
            approval_request_id.clone(),
            AuditPhase::Initiated,
            Some(expected_from),
            Some(to),
            None,
            metadata.clone(),
        );
        self.record(
            version_id,
            approval_request_id.clone(),
            AuditPhase::Validated,
            Some(expected_from),
            Some(to),
            None,
            metadata.clone(),
        );

        version.status = to;
        version.updated_at = Utc::now();
        if to == VersionStatus::Active {
            version.activated_at = Some(Utc::now());
            version.ensure_merkle_hash();
        }
        finalize(&mut version);

        if let Err(err) = self.versions.put(&version) {
            self.record(
                version_id,
                approval_request_id.clone(),
                AuditPhase::Failed,
                Some(expected_from),
                Some(to),
                Some(err.to_string()),
                metadata,
            );
            return Err(TransitionError::Store(err));
        }

        self.record(
            version_id,
            approval_request_id.clone(),
            AuditPhase::Transitioned,
            Some(expected_from),
            Some(to),
            None,
            metadata.clone(),
        );
        self.record(
            version_id,
            approval_request_id,
            AuditPhase::Completed,
            Some(expected_from),
            Some(to),
            None,
            metadata,
        );

        Ok(version)
    }

    /// Purely informational: step 9 of §4.5 already rolled back any
    /// persistence changes, so this only records the attempt for the
    /// forensic trail.
    pub fn rollback_transition(&self, version_id: &VersionId, reason: &str) {
        self.record(
            version_id,
            None,
            AuditPhase::RolledBack,
            None,
            None,
            Some(reason.to_string()),
            json!({ "reason": reason }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TokenId;
    use crate::store_memory::{InMemoryAuditStore, InMemoryVersionStore};

    fn fixtures() -> (Arc<InMemoryVersionStore>, Arc<InMemoryAuditStore>, TransitionManager) {
        let versions = Arc::new(InMemoryVersionStore::new());
        let audit = Arc::new(InMemoryAuditStore::new());
        let manager = TransitionManager::new(versions.clone(), audit.clone());
        (versions, audit, manager)
    }

    #[test]
    fn successful_transition_produces_full_audit_chain() {
        let (versions, audit, manager) = fixtures();
        let mut version = TokenVersion::new(TokenId::new(), 1, b"content".to_vec());
        version.status = VersionStatus::PendingVvb;
        versions.put(&version).unwrap();

        let updated = manager
            .execute(&version.id, VersionStatus::PendingVvb, VersionStatus::Active, None, json!({}), |_| {})
            .unwrap();
        assert_eq!(updated.status, VersionStatus::Active);
        assert!(updated.merkle_hash.is_some());
        assert!(updated.activated_at.is_some());

        let entries = audit.list_for_version(&version.id).unwrap();
        let phases: Vec<_> = entries.iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![
                AuditPhase::Initiated,
                AuditPhase::Validated,
                AuditPhase::Transitioned,
                AuditPhase::Completed,
            ]
        );
    }

    #[test]
    fn stale_status_fails_with_single_failed_audit_entry() {
        let (versions, audit, manager) = fixtures();
        let mut version = TokenVersion::new(TokenId::new(), 1, b"content".to_vec());
        version.status = VersionStatus::Created;
        versions.put(&version).unwrap();

        let err = manager
            .execute(&version.id, VersionStatus::PendingVvb, VersionStatus::Active, None, json!({}), |_| {})
            .unwrap_err();
        assert!(matches!(err, TransitionError::StaleStatus { .. }));

        let entries = audit.list_for_version(&version.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phase, AuditPhase::Failed);
    }

    #[test]
    fn disallowed_transition_fails_before_mutating_status() {
        let (versions, _audit, manager) = fixtures();
        let mut version = TokenVersion::new(TokenId::new(), 1, b"content".to_vec());
        version.status = VersionStatus::Created;
        versions.put(&version).unwrap();

        let err = manager
            .execute(&version.id, VersionStatus::Created, VersionStatus::Replaced, None, json!({}), |_| {})
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));

        let unchanged = versions.get(&version.id).unwrap().unwrap();
        assert_eq!(unchanged.status, VersionStatus::Created);
    }

    #[test]
    fn not_found_version_fails_with_not_found_audit() {
        let (_versions, audit, manager) = fixtures();
        let missing = VersionId::new();

        let err = manager
            .execute(&missing, VersionStatus::PendingVvb, VersionStatus::Active, None, json!({}), |_| {})
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotFound(_)));

        let entries = audit.list_for_version(&missing).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].phase, AuditPhase::Failed);
    }
}
