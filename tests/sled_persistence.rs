//! Persistence round-trip against a real `sled` database in a scratch
//! directory, following `tempfile::tempdir` for test db cleanup the same
//! way a `tests/scenarios.rs` integration suite uses it.

use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.
use token_approval_core::audit::AuditPhase;
use token_approval_core::ids::TokenId;
use token_approval_core::state_machine::VersionStatus;
use token_approval_core::store::{AuditStore, RequestStore, VersionStore, VoteStore};
use token_approval_core::store_sled::{SledAuditStore, SledRequestStore, SledVersionStore, SledVoteStore};
use token_approval_core::transition::TransitionManager;
use token_approval_core::version::TokenVersion;
use token_approval_core::vote::{ValidatorVote, VoteChoice};

#[test]
fn version_request_vote_and_audit_round_trip_through_sled() {
    let dir = tempdir().unwrap();
    let db = sled::open(dir.path()).unwrap();

    let versions = SledVersionStore::open(&db).unwrap();
    let requests = SledRequestStore::open(&db).unwrap();
    let votes = SledVoteStore::open(&db).unwrap();
    let audit = SledAuditStore::open(&db).unwrap();

    let mut version = TokenVersion::new(TokenId::new(), 1, b"sled content".to_vec());
    version.status = VersionStatus::PendingVvb;
    versions.put(&version).unwrap();

    let fetched = versions.get(&version.id).unwrap().unwrap();
    assert_eq!(fetched.content, version.content);
    assert_eq!(fetched.status, VersionStatus::PendingVvb);

    let request = token_approval_core::request::ApprovalRequest::new(version.id.clone(), 3, 3600, 66.67);
    requests.put(&request).unwrap();
    let by_version = requests.find_by_version(&version.id).unwrap().unwrap();
    assert_eq!(by_version.id, request.id);

    let vote = ValidatorVote::new(request.id.clone(), "validator_a".to_string(), VoteChoice::Yes, None, None);
    votes.append(&vote).unwrap();
    let stored_votes = votes.list_for_request(&request.id).unwrap();
    assert_eq!(stored_votes.len(), 1);
    assert_eq!(stored_votes[0].validator_id, "validator_a");

    let manager = TransitionManager::new(Arc::new(versions), Arc::new(audit));
    let updated = manager
        .execute(
            &fetched.id,
            VersionStatus::PendingVvb,
            VersionStatus::Active,
            Some(request.id.clone()),
            serde_json::json!({}),
            |_| {},
        )
        .unwrap();
    assert_eq!(updated.status, VersionStatus::Active);

    // The manager now owns both stores by value; reopen fresh handles on the
    // same trees to verify durability across "process" boundaries.
    let audit_reopened = SledAuditStore::open(&db).unwrap();
    let entries = audit_reopened.list_for_version(&version.id).unwrap();
    let phases: Vec<_> = entries.iter().map(|e| e.phase).collect();
    assert_eq!(
        phases,
        vec![AuditPhase::Initiated, AuditPhase::Validated, AuditPhase::Transitioned, AuditPhase::Completed]
    );
}
