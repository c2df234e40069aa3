//! End-to-end lifecycle scenarios wired through the real in-memory stores,
//! `ApprovalService`, `TransitionManager`, `CascadeRetirement`, and
//! `ExecutionService` — the same shape as a `tests/scenarios.rs`
//! full-pipeline integration tests, generalized from a single trade
//! approval to the version/request/vote/audit pipeline this crate drives.

use std::sync::Arc;
use std::time::Duration;

use token_approval_core::cascade::CascadeRetirement;
use token_approval_core::event::EventBus;
use token_approval_core::execution::ExecutionService;
use token_approval_core::ids::TokenId;
use token_approval_core::service::ApprovalService;
use token_approval_core::state_machine::VersionStatus;
use token_approval_core::store::{AuditStore, VersionStore};
use token_approval_core::store_memory::{InMemoryAuditStore, InMemoryRequestStore, InMemoryVersionStore, InMemoryVoteStore};
use token_approval_core::sweeper::sweep_once;
use token_approval_core::version::TokenVersion;
use token_approval_core::vote::{AllowAllVerifier, VoteChoice};

struct Harness {
    service: Arc<ApprovalService>,
    versions: Arc<InMemoryVersionStore>,
    audit: Arc<InMemoryAuditStore>,
}

fn harness() -> Harness {
    let versions = Arc::new(InMemoryVersionStore::new());
    let requests = Arc::new(InMemoryRequestStore::new());
    let votes = Arc::new(InMemoryVoteStore::new());
    let audit = Arc::new(InMemoryAuditStore::new());
    let bus = Arc::new(EventBus::new());

    let transitions = Arc::new(token_approval_core::transition::TransitionManager::new(
        versions.clone() as Arc<dyn VersionStore>,
        audit.clone() as Arc<dyn AuditStore>,
    ));
    let cascade = Arc::new(CascadeRetirement::new(versions.clone() as Arc<dyn VersionStore>, transitions.clone()));
    let execution = ExecutionService::new(transitions, cascade, bus.clone());
    execution.install(&bus);

    let service = Arc::new(ApprovalService::new(
        versions.clone() as Arc<dyn VersionStore>,
        requests,
        votes,
        bus,
        Box::new(AllowAllVerifier),
    ));

    Harness { service, versions, audit }
}

fn pending_version(h: &Harness, token: TokenId, number: u64) -> TokenVersion {
    let mut v = TokenVersion::new(token, number, format!("content-{number}").into_bytes());
    v.status = VersionStatus::PendingVvb;
    h.versions.put(&v).unwrap();
    v
}

#[test]
fn s1_happy_approval_activates_the_version_with_a_full_audit_chain() {
    let h = harness();
    let token = TokenId::new();
    let v1 = pending_version(&h, token, 1);

    let request = h
        .service
        .create_request(v1.id.clone(), vec!["a".into(), "b".into(), "c".into()], 3600, Some(66.67))
        .unwrap();

    h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::Yes, None, None).unwrap();
    let outcome = h.service.submit_vote(request.id.clone(), "b".into(), VoteChoice::Yes, None, None).unwrap();
    assert!(outcome.consensus.reached && outcome.consensus.approved);

    let reloaded_request = h.service.lookup_request(&request.id).unwrap();
    assert_eq!(reloaded_request.status, token_approval_core::request::RequestStatus::Approved);

    let activated = h.versions.get(&v1.id).unwrap().unwrap();
    assert_eq!(activated.status, VersionStatus::Active);
    assert!(activated.merkle_hash.is_some());

    let phases: Vec<_> = h.audit.list_for_version(&v1.id).unwrap().into_iter().map(|e| e.phase).collect();
    use token_approval_core::audit::AuditPhase::*;
    assert_eq!(phases, vec![Initiated, Validated, Transitioned, Completed]);
}

#[test]
fn s2_rejection_by_majority_leaves_no_active_version() {
    let h = harness();
    let token = TokenId::new();
    let v1 = pending_version(&h, token, 1);

    let request = h
        .service
        .create_request(v1.id.clone(), vec!["a".into(), "b".into(), "c".into()], 3600, Some(66.67))
        .unwrap();

    h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::No, None, None).unwrap();
    let outcome = h.service.submit_vote(request.id.clone(), "b".into(), VoteChoice::No, None, None).unwrap();
    assert!(outcome.consensus.rejected);

    let reloaded_request = h.service.lookup_request(&request.id).unwrap();
    assert_eq!(reloaded_request.status, token_approval_core::request::RequestStatus::Rejected);

    let rejected = h.versions.get(&v1.id).unwrap().unwrap();
    assert_eq!(rejected.status, VersionStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("rejected_by_majority"));
}

#[test]
fn s3_early_impossibility_rejects_without_waiting_for_every_vote() {
    let h = harness();
    let token = TokenId::new();
    let v1 = pending_version(&h, token, 1);

    let validators = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
    let request = h.service.create_request(v1.id.clone(), validators, 3600, Some(66.67)).unwrap();

    // min_for_majority = floor(5*66.67/100)+1 = 4. A 2-2 split with one
    // validator left to vote means neither side can reach 4 regardless of
    // how the last vote falls.
    h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::Yes, None, None).unwrap();
    h.service.submit_vote(request.id.clone(), "b".into(), VoteChoice::Yes, None, None).unwrap();
    let outcome = h.service.submit_vote(request.id.clone(), "c".into(), VoteChoice::No, None, None).unwrap();
    assert!(!outcome.consensus.reached && !outcome.consensus.impossible);
    let outcome = h.service.submit_vote(request.id.clone(), "d".into(), VoteChoice::No, None, None).unwrap();
    assert!(outcome.consensus.impossible);

    let reloaded_request = h.service.lookup_request(&request.id).unwrap();
    assert_eq!(reloaded_request.status, token_approval_core::request::RequestStatus::Rejected);
}

#[test]
fn s4_duplicate_vote_is_refused_and_tallies_are_unchanged() {
    let h = harness();
    let token = TokenId::new();
    let v1 = pending_version(&h, token, 1);
    let request = h
        .service
        .create_request(v1.id.clone(), vec!["a".into(), "b".into(), "c".into()], 3600, Some(66.67))
        .unwrap();

    h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::Yes, None, None).unwrap();
    let err = h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::Yes, None, None).unwrap_err();
    assert!(matches!(err, token_approval_core::error::ApprovalError::DuplicateVote { .. }));

    let reloaded = h.service.lookup_request(&request.id).unwrap();
    assert_eq!(reloaded.approval_count, 1);
}

#[test]
fn s5_expiry_moves_the_version_to_expired() {
    let h = harness();
    let token = TokenId::new();
    let v1 = pending_version(&h, token, 1);
    let request = h
        .service
        .create_request(v1.id.clone(), vec!["a".into(), "b".into(), "c".into()], 1, None)
        .unwrap();

    std::thread::sleep(Duration::from_millis(1100));
    sweep_once(&h.service);

    let reloaded = h.service.lookup_request(&request.id).unwrap();
    assert_eq!(reloaded.status, token_approval_core::request::RequestStatus::Expired);

    let version = h.versions.get(&v1.id).unwrap().unwrap();
    assert_eq!(version.status, VersionStatus::Expired);
}

#[test]
fn s6_cascade_retirement_replaces_the_prior_active_version() {
    let h = harness();
    let token = TokenId::new();

    let mut v1 = TokenVersion::new(token.clone(), 1, b"v1".to_vec());
    v1.status = VersionStatus::Active;
    v1.ensure_merkle_hash();
    h.versions.put(&v1).unwrap();

    let mut v2 = TokenVersion::new(token, 2, b"v2".to_vec());
    v2.status = VersionStatus::PendingVvb;
    v2.previous_version_id = Some(v1.id.clone());
    h.versions.put(&v2).unwrap();

    let request = h
        .service
        .create_request(v2.id.clone(), vec!["a".into(), "b".into(), "c".into()], 3600, Some(66.67))
        .unwrap();
    h.service.submit_vote(request.id.clone(), "a".into(), VoteChoice::Yes, None, None).unwrap();
    h.service.submit_vote(request.id.clone(), "b".into(), VoteChoice::Yes, None, None).unwrap();

    let activated = h.versions.get(&v2.id).unwrap().unwrap();
    assert_eq!(activated.status, VersionStatus::Active);

    let retired = h.versions.get(&v1.id).unwrap().unwrap();
    assert_eq!(retired.status, VersionStatus::Replaced);
    assert_eq!(retired.replaced_by_version_id, Some(v2.id));
    assert!(retired.replaced_at.is_some());
}
