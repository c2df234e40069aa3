//! End-to-end demo wiring the approval core against a real `sled` database,
//! adapted from a standalone `examples/sled.rs` demo (same
//! open-db / insert / fetch-back shape, generalized from a single
//! `TradeDetails` row to the full version + approval-request + audit
//! keyspace this crate persists, plus the transition/cascade/event/webhook/
//! sweeper wiring that drives a version all the way to ACTIVE under
//! `AppConfig`-derived settings).
#![allow(warnings)]

use std::sync::Arc;
use std::time::Duration;

use token_approval_core::cascade::CascadeRetirement;
use token_approval_core::config::AppConfig;
use token_approval_core::event::EventBus;
use token_approval_core::execution::ExecutionService;
use token_approval_core::ids::TokenId;
use token_approval_core::service::ApprovalService;
use token_approval_core::state_machine::VersionStatus;
use token_approval_core::store::VersionStore;
use token_approval_core::store_sled::{SledRequestStore, SledVersionStore, SledVoteStore};
use token_approval_core::sweeper::ExpirySweeper;
use token_approval_core::transition::TransitionManager;
use token_approval_core::version::TokenVersion;
use token_approval_core::vote::{AllowAllVerifier, VoteChoice};
use token_approval_core::webhook::{ReqwestSender, WebhookDispatcher, WebhookSubscription};

fn main() -> anyhow::Result<()> {
    token_approval_core::telemetry::init();

    let config = AppConfig::load()?;

    let db = sled::open("demo-sled-db")?;
    if !db.is_empty() {
        db.clear()?;
    }

    let versions: Arc<dyn VersionStore> = Arc::new(SledVersionStore::open(&db)?);
    let requests = Arc::new(SledRequestStore::open(&db)?);
    let votes = Arc::new(SledVoteStore::open(&db)?);
    let audit = Arc::new(token_approval_core::store_memory::InMemoryAuditStore::new());
    let bus = Arc::new(EventBus::new());

    let transitions = Arc::new(TransitionManager::new(versions.clone(), audit.clone()));
    let cascade = Arc::new(CascadeRetirement::new(versions.clone(), transitions.clone()));
    let execution = ExecutionService::new(transitions, cascade, bus.clone());
    execution.install(&bus);

    let transport = Arc::new(ReqwestSender::with_timeout(Duration::from_secs(config.webhook_request_timeout_secs)));
    let webhooks = WebhookDispatcher::from_config(transport, &config);
    webhooks.add_subscription(WebhookSubscription::new(
        "https://example.invalid/hooks/token-approval".to_string(),
        vec!["*".to_string()],
        "demo-secret".to_string(),
    ));
    webhooks.install(&bus);

    let service = Arc::new(ApprovalService::new(
        versions.clone(),
        requests,
        votes,
        bus,
        Box::new(AllowAllVerifier),
    ));

    let sweeper = ExpirySweeper::spawn(service.clone(), Duration::from_secs(config.sweeper_interval_secs));

    let token_id = TokenId::new();
    let mut version = TokenVersion::new(token_id, 1, b"demo token content".to_vec());
    version.status = VersionStatus::PendingVvb;
    versions.put(&version)?;

    let validators = vec!["validator_a".to_string(), "validator_b".to_string(), "validator_c".to_string()];
    let request = service.create_request(
        version.id.clone(),
        validators,
        config.default_voting_window_seconds,
        Some(config.default_threshold_percent),
    )?;

    service.submit_vote(request.id.clone(), "validator_a".to_string(), VoteChoice::Yes, None, None)?;
    let outcome = service.submit_vote(request.id.clone(), "validator_b".to_string(), VoteChoice::Yes, None, None)?;

    println!("consensus after second vote: {:?}", outcome.consensus);

    let fetched = versions.get(&version.id)?.expect("version round-trips through sled");
    println!("{:#?}", fetched);

    sweeper.stop();

    Ok(())
}
