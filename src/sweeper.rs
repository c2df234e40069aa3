//! §4.9 ExpirySweeper — a single timer thread that expires PENDING requests
//! whose voting window has closed. Mirrors a background-thread
//! idiom (a named `thread::spawn` loop with a shutdown flag) rather than
//! pulling in an async runtime, matching §5's synchronous concurrency model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::service::ApprovalService;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExpirySweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawns the sweeper thread. Call `stop` (or drop the returned value)
    /// to end it.
    pub fn spawn(service: Arc<ApprovalService>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = thread::Builder::new()
            .name("expiry-sweeper".to_string())
            .spawn(move || {
                while !stop_clone.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }
                    sweep_once(&service);
                }
            })
            .expect("spawning the expiry sweeper thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// One sweep pass: idempotent per §4.9, exposed standalone so tests and a
/// manual-trigger HTTP endpoint can drive it without waiting on the timer.
pub fn sweep_once(service: &ApprovalService) {
    for request in service.expired_requests() {
        if let Err(err) = service.expire(&request.id) {
            tracing::warn!(request_id = %request.id, %err, "expiry sweep failed for request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::ids::VersionId;
    use crate::request::RequestStatus;
    use crate::state_machine::VersionStatus;
    use crate::store::{RequestStore, VersionStore};
    use crate::store_memory::{InMemoryRequestStore, InMemoryVersionStore, InMemoryVoteStore};
    use crate::version::TokenVersion;
    use crate::vote::AllowAllVerifier;

    fn setup() -> (Arc<ApprovalService>, VersionId) {
        let versions = Arc::new(InMemoryVersionStore::new());
        let requests = Arc::new(InMemoryRequestStore::new());
        let votes = Arc::new(InMemoryVoteStore::new());
        let bus = Arc::new(EventBus::new());

        let mut version = TokenVersion::new(crate::ids::TokenId::new(), 1, b"x".to_vec());
        version.status = VersionStatus::PendingVvb;
        versions.put(&version).unwrap();

        let service = Arc::new(ApprovalService::new(versions, requests, votes, bus, Box::new(AllowAllVerifier)));
        (service, version.id)
    }

    #[test]
    fn sweep_once_is_a_no_op_while_the_window_is_open() {
        let (service, version_id) = setup();
        let request = service
            .create_request(version_id, vec!["a".into(), "b".into(), "c".into()], 3600, None)
            .unwrap();

        sweep_once(&service);
        let unchanged = service.lookup_request(&request.id).unwrap();
        assert_eq!(unchanged.status, RequestStatus::Pending);
    }

    #[test]
    fn sweep_once_expires_a_request_past_its_voting_window() {
        let (service, version_id) = setup();
        let request = service
            .create_request(version_id, vec!["a".into(), "b".into(), "c".into()], 1, None)
            .unwrap();

        std::thread::sleep(Duration::from_millis(1100));
        sweep_once(&service);

        let expired = service.lookup_request(&request.id).unwrap();
        assert_eq!(expired.status, RequestStatus::Expired);
    }
}
