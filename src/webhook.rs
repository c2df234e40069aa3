//! §4.8 WebhookDispatcher — bounded-queue, worker-pool, HMAC-signed HTTP
//! delivery with exponential backoff retry. The signing/retry shape follows
//! a `reqwest`-blocking usage pattern; the pluggable `HttpSender` seam
//! keeps the retry state machine testable without a live HTTP server.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;

use crate::error::WebhookError;
use crate::event::DomainEvent;
use crate::ids::{DeliveryId, WebhookId};

pub const QUEUE_CAPACITY: usize = 10_000;
pub const WORKER_COUNT: usize = 5;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(32);

#[derive(Debug, Clone)]
pub struct WebhookSubscription {
    pub id: WebhookId,
    pub url: String,
    pub event_types: Vec<String>,
    pub secret: String,
}

impl WebhookSubscription {
    pub fn new(url: String, event_types: Vec<String>, secret: String) -> Self {
        Self {
            id: WebhookId::new(),
            url,
            event_types,
            secret,
        }
    }

    fn matches(&self, wire_type: &str) -> bool {
        self.event_types.iter().any(|t| t == "*" || t == wire_type)
    }
}

/// The seam between retry/signing logic and the actual transport, so tests
/// can exercise backoff behavior without a live server.
pub trait HttpSender: Send + Sync {
    fn post(&self, url: &str, body: &[u8], headers: &[(&str, String)]) -> Result<u16, String>;
}

pub struct ReqwestSender {
    client: reqwest::blocking::Client,
}

impl Default for ReqwestSender {
    fn default() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }
}

impl ReqwestSender {
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a static config");
        Self { client }
    }
}

impl HttpSender for ReqwestSender {
    fn post(&self, url: &str, body: &[u8], headers: &[(&str, String)]) -> Result<u16, String> {
        let mut req = self.client.post(url).body(body.to_vec());
        for (key, value) in headers {
            req = req.header(*key, value.clone());
        }
        let response = req.send().map_err(|err| err.to_string())?;
        Ok(response.status().as_u16())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    id: &'a str,
    event: &'a str,
    approval_id: Option<String>,
    timestamp: String,
    data: serde_json::Value,
}

struct QueuedDelivery {
    subscription: WebhookSubscription,
    wire_type: String,
    approval_id: Option<String>,
    data: serde_json::Value,
}

/// §4.8 WebhookDispatcher. Owns a bounded MPSC queue and a fixed worker
/// pool; workers never call back into `ApprovalService` (§5).
pub struct WebhookDispatcher {
    sender: SyncSender<QueuedDelivery>,
    subscriptions: Arc<Mutex<Vec<WebhookSubscription>>>,
}

impl WebhookDispatcher {
    pub fn new(transport: Arc<dyn HttpSender>, queue_capacity: usize, worker_count: usize) -> Arc<Self> {
        let (tx, rx) = sync_channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(rx));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let transport = transport.clone();
            thread::Builder::new()
                .name(format!("webhook-worker-{worker_id}"))
                .spawn(move || worker_loop(receiver, transport))
                .expect("spawning a webhook worker thread");
        }

        Arc::new(Self {
            sender: tx,
            subscriptions,
        })
    }

    /// Builds a dispatcher sized from `AppConfig` instead of the module's
    /// hardcoded `QUEUE_CAPACITY`/`WORKER_COUNT` defaults.
    pub fn from_config(transport: Arc<dyn HttpSender>, config: &crate::config::AppConfig) -> Arc<Self> {
        Self::new(transport, config.webhook_queue_capacity, config.webhook_worker_count)
    }

    pub fn add_subscription(&self, subscription: WebhookSubscription) -> WebhookId {
        let id = subscription.id.clone();
        self.subscriptions.lock().expect("subscriptions lock poisoned").push(subscription);
        id
    }

    pub fn remove_subscription(&self, id: &WebhookId) {
        self.subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .retain(|s| &s.id != id);
    }

    /// Registers this dispatcher as an `EventBus` subscriber. Matching
    /// subscriptions are enqueued; a full queue is logged and dropped —
    /// delivery is best-effort per §4.8.
    pub fn install(self: &Arc<Self>, bus: &crate::event::EventBus) {
        let this = self.clone();
        bus.subscribe(Arc::new(move |event: &DomainEvent| {
            this.dispatch(event);
        }));
    }

    fn dispatch(&self, event: &DomainEvent) {
        let wire_type = event.wire_type();
        let approval_id = event.approval_id().map(|id| id.to_string());
        let data = event_data(event);

        let matching: Vec<WebhookSubscription> = self
            .subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .iter()
            .filter(|s| s.matches(wire_type))
            .cloned()
            .collect();

        for subscription in matching {
            let delivery = QueuedDelivery {
                subscription,
                wire_type: wire_type.to_string(),
                approval_id: approval_id.clone(),
                data: data.clone(),
            };
            if let Err(TrySendError::Full(_)) = self.sender.try_send(delivery) {
                tracing::warn!(event = wire_type, "webhook queue full, dropping delivery");
            }
        }
    }

    /// Exposed for callers (e.g. an HTTP admin surface) that want `QueueFull`
    /// surfaced rather than silently logged, per §4.8's "caller decides".
    pub fn try_dispatch_one(&self, subscription: WebhookSubscription, event: &DomainEvent) -> Result<(), WebhookError> {
        let delivery = QueuedDelivery {
            wire_type: event.wire_type().to_string(),
            approval_id: event.approval_id().map(|id| id.to_string()),
            data: event_data(event),
            subscription,
        };
        self.sender.try_send(delivery).map_err(|_| WebhookError::QueueFull)
    }
}

fn event_data(event: &DomainEvent) -> serde_json::Value {
    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
}

fn worker_loop(receiver: Arc<Mutex<Receiver<QueuedDelivery>>>, transport: Arc<dyn HttpSender>) {
    loop {
        let delivery = {
            let rx = receiver.lock().expect("webhook receiver lock poisoned");
            rx.recv()
        };
        let Ok(delivery) = delivery else {
            return; // all senders dropped, dispatcher shut down
        };
        deliver_with_retry(&delivery, transport.as_ref());
    }
}

fn deliver_with_retry(delivery: &QueuedDelivery, transport: &dyn HttpSender) {
    let delivery_id = DeliveryId::new();
    let body = build_body(delivery, &delivery_id);
    let signature = sign(&body, &delivery.subscription.secret);

    let headers = [
        ("X-Aurigraph-Signature", format!("sha256={signature}")),
        ("X-Aurigraph-Event", delivery.wire_type.clone()),
        ("X-Aurigraph-Delivery-ID", delivery_id.to_string()),
        ("Content-Type", "application/json".to_string()),
    ];

    let mut attempt = 0;
    loop {
        match transport.post(&delivery.subscription.url, &body, &headers) {
            Ok(status) if (200..300).contains(&status) => {
                tracing::info!(
                    delivery_id = %delivery_id,
                    url = %delivery.subscription.url,
                    attempt,
                    "webhook delivered"
                );
                return;
            }
            Ok(status) => {
                tracing::warn!(delivery_id = %delivery_id, status, attempt, "webhook delivery rejected");
            }
            Err(err) => {
                tracing::warn!(delivery_id = %delivery_id, %err, attempt, "webhook delivery error");
            }
        }

        if attempt >= MAX_RETRIES {
            tracing::error!(delivery_id = %delivery_id, url = %delivery.subscription.url, "webhook delivery abandoned after final retry");
            return;
        }

        let backoff = std::cmp::min(BASE_BACKOFF * 2u32.pow(attempt), MAX_BACKOFF);
        thread::sleep(backoff);
        attempt += 1;
    }
}

fn build_body(delivery: &QueuedDelivery, delivery_id: &DeliveryId) -> Vec<u8> {
    let payload = WebhookPayload {
        id: delivery_id.as_str(),
        event: &delivery.wire_type,
        approval_id: delivery.approval_id.clone(),
        timestamp: Utc::now().to_rfc3339(),
        data: delivery.data.clone(),
    };
    serde_json::to_vec(&json!(payload)).expect("webhook payload always serializes")
}

fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
