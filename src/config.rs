//! Layered runtime configuration via the `config` crate, env-prefixed
//! `TOKEN_APPROVAL_`. Defaults match §4.8/§4.9's suggested constants so the
//! service runs sanely with no environment set at all.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_voting_window_seconds: u64,
    pub default_threshold_percent: f64,
    pub webhook_queue_capacity: usize,
    pub webhook_worker_count: usize,
    pub webhook_request_timeout_secs: u64,
    pub sweeper_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_voting_window_seconds: 3600,
            default_threshold_percent: crate::request::DEFAULT_THRESHOLD_PERCENT,
            webhook_queue_capacity: crate::webhook::QUEUE_CAPACITY,
            webhook_worker_count: crate::webhook::WORKER_COUNT,
            webhook_request_timeout_secs: crate::webhook::REQUEST_TIMEOUT.as_secs(),
            sweeper_interval_secs: crate::sweeper::DEFAULT_INTERVAL.as_secs(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then overlays any `TOKEN_APPROVAL_*` environment
    /// variables (e.g. `TOKEN_APPROVAL_SWEEPER_INTERVAL_SECS=30`).
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("default_voting_window_seconds", defaults.default_voting_window_seconds)?
            .set_default("default_threshold_percent", defaults.default_threshold_percent)?
            .set_default("webhook_queue_capacity", defaults.webhook_queue_capacity as i64)?
            .set_default("webhook_worker_count", defaults.webhook_worker_count as i64)?
            .set_default("webhook_request_timeout_secs", defaults.webhook_request_timeout_secs)?
            .set_default("sweeper_interval_secs", defaults.sweeper_interval_secs)?
            .add_source(config::Environment::with_prefix("TOKEN_APPROVAL"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.webhook_worker_count, crate::webhook::WORKER_COUNT);
        assert_eq!(cfg.sweeper_interval_secs, crate::sweeper::DEFAULT_INTERVAL.as_secs());
    }
}
