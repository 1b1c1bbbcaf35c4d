use std::sync::Arc;

use crate::config::RelayConfig;

/// Shared request-handling state: the immutable configuration and one pooled
/// HTTP client reused across all upstream calls.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub client: reqwest::Client,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let client = reqwest::Client::builder()
            // Connect timeout only: a chat response body legitimately streams
            // for minutes, so no overall request deadline is set.
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            config: Arc::new(config),
            client,
        }
    }
}
