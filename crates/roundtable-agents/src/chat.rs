use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, warn};

use crate::error::AgentError;

/// One "send messages, get text back" exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

/// The boundary every role and chairman call goes through. Mockable for testing.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError>;
}

/// Recent failure counts per provider.
///
/// Counts live in a moka cache whose TTL is the failure window, so a provider that
/// stops failing drifts back up the order. Clones share the same counts. Each
/// orchestrator owns its own tracker; there is no process-wide state.
#[derive(Clone)]
pub struct FailureTracker {
    failures: Cache<String, u32>,
}

impl FailureTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            failures: Cache::builder()
                .max_capacity(256)
                .time_to_live(window)
                .build(),
        }
    }

    pub async fn record_failure(&self, provider: &str) -> u32 {
        let count = self.count(provider).await + 1;
        self.failures.insert(provider.to_string(), count).await;
        count
    }

    pub async fn count(&self, provider: &str) -> u32 {
        self.failures.get(provider).await.unwrap_or(0)
    }
}

/// Provider chain: preferred, then the named peer, then everyone else by
/// ascending recent-failure count.
#[derive(Clone)]
pub struct FailoverChat {
    providers: Arc<Vec<Arc<dyn ChatProvider>>>,
    tracker: FailureTracker,
    preferred: Option<String>,
    peer: Option<String>,
}

impl FailoverChat {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, tracker: FailureTracker) -> Self {
        Self {
            providers: Arc::new(providers),
            tracker,
            preferred: None,
            peer: None,
        }
    }

    /// A view over the same providers and failure counts with a different preference.
    pub fn with_preference(&self, preferred: Option<String>, peer: Option<String>) -> Self {
        Self {
            providers: Arc::clone(&self.providers),
            tracker: self.tracker.clone(),
            preferred,
            peer,
        }
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    /// Provider names in the order they will be tried.
    pub async fn attempt_order(&self) -> Vec<String> {
        let mut pinned: Vec<String> = Vec::new();
        for name in [&self.preferred, &self.peer].into_iter().flatten() {
            if !pinned.contains(name) && self.providers.iter().any(|p| p.name() == name) {
                pinned.push(name.clone());
            }
        }

        let mut rest: Vec<(u32, String)> = Vec::new();
        for provider in self.providers.iter() {
            let name = provider.name();
            if !pinned.iter().any(|p| p == name) {
                rest.push((self.tracker.count(name).await, name.to_string()));
            }
        }
        // Stable: ties keep configured order.
        rest.sort_by_key(|(failures, _)| *failures);

        pinned.extend(rest.into_iter().map(|(_, name)| name));
        pinned
    }
}

#[async_trait]
impl ChatProvider for FailoverChat {
    fn name(&self) -> &str {
        "failover"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
        let order = self.attempt_order().await;
        let mut last_error = String::from("no providers configured");

        for name in order {
            let Some(provider) = self.providers.iter().find(|p| p.name() == name) else {
                continue;
            };

            match provider.complete(request).await {
                Ok(text) => {
                    debug!(provider = %name, "Chat call succeeded");
                    return Ok(text);
                }
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                Err(e) => {
                    let failures = self.tracker.record_failure(&name).await;
                    warn!(provider = %name, error = %e, failures, "Chat provider failed, trying next");
                    last_error = format!("{name}: {e}");
                }
            }
        }

        Err(AgentError::Transport(format!(
            "All providers exhausted (last: {last_error})"
        )))
    }
}
