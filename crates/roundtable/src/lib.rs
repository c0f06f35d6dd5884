//! Roundtable - multi-agent trade deliberation
//!
//! Six specialist roles give independent opinions on a symbol, debate when they
//! disagree, and a chairman commits to one decision. When the chairman is
//! unavailable a deterministic weighted vote decides instead. Every session is
//! recorded in an append-only SQLite discussion log.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use roundtable::models::config::RoundtableConfig;
//! use roundtable::models::input::DeliberationInput;
//! use roundtable::agents::{Orchestrator, PhaseEvent};
//! use roundtable::log::SqliteDiscussionLog;
//! ```

pub use roundtable_agents as agents;
pub use roundtable_log as log;
pub use roundtable_models as models;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use roundtable_agents::{
    persona_for, AgentError, Chairman, ChatProvider, ClaudeCliProvider, FailoverChat,
    FailureTracker, Orchestrator, RoleAgent,
};
use roundtable_log::{SessionLog, SqliteDiscussionLog};
use roundtable_models::config::{ChatConfig, LogConfig, RoundtableConfig};
use roundtable_models::input::DeliberationInput;
use roundtable_models::session::SessionResult;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The provider chain shared by every role and the chairman.
pub fn build_chat(config: &ChatConfig) -> FailoverChat {
    let providers: Vec<Arc<dyn ChatProvider>> = config
        .providers
        .iter()
        .map(|p| Arc::new(ClaudeCliProvider::from_config(p)) as Arc<dyn ChatProvider>)
        .collect();
    let tracker = FailureTracker::new(Duration::from_secs(config.failure_window_seconds));

    FailoverChat::new(providers, tracker)
        .with_preference(config.preferred.clone(), config.peer.clone())
}

/// Open the discussion log, creating its directory if needed.
pub fn open_log(config: &LogConfig) -> Result<SqliteDiscussionLog, anyhow::Error> {
    if let Some(parent) = Path::new(&config.sqlite_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    SqliteDiscussionLog::open(&config.sqlite_path)
        .with_context(|| format!("Failed to open discussion log: {}", config.sqlite_path))
}

/// Build an Orchestrator writing to the given log.
pub fn build_orchestrator_with_log(
    config: &RoundtableConfig,
    log: Arc<dyn SessionLog>,
) -> Orchestrator {
    let chat = build_chat(&config.chat);

    let roles: Vec<Arc<dyn RoleAgent>> = config
        .roundtable
        .enabled_roles()
        .map(|rc| {
            let preferred = rc
                .preferred_provider
                .clone()
                .or_else(|| config.chat.preferred.clone());
            let view = chat.with_preference(preferred, config.chat.peer.clone());
            persona_for(rc.role, Arc::new(view))
        })
        .collect();

    let chairman_chat = chat.with_preference(
        config
            .chat
            .chairman_provider
            .clone()
            .or_else(|| config.chat.preferred.clone()),
        config.chat.peer.clone(),
    );
    let chairman = Chairman::new(Arc::new(chairman_chat), config.roundtable.summary_chars);

    Orchestrator::new(roles, chairman, log, config.roundtable.clone())
}

/// Build an Orchestrator from configuration, backed by the SQLite discussion log.
pub fn build_orchestrator(config: &RoundtableConfig) -> Result<Orchestrator, anyhow::Error> {
    let log = open_log(&config.log)?;
    Ok(build_orchestrator_with_log(config, Arc::new(log)))
}

/// Run one deliberation session.
pub async fn deliberate(
    orchestrator: &Orchestrator,
    input: &DeliberationInput,
    cancel: &CancellationToken,
) -> Result<SessionResult, AgentError> {
    orchestrator.deliberate(input, cancel).await
}

/// Cancel `cancel` once `signal` fires.
///
/// A signal handler that fails to install leaves the session running.
pub async fn cancel_on_signal<S>(signal: S, cancel: CancellationToken)
where
    S: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received shutdown signal");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
