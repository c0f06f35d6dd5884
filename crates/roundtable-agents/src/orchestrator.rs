use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use roundtable_log::SessionLog;
use roundtable_models::config::DeliberationConfig;
use roundtable_models::decision::{Decision, DecisionSource};
use roundtable_models::discussion::DiscussionRow;
use roundtable_models::input::DeliberationInput;
use roundtable_models::opinion::{DebateResponse, Opinion, RoleId};
use roundtable_models::session::{RoleTiming, Round, SessionResult, TimingStatus};
use roundtable_models::stance::Depth;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chairman::Chairman;
use crate::consensus::unanimous_stance;
use crate::error::AgentError;
use crate::events::PhaseEvent;
use crate::fallback::fallback_vote;
use crate::prompts::DebateDigest;
use crate::roles::RoleAgent;

/// Depth for this session. An open position always gets the fastest path.
pub fn select_depth(config: &DeliberationConfig, input: &DeliberationInput) -> Depth {
    if input.has_open_position() {
        return Depth::Quick;
    }
    match config.default_depth {
        Depth::Deep if !config.allow_deep => Depth::Standard,
        depth => depth,
    }
}

/// Drives one deliberation: Round 1, optional debate, chairman or fallback, log.
pub struct Orchestrator {
    roles: Vec<Arc<dyn RoleAgent>>,
    chairman: Chairman,
    log: Arc<dyn SessionLog>,
    config: DeliberationConfig,
    observer: Option<mpsc::Sender<PhaseEvent>>,
}

/// Successful results and one timing per launched role, in seat order.
struct RoundOutcome<T> {
    results: Vec<T>,
    timings: Vec<RoleTiming>,
}

impl Orchestrator {
    pub fn new(
        roles: Vec<Arc<dyn RoleAgent>>,
        chairman: Chairman,
        log: Arc<dyn SessionLog>,
        config: DeliberationConfig,
    ) -> Self {
        Self {
            roles,
            chairman,
            log,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: mpsc::Sender<PhaseEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &DeliberationConfig {
        &self.config
    }

    /// Agents for enabled roles, in configured order.
    fn seated(&self) -> Vec<Arc<dyn RoleAgent>> {
        self.config
            .enabled_roles()
            .filter_map(|rc| {
                let agent = self.roles.iter().find(|a| a.role() == rc.role);
                if agent.is_none() {
                    debug!(role = %rc.role, "Role enabled in config but no agent registered");
                }
                agent.cloned()
            })
            .collect()
    }

    /// Run a full session.
    ///
    /// Fails only on cancellation or when Round 1 misses quorum. Chairman and
    /// persistence failures degrade instead of failing.
    pub async fn deliberate(
        &self,
        input: &DeliberationInput,
        cancel: &CancellationToken,
    ) -> Result<SessionResult, AgentError> {
        let session_id = Uuid::new_v4();
        let depth = select_depth(&self.config, input);
        info!(session_id = %session_id, symbol = %input.symbol(), depth = %depth, "Deliberation started");
        self.notify(PhaseEvent::SessionStarted {
            session_id,
            symbol: input.symbol().to_string(),
            depth,
        });

        match self.run(session_id, depth, input, cancel).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Deliberation failed");
                self.notify(PhaseEvent::SessionFailed {
                    session_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        session_id: Uuid,
        depth: Depth,
        input: &DeliberationInput,
        cancel: &CancellationToken,
    ) -> Result<SessionResult, AgentError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let shared_input = Arc::new(input.clone());
        let seated = self.seated();
        let role_timeout = Duration::from_millis(self.config.role_timeout_ms);

        // Round 1
        let round1 = run_round(&seated, Round::R1, role_timeout, cancel, |agent| {
            let input = Arc::clone(&shared_input);
            let cancel = cancel.clone();
            async move { agent.analyze(&input, &cancel).await }
        })
        .await?;
        let opinions: Vec<Opinion> = round1.results;
        let mut timings = round1.timings;

        let responded: Vec<RoleId> = opinions.iter().map(|o| o.role).collect();
        let missing: Vec<RoleId> = seated
            .iter()
            .map(|a| a.role())
            .filter(|r| !responded.contains(r))
            .collect();
        info!(
            session_id = %session_id,
            responded = responded.len(),
            missing = missing.len(),
            "Round 1 complete"
        );
        self.notify(PhaseEvent::Round1Completed {
            session_id,
            responded: responded.clone(),
            missing,
        });

        if opinions.len() < self.config.quorum {
            return Err(AgentError::Quorum {
                got: opinions.len(),
                required: self.config.quorum,
            });
        }

        // Round 2
        let round2 = if !depth.allows_debate() {
            self.skip_round2(session_id, format!("depth {depth} does not debate"));
            None
        } else if let Some(stance) = unanimous_stance(&opinions) {
            self.skip_round2(session_id, format!("unanimous {stance}"));
            None
        } else {
            let survivors: Vec<Arc<dyn RoleAgent>> = seated
                .iter()
                .filter(|a| responded.contains(&a.role()))
                .cloned()
                .collect();
            let summary_chars = self.config.summary_chars;

            let debate = run_round(&survivors, Round::R2, role_timeout, cancel, |agent| {
                let input = Arc::clone(&shared_input);
                let cancel = cancel.clone();
                let digest = DebateDigest::build(agent.role(), &opinions, depth, summary_chars);
                async move { agent.debate(&input, &digest, &cancel).await }
            })
            .await?;
            timings.extend(debate.timings);

            let responses: Vec<DebateResponse> = debate.results;
            info!(session_id = %session_id, responded = responses.len(), "Round 2 complete");
            self.notify(PhaseEvent::Round2Completed {
                session_id,
                responded: responses.iter().map(|r| r.role).collect(),
            });
            Some(responses)
        };

        // Chairman, or the fallback vote
        let (decision, decision_source, chairman_timing) = self
            .decide(input, &opinions, round2.as_deref(), depth, cancel)
            .await?;
        timings.push(chairman_timing);

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        info!(
            session_id = %session_id,
            action = %decision.action,
            confidence = %decision.confidence,
            source = decision_source.as_str(),
            "Decision reached"
        );
        self.notify(PhaseEvent::DecisionReached {
            session_id,
            action: decision.action,
            confidence: decision.confidence,
            source: decision_source,
        });

        let result = SessionResult {
            session_id,
            symbol: input.symbol().to_string(),
            depth,
            started_at,
            round1: opinions,
            round2,
            consensus_level: decision.consensus_level,
            decision,
            decision_source,
            timings,
            total_duration_ms: elapsed_ms(clock),
        };

        self.persist(&result);
        Ok(result)
    }

    async fn decide(
        &self,
        input: &DeliberationInput,
        round1: &[Opinion],
        round2: Option<&[DebateResponse]>,
        depth: Depth,
        cancel: &CancellationToken,
    ) -> Result<(Decision, DecisionSource, RoleTiming), AgentError> {
        let limit = Duration::from_millis(self.config.chairman_timeout_ms);
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            limit,
            self.chairman.synthesize(input, round1, round2, depth, cancel),
        )
        .await;
        let duration_ms = elapsed_ms(started);

        let status = match outcome {
            Ok(Ok(decision)) => {
                let timing = chairman_timing(duration_ms, TimingStatus::Ok);
                return Ok((decision, DecisionSource::Chairman, timing));
            }
            Ok(Err(AgentError::Cancelled)) => return Err(AgentError::Cancelled),
            Ok(Err(e)) => {
                warn!(symbol = %input.symbol(), error = %e, "Chairman failed, using fallback vote");
                status_for(&e)
            }
            Err(_) => {
                warn!(
                    symbol = %input.symbol(),
                    timeout_ms = self.config.chairman_timeout_ms,
                    "Chairman timed out, using fallback vote"
                );
                TimingStatus::Timeout
            }
        };

        let decision = fallback_vote(input.symbol(), round1, &self.config);
        Ok((
            decision,
            DecisionSource::Fallback,
            chairman_timing(duration_ms, status),
        ))
    }

    fn skip_round2(&self, session_id: Uuid, reason: String) {
        info!(session_id = %session_id, reason = %reason, "Round 2 skipped");
        self.notify(PhaseEvent::Round2Skipped { session_id, reason });
    }

    fn persist(&self, result: &SessionResult) {
        let row = match DiscussionRow::from_session(result) {
            Ok(row) => row,
            Err(e) => {
                error!(session_id = %result.session_id, error = %e, "Failed to serialize session");
                return;
            }
        };

        match self.log.append(&row) {
            Ok(()) => {
                debug!(session_id = %result.session_id, "Session persisted");
                self.notify(PhaseEvent::SessionPersisted {
                    session_id: result.session_id,
                });
            }
            Err(e) => {
                error!(session_id = %result.session_id, error = %e, "Failed to persist session");
            }
        }
    }

    fn notify(&self, event: PhaseEvent) {
        if let Some(observer) = &self.observer {
            if let Err(e) = observer.try_send(event) {
                debug!(error = %e, "Observer dropped phase event");
            }
        }
    }
}

/// Fan out one call per agent, each under its own timeout, and wait for all to settle.
///
/// Failures only remove the failing role. Cancellation aborts every in-flight call.
async fn run_round<T, F, Fut>(
    agents: &[Arc<dyn RoleAgent>],
    round: Round,
    limit: Duration,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<RoundOutcome<T>, AgentError>
where
    T: Send + 'static,
    F: FnMut(Arc<dyn RoleAgent>) -> Fut,
    Fut: Future<Output = Result<T, AgentError>> + Send + 'static,
{
    let round_start = Instant::now();
    let mut set = JoinSet::new();
    for agent in agents {
        let role = agent.role();
        let fut = call(Arc::clone(agent));
        set.spawn(async move {
            let started = Instant::now();
            let outcome = tokio::time::timeout(limit, fut).await;
            (role, elapsed_ms(started), outcome)
        });
    }

    let mut results: Vec<(RoleId, T)> = Vec::new();
    let mut timings: Vec<RoleTiming> = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                set.abort_all();
                return Err(AgentError::Cancelled);
            }
            next = set.join_next() => next,
        };

        let Some(joined) = next else { break };
        match joined {
            Ok((role, duration_ms, Ok(Ok(value)))) => {
                debug!(role = %role, round = ?round, elapsed_ms = duration_ms, "Role responded");
                timings.push(role_timing(role, round, duration_ms, TimingStatus::Ok));
                results.push((role, value));
            }
            Ok((_, _, Ok(Err(AgentError::Cancelled)))) => {
                set.abort_all();
                return Err(AgentError::Cancelled);
            }
            Ok((role, duration_ms, Ok(Err(e)))) => {
                warn!(role = %role, round = ?round, error = %e, "Role abstained");
                timings.push(role_timing(role, round, duration_ms, status_for(&e)));
            }
            Ok((role, duration_ms, Err(_))) => {
                warn!(role = %role, round = ?round, timeout_ms = limit.as_millis() as u64, "Role timed out");
                timings.push(role_timing(role, round, duration_ms, TimingStatus::Timeout));
            }
            Err(e) => {
                error!(round = ?round, error = %e, "Role task panicked");
            }
        }
    }

    // A panicked task never reports its role; anything unaccounted for failed.
    for agent in agents {
        let role = agent.role();
        if !timings.iter().any(|t| t.role == Some(role)) {
            timings.push(role_timing(role, round, elapsed_ms(round_start), TimingStatus::Failed));
        }
    }

    let seat = |role: RoleId| agents.iter().position(|a| a.role() == role);
    results.sort_by_key(|(role, _)| seat(*role));
    timings.sort_by_key(|t| t.role.and_then(seat));

    Ok(RoundOutcome {
        results: results.into_iter().map(|(_, value)| value).collect(),
        timings,
    })
}

fn status_for(error: &AgentError) -> TimingStatus {
    match error {
        AgentError::Timeout(_) => TimingStatus::Timeout,
        _ => TimingStatus::Failed,
    }
}

fn role_timing(role: RoleId, round: Round, duration_ms: u64, status: TimingStatus) -> RoleTiming {
    RoleTiming {
        role: Some(role),
        round,
        duration_ms,
        status,
    }
}

fn chairman_timing(duration_ms: u64, status: TimingStatus) -> RoleTiming {
    RoleTiming {
        role: None,
        round: Round::Chairman,
        duration_ms,
        status,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
