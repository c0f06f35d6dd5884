//! Test doubles for the chat boundary, the role seat and the discussion log,
//! plus builders for realistic inputs and opinions.
//!
//! `ScriptedChat` replays canned replies; `ScriptedRole` skips prompting
//! entirely and returns typed outcomes so orchestration can be tested
//! without any JSON in the loop.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use roundtable_log::{LogError, SessionLog};
use roundtable_models::discussion::DiscussionRow;
use roundtable_models::input::{
    AccountSnapshot, CircuitBreakerState, DeliberationInput, MarketSnapshot, OpenPosition,
    OrderBookSummary, RiskLimits, SentimentSummary, StrategyContext, TickerStats,
};
use roundtable_models::opinion::{DebateResponse, Opinion, RoleId};
use roundtable_models::stance::Stance;
use rust_decimal::Decimal;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatProvider, ChatRequest};
use crate::error::AgentError;
use crate::prompts::DebateDigest;
use crate::roles::RoleAgent;

/// One step of a scripted chat provider.
#[derive(Debug, Clone)]
pub enum ChatStep {
    Reply(String),
    Fail,
    /// Never completes. Only a timeout or cancellation ends the call.
    Hang,
}

/// A chat provider that replays a script, then repeats its last step.
pub struct ScriptedChat {
    name: String,
    script: Mutex<VecDeque<ChatStep>>,
    last: Mutex<ChatStep>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn sequence(name: &str, steps: Vec<ChatStep>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(steps.into()),
            last: Mutex::new(ChatStep::Fail),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(name: &str, text: &str) -> Self {
        Self::sequence(name, vec![ChatStep::Reply(text.to_string())])
    }

    pub fn failing(name: &str) -> Self {
        Self::sequence(name, vec![ChatStep::Fail])
    }

    pub fn hanging(name: &str) -> Self {
        Self::sequence(name, vec![ChatStep::Hang])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn next_step(&self) -> ChatStep {
        let mut last = lock(&self.last);
        if let Some(step) = lock(&self.script).pop_front() {
            *last = step;
        }
        last.clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        match self.next_step() {
            ChatStep::Reply(text) => Ok(text),
            ChatStep::Fail => Err(AgentError::Transport(format!("{} is down", self.name))),
            ChatStep::Hang => std::future::pending().await,
        }
    }
}

/// What a `ScriptedRole` does when asked.
#[derive(Debug, Clone)]
pub enum RoleOutcome<T> {
    Return(T),
    Fail,
    /// The provider itself gave up with `AgentError::Timeout`.
    ProviderTimeout,
    /// Waits until cancelled, then reports cancellation.
    Hang,
    /// Panics inside the role task.
    Panic,
}

impl<T: Clone> RoleOutcome<T> {
    async fn play(&self, cancel: &CancellationToken) -> Result<T, AgentError> {
        match self {
            RoleOutcome::Return(value) => Ok(value.clone()),
            RoleOutcome::Fail => Err(AgentError::Validation("scripted failure".to_string())),
            RoleOutcome::ProviderTimeout => Err(AgentError::Timeout(1)),
            RoleOutcome::Hang => {
                cancel.cancelled().await;
                Err(AgentError::Cancelled)
            }
            RoleOutcome::Panic => panic!("scripted role panic"),
        }
    }
}

/// A role double with fixed outcomes for both rounds.
pub struct ScriptedRole {
    role: RoleId,
    analyze: RoleOutcome<Opinion>,
    debate: RoleOutcome<DebateResponse>,
    analyze_calls: AtomicUsize,
    debate_calls: AtomicUsize,
    digests: Mutex<Vec<DebateDigest>>,
}

impl ScriptedRole {
    /// Holds `stance` in Round 1 and keeps it through the debate.
    pub fn new(role: RoleId, stance: Stance, confidence: Decimal) -> Self {
        Self {
            role,
            analyze: RoleOutcome::Return(opinion(role, stance, confidence)),
            debate: RoleOutcome::Return(debate_response(role, stance, confidence)),
            analyze_calls: AtomicUsize::new(0),
            debate_calls: AtomicUsize::new(0),
            digests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_opinion(mut self, opinion: Opinion) -> Self {
        self.analyze = RoleOutcome::Return(opinion);
        self
    }

    pub fn with_analysis(mut self, outcome: RoleOutcome<Opinion>) -> Self {
        self.analyze = outcome;
        self
    }

    pub fn with_debate(mut self, outcome: RoleOutcome<DebateResponse>) -> Self {
        self.debate = outcome;
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn debate_calls(&self) -> usize {
        self.debate_calls.load(Ordering::SeqCst)
    }

    pub fn digests(&self) -> Vec<DebateDigest> {
        lock(&self.digests).clone()
    }
}

#[async_trait]
impl RoleAgent for ScriptedRole {
    fn role(&self) -> RoleId {
        self.role
    }

    async fn analyze(
        &self,
        _input: &DeliberationInput,
        cancel: &CancellationToken,
    ) -> Result<Opinion, AgentError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.analyze.play(cancel).await
    }

    async fn debate(
        &self,
        _input: &DeliberationInput,
        digest: &DebateDigest,
        cancel: &CancellationToken,
    ) -> Result<DebateResponse, AgentError> {
        self.debate_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.digests).push(digest.clone());
        self.debate.play(cancel).await
    }
}

/// A `SessionLog` that keeps rows in memory.
#[derive(Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<DiscussionRow>>,
    fail: bool,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every append.
    pub fn failing() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn rows(&self) -> Vec<DiscussionRow> {
        lock(&self.rows).clone()
    }
}

impl SessionLog for MemoryLog {
    fn append(&self, row: &DiscussionRow) -> Result<(), LogError> {
        if self.fail {
            return Err(LogError::Unavailable("memory log is read-only".to_string()));
        }
        lock(&self.rows).push(row.clone());
        Ok(())
    }
}

pub fn opinion(role: RoleId, stance: Stance, confidence: Decimal) -> Opinion {
    Opinion {
        role,
        stance,
        confidence,
        reasoning: format!("{} leans {}", role.display_name(), stance),
        key_points: vec![format!("{} point", role.display_name())],
        suggested_params: None,
    }
}

pub fn debate_response(role: RoleId, stance: Stance, confidence: Decimal) -> DebateResponse {
    DebateResponse {
        role,
        revised_stance: stance,
        final_confidence: confidence,
        stance_changed: false,
        change_reason: None,
        agreements: Vec::new(),
        challenges: Vec::new(),
        final_reasoning: format!("{} stays {}", role.display_name(), stance),
    }
}

/// A flat account with no positions and a populated market snapshot.
pub fn sample_input(symbol: &str) -> DeliberationInput {
    let mut timeframes = BTreeMap::new();
    timeframes.insert(
        "1h".to_string(),
        json!({"rsi": 58.2, "ema_20": 61750.0, "ema_50": 61200.0, "atr": 420.0}),
    );
    timeframes.insert(
        "4h".to_string(),
        json!({"rsi": 61.0, "ema_20": 60900.0, "ema_50": 59800.0, "atr": 980.0}),
    );

    DeliberationInput {
        market: MarketSnapshot {
            symbol: symbol.to_string(),
            price: Decimal::new(62_000, 0),
            timeframes,
            order_book: Some(OrderBookSummary {
                bid_depth: Decimal::new(1_250_000, 0),
                ask_depth: Decimal::new(980_000, 0),
                imbalance: Decimal::new(12, 2),
                spread: Decimal::new(5, 1),
            }),
            sentiment: Some(SentimentSummary {
                fear_greed_index: Some(64),
                label: Some("greed".to_string()),
                news_score: Some(Decimal::new(3, 1)),
            }),
            narrative: Some("ETF inflows steady, no macro events this week".to_string()),
            funding_rate: Some(Decimal::new(1, 4)),
            ticker: Some(TickerStats {
                change_24h_percent: Decimal::new(21, 1),
                volume_24h: Decimal::new(28_500_000_000, 0),
                high_24h: Decimal::new(62_400, 0),
                low_24h: Decimal::new(60_300, 0),
            }),
        },
        account: AccountSnapshot {
            total_balance: Decimal::new(10_000, 0),
            available_balance: Decimal::new(8_500, 0),
            positions: Vec::new(),
            circuit_breaker: CircuitBreakerState::default(),
            win_streak: 2,
            loss_streak: 0,
            risk_limits: Some(RiskLimits {
                max_position_percent: Decimal::new(20, 0),
                max_leverage: Decimal::new(5, 0),
                max_daily_loss_percent: Decimal::new(3, 0),
            }),
        },
        strategy: StrategyContext {
            htf_bias: Some("bullish above 60k".to_string()),
            ..StrategyContext::default()
        },
    }
}

/// `sample_input` with an open long on the same symbol.
pub fn input_with_position(symbol: &str) -> DeliberationInput {
    let mut input = sample_input(symbol);
    input.account.positions.push(OpenPosition {
        symbol: symbol.to_string(),
        side: "long".to_string(),
        size: Decimal::new(5, 2),
        entry_price: Decimal::new(61_000, 0),
        unrealized_pnl: Decimal::new(50, 0),
        leverage: Some(Decimal::new(3, 0)),
    });
    input
}

/// A well-formed chairman reply.
pub fn chairman_reply(action: Stance, confidence: Decimal) -> String {
    json!({
        "action": action.as_str(),
        "confidence": confidence.to_string(),
        "reasoning": format!("Chair settles on {action}"),
        "consensus_level": "majority",
        "key_debate_points": ["trend intact on 4h"],
        "dissent": null,
        "risk_manager_verdict": {"approved": true, "vetoed": false, "reasoning": "within limits"},
        "market_regime": "trending_up"
    })
    .to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
