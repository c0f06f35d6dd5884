use roundtable_models::input::DeliberationInput;
use roundtable_models::opinion::{Agreement, DebateResponse, Opinion, RoleId};
use roundtable_models::stance::{Depth, Stance};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

/// Prompt construction for one seat at the table. The six personas differ only here.
pub trait RolePersona: Send + Sync + 'static {
    fn role(&self) -> RoleId;

    /// Body of the system prompt: what this role cares about and how it judges.
    fn charter(&self) -> &'static str;

    /// The slice of the snapshot this role is shown.
    fn briefing(&self, input: &DeliberationInput) -> Value;
}

pub struct Strategist;
pub struct TechnicalAnalyst;
pub struct RiskManager;
pub struct ExecutionTrader;
pub struct SentimentAnalyst;
pub struct PortfolioManager;

impl RolePersona for Strategist {
    fn role(&self) -> RoleId {
        RoleId::Strategist
    }

    fn charter(&self) -> &'static str {
        "You own the thesis. Weigh the higher-timeframe bias, the active trading plan and \
         the lessons in memory against the current narrative. Prefer HOLD when the setup \
         contradicts the plan; prefer CLOSE when the entry thesis of an open position is \
         invalidated. Suggest entry, stop and target only when you recommend an entry."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        json!({
            "price": input.market.price,
            "htf_bias": input.strategy.htf_bias,
            "memory": input.strategy.memory,
            "trading_plan": input.strategy.trading_plan,
            "narrative": input.market.narrative,
            "entry_thesis": input.strategy.entry_thesis,
            "position": input.account.position_for(input.symbol()),
        })
    }
}

impl RolePersona for TechnicalAnalyst {
    fn role(&self) -> RoleId {
        RoleId::TechnicalAnalyst
    }

    fn charter(&self) -> &'static str {
        "You read price structure and indicators across timeframes. Lower timeframes time \
         the entry; higher timeframes set direction. Say LONG or SHORT only when at least \
         two timeframes agree. Place stops beyond the structure that invalidates the idea \
         and targets at the next opposing level."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        json!({
            "price": input.market.price,
            "timeframes": input.market.timeframes,
            "ticker": input.market.ticker,
        })
    }
}

impl RolePersona for RiskManager {
    fn role(&self) -> RoleId {
        RoleId::RiskManager
    }

    fn charter(&self) -> &'static str {
        "You protect the account. Check exposure against the tier limits, the circuit \
         breaker, the loss streak and funding costs. Cap position size and leverage in your \
         suggested params. If the trade must not be taken under any sizing, put a key point \
         starting with the word VETO followed by the reason."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        let account = &input.account;
        json!({
            "price": input.market.price,
            "total_balance": account.total_balance,
            "available_balance": account.available_balance,
            "positions": account.positions,
            "circuit_breaker": account.circuit_breaker,
            "win_streak": account.win_streak,
            "loss_streak": account.loss_streak,
            "risk_limits": account.risk_limits,
            "funding_rate": input.market.funding_rate,
        })
    }
}

impl RolePersona for ExecutionTrader {
    fn role(&self) -> RoleId {
        RoleId::ExecutionTrader
    }

    fn charter(&self) -> &'static str {
        "You judge whether the trade can be filled well right now. Look at book depth, \
         imbalance, spread and the day's range. Recommend ADJUST when an open position's \
         orders need moving, and give a concrete entry price when a limit order beats \
         crossing the spread."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        json!({
            "price": input.market.price,
            "order_book": input.market.order_book,
            "ticker": input.market.ticker,
            "funding_rate": input.market.funding_rate,
            "position": input.account.position_for(input.symbol()),
        })
    }
}

impl RolePersona for SentimentAnalyst {
    fn role(&self) -> RoleId {
        RoleId::SentimentAnalyst
    }

    fn charter(&self) -> &'static str {
        "You read crowd positioning. Extreme greed with rich funding argues against fresh \
         longs; extreme fear with negative funding argues against fresh shorts. Treat the \
         narrative as context, not a signal, and say HOLD when sentiment is neutral."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        json!({
            "sentiment": input.market.sentiment,
            "narrative": input.market.narrative,
            "funding_rate": input.market.funding_rate,
            "change_24h_percent": input.market.ticker.as_ref().map(|t| t.change_24h_percent),
        })
    }
}

impl RolePersona for PortfolioManager {
    fn role(&self) -> RoleId {
        RoleId::PortfolioManager
    }

    fn charter(&self) -> &'static str {
        "You look at the book as a whole. Consider correlation with the other open \
         positions, how this symbol has been traded recently and whether capital is better \
         used elsewhere. Recommend ADD or REDUCE for an open position; suggest a position \
         size as a percent of balance for new entries."
    }

    fn briefing(&self, input: &DeliberationInput) -> Value {
        json!({
            "total_balance": input.account.total_balance,
            "available_balance": input.account.available_balance,
            "positions": input.account.positions,
            "position_history": input.strategy.position_history,
            "trading_plan": input.strategy.trading_plan,
            "entry_thesis": input.strategy.entry_thesis,
        })
    }
}

fn stance_list() -> String {
    Stance::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn analysis_system_prompt(persona: &dyn RolePersona) -> String {
    let example = json!({
        "stance": "<one of the stances>",
        "confidence": 0.65,
        "reasoning": "<concise reasoning>",
        "key_points": ["<short point>"],
        "suggested_params": {
            "entry_price": null,
            "stop_loss": null,
            "take_profit": null,
            "position_size_percent": null,
            "leverage": null
        }
    });

    format!(
        "You are the {} on a trading roundtable. Six specialists give independent views \
         on one symbol before a chairman decides.\n\n\
         {}\n\n\
         Stances: {}.\n\n\
         You MUST respond with ONLY a JSON object matching this schema:\n{}\n\n\
         confidence is a number between 0 and 1. Use null for params you do not suggest.",
        persona.role().display_name(),
        persona.charter(),
        stance_list(),
        serde_json::to_string_pretty(&example).unwrap_or_default()
    )
}

pub fn analysis_user_prompt(persona: &dyn RolePersona, input: &DeliberationInput) -> String {
    let body = json!({
        "symbol": input.symbol(),
        "has_open_position": input.has_open_position(),
        "triggered_by": input.strategy.triggered_by,
        "briefing": persona.briefing(input),
    });
    serde_json::to_string_pretty(&body).unwrap_or_default()
}

/// A compact view of one Round 1 opinion for debate and synthesis prompts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeerSummary {
    pub role: RoleId,
    pub stance: Stance,
    pub confidence: Decimal,
    pub reasoning: String,
    pub key_points: Vec<String>,
}

impl PeerSummary {
    pub fn from_opinion(opinion: &Opinion, depth: Depth, summary_chars: usize) -> Self {
        Self {
            role: opinion.role,
            stance: opinion.stance,
            confidence: opinion.confidence,
            reasoning: summarize(&opinion.reasoning, depth, summary_chars),
            key_points: opinion.key_points.clone(),
        }
    }
}

/// Round 1 as seen by one debating role, split relative to its own stance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DebateDigest {
    pub own: Option<PeerSummary>,
    pub agreeing: Vec<PeerSummary>,
    pub disagreeing: Vec<PeerSummary>,
}

impl DebateDigest {
    pub fn build(role: RoleId, round1: &[Opinion], depth: Depth, summary_chars: usize) -> Self {
        let own = round1.iter().find(|o| o.role == role);
        let own_stance = own.map(|o| o.stance);

        let mut agreeing = Vec::new();
        let mut disagreeing = Vec::new();
        for peer in round1.iter().filter(|o| o.role != role) {
            let summary = PeerSummary::from_opinion(peer, depth, summary_chars);
            if Some(peer.stance) == own_stance {
                agreeing.push(summary);
            } else {
                disagreeing.push(summary);
            }
        }

        Self {
            own: own.map(|o| PeerSummary::from_opinion(o, depth, summary_chars)),
            agreeing,
            disagreeing,
        }
    }
}

pub fn debate_system_prompt(persona: &dyn RolePersona) -> String {
    let example = json!({
        "revised_stance": "<one of the stances>",
        "final_confidence": 0.6,
        "stance_changed": false,
        "change_reason": null,
        "agreements": [{"with_role": "<role id>", "point": "<what you agree with>"}],
        "challenges": [{"to_role": "<role id>", "challenge": "<objection>", "severity": "minor|major|critical"}],
        "final_reasoning": "<concise reasoning>"
    });

    format!(
        "You are the {} on a trading roundtable, now in the debate round. You see every \
         Round 1 opinion, split into peers who agree and peers who disagree with you.\n\n\
         {}\n\n\
         Address every disagreeing peer with a challenge or concede the point. Change your \
         stance only if an argument actually beats yours, and say why. Use severity \
         \"critical\" only for objections that should stop the trade.\n\n\
         Stances: {}.\n\n\
         You MUST respond with ONLY a JSON object matching this schema:\n{}",
        persona.role().display_name(),
        persona.charter(),
        stance_list(),
        serde_json::to_string_pretty(&example).unwrap_or_default()
    )
}

pub fn debate_user_prompt(
    persona: &dyn RolePersona,
    input: &DeliberationInput,
    digest: &DebateDigest,
) -> String {
    let body = json!({
        "symbol": input.symbol(),
        "briefing": persona.briefing(input),
        "round1": digest,
    });
    serde_json::to_string_pretty(&body).unwrap_or_default()
}

pub fn chairman_system_prompt() -> String {
    let example = json!({
        "action": "<one of the stances>",
        "confidence": 0.6,
        "reasoning": "<why this decision>",
        "consensus_level": "unanimous|strong_majority|majority|split|overruled",
        "key_debate_points": ["<point that decided it>"],
        "dissent": "<strongest opposing view, or null>",
        "risk_manager_verdict": {"approved": true, "vetoed": false, "reasoning": "<summary>"},
        "trade_params": {
            "entry_price": null,
            "stop_loss": null,
            "take_profit": null,
            "position_size_percent": null,
            "leverage": null,
            "order_type": "market|limit"
        },
        "market_regime": "trending_up|trending_down|ranging|volatile",
        "key_price_levels": [{
            "price": 0,
            "level_type": "support|resistance|breakout|breakdown",
            "direction": "above|below",
            "reasoning": "<why this level matters>",
            "confidence": 0.5
        }]
    });

    format!(
        "You chair a trading roundtable of six specialists and make the single final \
         decision. Weigh arguments, not headcount: you may overrule the majority when its \
         reasoning is weaker, and say so with consensus_level \"overruled\".\n\n\
         If the risk manager raised a veto, treat it as the most serious input you have. \
         You are still the one deciding; explain in reasoning why you follow or overrule it.\n\n\
         Only when action is HOLD, list up to three key_price_levels where the decision \
         should be revisited. Otherwise return an empty list. Trade params must respect the \
         account's risk limits.\n\n\
         Stances: {}.\n\n\
         You MUST respond with ONLY a JSON object matching this schema:\n{}",
        stance_list(),
        serde_json::to_string_pretty(&example).unwrap_or_default()
    )
}

#[derive(Debug, Clone, Serialize)]
struct DebateSummary {
    role: RoleId,
    revised_stance: Stance,
    final_confidence: Decimal,
    stance_changed: bool,
    change_reason: Option<String>,
    agreements: Vec<Agreement>,
    challenges: Vec<Value>,
    final_reasoning: String,
}

pub fn chairman_user_prompt(
    input: &DeliberationInput,
    round1: &[Opinion],
    round2: Option<&[DebateResponse]>,
    risk_veto: Option<&str>,
    depth: Depth,
    summary_chars: usize,
) -> String {
    let opinions: Vec<PeerSummary> = round1
        .iter()
        .map(|o| PeerSummary::from_opinion(o, depth, summary_chars))
        .collect();

    let debate: Option<Vec<DebateSummary>> = round2.map(|responses| {
        responses
            .iter()
            .map(|r| DebateSummary {
                role: r.role,
                revised_stance: r.revised_stance,
                final_confidence: r.final_confidence,
                stance_changed: r.stance_changed,
                change_reason: r.change_reason.clone(),
                agreements: r.agreements.clone(),
                challenges: r
                    .challenges
                    .iter()
                    .map(|c| json!({"to_role": c.to_role, "challenge": c.challenge, "severity": c.severity}))
                    .collect(),
                final_reasoning: summarize(&r.final_reasoning, depth, summary_chars),
            })
            .collect()
    });

    let account = &input.account;
    let body = json!({
        "symbol": input.symbol(),
        "price": input.market.price,
        "account": {
            "total_balance": account.total_balance,
            "available_balance": account.available_balance,
            "position": account.position_for(input.symbol()),
            "circuit_breaker": account.circuit_breaker,
            "risk_limits": account.risk_limits,
        },
        "htf_bias": input.strategy.htf_bias,
        "triggered_by": input.strategy.triggered_by,
        "round1": opinions,
        "round2": debate,
        "risk_manager_veto": risk_veto,
    });
    serde_json::to_string_pretty(&body).unwrap_or_default()
}

/// Deep sessions pass reasoning through untouched; others cut it to `max_chars`.
fn summarize(text: &str, depth: Depth, max_chars: usize) -> String {
    if depth == Depth::Deep || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
