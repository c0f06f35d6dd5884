//! Validation of model replies into typed opinions, debate responses and decisions.
//!
//! Every reply goes through the same pipeline: extract the JSON object, parse it,
//! strip null-valued keys, deserialize into a permissive raw shape, then check
//! ranges and normalize enums. Nothing unvalidated leaves this module.

use roundtable_models::decision::{KeyPriceLevel, OrderType, RiskManagerVerdict, TradeParams};
use roundtable_models::opinion::{
    Agreement, Challenge, DebateResponse, Opinion, RoleId, SuggestedParams,
};
use roundtable_models::stance::{ConsensusLevel, MarketRegime, Stance};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AgentError;
use crate::normalizer::{
    extract_json, normalize_consensus, normalize_direction, normalize_level_type,
    normalize_regime, normalize_severity, normalize_stance, strip_nulls,
};

#[derive(Deserialize)]
struct RawParams {
    #[serde(default, alias = "entryPrice")]
    entry_price: Option<Decimal>,
    #[serde(default, alias = "stopLoss")]
    stop_loss: Option<Decimal>,
    #[serde(default, alias = "takeProfit")]
    take_profit: Option<Decimal>,
    #[serde(default, alias = "positionSizePercent")]
    position_size_percent: Option<Decimal>,
    #[serde(default)]
    leverage: Option<Decimal>,
    #[serde(default, alias = "orderType")]
    order_type: Option<String>,
}

#[derive(Deserialize)]
struct RawOpinion {
    stance: String,
    confidence: Decimal,
    reasoning: String,
    #[serde(default, alias = "keyPoints")]
    key_points: Vec<String>,
    #[serde(default, alias = "suggestedParams")]
    suggested_params: Option<RawParams>,
}

#[derive(Deserialize)]
struct RawDebate {
    #[serde(alias = "revisedStance", alias = "stance")]
    revised_stance: String,
    #[serde(alias = "finalConfidence", alias = "confidence")]
    final_confidence: Decimal,
    #[serde(default, alias = "stanceChanged")]
    stance_changed: Option<bool>,
    #[serde(default, alias = "changeReason")]
    change_reason: Option<String>,
    #[serde(default)]
    agreements: Vec<Value>,
    #[serde(default)]
    challenges: Vec<Value>,
    #[serde(alias = "finalReasoning", alias = "reasoning")]
    final_reasoning: String,
}

#[derive(Deserialize)]
struct RawAgreement {
    #[serde(alias = "withRole", alias = "role")]
    with_role: String,
    point: String,
}

#[derive(Deserialize)]
struct RawChallenge {
    #[serde(alias = "toRole", alias = "role")]
    to_role: String,
    challenge: String,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    approved: bool,
    #[serde(default)]
    vetoed: bool,
    #[serde(default)]
    reasoning: String,
}

#[derive(Deserialize)]
struct RawLevel {
    price: Decimal,
    #[serde(alias = "levelType", alias = "type")]
    level_type: String,
    direction: String,
    #[serde(default)]
    reasoning: String,
    confidence: Decimal,
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(alias = "stance")]
    action: String,
    confidence: Decimal,
    reasoning: String,
    #[serde(default, alias = "consensusLevel")]
    consensus_level: Option<String>,
    #[serde(default, alias = "keyDebatePoints")]
    key_debate_points: Vec<String>,
    #[serde(default)]
    dissent: Option<String>,
    #[serde(default, alias = "riskManagerVerdict")]
    risk_manager_verdict: Option<RawVerdict>,
    #[serde(default, alias = "tradeParams")]
    trade_params: Option<RawParams>,
    #[serde(default, alias = "marketRegime")]
    market_regime: Option<String>,
    #[serde(default, alias = "keyPriceLevels")]
    key_price_levels: Vec<Value>,
}

/// A validated chairman reply. Fields the chairman may omit stay optional here and
/// are completed from the transcript by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDecision {
    pub action: Stance,
    pub symbol: String,
    pub confidence: Decimal,
    pub reasoning: String,
    pub consensus_level: Option<ConsensusLevel>,
    pub key_debate_points: Vec<String>,
    pub dissent: Option<String>,
    pub risk_manager_verdict: Option<RiskManagerVerdict>,
    pub trade_params: Option<TradeParams>,
    pub market_regime: Option<MarketRegime>,
    pub key_price_levels: Vec<KeyPriceLevel>,
}

/// Validate a Round 1 reply.
pub fn parse_opinion(raw: &str, role: RoleId) -> Result<Opinion, AgentError> {
    let mut obj = parse_object(raw)?;
    strip_nested(&mut obj, &["suggested_params", "suggestedParams"]);
    let parsed: RawOpinion = from_object(obj, "opinion")?;

    let confidence = check_unit("confidence", parsed.confidence)?;
    let suggested_params = parsed
        .suggested_params
        .map(|p| SuggestedParams {
            entry_price: p.entry_price,
            stop_loss: p.stop_loss,
            take_profit: p.take_profit,
            position_size_percent: p.position_size_percent,
            leverage: p.leverage,
        })
        .filter(|p| !p.is_empty());

    Ok(Opinion {
        role,
        stance: normalize_stance(&parsed.stance),
        confidence,
        reasoning: parsed.reasoning,
        key_points: parsed.key_points,
        suggested_params,
    })
}

/// Validate a Round 2 reply. `own_stance` is the role's Round 1 stance, used when
/// the reply does not say whether the stance changed.
pub fn parse_debate(
    raw: &str,
    role: RoleId,
    own_stance: Option<Stance>,
) -> Result<DebateResponse, AgentError> {
    let obj = parse_object(raw)?;
    let parsed: RawDebate = from_object(obj, "debate response")?;

    let revised_stance = normalize_stance(&parsed.revised_stance);
    let final_confidence = check_unit("final_confidence", parsed.final_confidence)?;
    let stance_changed = parsed
        .stance_changed
        .unwrap_or_else(|| own_stance.is_some_and(|s| s != revised_stance));

    let agreements = parsed
        .agreements
        .into_iter()
        .filter_map(|v| lenient::<RawAgreement>(v, role, "agreement"))
        .map(|a| Agreement {
            with_role: a.with_role,
            point: a.point,
        })
        .collect();

    let challenges = parsed
        .challenges
        .into_iter()
        .filter_map(|v| lenient::<RawChallenge>(v, role, "challenge"))
        .map(|c| Challenge {
            to_role: c.to_role,
            challenge: c.challenge,
            severity: normalize_severity(c.severity.as_deref().unwrap_or("minor")),
        })
        .collect();

    Ok(DebateResponse {
        role,
        revised_stance,
        final_confidence,
        stance_changed,
        change_reason: parsed.change_reason,
        agreements,
        challenges,
        final_reasoning: parsed.final_reasoning,
    })
}

/// Validate the chairman's reply.
pub fn parse_decision(raw: &str, symbol: &str) -> Result<ParsedDecision, AgentError> {
    let mut obj = parse_object(raw)?;
    strip_nested(
        &mut obj,
        &[
            "trade_params",
            "tradeParams",
            "risk_manager_verdict",
            "riskManagerVerdict",
        ],
    );
    let parsed: RawDecision = from_object(obj, "decision")?;

    let action = normalize_stance(&parsed.action);
    let confidence = check_unit("confidence", parsed.confidence)?;

    let trade_params = parsed.trade_params.map(|p| TradeParams {
        entry_price: p.entry_price,
        stop_loss: p.stop_loss,
        take_profit: p.take_profit,
        position_size_percent: p.position_size_percent,
        leverage: p.leverage,
        order_type: match p.order_type.as_deref().map(str::to_ascii_lowercase) {
            Some(t) if t == "limit" => OrderType::Limit,
            _ => OrderType::Market,
        },
    });

    let key_price_levels = parsed
        .key_price_levels
        .into_iter()
        .filter_map(parse_level)
        .collect();

    Ok(ParsedDecision {
        action,
        symbol: symbol.to_string(),
        confidence,
        reasoning: parsed.reasoning,
        consensus_level: parsed.consensus_level.as_deref().and_then(normalize_consensus),
        key_debate_points: parsed.key_debate_points,
        dissent: parsed.dissent.filter(|d| !d.trim().is_empty()),
        risk_manager_verdict: parsed.risk_manager_verdict.map(|v| RiskManagerVerdict {
            approved: v.approved,
            vetoed: v.vetoed,
            reasoning: v.reasoning,
        }),
        trade_params,
        market_regime: parsed.market_regime.as_deref().and_then(normalize_regime),
        key_price_levels,
    })
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, AgentError> {
    let json_str = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| AgentError::MalformedResponse(format!("Extracted object is not JSON: {e}")))?;

    match value {
        Value::Object(map) => strip_nulls(map)
            .ok_or_else(|| AgentError::Validation("Reply object has no non-null fields".to_string())),
        other => Err(AgentError::Validation(format!(
            "Expected a JSON object, got {other}"
        ))),
    }
}

/// Apply `strip_nulls` to nested parameter objects, removing them when nothing is left.
fn strip_nested(obj: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if let Some(Value::Object(inner)) = obj.remove(*key) {
            if let Some(stripped) = strip_nulls(inner) {
                obj.insert((*key).to_string(), Value::Object(stripped));
            }
        }
    }
}

fn from_object<T: DeserializeOwned>(obj: Map<String, Value>, what: &str) -> Result<T, AgentError> {
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| AgentError::Validation(format!("Invalid {what}: {e}")))
}

fn check_unit(field: &str, value: Decimal) -> Result<Decimal, AgentError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(AgentError::Validation(format!(
            "{field} {value} is outside [0, 1]"
        )));
    }
    Ok(value)
}

fn lenient<T: DeserializeOwned>(value: Value, role: RoleId, what: &str) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!(role = %role, error = %e, "Dropping malformed {what}");
            None
        }
    }
}

fn parse_level(value: Value) -> Option<KeyPriceLevel> {
    let raw: RawLevel = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Dropping malformed key price level");
            return None;
        }
    };

    let level_type = normalize_level_type(&raw.level_type)?;
    let direction = normalize_direction(&raw.direction)?;
    if raw.price <= Decimal::ZERO || check_unit("level confidence", raw.confidence).is_err() {
        warn!(price = %raw.price, "Dropping out-of-range key price level");
        return None;
    }

    Some(KeyPriceLevel {
        price: raw.price,
        level_type,
        direction,
        reasoning: raw.reasoning,
        confidence: raw.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_models::decision::{LevelDirection, LevelType};
    use roundtable_models::opinion::Severity;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_opinion_with_camel_case_and_nulls() {
        let raw = r#"Sure, here you go:
```json
{
  "stance": "strong buy",
  "confidence": 0.72,
  "reasoning": "Breakout retest held",
  "keyPoints": ["1h close above 65k", "volume expanding"],
  "suggestedParams": {"entryPrice": 65200, "stopLoss": 64100, "takeProfit": null, "leverage": null},
  "notes": null
}
```"#;
        let opinion = parse_opinion(raw, RoleId::TechnicalAnalyst).unwrap();
        assert_eq!(opinion.role, RoleId::TechnicalAnalyst);
        assert_eq!(opinion.stance, Stance::Long);
        assert_eq!(opinion.confidence, dec!(0.72));
        assert_eq!(opinion.key_points.len(), 2);
        let params = opinion.suggested_params.unwrap();
        assert_eq!(params.entry_price, Some(dec!(65200)));
        assert_eq!(params.stop_loss, Some(dec!(64100)));
        assert_eq!(params.take_profit, None);
    }

    #[test]
    fn parse_opinion_all_null_params_become_absent() {
        let raw = r#"{"stance": "HOLD", "confidence": "0.5", "reasoning": "No edge",
                      "suggested_params": {"entry_price": null}}"#;
        let opinion = parse_opinion(raw, RoleId::Strategist).unwrap();
        assert!(opinion.suggested_params.is_none());
        assert!(opinion.key_points.is_empty());
    }

    #[test]
    fn parse_opinion_rejects_out_of_range_confidence() {
        let raw = r#"{"stance": "LONG", "confidence": 75, "reasoning": "Very sure"}"#;
        let err = parse_opinion(raw, RoleId::Strategist).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn parse_opinion_missing_stance_is_validation_error() {
        let raw = r#"{"stance": null, "confidence": 0.6, "reasoning": "?"}"#;
        let err = parse_opinion(raw, RoleId::Strategist).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn parse_opinion_without_json_is_malformed() {
        let err = parse_opinion("I think we should go long.", RoleId::Strategist).unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[test]
    fn parse_opinion_with_broken_json_is_malformed() {
        let err = parse_opinion(r#"{"stance": LONG}"#, RoleId::Strategist).unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[test]
    fn parse_opinion_with_wrong_field_type_is_validation_error() {
        let raw = r#"{"stance": "LONG", "confidence": "very high", "reasoning": "Trend"}"#;
        let err = parse_opinion(raw, RoleId::Strategist).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn parse_debate_with_empty_lists() {
        let raw = r#"{"revised_stance": "LONG", "final_confidence": 0.7,
                      "agreements": [], "challenges": [], "final_reasoning": "Unchanged"}"#;
        let debate = parse_debate(raw, RoleId::Strategist, Some(Stance::Long)).unwrap();
        assert!(!debate.stance_changed);
        assert!(debate.agreements.is_empty());
        assert!(debate.challenges.is_empty());
    }

    #[test]
    fn parse_debate_derives_stance_change() {
        let raw = r#"{"revisedStance": "hold", "finalConfidence": 0.55,
                      "finalReasoning": "Risk manager's point on funding is fair"}"#;
        let debate = parse_debate(raw, RoleId::TechnicalAnalyst, Some(Stance::Long)).unwrap();
        assert_eq!(debate.revised_stance, Stance::Hold);
        assert!(debate.stance_changed);
    }

    #[test]
    fn parse_debate_drops_malformed_entries() {
        let raw = r#"{
            "revised_stance": "SHORT",
            "final_confidence": 0.8,
            "stance_changed": false,
            "agreements": [{"with_role": "technical_analyst", "point": "Lower highs"}, {"oops": 1}],
            "challenges": [
                {"toRole": "strategist", "challenge": "HTF bias is stale", "severity": "major"},
                {"to_role": "execution_trader", "challenge": "Book too thin"},
                "not an object"
            ],
            "final_reasoning": "Still short"
        }"#;
        let debate = parse_debate(raw, RoleId::RiskManager, Some(Stance::Short)).unwrap();
        assert_eq!(debate.agreements.len(), 1);
        assert_eq!(debate.challenges.len(), 2);
        assert_eq!(debate.challenges[0].severity, Severity::Major);
        assert_eq!(debate.challenges[1].severity, Severity::Minor);
    }

    #[test]
    fn parse_decision_full() {
        let raw = r#"{
            "action": "hold",
            "confidence": 0.6,
            "reasoning": "Wait for the range to resolve",
            "consensusLevel": "split",
            "keyDebatePoints": ["Funding elevated"],
            "dissent": "",
            "riskManagerVerdict": {"approved": true, "reasoning": "Fine"},
            "tradeParams": {"entryPrice": null},
            "marketRegime": "sideways chop",
            "keyPriceLevels": [
                {"price": 66500, "type": "resistance", "direction": "above", "reasoning": "Range high", "confidence": 0.7},
                {"price": 61000, "level_type": "support", "direction": "below", "confidence": 1.4},
                {"price": 60000, "level_type": "pivot", "direction": "below", "confidence": 0.5}
            ]
        }"#;
        let parsed = parse_decision(raw, "BTCUSDT").unwrap();
        assert_eq!(parsed.action, Stance::Hold);
        assert_eq!(parsed.symbol, "BTCUSDT");
        assert_eq!(parsed.consensus_level, Some(ConsensusLevel::Split));
        assert!(parsed.dissent.is_none());
        assert!(parsed.trade_params.is_none());
        assert_eq!(parsed.market_regime, Some(MarketRegime::Ranging));
        assert!(parsed.risk_manager_verdict.unwrap().approved);
        assert_eq!(parsed.key_price_levels.len(), 1);
        assert_eq!(parsed.key_price_levels[0].level_type, LevelType::Resistance);
        assert_eq!(parsed.key_price_levels[0].direction, LevelDirection::Above);
    }

    #[test]
    fn parse_decision_limit_order() {
        let raw = r#"{"action": "LONG", "confidence": 0.7, "reasoning": "Go",
                      "trade_params": {"entry_price": 100, "order_type": "LIMIT"}}"#;
        let parsed = parse_decision(raw, "SOLUSDT").unwrap();
        let params = parsed.trade_params.unwrap();
        assert_eq!(params.order_type, OrderType::Limit);
        assert_eq!(params.entry_price, Some(dec!(100)));
        assert!(parsed.consensus_level.is_none());
        assert!(parsed.risk_manager_verdict.is_none());
    }

    #[test]
    fn parse_decision_requires_reasoning() {
        let err = parse_decision(r#"{"action": "LONG", "confidence": 0.7}"#, "BTCUSDT").unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
