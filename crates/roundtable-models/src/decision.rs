use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stance::{ConsensusLevel, MarketRegime, Stance};

/// The single committed outcome of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub action: Stance,
    pub symbol: String,
    /// 0.0 to 1.0.
    pub confidence: Decimal,
    pub reasoning: String,
    pub consensus_level: ConsensusLevel,
    #[serde(default)]
    pub key_debate_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissent: Option<String>,
    pub risk_manager_verdict: RiskManagerVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_params: Option<TradeParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_regime: Option<MarketRegime>,
    /// Only ever populated when `action` is HOLD.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_price_levels: Vec<KeyPriceLevel>,
}

/// Which component produced the decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Chairman,
    Fallback,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Chairman => "chairman",
            DecisionSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskManagerVerdict {
    pub approved: bool,
    #[serde(default)]
    pub vetoed: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TradeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_size_percent: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LevelType {
    Support,
    Resistance,
    Breakout,
    Breakdown,
}

/// Which side of the level the price must cross for it to trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LevelDirection {
    Above,
    Below,
}

/// A price point worth watching instead of re-running a full session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyPriceLevel {
    pub price: Decimal,
    pub level_type: LevelType,
    pub direction: LevelDirection,
    pub reasoning: String,
    pub confidence: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_decision() -> Decision {
        Decision {
            action: Stance::Hold,
            symbol: "BTCUSDT".to_string(),
            confidence: dec!(0.55),
            reasoning: "Range-bound; wait for a break".to_string(),
            consensus_level: ConsensusLevel::Split,
            key_debate_points: vec!["Funding elevated".to_string()],
            dissent: Some("Technical analyst wanted a long".to_string()),
            risk_manager_verdict: RiskManagerVerdict {
                approved: true,
                vetoed: false,
                reasoning: "Exposure within limits".to_string(),
            },
            trade_params: None,
            market_regime: Some(MarketRegime::Ranging),
            key_price_levels: vec![KeyPriceLevel {
                price: dec!(66500),
                level_type: LevelType::Resistance,
                direction: LevelDirection::Above,
                reasoning: "Range high".to_string(),
                confidence: dec!(0.6),
            }],
        }
    }

    #[test]
    fn roundtrip_decision() {
        let decision = sample_decision();
        let json = serde_json::to_string(&decision).unwrap();
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, back);
    }

    #[test]
    fn empty_levels_are_not_serialized() {
        let mut decision = sample_decision();
        decision.key_price_levels.clear();
        let json = serde_json::to_value(&decision).unwrap();
        assert!(json.get("key_price_levels").is_none());
        assert!(json.get("trade_params").is_none());
    }

    #[test]
    fn order_type_defaults_to_market() {
        let params: TradeParams = serde_json::from_str(r#"{"entry_price": "100.5"}"#).unwrap();
        assert_eq!(params.order_type, OrderType::Market);
        assert_eq!(params.entry_price, Some(dec!(100.5)));
    }
}
