use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stance::Stance;

/// One of the six fixed personas seated at the roundtable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    Strategist,
    TechnicalAnalyst,
    RiskManager,
    ExecutionTrader,
    SentimentAnalyst,
    PortfolioManager,
}

impl RoleId {
    pub const ALL: [RoleId; 6] = [
        RoleId::Strategist,
        RoleId::TechnicalAnalyst,
        RoleId::RiskManager,
        RoleId::ExecutionTrader,
        RoleId::SentimentAnalyst,
        RoleId::PortfolioManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::Strategist => "strategist",
            RoleId::TechnicalAnalyst => "technical_analyst",
            RoleId::RiskManager => "risk_manager",
            RoleId::ExecutionTrader => "execution_trader",
            RoleId::SentimentAnalyst => "sentiment_analyst",
            RoleId::PortfolioManager => "portfolio_manager",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoleId::Strategist => "Strategist",
            RoleId::TechnicalAnalyst => "Technical Analyst",
            RoleId::RiskManager => "Risk Manager",
            RoleId::ExecutionTrader => "Execution Trader",
            RoleId::SentimentAnalyst => "Sentiment Analyst",
            RoleId::PortfolioManager => "Portfolio Manager",
        }
    }

    /// Voting weight used by the fallback voter when config has no override.
    /// The six defaults sum to 1.0.
    pub fn default_weight(&self) -> Decimal {
        match self {
            RoleId::Strategist | RoleId::RiskManager => Decimal::new(25, 2),
            RoleId::TechnicalAnalyst => Decimal::new(20, 2),
            RoleId::ExecutionTrader | RoleId::SentimentAnalyst | RoleId::PortfolioManager => {
                Decimal::new(10, 2)
            }
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade parameters a role may attach to its Round 1 opinion. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuggestedParams {
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
}

impl SuggestedParams {
    pub fn is_empty(&self) -> bool {
        self.entry_price.is_none()
            && self.stop_loss.is_none()
            && self.take_profit.is_none()
            && self.position_size_percent.is_none()
            && self.leverage.is_none()
    }
}

/// A role's independent Round 1 judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opinion {
    pub role: RoleId,
    pub stance: Stance,
    /// 0.0 to 1.0.
    pub confidence: Decimal,
    pub reasoning: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_params: Option<SuggestedParams>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agreement {
    pub with_role: String,
    pub point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Challenge {
    pub to_role: String,
    pub challenge: String,
    pub severity: Severity,
}

/// A role's Round 2 reply after seeing everyone's Round 1 opinion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateResponse {
    pub role: RoleId,
    pub revised_stance: Stance,
    pub final_confidence: Decimal,
    pub stance_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_reason: Option<String>,
    #[serde(default)]
    pub agreements: Vec<Agreement>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    pub final_reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_weights_sum_to_one() {
        let total: Decimal = RoleId::ALL.iter().map(|r| r.default_weight()).sum();
        assert_eq!(total, dec!(1.00));
    }

    #[test]
    fn role_id_serialization() {
        assert_eq!(
            serde_json::to_string(&RoleId::RiskManager).unwrap(),
            "\"risk_manager\""
        );
        for role in RoleId::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn opinion_omits_absent_params() {
        let opinion = Opinion {
            role: RoleId::Strategist,
            stance: Stance::Long,
            confidence: dec!(0.7),
            reasoning: "Higher-timeframe trend intact".to_string(),
            key_points: vec!["4h bias bullish".to_string()],
            suggested_params: Some(SuggestedParams {
                entry_price: Some(dec!(64000)),
                ..Default::default()
            }),
        };

        let json = serde_json::to_value(&opinion).unwrap();
        let params = json.get("suggested_params").unwrap();
        assert!(params.get("entry_price").is_some());
        assert!(params.get("stop_loss").is_none());

        let back: Opinion = serde_json::from_value(json).unwrap();
        assert_eq!(back, opinion);
    }

    #[test]
    fn severity_orders_by_weight() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Minor);
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn suggested_params_emptiness() {
        assert!(SuggestedParams::default().is_empty());
        let params = SuggestedParams {
            leverage: Some(dec!(3)),
            ..Default::default()
        };
        assert!(!params.is_empty());
    }
}
