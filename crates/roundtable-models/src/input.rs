use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decision::KeyPriceLevel;

/// Everything a session is allowed to look at. Produced by collaborators, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliberationInput {
    pub market: MarketSnapshot,
    #[serde(default)]
    pub account: AccountSnapshot,
    #[serde(default)]
    pub strategy: StrategyContext,
}

impl DeliberationInput {
    pub fn symbol(&self) -> &str {
        &self.market.symbol
    }

    pub fn has_open_position(&self) -> bool {
        self.account.has_open_position(&self.market.symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: Decimal,
    /// Indicator bundles keyed by timeframe (e.g. `15m`, `1h`, `4h`). Computed elsewhere.
    #[serde(default)]
    pub timeframes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub order_book: Option<OrderBookSummary>,
    #[serde(default)]
    pub sentiment: Option<SentimentSummary>,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub ticker: Option<TickerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBookSummary {
    pub bid_depth: Decimal,
    pub ask_depth: Decimal,
    /// (bids - asks) / (bids + asks).
    pub imbalance: Decimal,
    pub spread: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentSummary {
    #[serde(default)]
    pub fear_greed_index: Option<u8>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub news_score: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerStats {
    pub change_24h_percent: Decimal,
    pub volume_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountSnapshot {
    #[serde(default)]
    pub total_balance: Decimal,
    #[serde(default)]
    pub available_balance: Decimal,
    #[serde(default)]
    pub positions: Vec<OpenPosition>,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerState,
    #[serde(default)]
    pub win_streak: u32,
    #[serde(default)]
    pub loss_streak: u32,
    #[serde(default)]
    pub risk_limits: Option<RiskLimits>,
}

impl AccountSnapshot {
    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.positions
            .iter()
            .any(|p| p.symbol.eq_ignore_ascii_case(symbol) && !p.size.is_zero())
    }

    pub fn position_for(&self, symbol: &str) -> Option<&OpenPosition> {
        self.positions
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub symbol: String,
    /// `long` or `short`.
    pub side: String,
    pub size: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub unrealized_pnl: Decimal,
    #[serde(default)]
    pub leverage: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerState {
    #[serde(default)]
    pub tripped: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Limits derived from the account tier by the external risk limiter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskLimits {
    pub max_position_percent: Decimal,
    pub max_leverage: Decimal,
    pub max_daily_loss_percent: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StrategyContext {
    /// Cached higher-timeframe bias, free text (e.g. "bullish above 62k").
    #[serde(default)]
    pub htf_bias: Option<String>,
    /// Lessons and notes carried between sessions.
    #[serde(default)]
    pub memory: Option<String>,
    /// Active or pending trading plan, opaque to this engine.
    #[serde(default)]
    pub trading_plan: Option<serde_json::Value>,
    #[serde(default)]
    pub position_history: Vec<serde_json::Value>,
    #[serde(default)]
    pub entry_thesis: Option<String>,
    /// The monitored level whose crossing triggered this session, if any.
    #[serde(default)]
    pub triggered_by: Option<KeyPriceLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minimal_input_parses_with_defaults() {
        let json = r#"{"market": {"symbol": "ETHUSDT", "price": "3120.5"}}"#;
        let input: DeliberationInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.symbol(), "ETHUSDT");
        assert_eq!(input.market.price, dec!(3120.5));
        assert!(input.account.positions.is_empty());
        assert!(!input.has_open_position());
        assert!(input.strategy.triggered_by.is_none());
    }

    #[test]
    fn open_position_detection_ignores_case_and_flat_positions() {
        let mut account = AccountSnapshot::default();
        account.positions.push(OpenPosition {
            symbol: "btcusdt".to_string(),
            side: "long".to_string(),
            size: dec!(0.5),
            entry_price: dec!(64000),
            unrealized_pnl: dec!(120),
            leverage: Some(dec!(3)),
        });
        account.positions.push(OpenPosition {
            symbol: "SOLUSDT".to_string(),
            side: "long".to_string(),
            size: Decimal::ZERO,
            entry_price: dec!(150),
            unrealized_pnl: Decimal::ZERO,
            leverage: None,
        });

        assert!(account.has_open_position("BTCUSDT"));
        assert!(!account.has_open_position("SOLUSDT"));
        assert!(!account.has_open_position("ETHUSDT"));
        assert!(account.position_for("BTCUSDT").is_some());
    }
}
