pub mod config;
pub mod decision;
pub mod discussion;
pub mod input;
pub mod opinion;
pub mod session;
pub mod stance;

pub use config::{ChatConfig, DeliberationConfig, LogConfig, ProviderConfig, RoleConfig, RoundtableConfig};
pub use decision::{
    Decision, DecisionSource, KeyPriceLevel, LevelDirection, LevelType, OrderType,
    RiskManagerVerdict, TradeParams,
};
pub use discussion::DiscussionRow;
pub use input::{
    AccountSnapshot, CircuitBreakerState, DeliberationInput, MarketSnapshot, OpenPosition,
    OrderBookSummary, RiskLimits, SentimentSummary, StrategyContext, TickerStats,
};
pub use opinion::{Agreement, Challenge, DebateResponse, Opinion, RoleId, Severity, SuggestedParams};
pub use session::{Round, RoleTiming, SessionResult, TimingStatus};
pub use stance::{ConsensusLevel, Depth, MarketRegime, Stance};
