//! Deterministic weighted vote over Round 1, used when the chairman is unavailable.
//!
//! Makes no external calls and cannot fail. Round 2 is deliberately ignored.

use roundtable_models::config::DeliberationConfig;
use roundtable_models::decision::{Decision, OrderType, TradeParams};
use roundtable_models::opinion::{Opinion, SuggestedParams};
use roundtable_models::stance::Stance;
use rust_decimal::Decimal;

use crate::consensus::{classify_consensus, derive_risk_verdict};

/// Weighted score per stance, in the order stances first appear.
pub fn stance_scores(round1: &[Opinion], config: &DeliberationConfig) -> Vec<(Stance, Decimal)> {
    let mut scores: Vec<(Stance, Decimal)> = Vec::new();
    for opinion in round1 {
        let contribution = config.weight_for(opinion.role) * opinion.confidence;
        match scores.iter_mut().find(|(s, _)| *s == opinion.stance) {
            Some((_, score)) => *score += contribution,
            None => scores.push((opinion.stance, contribution)),
        }
    }
    scores
}

/// Highest score wins; on a tie the stance seen first keeps it.
fn winning_stance(scores: &[(Stance, Decimal)]) -> Option<Stance> {
    let mut best: Option<(Stance, Decimal)> = None;
    for &(stance, score) in scores {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((stance, score)),
        }
    }
    best.map(|(stance, _)| stance)
}

pub fn fallback_vote(symbol: &str, round1: &[Opinion], config: &DeliberationConfig) -> Decision {
    let scores = stance_scores(round1, config);
    let action = winning_stance(&scores).unwrap_or(Stance::Hold);

    let winners: Vec<&Opinion> = round1.iter().filter(|o| o.stance == action).collect();
    let confidence = mean(winners.iter().map(|o| o.confidence)).unwrap_or(Decimal::ZERO);

    let score_summary = scores
        .iter()
        .map(|(stance, score)| format!("{stance} {}", score.round_dp(4).normalize()))
        .collect::<Vec<_>>()
        .join(", ");

    let dissenters: Vec<String> = round1
        .iter()
        .filter(|o| o.stance != action)
        .map(|o| format!("{} {} ({})", o.role.display_name(), o.stance, o.confidence))
        .collect();

    let trade_params = if action == Stance::Hold {
        None
    } else {
        average_params(&winners)
    };

    Decision {
        action,
        symbol: symbol.to_string(),
        confidence,
        reasoning: format!(
            "Fallback weighted vote chose {action} from {} opinions. Scores: {score_summary}.",
            round1.len()
        ),
        consensus_level: classify_consensus(round1, action),
        key_debate_points: winners
            .iter()
            .filter_map(|o| o.key_points.first().cloned())
            .collect(),
        dissent: (!dissenters.is_empty()).then(|| dissenters.join("; ")),
        risk_manager_verdict: derive_risk_verdict(round1, None),
        trade_params,
        market_regime: None,
        key_price_levels: Vec::new(),
    }
}

fn average_params(winners: &[&Opinion]) -> Option<TradeParams> {
    let supplied: Vec<&SuggestedParams> = winners
        .iter()
        .filter_map(|o| o.suggested_params.as_ref())
        .collect();

    let field = |get: fn(&SuggestedParams) -> Option<Decimal>| {
        mean(supplied.iter().filter_map(|p| get(p)))
    };

    let params = TradeParams {
        entry_price: field(|p| p.entry_price),
        stop_loss: field(|p| p.stop_loss),
        take_profit: field(|p| p.take_profit),
        position_size_percent: field(|p| p.position_size_percent),
        leverage: field(|p| p.leverage),
        order_type: OrderType::Market,
    };

    let empty = params.entry_price.is_none()
        && params.stop_loss.is_none()
        && params.take_profit.is_none()
        && params.position_size_percent.is_none()
        && params.leverage.is_none();
    (!empty).then_some(params)
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / Decimal::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::opinion;
    use roundtable_models::config::RoleConfig;
    use roundtable_models::opinion::RoleId;
    use roundtable_models::stance::ConsensusLevel;
    use rust_decimal_macros::dec;

    #[test]
    fn weighted_vote_example() {
        let config = DeliberationConfig::default();
        let round1 = vec![
            opinion(RoleId::Strategist, Stance::Long, dec!(0.8)),
            opinion(RoleId::RiskManager, Stance::Long, dec!(0.4)),
            opinion(RoleId::TechnicalAnalyst, Stance::Short, dec!(0.9)),
        ];

        let scores = stance_scores(&round1, &config);
        assert_eq!(scores, vec![(Stance::Long, dec!(0.30)), (Stance::Short, dec!(0.18))]);

        let decision = fallback_vote("BTCUSDT", &round1, &config);
        assert_eq!(decision.action, Stance::Long);
        assert_eq!(decision.confidence, dec!(0.6));
        assert_eq!(decision.consensus_level, ConsensusLevel::Majority);
        assert_eq!(
            decision.dissent.as_deref(),
            Some("Technical Analyst SHORT (0.9)")
        );
        assert!(decision.reasoning.contains("LONG 0.3"));
        assert!(decision.reasoning.contains("SHORT 0.18"));
    }

    #[test]
    fn tie_keeps_first_seen_stance() {
        let config = DeliberationConfig::default();
        let round1 = vec![
            opinion(RoleId::ExecutionTrader, Stance::Short, dec!(0.5)),
            opinion(RoleId::SentimentAnalyst, Stance::Long, dec!(0.5)),
        ];
        assert_eq!(fallback_vote("ETHUSDT", &round1, &config).action, Stance::Short);

        let reversed: Vec<Opinion> = round1.into_iter().rev().collect();
        assert_eq!(fallback_vote("ETHUSDT", &reversed, &config).action, Stance::Long);
    }

    #[test]
    fn configured_weights_override_defaults() {
        let mut config = DeliberationConfig::default();
        config.roles = vec![
            RoleConfig {
                weight: Some(dec!(1)),
                ..RoleConfig::enabled(RoleId::SentimentAnalyst)
            },
            RoleConfig::enabled(RoleId::Strategist),
        ];
        let round1 = vec![
            opinion(RoleId::Strategist, Stance::Long, dec!(0.9)),
            opinion(RoleId::SentimentAnalyst, Stance::Short, dec!(0.5)),
        ];
        assert_eq!(fallback_vote("BTCUSDT", &round1, &config).action, Stance::Short);
    }

    #[test]
    fn params_are_per_field_means() {
        let config = DeliberationConfig::default();
        let mut a = opinion(RoleId::Strategist, Stance::Long, dec!(0.8));
        a.suggested_params = Some(SuggestedParams {
            entry_price: Some(dec!(62000)),
            stop_loss: Some(dec!(61000)),
            ..SuggestedParams::default()
        });
        let mut b = opinion(RoleId::TechnicalAnalyst, Stance::Long, dec!(0.6));
        b.suggested_params = Some(SuggestedParams {
            entry_price: Some(dec!(62200)),
            leverage: Some(dec!(3)),
            ..SuggestedParams::default()
        });
        let c = opinion(RoleId::RiskManager, Stance::Long, dec!(0.7));

        let decision = fallback_vote("BTCUSDT", &[a, b, c], &config);
        let params = decision.trade_params.unwrap();
        assert_eq!(params.entry_price, Some(dec!(62100)));
        assert_eq!(params.stop_loss, Some(dec!(61000)));
        assert_eq!(params.leverage, Some(dec!(3)));
        assert_eq!(params.take_profit, None);
        assert_eq!(params.position_size_percent, None);
        assert_eq!(params.order_type, OrderType::Market);
        assert_eq!(decision.consensus_level, ConsensusLevel::Unanimous);
        assert!(decision.dissent.is_none());
    }

    #[test]
    fn params_ignore_losing_opinions() {
        let config = DeliberationConfig::default();
        let a = opinion(RoleId::Strategist, Stance::Long, dec!(0.8));
        let mut b = opinion(RoleId::SentimentAnalyst, Stance::Short, dec!(0.3));
        b.suggested_params = Some(SuggestedParams {
            entry_price: Some(dec!(60000)),
            ..SuggestedParams::default()
        });

        let decision = fallback_vote("BTCUSDT", &[a, b], &config);
        assert_eq!(decision.action, Stance::Long);
        assert!(decision.trade_params.is_none());
    }

    #[test]
    fn hold_never_carries_params() {
        let config = DeliberationConfig::default();
        let mut a = opinion(RoleId::RiskManager, Stance::Hold, dec!(0.9));
        a.suggested_params = Some(SuggestedParams {
            position_size_percent: Some(dec!(5)),
            ..SuggestedParams::default()
        });

        let decision = fallback_vote("BTCUSDT", &[a], &config);
        assert_eq!(decision.action, Stance::Hold);
        assert!(decision.trade_params.is_none());
        assert!(decision.key_price_levels.is_empty());
        assert!(decision.market_regime.is_none());
    }

    #[test]
    fn key_points_come_from_winners() {
        let config = DeliberationConfig::default();
        let round1 = vec![
            opinion(RoleId::Strategist, Stance::Long, dec!(0.8)),
            opinion(RoleId::RiskManager, Stance::Long, dec!(0.6)),
            opinion(RoleId::SentimentAnalyst, Stance::Short, dec!(0.4)),
            opinion(RoleId::PortfolioManager, Stance::Long, dec!(0.5)),
            opinion(RoleId::ExecutionTrader, Stance::Long, dec!(0.5)),
        ];

        let decision = fallback_vote("BTCUSDT", &round1, &config);
        assert_eq!(decision.key_debate_points.len(), 4);
        assert_eq!(decision.key_debate_points[0], "Strategist point");
        assert_eq!(decision.consensus_level, ConsensusLevel::StrongMajority);
        assert!(decision.risk_manager_verdict.approved);
    }

    #[test]
    fn empty_round_holds() {
        let decision = fallback_vote("BTCUSDT", &[], &DeliberationConfig::default());
        assert_eq!(decision.action, Stance::Hold);
        assert_eq!(decision.confidence, Decimal::ZERO);
        assert!(!decision.risk_manager_verdict.approved);
    }
}
