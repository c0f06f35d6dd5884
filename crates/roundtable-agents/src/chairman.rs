use std::sync::Arc;

use roundtable_models::decision::Decision;
use roundtable_models::input::DeliberationInput;
use roundtable_models::opinion::{DebateResponse, Opinion};
use roundtable_models::stance::{Depth, Stance};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chat::{ChatProvider, ChatRequest};
use crate::consensus::{classify_consensus, derive_risk_verdict, detect_risk_veto};
use crate::error::AgentError;
use crate::prompts::{chairman_system_prompt, chairman_user_prompt};
use crate::schema::{parse_decision, ParsedDecision};

/// Single decision-maker over the full transcript.
pub struct Chairman {
    chat: Arc<dyn ChatProvider>,
    summary_chars: usize,
}

impl Chairman {
    pub fn new(chat: Arc<dyn ChatProvider>, summary_chars: usize) -> Self {
        Self {
            chat,
            summary_chars,
        }
    }

    pub async fn synthesize(
        &self,
        input: &DeliberationInput,
        round1: &[Opinion],
        round2: Option<&[DebateResponse]>,
        depth: Depth,
        cancel: &CancellationToken,
    ) -> Result<Decision, AgentError> {
        let veto = detect_risk_veto(round1, round2);
        if let Some(text) = &veto {
            info!(symbol = %input.symbol(), veto = %text, "Risk manager veto passed to chairman");
        }

        let request = ChatRequest {
            system: chairman_system_prompt(),
            user: chairman_user_prompt(
                input,
                round1,
                round2,
                veto.as_deref(),
                depth,
                self.summary_chars,
            ),
        };

        let raw = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = self.chat.complete(&request) => result?,
        };
        debug!(symbol = %input.symbol(), length = raw.len(), "Chairman reply received");

        let parsed = parse_decision(&raw, input.symbol())?;
        Ok(finalize(parsed, round1, round2))
    }
}

/// Fill what the chairman left out from the transcript.
pub fn finalize(
    parsed: ParsedDecision,
    round1: &[Opinion],
    round2: Option<&[DebateResponse]>,
) -> Decision {
    let consensus_level = parsed
        .consensus_level
        .unwrap_or_else(|| classify_consensus(round1, parsed.action));
    let risk_manager_verdict = parsed
        .risk_manager_verdict
        .unwrap_or_else(|| derive_risk_verdict(round1, round2));

    // Levels are re-evaluation points for a HOLD; anything else acts now.
    let key_price_levels = if parsed.action == Stance::Hold {
        parsed.key_price_levels
    } else {
        Vec::new()
    };

    Decision {
        action: parsed.action,
        symbol: parsed.symbol,
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
        consensus_level,
        key_debate_points: parsed.key_debate_points,
        dissent: parsed.dissent,
        risk_manager_verdict,
        trade_params: parsed.trade_params,
        market_regime: parsed.market_regime,
        key_price_levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chairman_reply, opinion, sample_input, ScriptedChat};
    use roundtable_models::decision::LevelType;
    use roundtable_models::opinion::RoleId;
    use roundtable_models::stance::{ConsensusLevel, MarketRegime};
    use rust_decimal_macros::dec;

    fn round1() -> Vec<Opinion> {
        vec![
            opinion(RoleId::Strategist, Stance::Long, dec!(0.7)),
            opinion(RoleId::TechnicalAnalyst, Stance::Long, dec!(0.6)),
            opinion(RoleId::RiskManager, Stance::Hold, dec!(0.8)),
        ]
    }

    const HOLD_WITH_LEVELS: &str = r#"{
        "action": "hold",
        "confidence": 0.55,
        "reasoning": "wait for a retest",
        "key_debate_points": ["4h resistance overhead"],
        "market_regime": "ranging",
        "key_price_levels": [
            {"price": 63000, "level_type": "breakout", "direction": "above", "reasoning": "range high", "confidence": 0.6},
            {"price": "not a number", "level_type": "support", "direction": "below", "confidence": 0.5},
            {"price": 60500, "level_type": "support", "direction": "below", "reasoning": "range low", "confidence": 0.5}
        ]
    }"#;

    #[tokio::test]
    async fn synthesize_parses_and_completes_decision() {
        let chat = Arc::new(ScriptedChat::reply("chair", HOLD_WITH_LEVELS));
        let chairman = Chairman::new(chat.clone(), 280);

        let decision = chairman
            .synthesize(
                &sample_input("BTCUSDT"),
                &round1(),
                None,
                Depth::Standard,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(decision.action, Stance::Hold);
        assert_eq!(decision.symbol, "BTCUSDT");
        assert_eq!(decision.market_regime, Some(MarketRegime::Ranging));
        assert_eq!(decision.key_price_levels.len(), 2);
        assert_eq!(decision.key_price_levels[0].level_type, LevelType::Breakout);
        // Missing consensus and verdict are derived from Round 1.
        assert_eq!(decision.consensus_level, ConsensusLevel::Majority);
        assert!(decision.risk_manager_verdict.approved);
        assert!(!decision.risk_manager_verdict.vetoed);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn levels_dropped_unless_hold() {
        let reply = HOLD_WITH_LEVELS.replace("\"hold\"", "\"LONG\"");
        let chairman = Chairman::new(Arc::new(ScriptedChat::reply("chair", &reply)), 280);

        let decision = chairman
            .synthesize(
                &sample_input("BTCUSDT"),
                &round1(),
                None,
                Depth::Standard,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(decision.action, Stance::Long);
        assert!(decision.key_price_levels.is_empty());
    }

    #[tokio::test]
    async fn stated_verdict_and_consensus_are_kept() {
        let chairman = Chairman::new(
            Arc::new(ScriptedChat::reply("chair", &chairman_reply(Stance::Long, dec!(0.65)))),
            280,
        );

        let decision = chairman
            .synthesize(
                &sample_input("BTCUSDT"),
                &round1(),
                None,
                Depth::Standard,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(decision.confidence, dec!(0.65));
        assert_eq!(decision.consensus_level, ConsensusLevel::Majority);
        assert_eq!(decision.risk_manager_verdict.reasoning, "within limits");
    }

    #[tokio::test]
    async fn veto_reaches_prompt_without_forcing_outcome() {
        let mut risk = opinion(RoleId::RiskManager, Stance::Hold, dec!(0.9));
        risk.key_points = vec!["VETO: loss streak at limit".to_string()];
        let transcript = vec![opinion(RoleId::Strategist, Stance::Long, dec!(0.7)), risk];

        let reply = r#"{"action": "LONG", "confidence": 0.5, "reasoning": "small size accepted"}"#;
        let chat = Arc::new(ScriptedChat::reply("chair", reply));
        let chairman = Chairman::new(chat.clone(), 280);

        let decision = chairman
            .synthesize(
                &sample_input("BTCUSDT"),
                &transcript,
                None,
                Depth::Quick,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(decision.action, Stance::Long);
        assert!(decision.risk_manager_verdict.vetoed);
        assert!(!decision.risk_manager_verdict.approved);
        assert!(chat.requests()[0].user.contains("VETO: loss streak at limit"));
    }

    #[tokio::test]
    async fn garbage_reply_is_an_error() {
        let chairman = Chairman::new(Arc::new(ScriptedChat::reply("chair", "no idea")), 280);
        let err = chairman
            .synthesize(
                &sample_input("BTCUSDT"),
                &round1(),
                None,
                Depth::Standard,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn cancelled_while_waiting() {
        let chairman = Chairman::new(Arc::new(ScriptedChat::hanging("chair")), 280);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = chairman
            .synthesize(&sample_input("BTCUSDT"), &round1(), None, Depth::Standard, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
