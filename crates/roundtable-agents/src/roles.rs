use std::sync::Arc;

use async_trait::async_trait;
use roundtable_models::input::DeliberationInput;
use roundtable_models::opinion::{DebateResponse, Opinion, RoleId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chat::{ChatProvider, ChatRequest};
use crate::error::AgentError;
use crate::prompts::{
    analysis_system_prompt, analysis_user_prompt, debate_system_prompt, debate_user_prompt,
    DebateDigest, ExecutionTrader, PortfolioManager, RiskManager, RolePersona, SentimentAnalyst,
    Strategist, TechnicalAnalyst,
};
use crate::schema::{parse_debate, parse_opinion};

/// One seat at the roundtable. The orchestrator only ever sees this trait.
#[async_trait]
pub trait RoleAgent: Send + Sync {
    fn role(&self) -> RoleId;

    /// Round 1: an independent opinion on the snapshot.
    async fn analyze(
        &self,
        input: &DeliberationInput,
        cancel: &CancellationToken,
    ) -> Result<Opinion, AgentError>;

    /// Round 2: respond to the other Round 1 opinions.
    async fn debate(
        &self,
        input: &DeliberationInput,
        digest: &DebateDigest,
        cancel: &CancellationToken,
    ) -> Result<DebateResponse, AgentError>;
}

/// A role that asks a chat provider and validates the reply.
pub struct ChatRole<P> {
    persona: P,
    chat: Arc<dyn ChatProvider>,
}

impl<P: RolePersona> ChatRole<P> {
    pub fn new(persona: P, chat: Arc<dyn ChatProvider>) -> Self {
        Self { persona, chat }
    }

    async fn ask(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.chat.complete(&request) => result,
        }
    }
}

#[async_trait]
impl<P: RolePersona> RoleAgent for ChatRole<P> {
    fn role(&self) -> RoleId {
        self.persona.role()
    }

    async fn analyze(
        &self,
        input: &DeliberationInput,
        cancel: &CancellationToken,
    ) -> Result<Opinion, AgentError> {
        let request = ChatRequest {
            system: analysis_system_prompt(&self.persona),
            user: analysis_user_prompt(&self.persona, input),
        };
        let raw = self.ask(request, cancel).await?;
        debug!(role = %self.role(), length = raw.len(), "Round 1 reply received");
        parse_opinion(&raw, self.role())
    }

    async fn debate(
        &self,
        input: &DeliberationInput,
        digest: &DebateDigest,
        cancel: &CancellationToken,
    ) -> Result<DebateResponse, AgentError> {
        let request = ChatRequest {
            system: debate_system_prompt(&self.persona),
            user: debate_user_prompt(&self.persona, input, digest),
        };
        let raw = self.ask(request, cancel).await?;
        debug!(role = %self.role(), length = raw.len(), "Round 2 reply received");
        parse_debate(&raw, self.role(), digest.own.as_ref().map(|o| o.stance))
    }
}

/// The chat-backed agent for `role`.
pub fn persona_for(role: RoleId, chat: Arc<dyn ChatProvider>) -> Arc<dyn RoleAgent> {
    match role {
        RoleId::Strategist => Arc::new(ChatRole::new(Strategist, chat)),
        RoleId::TechnicalAnalyst => Arc::new(ChatRole::new(TechnicalAnalyst, chat)),
        RoleId::RiskManager => Arc::new(ChatRole::new(RiskManager, chat)),
        RoleId::ExecutionTrader => Arc::new(ChatRole::new(ExecutionTrader, chat)),
        RoleId::SentimentAnalyst => Arc::new(ChatRole::new(SentimentAnalyst, chat)),
        RoleId::PortfolioManager => Arc::new(ChatRole::new(PortfolioManager, chat)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{opinion, sample_input, ScriptedChat};
    use roundtable_models::stance::{Depth, Stance};
    use rust_decimal_macros::dec;

    #[test]
    fn persona_for_covers_every_role() {
        let chat: Arc<dyn ChatProvider> = Arc::new(ScriptedChat::reply("a", "{}"));
        for role in RoleId::ALL {
            assert_eq!(persona_for(role, Arc::clone(&chat)).role(), role);
        }
    }

    #[tokio::test]
    async fn analyze_parses_wrapped_reply() {
        let chat = Arc::new(ScriptedChat::reply(
            "a",
            "Sure.\n```json\n{\"stance\": \"buy\", \"confidence\": 0.7, \"reasoning\": \"breakout\", \"key_points\": [\"volume\"]}\n```",
        ));
        let agent = persona_for(RoleId::TechnicalAnalyst, chat.clone());

        let opinion = agent
            .analyze(&sample_input("BTCUSDT"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(opinion.role, RoleId::TechnicalAnalyst);
        assert_eq!(opinion.stance, Stance::Long);
        assert_eq!(opinion.confidence, dec!(0.7));

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("Technical Analyst"));
    }

    #[tokio::test]
    async fn analyze_rejects_garbage() {
        let chat = Arc::new(ScriptedChat::reply("a", "I would rather not say."));
        let agent = persona_for(RoleId::Strategist, chat);

        let err = agent
            .analyze(&sample_input("BTCUSDT"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_call() {
        let chat = Arc::new(ScriptedChat::hanging("a"));
        let agent = persona_for(RoleId::RiskManager, chat);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent
            .analyze(&sample_input("BTCUSDT"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn debate_uses_own_stance_from_digest() {
        let chat = Arc::new(ScriptedChat::reply(
            "a",
            r#"{"revised_stance": "HOLD", "final_confidence": 0.55, "final_reasoning": "still cautious", "agreements": [], "challenges": []}"#,
        ));
        let agent = persona_for(RoleId::RiskManager, chat.clone());
        let round1 = vec![
            opinion(RoleId::RiskManager, Stance::Hold, dec!(0.8)),
            opinion(RoleId::Strategist, Stance::Long, dec!(0.7)),
        ];
        let digest = DebateDigest::build(RoleId::RiskManager, &round1, Depth::Standard, 280);

        let response = agent
            .debate(&sample_input("BTCUSDT"), &digest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.role, RoleId::RiskManager);
        assert_eq!(response.revised_stance, Stance::Hold);
        assert!(!response.stance_changed);
        assert!(chat.requests()[0].user.contains("disagreeing"));
    }
}
