use roundtable_models::decision::DecisionSource;
use roundtable_models::opinion::RoleId;
use roundtable_models::stance::{Depth, Stance};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Phase boundaries reported to an optional observer.
///
/// Delivery is best effort: the orchestrator never waits on the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    SessionStarted {
        session_id: Uuid,
        symbol: String,
        depth: Depth,
    },
    Round1Completed {
        session_id: Uuid,
        responded: Vec<RoleId>,
        missing: Vec<RoleId>,
    },
    Round2Skipped {
        session_id: Uuid,
        reason: String,
    },
    Round2Completed {
        session_id: Uuid,
        responded: Vec<RoleId>,
    },
    DecisionReached {
        session_id: Uuid,
        action: Stance,
        confidence: Decimal,
        source: DecisionSource,
    },
    SessionPersisted {
        session_id: Uuid,
    },
    SessionFailed {
        session_id: Uuid,
        error: String,
    },
}

impl PhaseEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            PhaseEvent::SessionStarted { session_id, .. }
            | PhaseEvent::Round1Completed { session_id, .. }
            | PhaseEvent::Round2Skipped { session_id, .. }
            | PhaseEvent::Round2Completed { session_id, .. }
            | PhaseEvent::DecisionReached { session_id, .. }
            | PhaseEvent::SessionPersisted { session_id }
            | PhaseEvent::SessionFailed { session_id, .. } => *session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhaseEvent::SessionStarted { .. } => "session_started",
            PhaseEvent::Round1Completed { .. } => "round1_completed",
            PhaseEvent::Round2Skipped { .. } => "round2_skipped",
            PhaseEvent::Round2Completed { .. } => "round2_completed",
            PhaseEvent::DecisionReached { .. } => "decision_reached",
            PhaseEvent::SessionPersisted { .. } => "session_persisted",
            PhaseEvent::SessionFailed { .. } => "session_failed",
        }
    }
}
