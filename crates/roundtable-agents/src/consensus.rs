use roundtable_models::decision::RiskManagerVerdict;
use roundtable_models::opinion::{DebateResponse, Opinion, RoleId, Severity};
use roundtable_models::stance::{ConsensusLevel, Stance};

/// Opinions needed before agreement counts as unanimous.
pub const UNANIMITY_MIN: usize = 3;

const STRONG_MAJORITY_MIN: usize = 4;

/// The shared stance when at least three opinions all agree.
pub fn unanimous_stance(round1: &[Opinion]) -> Option<Stance> {
    if round1.len() < UNANIMITY_MIN {
        return None;
    }
    let first = round1[0].stance;
    round1.iter().all(|o| o.stance == first).then_some(first)
}

/// How strongly Round 1 backs `action`.
pub fn classify_consensus(round1: &[Opinion], action: Stance) -> ConsensusLevel {
    if unanimous_stance(round1) == Some(action) {
        return ConsensusLevel::Unanimous;
    }
    let backing = round1.iter().filter(|o| o.stance == action).count();
    if backing >= STRONG_MAJORITY_MIN {
        ConsensusLevel::StrongMajority
    } else {
        ConsensusLevel::Majority
    }
}

/// The risk manager's veto, if it raised one.
///
/// A critical challenge it authored in Round 2 takes precedence over a `VETO`
/// marker in its Round 1 key points.
pub fn detect_risk_veto(round1: &[Opinion], round2: Option<&[DebateResponse]>) -> Option<String> {
    let critical = round2
        .unwrap_or_default()
        .iter()
        .filter(|r| r.role == RoleId::RiskManager)
        .flat_map(|r| r.challenges.iter())
        .find(|c| c.severity == Severity::Critical)
        .map(|c| format!("{}: {}", c.to_role, c.challenge));
    if critical.is_some() {
        return critical;
    }

    round1
        .iter()
        .filter(|o| o.role == RoleId::RiskManager)
        .flat_map(|o| o.key_points.iter())
        .find(|p| p.to_ascii_uppercase().contains("VETO"))
        .cloned()
}

/// The verdict implied by the transcript, for when nobody states one.
pub fn derive_risk_verdict(
    round1: &[Opinion],
    round2: Option<&[DebateResponse]>,
) -> RiskManagerVerdict {
    let risk_opinion = round1.iter().find(|o| o.role == RoleId::RiskManager);
    match detect_risk_veto(round1, round2) {
        Some(veto) => RiskManagerVerdict {
            approved: false,
            vetoed: true,
            reasoning: veto,
        },
        None => RiskManagerVerdict {
            approved: risk_opinion.is_some(),
            vetoed: false,
            reasoning: risk_opinion
                .map(|o| o.reasoning.clone())
                .unwrap_or_else(|| "Risk manager did not report".to_string()),
        },
    }
}
