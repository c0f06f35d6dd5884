use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{Decision, DecisionSource};
use crate::opinion::{DebateResponse, Opinion, RoleId};
use crate::stance::{ConsensusLevel, Depth};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    R1,
    R2,
    Chairman,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimingStatus {
    Ok,
    Failed,
    Timeout,
}

/// One entry per attempted call, whatever its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleTiming {
    /// `None` for the chairman call.
    pub role: Option<RoleId>,
    pub round: Round,
    pub duration_ms: u64,
    pub status: TimingStatus,
}

/// Everything a session produced. Persisted verbatim to the discussion log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub symbol: String,
    pub depth: Depth,
    pub started_at: DateTime<Utc>,
    pub round1: Vec<Opinion>,
    /// `None` when debate was skipped or not permitted.
    pub round2: Option<Vec<DebateResponse>>,
    pub decision: Decision,
    pub decision_source: DecisionSource,
    pub consensus_level: ConsensusLevel,
    pub timings: Vec<RoleTiming>,
    pub total_duration_ms: u64,
}

impl SessionResult {
    pub fn timings_for(&self, round: Round) -> impl Iterator<Item = &RoleTiming> {
        self.timings.iter().filter(move |t| t.round == round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_serialization() {
        assert_eq!(serde_json::to_string(&Round::R1).unwrap(), "\"r1\"");
        assert_eq!(serde_json::to_string(&Round::R2).unwrap(), "\"r2\"");
        assert_eq!(
            serde_json::to_string(&Round::Chairman).unwrap(),
            "\"chairman\""
        );
    }

    #[test]
    fn timing_status_serialization() {
        assert_eq!(serde_json::to_string(&TimingStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(
            serde_json::to_string(&TimingStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    #[test]
    fn chairman_timing_has_no_role() {
        let timing = RoleTiming {
            role: None,
            round: Round::Chairman,
            duration_ms: 1200,
            status: TimingStatus::Failed,
        };
        let json = serde_json::to_value(&timing).unwrap();
        assert!(json["role"].is_null());
        assert_eq!(json["status"], "failed");
    }
}
