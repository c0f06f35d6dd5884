use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::opinion::{DebateResponse, Opinion};
use crate::session::{RoleTiming, SessionResult};

/// The discussion log table. One immutable row per completed session.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS discussion_log (
///     session_id        TEXT PRIMARY KEY,
///     symbol            TEXT NOT NULL,
///     depth             TEXT NOT NULL,
///     round1_json       TEXT NOT NULL,
///     round2_json       TEXT,
///     decision_json     TEXT NOT NULL,
///     decision_source   TEXT NOT NULL,
///     consensus_level   TEXT NOT NULL,
///     action            TEXT NOT NULL,
///     total_duration_ms INTEGER NOT NULL,
///     timings_json      TEXT NOT NULL,
///     created_at        TEXT NOT NULL
/// );
/// ```
pub const DISCUSSION_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS discussion_log (
    session_id        TEXT PRIMARY KEY,
    symbol            TEXT NOT NULL,
    depth             TEXT NOT NULL,
    round1_json       TEXT NOT NULL,
    round2_json       TEXT,
    decision_json     TEXT NOT NULL,
    decision_source   TEXT NOT NULL,
    consensus_level   TEXT NOT NULL,
    action            TEXT NOT NULL,
    total_duration_ms INTEGER NOT NULL,
    timings_json      TEXT NOT NULL,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_discussion_symbol_created ON discussion_log(symbol, created_at);
";

/// A row in the `discussion_log` table. Arrays and the decision are stored as JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscussionRow {
    pub session_id: String,
    pub symbol: String,
    pub depth: String,
    pub round1_json: String,
    pub round2_json: Option<String>,
    pub decision_json: String,
    pub decision_source: String,
    pub consensus_level: String,
    pub action: String,
    pub total_duration_ms: u64,
    pub timings_json: String,
    /// RFC 3339 session start time.
    pub created_at: String,
}

impl DiscussionRow {
    pub fn from_session(session: &SessionResult) -> Result<Self, serde_json::Error> {
        let round2_json = match &session.round2 {
            Some(round2) => Some(serde_json::to_string(round2)?),
            None => None,
        };

        Ok(Self {
            session_id: session.session_id.to_string(),
            symbol: session.symbol.clone(),
            depth: session.depth.as_str().to_string(),
            round1_json: serde_json::to_string(&session.round1)?,
            round2_json,
            decision_json: serde_json::to_string(&session.decision)?,
            decision_source: session.decision_source.as_str().to_string(),
            consensus_level: session.consensus_level.as_str().to_string(),
            action: session.decision.action.as_str().to_string(),
            total_duration_ms: session.total_duration_ms,
            timings_json: serde_json::to_string(&session.timings)?,
            created_at: session.started_at.to_rfc3339(),
        })
    }

    pub fn decision(&self) -> Result<Decision, serde_json::Error> {
        serde_json::from_str(&self.decision_json)
    }

    pub fn round1(&self) -> Result<Vec<Opinion>, serde_json::Error> {
        serde_json::from_str(&self.round1_json)
    }

    pub fn round2(&self) -> Result<Option<Vec<DebateResponse>>, serde_json::Error> {
        self.round2_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }

    pub fn timings(&self) -> Result<Vec<RoleTiming>, serde_json::Error> {
        serde_json::from_str(&self.timings_json)
    }
}
