use roundtable_models::decision::{LevelDirection, LevelType};
use roundtable_models::opinion::Severity;
use roundtable_models::stance::{ConsensusLevel, MarketRegime, Stance};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Extract the first balanced JSON object from free-form model text.
///
/// Scans from the first `{` and returns the span up to its matching `}`.
/// Braces inside string literals do not count, so this handles:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix/suffix text: `Here is my view: {"key": "value"} Thanks.`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let start = text.find('{').ok_or_else(|| {
        AgentError::MalformedResponse(format!(
            "No JSON object found in response (length={})",
            text.len()
        ))
    })?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset;
                    return Ok(text[start..=end].to_string());
                }
            }
            _ => {}
        }
    }

    Err(AgentError::MalformedResponse(format!(
        "Unterminated JSON object in response (length={})",
        text.len()
    )))
}

/// Map a loose stance string onto the closed enum.
///
/// Exact names win; otherwise substrings are checked in a fixed priority.
/// Anything unrecognised is HOLD, so noise never turns into an entry.
pub fn normalize_stance(raw: &str) -> Stance {
    if let Ok(stance) = raw.parse::<Stance>() {
        return stance;
    }

    let upper = raw.to_ascii_uppercase();
    let has = |needles: &[&str]| needles.iter().any(|n| upper.contains(n));

    if has(&["LONG", "BUY"]) {
        Stance::Long
    } else if has(&["SHORT", "SELL"]) {
        Stance::Short
    } else if has(&["CLOSE", "EXIT"]) {
        Stance::Close
    } else if has(&["ADD", "INCREASE"]) {
        Stance::Add
    } else if has(&["REDUCE", "DECREASE", "TRIM"]) {
        Stance::Reduce
    } else if has(&["ADJUST"]) {
        Stance::Adjust
    } else {
        Stance::Hold
    }
}

/// Map a loose regime label onto the enum. Unknown labels are dropped.
pub fn normalize_regime(raw: &str) -> Option<MarketRegime> {
    let key = canonical(raw);
    let has = |needles: &[&str]| needles.iter().any(|n| key.contains(n));

    if has(&["trending_up", "trend_up", "uptrend", "bull"]) {
        Some(MarketRegime::TrendingUp)
    } else if has(&["trending_down", "trend_down", "downtrend", "bear"]) {
        Some(MarketRegime::TrendingDown)
    } else if has(&["rang", "sideways", "consolidat"]) {
        Some(MarketRegime::Ranging)
    } else if has(&["volatil", "chop"]) {
        Some(MarketRegime::Volatile)
    } else {
        None
    }
}

pub fn normalize_severity(raw: &str) -> Severity {
    let key = canonical(raw);
    if ["critical", "fatal", "blocker"].iter().any(|n| key.contains(n)) {
        Severity::Critical
    } else if ["major", "high", "significant"].iter().any(|n| key.contains(n)) {
        Severity::Major
    } else {
        Severity::Minor
    }
}

pub fn normalize_consensus(raw: &str) -> Option<ConsensusLevel> {
    match canonical(raw).as_str() {
        "unanimous" => Some(ConsensusLevel::Unanimous),
        "strong_majority" => Some(ConsensusLevel::StrongMajority),
        "majority" => Some(ConsensusLevel::Majority),
        "split" => Some(ConsensusLevel::Split),
        "overruled" => Some(ConsensusLevel::Overruled),
        _ => None,
    }
}

pub fn normalize_level_type(raw: &str) -> Option<LevelType> {
    let key = canonical(raw);
    if key.contains("support") {
        Some(LevelType::Support)
    } else if key.contains("resist") {
        Some(LevelType::Resistance)
    } else if key.contains("breakout") {
        Some(LevelType::Breakout)
    } else if key.contains("breakdown") {
        Some(LevelType::Breakdown)
    } else {
        None
    }
}

pub fn normalize_direction(raw: &str) -> Option<LevelDirection> {
    match canonical(raw).as_str() {
        "above" | "up" | "cross_above" | "crosses_above" => Some(LevelDirection::Above),
        "below" | "down" | "cross_below" | "crosses_below" => Some(LevelDirection::Below),
        _ => None,
    }
}

/// Shallow removal of null-valued keys. An object left empty becomes `None`.
pub fn strip_nulls(obj: Map<String, Value>) -> Option<Map<String, Value>> {
    let stripped: Map<String, Value> = obj.into_iter().filter(|(_, v)| !v.is_null()).collect();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

fn canonical(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}
