use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The action a role (or the final decision) recommends for the symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stance {
    Long,
    Short,
    Hold,
    Close,
    Adjust,
    Add,
    Reduce,
}

impl Stance {
    pub const ALL: [Stance; 7] = [
        Stance::Long,
        Stance::Short,
        Stance::Hold,
        Stance::Close,
        Stance::Adjust,
        Stance::Add,
        Stance::Reduce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Long => "LONG",
            Stance::Short => "SHORT",
            Stance::Hold => "HOLD",
            Stance::Close => "CLOSE",
            Stance::Adjust => "ADJUST",
            Stance::Add => "ADD",
            Stance::Reduce => "REDUCE",
        }
    }

    /// True for stances that open or grow exposure.
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Stance::Long | Stance::Short | Stance::Add)
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact, case-insensitive match against the enum names.
impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Stance::ALL
            .iter()
            .copied()
            .find(|stance| stance.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown stance: {trimmed}"))
    }
}

/// Coarse classification of agreement across opinions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLevel {
    Unanimous,
    StrongMajority,
    Majority,
    Split,
    Overruled,
}

impl ConsensusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusLevel::Unanimous => "unanimous",
            ConsensusLevel::StrongMajority => "strong_majority",
            ConsensusLevel::Majority => "majority",
            ConsensusLevel::Split => "split",
            ConsensusLevel::Overruled => "overruled",
        }
    }
}

impl fmt::Display for ConsensusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many rounds a session is allowed to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Round 1 and the chairman only.
    Quick,
    /// Round 1, debate, chairman. Digests carry truncated reasoning.
    #[default]
    Standard,
    /// Same rounds as standard with full reasoning passed to debate and chairman.
    Deep,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Quick => "quick",
            Depth::Standard => "standard",
            Depth::Deep => "deep",
        }
    }

    pub fn allows_debate(&self) -> bool {
        !matches!(self, Depth::Quick)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
}
