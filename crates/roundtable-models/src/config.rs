use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::opinion::RoleId;
use crate::stance::Depth;

/// Top-level configuration for the roundtable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoundtableConfig {
    #[serde(default)]
    pub roundtable: DeliberationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Configuration for session orchestration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliberationConfig {
    #[serde(default)]
    pub default_depth: Depth,
    /// Deep sessions run only when this is set and `default_depth` is deep.
    #[serde(default)]
    pub allow_deep: bool,
    /// Minimum Round 1 opinions required to continue.
    #[serde(default = "default_quorum")]
    pub quorum: usize,
    /// Per-role call timeout, applied independently to every Round 1 and Round 2 call.
    #[serde(default = "default_role_timeout_ms")]
    pub role_timeout_ms: u64,
    #[serde(default = "default_chairman_timeout_ms")]
    pub chairman_timeout_ms: u64,
    /// Reasoning is cut to this many characters in standard-depth digests.
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
    #[serde(default = "default_roles")]
    pub roles: Vec<RoleConfig>,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            default_depth: Depth::Standard,
            allow_deep: false,
            quorum: default_quorum(),
            role_timeout_ms: default_role_timeout_ms(),
            chairman_timeout_ms: default_chairman_timeout_ms(),
            summary_chars: default_summary_chars(),
            roles: default_roles(),
        }
    }
}

impl DeliberationConfig {
    /// Voting weight for a role, honouring config overrides.
    pub fn weight_for(&self, role: RoleId) -> Decimal {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .and_then(|r| r.weight)
            .unwrap_or_else(|| role.default_weight())
    }

    pub fn enabled_roles(&self) -> impl Iterator<Item = &RoleConfig> {
        self.roles.iter().filter(|r| r.enabled)
    }
}

/// Configuration for a single seat at the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleConfig {
    pub role: RoleId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides `RoleId::default_weight` in the fallback vote.
    #[serde(default)]
    pub weight: Option<Decimal>,
    /// Provider to try first for this role. Falls back to `ChatConfig::preferred`.
    #[serde(default)]
    pub preferred_provider: Option<String>,
}

impl RoleConfig {
    pub fn enabled(role: RoleId) -> Self {
        Self {
            role,
            enabled: true,
            weight: None,
            preferred_provider: None,
        }
    }
}

/// Configuration for the provider chain every chat call goes through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub preferred: Option<String>,
    /// Tried right after the preferred provider.
    #[serde(default)]
    pub peer: Option<String>,
    #[serde(default)]
    pub chairman_provider: Option<String>,
    /// How long a provider failure keeps counting against it.
    #[serde(default = "default_failure_window")]
    pub failure_window_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            preferred: None,
            peer: None,
            chairman_provider: None,
            failure_window_seconds: default_failure_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    /// Executable implementing the `claude` CLI interface.
    #[serde(default = "default_command")]
    pub command: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Path to the discussion log SQLite file.
    pub sqlite_path: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/roundtable.db".to_string(),
        }
    }
}

fn default_quorum() -> usize {
    3
}
fn default_role_timeout_ms() -> u64 {
    45_000
}
fn default_chairman_timeout_ms() -> u64 {
    60_000
}
fn default_summary_chars() -> usize {
    280
}
fn default_roles() -> Vec<RoleConfig> {
    RoleId::ALL.iter().copied().map(RoleConfig::enabled).collect()
}
fn default_true() -> bool {
    true
}
fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "claude".to_string(),
        command: default_command(),
        model: "claude-sonnet-4-5-20250929".to_string(),
    }]
}
fn default_command() -> String {
    "claude".to_string()
}
fn default_failure_window() -> u64 {
    300
}
