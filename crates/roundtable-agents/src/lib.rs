pub mod chairman;
pub mod chat;
pub mod claude_cli;
pub mod consensus;
pub mod error;
pub mod events;
pub mod fallback;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod roles;
pub mod schema;

pub mod test_support;

pub use chairman::Chairman;
pub use chat::{ChatProvider, ChatRequest, FailoverChat, FailureTracker};
pub use claude_cli::ClaudeCliProvider;
pub use error::AgentError;
pub use events::PhaseEvent;
pub use orchestrator::{select_depth, Orchestrator};
pub use roles::{persona_for, ChatRole, RoleAgent};
