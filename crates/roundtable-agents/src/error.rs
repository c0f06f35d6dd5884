use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// The reply parsed as JSON but did not match the expected shape.
    #[error("Response validation error: {0}")]
    Validation(String),

    /// No complete JSON object could be extracted from the reply.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Call timed out after {0} ms")]
    Timeout(u64),

    /// Every provider in the chain failed.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Quorum not reached: {got} opinions, {required} required")]
    Quorum { got: usize, required: usize },

    #[error("Session cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }

    /// Errors that end a session rather than demoting a single role.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Quorum { .. } | AgentError::Cancelled)
    }
}
