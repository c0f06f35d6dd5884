pub mod error;
pub mod sqlite;

pub use error::LogError;
pub use sqlite::SqliteDiscussionLog;

use roundtable_models::discussion::DiscussionRow;

/// Append-only sink for finished sessions. The orchestrator writes through this seam.
pub trait SessionLog: Send + Sync {
    fn append(&self, row: &DiscussionRow) -> Result<(), LogError>;
}
