use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Discussion log not available: {0}")]
    Unavailable(String),
}
