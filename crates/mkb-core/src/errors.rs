use std::path::PathBuf;

/// Core error type for the marker bot.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can decide consistently between a user-facing reply and a logged failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The settings document could not be written; the in-memory change was discarded.
    #[error("settings not saved: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, Error>;
