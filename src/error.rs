//! Error types for the tracker.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tracker operations.
///
/// Soft failures (one endpoint down, a corrupt history file) never show up
/// here: the failover client and the durable state guard absorb them. What
/// remains are the conditions a caller has to act on.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Mandatory input {path} unavailable: {reason}")]
    MissingInput { path: PathBuf, reason: String },

    #[error("Current-state input lists no entities; refusing to record exits for everyone")]
    EmptyCurrentState,

    #[error("No ledger endpoint answered for account {account}")]
    LedgerUnreachable { account: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unsupported schema: {0}")]
    UnsupportedSchema(String),

    #[error("Data directory is locked by another run")]
    Locked,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl TrackerError {
    /// Process exit code for this error.
    ///
    /// `2` is reserved for the unreadable current-state input, `3` for an
    /// unreachable ledger; everything else is a generic failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            TrackerError::MissingInput { .. }
            | TrackerError::UnsupportedSchema(_)
            | TrackerError::EmptyCurrentState => 2,
            TrackerError::LedgerUnreachable { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
