//! services/guard/src/error.rs
//!
//! Errors surfaced by the guard client to its commands and the binary.

use crate::config::ConfigError;
use patrol_core::ports::PortError;

/// Everything a guard command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// The environment held a missing or malformed setting.
    #[error("Bad configuration: {0}")]
    Config(#[from] ConfigError),

    /// A port call failed (API, storage).
    #[error("{0}")]
    Port(#[from] PortError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local storage held something that is not valid JSON.
    #[error("Storage format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// An operation needed a signed-in guard.
    #[error("Not signed in. Run `guard login` first")]
    NotSignedIn,

    /// Anything else the client cannot recover from.
    #[error("Internal error: {0}")]
    Internal(String),
}
