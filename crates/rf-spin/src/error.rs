//! Error types for the spin core
//!
//! Cancellation is not an error: a force-stopped spin settles normally.

use thiserror::Error;

use crate::controller::SessionPhase;
use crate::gate::Driver;

/// Failure reported by (or about) the upstream result service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed result: {0}")]
    Malformed(String),
}

/// Spin session error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpinError {
    /// Invariant violation: reported synchronously, nothing mutated
    #[error("Spin session {session_id} already active ({phase:?})")]
    SessionActive {
        session_id: u64,
        phase: SessionPhase,
    },

    #[error("Upstream returned no result")]
    NoResult,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Result grid does not fit the reels: {0}")]
    GridMismatch(String),

    #[error("Reel coordinator abandoned session {0}")]
    Abandoned(u64),
}

impl SpinError {
    /// Rejected before any session state was touched
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::SessionActive { .. })
    }
}

/// Autoplay start errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutoplayError {
    #[error("Autoplay count must be positive")]
    InvalidCount,

    #[error("Autoplay already running")]
    AlreadyRunning,

    #[error("A spin is in flight")]
    SpinInFlight,

    #[error("Spin controller is driven by {0:?}")]
    DriverBusy(Driver),
}

/// Free-spin session errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FreeSpinError {
    #[error("Free-spin session already running")]
    AlreadyRunning,

    #[error("Spin controller is driven by {0:?}")]
    DriverBusy(Driver),

    #[error("Invalid rounds: {remaining} remaining of {total}")]
    InvalidRounds { total: u32, remaining: u32 },

    #[error("Free-spin round {round} failed: {source}")]
    Spin { round: u32, source: SpinError },
}

/// Errors surfaced by the game session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("Spin controller is driven by {0:?}")]
    DriverBusy(Driver),

    #[error(transparent)]
    Spin(#[from] SpinError),

    #[error(transparent)]
    Autoplay(#[from] AutoplayError),

    #[error(transparent)]
    FreeSpin(#[from] FreeSpinError),
}

/// Configuration loading/validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnknownFormat(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type alias
pub type SpinResult<T> = Result<T, SpinError>;
