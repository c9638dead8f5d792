//! Commands — notifications the spin core consumes

use serde::{Deserialize, Serialize};

use crate::taxonomy::SpinMode;

/// Requests sent by UI/input or by infrastructure to the spin core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// User pressed spin
    Spin,
    /// User asked to stop the reels now
    ForceStop,
    /// User started autoplay
    StartAutoplay { count: u32 },
    /// User stopped autoplay
    StopAutoplay,
    /// Speed mode for the next sessions
    SetMode { mode: SpinMode },
    /// Infrastructure detected an unrecoverable fault (network loss, ...)
    FatalError { reason: String },
}

impl Command {
    /// Get the canonical type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::ForceStop => "force_stop",
            Self::StartAutoplay { .. } => "start_autoplay",
            Self::StopAutoplay => "stop_autoplay",
            Self::SetMode { .. } => "set_mode",
            Self::FatalError { .. } => "fatal_error",
        }
    }
}
