//! Stage Taxonomy — Enums shared by stages and the spin core
//!
//! These enums classify spin speed modes, triggered features and the
//! reasons a session loop ended.

use serde::{Deserialize, Serialize};

/// Spin speed mode, governs every timing constant of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpinMode {
    /// Full presentation timing
    #[default]
    Normal,
    /// Travel halved, slow-down and stop compressed
    Fast,
    /// All delays collapsed to zero, reels resolve immediately
    Turbo,
}

impl SpinMode {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::Turbo => "Turbo",
        }
    }

    /// Next mode in the UI toggle cycle
    pub fn cycle(&self) -> Self {
        match self {
            Self::Normal => Self::Fast,
            Self::Fast => Self::Turbo,
            Self::Turbo => Self::Normal,
        }
    }
}

/// Feature classification for triggered features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Free spins rounds
    FreeSpins,
    /// Bonus game (pick, wheel, ...)
    BonusGame,
}

impl FeatureType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FreeSpins => "Free Spins",
            Self::BonusGame => "Bonus Game",
        }
    }
}

/// Why an autoplay session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayStopReason {
    /// Requested spin count played through
    Exhausted,
    /// A spin won and stop-on-win is configured
    Win,
    /// A feature was triggered
    Feature,
    /// Single win reached the configured limit
    SingleWinLimit,
    /// Balance dropped by the configured loss limit
    LossLimit,
    /// User asked to stop mid-loop
    UserStop,
    /// A spin failed; the loop never retries silently
    Failure,
}

impl AutoplayStopReason {
    /// Whether the loop ended because of a fault
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// Why a free-spin session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeSpinEndReason {
    /// All rounds played
    Completed,
    /// Cancelled externally
    Stopped,
    /// A round failed to settle
    Failed,
}
