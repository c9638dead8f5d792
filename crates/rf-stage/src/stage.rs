//! Stage — The notifications the spin core publishes
//!
//! A Stage is NOT a render command and NOT a sound cue.
//! A Stage is the SEMANTIC MEANING of a moment in the spin lifecycle;
//! presentation, audio and UI layers decide what to do with it.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{AutoplayStopReason, FeatureType, FreeSpinEndReason, SpinMode};

/// Canonical spin stage: the contract between the core and every listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // CONTROLS
    // ═══════════════════════════════════════════════════════════════════════
    /// Interactive controls must be disabled (spin in flight)
    ControlsLocked,

    /// Interactive controls return to their default enabled state
    ControlsReleased,

    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// A spin session was accepted and is requesting its result
    SpinStart {
        session_id: u64,
        mode: SpinMode,
    },

    /// Reel has stopped, showing final symbols
    ReelStop {
        session_id: u64,
        /// Which reel stopped (0-indexed)
        reel_index: u8,
        /// Symbols on this reel (top to bottom)
        #[serde(default)]
        symbols: Vec<u32>,
    },

    /// Every reel of the session has stopped
    AllReelsStopped {
        session_id: u64,
    },

    /// User (or a fatal error) cut the session short
    ForceStop {
        session_id: u64,
    },

    /// Spin settled, ready for next spin
    SpinEnd {
        session_id: u64,
        #[serde(default)]
        total_win: f64,
        #[serde(default)]
        force_stopped: bool,
    },

    /// Spin could not settle (no result, malformed result, transport failure)
    SpinFailed {
        session_id: u64,
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // ANTICIPATION
    // ═══════════════════════════════════════════════════════════════════════
    /// Reel is held in a slowed near-miss hold
    AnticipationOn {
        session_id: u64,
        reel_index: u8,
    },

    /// Hold released, the reel resumes its stop sequence
    AnticipationOff {
        session_id: u64,
        reel_index: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // AUTOPLAY
    // ═══════════════════════════════════════════════════════════════════════
    AutoplayStart {
        requested: u32,
    },

    AutoplayProgress {
        played: u32,
        remaining: u32,
    },

    AutoplayEnd {
        played: u32,
        reason: AutoplayStopReason,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // FREE SPINS
    // ═══════════════════════════════════════════════════════════════════════
    FreeSpinStart {
        total_rounds: u32,
        remaining_rounds: u32,
    },

    FreeSpinProgress {
        played_rounds: u32,
        remaining_rounds: u32,
        #[serde(default)]
        accumulated_win: f64,
    },

    /// Extra rounds were awarded mid-session
    FreeSpinRetrigger {
        extra_rounds: u32,
        total_rounds: u32,
    },

    FreeSpinEnd {
        total_win: f64,
        free_spin_count: u32,
        reason: FreeSpinEndReason,
    },

    /// A feature was triggered by a settled spin
    FeatureTriggered {
        session_id: u64,
        feature: FeatureType,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // FAULTS
    // ═══════════════════════════════════════════════════════════════════════
    /// Externally detected fatal error (network loss, ...)
    FatalError {
        reason: String,
    },
}

/// Fieldless discriminant of [`Stage`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    ControlsLocked,
    ControlsReleased,
    SpinStart,
    ReelStop,
    AllReelsStopped,
    ForceStop,
    SpinEnd,
    SpinFailed,
    AnticipationOn,
    AnticipationOff,
    AutoplayStart,
    AutoplayProgress,
    AutoplayEnd,
    FreeSpinStart,
    FreeSpinProgress,
    FreeSpinRetrigger,
    FreeSpinEnd,
    FeatureTriggered,
    FatalError,
}

impl StageKind {
    /// Every kind, in declaration order
    pub const ALL: [StageKind; 19] = [
        StageKind::ControlsLocked,
        StageKind::ControlsReleased,
        StageKind::SpinStart,
        StageKind::ReelStop,
        StageKind::AllReelsStopped,
        StageKind::ForceStop,
        StageKind::SpinEnd,
        StageKind::SpinFailed,
        StageKind::AnticipationOn,
        StageKind::AnticipationOff,
        StageKind::AutoplayStart,
        StageKind::AutoplayProgress,
        StageKind::AutoplayEnd,
        StageKind::FreeSpinStart,
        StageKind::FreeSpinProgress,
        StageKind::FreeSpinRetrigger,
        StageKind::FreeSpinEnd,
        StageKind::FeatureTriggered,
        StageKind::FatalError,
    ];

    /// Get the stage category for grouping
    pub fn category(&self) -> StageCategory {
        match self {
            Self::ControlsLocked | Self::ControlsReleased => StageCategory::Controls,

            Self::SpinStart
            | Self::ReelStop
            | Self::AllReelsStopped
            | Self::ForceStop
            | Self::SpinEnd
            | Self::SpinFailed => StageCategory::SpinLifecycle,

            Self::AnticipationOn | Self::AnticipationOff => StageCategory::Anticipation,

            Self::AutoplayStart | Self::AutoplayProgress | Self::AutoplayEnd => {
                StageCategory::Autoplay
            }

            Self::FreeSpinStart
            | Self::FreeSpinProgress
            | Self::FreeSpinRetrigger
            | Self::FreeSpinEnd
            | Self::FeatureTriggered => StageCategory::Feature,

            Self::FatalError => StageCategory::Fault,
        }
    }
}

impl Stage {
    /// Subscription key of this stage
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::ControlsLocked => StageKind::ControlsLocked,
            Stage::ControlsReleased => StageKind::ControlsReleased,
            Stage::SpinStart { .. } => StageKind::SpinStart,
            Stage::ReelStop { .. } => StageKind::ReelStop,
            Stage::AllReelsStopped { .. } => StageKind::AllReelsStopped,
            Stage::ForceStop { .. } => StageKind::ForceStop,
            Stage::SpinEnd { .. } => StageKind::SpinEnd,
            Stage::SpinFailed { .. } => StageKind::SpinFailed,
            Stage::AnticipationOn { .. } => StageKind::AnticipationOn,
            Stage::AnticipationOff { .. } => StageKind::AnticipationOff,
            Stage::AutoplayStart { .. } => StageKind::AutoplayStart,
            Stage::AutoplayProgress { .. } => StageKind::AutoplayProgress,
            Stage::AutoplayEnd { .. } => StageKind::AutoplayEnd,
            Stage::FreeSpinStart { .. } => StageKind::FreeSpinStart,
            Stage::FreeSpinProgress { .. } => StageKind::FreeSpinProgress,
            Stage::FreeSpinRetrigger { .. } => StageKind::FreeSpinRetrigger,
            Stage::FreeSpinEnd { .. } => StageKind::FreeSpinEnd,
            Stage::FeatureTriggered { .. } => StageKind::FeatureTriggered,
            Stage::FatalError { .. } => StageKind::FatalError,
        }
    }

    /// Get the stage category for grouping
    pub fn category(&self) -> StageCategory {
        self.kind().category()
    }

    /// Session the stage belongs to, if it is spin-scoped
    pub fn session_id(&self) -> Option<u64> {
        match self {
            Stage::SpinStart { session_id, .. }
            | Stage::ReelStop { session_id, .. }
            | Stage::AllReelsStopped { session_id }
            | Stage::ForceStop { session_id }
            | Stage::SpinEnd { session_id, .. }
            | Stage::SpinFailed { session_id, .. }
            | Stage::AnticipationOn { session_id, .. }
            | Stage::AnticipationOff { session_id, .. }
            | Stage::FeatureTriggered { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }

    /// Get the canonical type name (for logging and bridges)
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::ControlsLocked => "controls_locked",
            Stage::ControlsReleased => "controls_released",
            Stage::SpinStart { .. } => "spin_start",
            Stage::ReelStop { .. } => "reel_stop",
            Stage::AllReelsStopped { .. } => "all_reels_stopped",
            Stage::ForceStop { .. } => "force_stop",
            Stage::SpinEnd { .. } => "spin_end",
            Stage::SpinFailed { .. } => "spin_failed",
            Stage::AnticipationOn { .. } => "anticipation_on",
            Stage::AnticipationOff { .. } => "anticipation_off",
            Stage::AutoplayStart { .. } => "autoplay_start",
            Stage::AutoplayProgress { .. } => "autoplay_progress",
            Stage::AutoplayEnd { .. } => "autoplay_end",
            Stage::FreeSpinStart { .. } => "free_spin_start",
            Stage::FreeSpinProgress { .. } => "free_spin_progress",
            Stage::FreeSpinRetrigger { .. } => "free_spin_retrigger",
            Stage::FreeSpinEnd { .. } => "free_spin_end",
            Stage::FeatureTriggered { .. } => "feature_triggered",
            Stage::FatalError { .. } => "fatal_error",
        }
    }
}

/// Stage categories for grouping in listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    Controls,
    SpinLifecycle,
    Anticipation,
    Autoplay,
    Feature,
    Fault,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Controls => "Controls",
            Self::SpinLifecycle => "Spin Lifecycle",
            Self::Anticipation => "Anticipation",
            Self::Autoplay => "Autoplay",
            Self::Feature => "Features",
            Self::Fault => "Faults",
        }
    }
}
