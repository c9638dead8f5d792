//! Timing profiles for spin sessions

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use rf_stage::SpinMode;

/// Delays of one spin, in the order the controller sequences them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    /// Reels accelerate before full-speed travel (ms)
    pub speed_up_ms: f64,

    /// Full-speed travel before slowing down (ms)
    pub travel_ms: f64,

    /// Slow-down before the first reel is released (ms)
    pub slow_down_ms: f64,

    /// Delay between consecutive reel stops (ms)
    pub reel_stop_interval_ms: f64,
}

impl PhaseTiming {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            speed_up_ms: 200.0,
            travel_ms: 800.0,
            slow_down_ms: 300.0,
            reel_stop_interval_ms: 300.0,
        }
    }

    /// Everything collapsed to zero
    pub fn instant() -> Self {
        Self {
            speed_up_ms: 0.0,
            travel_ms: 0.0,
            slow_down_ms: 0.0,
            reel_stop_interval_ms: 0.0,
        }
    }

    /// Fast variant: travel scaled by `travel_factor`, slow-down and stops by `compression`
    pub fn compressed(&self, travel_factor: f64, compression: f64) -> Self {
        Self {
            speed_up_ms: self.speed_up_ms,
            travel_ms: self.travel_ms * travel_factor,
            slow_down_ms: self.slow_down_ms * compression,
            reel_stop_interval_ms: self.reel_stop_interval_ms * compression,
        }
    }

    pub fn speed_up(&self) -> Duration {
        millis(self.speed_up_ms)
    }

    pub fn travel(&self) -> Duration {
        millis(self.travel_ms)
    }

    pub fn slow_down(&self) -> Duration {
        millis(self.slow_down_ms)
    }

    pub fn reel_stop_interval(&self) -> Duration {
        millis(self.reel_stop_interval_ms)
    }

    /// Calculate nominal spin duration until the last reel is released
    pub fn total_spin_duration(&self, reel_count: u8) -> f64 {
        self.speed_up_ms
            + self.travel_ms
            + self.slow_down_ms
            + (reel_count.saturating_sub(1) as f64) * self.reel_stop_interval_ms
    }

    fn is_valid(&self) -> bool {
        [
            self.speed_up_ms,
            self.travel_ms,
            self.slow_down_ms,
            self.reel_stop_interval_ms,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self::normal()
    }
}

/// Detailed timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Normal mode delays
    pub normal: PhaseTiming,

    /// Fast mode delays
    pub fast: PhaseTiming,

    /// How long the final reel is held in anticipation (ms)
    pub anticipation_hold_ms: f64,

    /// Pause between autoplay spins (ms)
    pub autoplay_spin_delay_ms: f64,

    /// Pause between free-spin rounds (ms)
    pub free_spin_round_delay_ms: f64,
}

impl TimingConfig {
    /// Normal gameplay timing; fast mode halves travel and compresses the rest
    pub fn standard() -> Self {
        let normal = PhaseTiming::normal();
        Self {
            normal,
            fast: normal.compressed(0.5, 0.6),
            anticipation_hold_ms: 1500.0,
            autoplay_spin_delay_ms: 500.0,
            free_spin_round_delay_ms: 700.0,
        }
    }

    /// Studio timing (short delays for headless runs)
    pub fn studio() -> Self {
        let normal = PhaseTiming {
            speed_up_ms: 50.0,
            travel_ms: 150.0,
            slow_down_ms: 50.0,
            reel_stop_interval_ms: 60.0,
        };
        Self {
            normal,
            fast: normal.compressed(0.5, 0.6),
            anticipation_hold_ms: 300.0,
            autoplay_spin_delay_ms: 50.0,
            free_spin_round_delay_ms: 50.0,
        }
    }

    /// Delays for a mode; turbo is always instant
    pub fn for_mode(&self, mode: SpinMode) -> PhaseTiming {
        match mode {
            SpinMode::Normal => self.normal,
            SpinMode::Fast => self.fast,
            SpinMode::Turbo => PhaseTiming::instant(),
        }
    }

    pub fn anticipation_hold(&self) -> Duration {
        millis(self.anticipation_hold_ms)
    }

    pub fn autoplay_spin_delay(&self) -> Duration {
        millis(self.autoplay_spin_delay_ms)
    }

    pub fn free_spin_round_delay(&self) -> Duration {
        millis(self.free_spin_round_delay_ms)
    }

    /// Every value finite and non-negative
    pub fn is_valid(&self) -> bool {
        self.normal.is_valid()
            && self.fast.is_valid()
            && [
                self.anticipation_hold_ms,
                self.autoplay_spin_delay_ms,
                self.free_spin_round_delay_ms,
            ]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Milliseconds (clamped at zero) to a [`Duration`]
pub fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}
