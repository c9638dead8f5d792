//! Upstream spin result
//!
//! Mirrors the result server's response shape field for field. Nothing here
//! reinterprets or coerces values: an absent `freeSpin` or `bonus` block
//! means that feature did not trigger.

use serde::{Deserialize, Serialize};

use rf_stage::FeatureType;

use crate::error::UpstreamError;

/// Balance before and after the spin was settled upstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub before: f64,
    pub after: f64,
}

impl Balance {
    /// after - before
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

/// Free-spin block, present only when free spins are awarded or running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeSpinInfo {
    pub total_rounds: u32,
    pub played_rounds: u32,
    pub extra_rounds: u32,
    pub feature_win: f64,
}

/// Bonus block, present only when the bonus game triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusInfo {
    pub positions: Vec<u32>,
    /// Opaque to the core
    #[serde(default)]
    pub history: Vec<serde_json::Value>,
}

/// One settled spin as returned by the result server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    /// Final symbol id per column, top to bottom
    pub reels: Vec<Vec<u32>>,
    /// "normal" or an escalating win-event tier
    pub win_event_type: String,
    pub total_win: f64,
    pub balance: Balance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_spin: Option<FreeSpinInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus: Option<BonusInfo>,
}

impl SpinResponse {
    /// Plain losing/winning result with no feature blocks
    pub fn new(reels: Vec<Vec<u32>>, total_win: f64, balance: Balance) -> Self {
        Self {
            reels,
            win_event_type: "normal".into(),
            total_win,
            balance,
            free_spin: None,
            bonus: None,
        }
    }

    pub fn with_free_spin(mut self, info: FreeSpinInfo) -> Self {
        self.free_spin = Some(info);
        self
    }

    pub fn with_bonus(mut self, info: BonusInfo) -> Self {
        self.bonus = Some(info);
        self
    }

    pub fn with_win_event(mut self, win_event_type: impl Into<String>) -> Self {
        self.win_event_type = win_event_type.into();
        self
    }

    /// Parse a response body
    pub fn from_json(body: &str) -> Result<Self, UpstreamError> {
        serde_json::from_str(body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_win(&self) -> bool {
        self.total_win > 0.0
    }

    /// Feature this result triggers, free spins first
    pub fn triggered_feature(&self) -> Option<FeatureType> {
        if self.free_spin.is_some() {
            Some(FeatureType::FreeSpins)
        } else if self.bonus.is_some() {
            Some(FeatureType::BonusGame)
        } else {
            None
        }
    }

    /// Extra free-spin rounds declared by this result
    pub fn extra_rounds(&self) -> u32 {
        self.free_spin.as_ref().map(|f| f.extra_rounds).unwrap_or(0)
    }
}

/// What kind of spin is being requested upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpinRequest {
    Base,
    FreeSpin { round: u32 },
}

impl SpinRequest {
    pub fn is_free_spin(&self) -> bool {
        matches!(self, Self::FreeSpin { .. })
    }
}
