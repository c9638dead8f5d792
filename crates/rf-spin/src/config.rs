//! Spin core configuration
//!
//! Everything here is externally supplied: grid shape, reel motion, the
//! anticipation trigger rule, timing constants and autoplay limits.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::symbols::{SymbolKind, SymbolTable, BONUS_ID, SCATTER_ID};
use crate::timing::{SpinMode, TimingConfig};

/// Grid specification (reels × rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of reels (columns)
    pub reels: u8,
    /// Number of visible rows per reel
    pub rows: u8,
}

impl GridSpec {
    /// Standard 5×3
    pub fn standard_5x3() -> Self {
        Self { reels: 5, rows: 3 }
    }

    /// Standard 5×4
    pub fn standard_5x4() -> Self {
        Self { reels: 5, rows: 4 }
    }

    /// Total grid positions
    pub fn total_positions(&self) -> usize {
        self.reels as usize * self.rows as usize
    }

    /// Index of the final column
    pub fn last_reel(&self) -> u8 {
        self.reels.saturating_sub(1)
    }

    /// Does a result grid (columns of rows) fit this spec
    pub fn check(&self, grid: &[Vec<u32>]) -> Result<(), String> {
        if grid.len() != self.reels as usize {
            return Err(format!(
                "expected {} columns, got {}",
                self.reels,
                grid.len()
            ));
        }
        for (column, values) in grid.iter().enumerate() {
            if values.len() != self.rows as usize {
                return Err(format!(
                    "column {} has {} rows, expected {}",
                    column,
                    values.len(),
                    self.rows
                ));
            }
        }
        Ok(())
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::standard_5x3()
    }
}

/// Reel motion constants (pixels, seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReelMotion {
    /// Height of one symbol slot
    pub symbol_height: f32,
    /// Full travel speed (px/s)
    pub max_speed: f32,
    /// Launch speed and slow-down floor (px/s)
    pub min_speed: f32,
    /// Speed while held in anticipation and while resuming from it (px/s)
    pub anticipation_speed: f32,
    /// Speed-up rate (px/s²)
    pub acceleration: f32,
    /// Slow-down rate (px/s²)
    pub deceleration: f32,
}

impl Default for ReelMotion {
    fn default() -> Self {
        Self {
            symbol_height: 150.0,
            max_speed: 3000.0,
            min_speed: 600.0,
            anticipation_speed: 1200.0,
            acceleration: 15000.0,
            deceleration: 9000.0,
        }
    }
}

impl ReelMotion {
    fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.symbol_height,
            self.max_speed,
            self.min_speed,
            self.anticipation_speed,
            self.acceleration,
            self.deceleration,
        ];
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ConfigError::Invalid(
                "reel motion values must be positive".into(),
            ));
        }
        if self.min_speed > self.max_speed || self.anticipation_speed > self.max_speed {
            return Err(ConfigError::Invalid(
                "min/anticipation speed cannot exceed max speed".into(),
            ));
        }
        Ok(())
    }
}

/// Anticipation trigger rule
///
/// When every trigger reel shows a trigger symbol in the FINAL grid, the
/// last column is held before it may stop. The rule is evaluated when the
/// rightmost trigger reel stops and always reads the upstream grid, never
/// the rendered reels.
///
/// ```text
/// trigger_reels: [0, 2]   bonus on reel 0 and reel 2  →  hold reel 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnticipationConfig {
    /// Master switch
    pub enabled: bool,

    /// Symbol ids that count as triggers (Scatter, Bonus); wilds are rejected
    pub trigger_symbol_ids: Vec<u32>,

    /// Reels that must all carry a trigger symbol
    pub trigger_reels: Vec<u8>,
}

impl Default for AnticipationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_symbol_ids: vec![BONUS_ID],
            trigger_reels: vec![0, 2],
        }
    }
}

impl AnticipationConfig {
    /// Scatter and bonus both trigger
    pub fn scatter_or_bonus() -> Self {
        Self {
            trigger_symbol_ids: vec![SCATTER_ID, BONUS_ID],
            ..Default::default()
        }
    }

    /// Check if a symbol ID is a trigger symbol
    pub fn is_trigger_symbol(&self, symbol_id: u32) -> bool {
        self.trigger_symbol_ids.contains(&symbol_id)
    }

    /// Reel whose stop evaluates the rule (rightmost trigger reel)
    pub fn evaluation_reel(&self) -> Option<u8> {
        self.trigger_reels.iter().max().copied()
    }

    /// Evaluate the rule against the upstream grid (columns of rows)
    pub fn should_anticipate(&self, final_grid: &[Vec<u32>]) -> bool {
        if !self.enabled || self.trigger_reels.is_empty() {
            return false;
        }
        self.trigger_reels.iter().all(|&reel| {
            final_grid
                .get(reel as usize)
                .map(|column| column.iter().any(|&id| self.is_trigger_symbol(id)))
                .unwrap_or(false)
        })
    }

    fn validate(&self, grid: &GridSpec, symbols: &SymbolTable) -> Result<(), ConfigError> {
        if let Some(&id) = self
            .trigger_symbol_ids
            .iter()
            .find(|&&id| symbols.kind_of(id) == SymbolKind::Wild)
        {
            return Err(ConfigError::Invalid(format!(
                "wild symbol {} cannot trigger anticipation",
                id
            )));
        }
        if let Some(&reel) = self.trigger_reels.iter().find(|&&r| r >= grid.last_reel()) {
            return Err(ConfigError::Invalid(format!(
                "anticipation trigger reel {} must precede the last reel {}",
                reel,
                grid.last_reel()
            )));
        }
        Ok(())
    }
}

/// Autoplay stop conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoplayConfig {
    /// Stop after any winning spin
    pub stop_on_win: bool,
    /// Stop when a bonus feature triggers (free spins always stop autoplay)
    pub stop_on_feature: bool,
    /// Stop once the balance dropped by at least this much since autoplay started
    pub loss_limit: Option<f64>,
    /// Stop when one spin wins at least this much
    pub single_win_limit: Option<f64>,
}

/// Complete spin core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    /// Game name
    pub name: String,
    /// Grid specification
    pub grid: GridSpec,
    /// Reel motion
    pub motion: ReelMotion,
    /// Symbol kinds and filler pool
    pub symbols: SymbolTable,
    /// Anticipation rule
    pub anticipation: AnticipationConfig,
    /// Timing constants
    pub timing: TimingConfig,
    /// Autoplay stop conditions
    pub autoplay: AutoplayConfig,
    /// Mode new sessions start in
    pub default_mode: SpinMode,
    /// Render tick rate driving the reels
    pub tick_hz: u32,
    /// Seed for filler symbols (None = entropy)
    pub seed: Option<u64>,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            name: "Reel Game".into(),
            grid: GridSpec::default(),
            motion: ReelMotion::default(),
            symbols: SymbolTable::standard(),
            anticipation: AnticipationConfig::default(),
            timing: TimingConfig::standard(),
            autoplay: AutoplayConfig::default(),
            default_mode: SpinMode::Normal,
            tick_hz: 60,
            seed: None,
        }
    }
}

impl SpinConfig {
    /// Headless config: short timings, fixed seed
    pub fn studio() -> Self {
        Self {
            name: "Studio".into(),
            timing: TimingConfig::studio(),
            seed: Some(0x5EED),
            ..Default::default()
        }
    }

    /// Parse from YAML
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`/`.yml`/`.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&source)?,
            "json" => Self::from_json_str(&source)?,
            other => return Err(ConfigError::UnknownFormat(other.to_string())),
        };
        log::info!("Loaded spin config '{}' from {:?}", config.name, path);
        Ok(config)
    }

    /// Reject configurations the core cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.reels == 0 || self.grid.rows == 0 {
            return Err(ConfigError::Invalid("grid must have reels and rows".into()));
        }
        if self.symbols.fillers().is_empty() {
            return Err(ConfigError::Invalid("symbol table has no fillers".into()));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be positive".into()));
        }
        if !self.timing.is_valid() {
            return Err(ConfigError::Invalid(
                "timing values must be finite and non-negative".into(),
            ));
        }
        self.motion.validate()?;
        self.anticipation.validate(&self.grid, &self.symbols)?;
        Ok(())
    }
}
