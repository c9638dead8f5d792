//! Fixtures shared by the loop tests

use std::sync::Arc;

use rf_stage::{StageBus, StageKind, Subscription};

use crate::config::SpinConfig;
use crate::controller::SpinController;
use crate::coordinator::ReelCoordinator;
use crate::driver::TickDriver;
use crate::gate::DriverGate;
use crate::result::{Balance, BonusInfo, FreeSpinInfo, SpinResponse};
use crate::source::ScriptedSource;

pub struct Rig {
    pub controller: Arc<SpinController>,
    pub source: Arc<ScriptedSource>,
    pub bus: Arc<StageBus>,
    pub gate: Arc<DriverGate>,
    pub sub: Subscription,
    pub config: SpinConfig,
    _driver: TickDriver,
}

impl Rig {
    pub fn kinds(&self) -> Vec<StageKind> {
        self.sub.drain().iter().map(|e| e.kind()).collect()
    }
}

pub fn rig(source: ScriptedSource) -> Rig {
    let config = SpinConfig::studio();
    let bus = Arc::new(StageBus::new());
    let sub = bus.subscribe_all();
    let coordinator = ReelCoordinator::new(&config, Arc::clone(&bus)).shared();
    let driver = TickDriver::spawn(Arc::clone(&coordinator), config.tick_hz);
    let source = Arc::new(source);
    let controller = Arc::new(SpinController::new(
        coordinator,
        source.clone(),
        Arc::clone(&bus),
        config.timing.clone(),
        config.default_mode,
    ));
    Rig {
        controller,
        source,
        bus,
        gate: DriverGate::new(),
        sub,
        config,
        _driver: driver,
    }
}

pub fn grid() -> Vec<Vec<u32>> {
    (0..5).map(|c| vec![c + 1, c + 2, c + 3]).collect()
}

pub fn spin(win: f64) -> SpinResponse {
    SpinResponse::new(grid(), win, Balance { before: 100.0, after: 99.0 + win })
}

/// Base spin that costs `bet` and wins `win` from `before`
pub fn ledger(before: f64, bet: f64, win: f64) -> SpinResponse {
    SpinResponse::new(
        grid(),
        win,
        Balance {
            before,
            after: before - bet + win,
        },
    )
}

pub fn free_spin_award(rounds: u32) -> SpinResponse {
    spin(0.0).with_free_spin(FreeSpinInfo {
        total_rounds: rounds,
        played_rounds: 0,
        extra_rounds: 0,
        feature_win: 0.0,
    })
}

pub fn bonus() -> SpinResponse {
    spin(0.0).with_bonus(BonusInfo {
        positions: vec![1, 7, 13],
        history: Vec::new(),
    })
}

pub fn free_round(played: u32, total: u32, win: f64, extra: u32) -> SpinResponse {
    SpinResponse::new(grid(), win, Balance { before: 100.0, after: 100.0 + win }).with_free_spin(
        FreeSpinInfo {
            total_rounds: total,
            played_rounds: played,
            extra_rounds: extra,
            feature_win: win,
        },
    )
}
