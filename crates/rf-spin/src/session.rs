//! Game Session — composition root of the spin core
//!
//! Builds the bus, coordinator, controller and both session loops from one
//! [`SpinConfig`] and one [`ResultSource`], and owns the tick driver. There
//! is no process-wide state: everything a component needs is handed to it
//! here.

use std::sync::Arc;

use parking_lot::Mutex;
use rf_stage::{AutoplayStopReason, Command, FreeSpinEndReason, Stage, StageBus, StageKind, Subscription};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::autoplay::{AutoplayLoop, AutoplayReport};
use crate::config::SpinConfig;
use crate::controller::{SpinController, SpinOutcome};
use crate::coordinator::{ReelCoordinator, SharedCoordinator};
use crate::driver::TickDriver;
use crate::error::{ConfigError, GameError, SpinError};
use crate::free_spins::{FreeSpinLoop, FreeSpinSummary};
use crate::gate::{Driver, DriverGate, DriverLease};
use crate::result::SpinRequest;
use crate::source::ResultSource;

/// A base spin plus the free spins it awarded
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub base: SpinOutcome,
    pub free_spins: Option<FreeSpinSummary>,
}

impl RoundReport {
    pub fn total_win(&self) -> f64 {
        self.base.total_win() + self.free_spins.map(|f| f.total_win).unwrap_or(0.0)
    }
}

/// Owns every spin-core service for one game screen
pub struct GameSession {
    config: SpinConfig,
    bus: Arc<StageBus>,
    coordinator: SharedCoordinator,
    controller: Arc<SpinController>,
    gate: Arc<DriverGate>,
    autoplay: Arc<AutoplayLoop>,
    free_spins: Arc<FreeSpinLoop>,
    driver: Mutex<Option<TickDriver>>,
}

impl GameSession {
    pub fn new(config: SpinConfig, source: Arc<dyn ResultSource>) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let bus = Arc::new(StageBus::new());
        let coordinator = ReelCoordinator::new(&config, Arc::clone(&bus)).shared();
        let controller = Arc::new(SpinController::new(
            Arc::clone(&coordinator),
            source,
            Arc::clone(&bus),
            config.timing.clone(),
            config.default_mode,
        ));
        let gate = DriverGate::new();
        let autoplay = Arc::new(AutoplayLoop::new(
            Arc::clone(&controller),
            Arc::clone(&gate),
            config.timing.clone(),
            config.autoplay.clone(),
        ));
        let free_spins = Arc::new(FreeSpinLoop::new(
            Arc::clone(&controller),
            Arc::clone(&gate),
            config.timing.clone(),
        ));

        log::info!(
            "Game session '{}' ready: {}x{} reels",
            config.name,
            config.grid.reels,
            config.grid.rows
        );

        Ok(Arc::new(Self {
            config,
            bus,
            coordinator,
            controller,
            gate,
            autoplay,
            free_spins,
            driver: Mutex::new(None),
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Spawn the tick driver on the current runtime (idempotent)
    pub fn start(&self) {
        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|d| d.is_running()) {
            return;
        }
        *driver = Some(TickDriver::spawn(
            Arc::clone(&self.coordinator),
            self.config.tick_hz,
        ));
    }

    /// Stop both loops, cut the active spin short, stop the tick driver
    pub async fn shutdown(&self) {
        self.autoplay.stop();
        self.free_spins.stop();
        self.controller.force_stop();

        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            let ticks = driver.shutdown().await;
            log::info!("Game session '{}' shut down after {} ticks", self.config.name, ticks);
        }
    }

    pub fn is_started(&self) -> bool {
        self.driver.lock().as_ref().is_some_and(|d| d.is_running())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PLAY
    // ═══════════════════════════════════════════════════════════════════════

    /// One base spin; awarded free spins are played before returning
    ///
    /// The round holds the driver gate from the base spin until its last
    /// free spin, so no loop can start in between.
    pub async fn play_round(&self) -> Result<RoundReport, GameError> {
        let lease = self.gate.acquire(Driver::Manual).map_err(GameError::DriverBusy)?;
        self.play_leased_round(lease).await
    }

    async fn play_leased_round(&self, lease: DriverLease) -> Result<RoundReport, GameError> {
        let base = self.controller.execute_spin(SpinRequest::Base).await?;
        let free_spins = self.play_awarded_free_spins(&base, Some(lease)).await?;
        Ok(RoundReport { base, free_spins })
    }

    /// Autoplay until a stop condition; a free-spin award that ended it is played out
    pub async fn run_autoplay(
        &self,
        count: u32,
    ) -> Result<(AutoplayReport, Option<FreeSpinSummary>), GameError> {
        let report = self.autoplay.play(count).await?;
        let free_spins = match &report.last_outcome {
            Some(outcome) if report.reason == AutoplayStopReason::Feature => {
                self.play_awarded_free_spins(outcome, None).await?
            }
            _ => None,
        };
        Ok((report, free_spins))
    }

    async fn play_awarded_free_spins(
        &self,
        outcome: &SpinOutcome,
        lease: Option<DriverLease>,
    ) -> Result<Option<FreeSpinSummary>, GameError> {
        let Some(award) = outcome.response.free_spin.as_ref() else {
            return Ok(None);
        };
        let remaining = award.total_rounds.saturating_sub(award.played_rounds);
        if remaining == 0 {
            return Ok(None);
        }
        let (total, initial_win) = (award.total_rounds, award.feature_win);
        let summary = match lease {
            Some(lease) => {
                self.free_spins
                    .execute_free_spin_with(lease, total, remaining, initial_win)
                    .await?
            }
            None => {
                self.free_spins
                    .execute_free_spin(total, remaining, initial_win)
                    .await?
            }
        };
        Ok(Some(summary))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply one consumed command; long-running work is spawned
    ///
    /// Rejections are reported synchronously and leave state untouched.
    pub fn handle(self: &Arc<Self>, command: Command) -> Result<(), GameError> {
        log::debug!("Command: {}", command.type_name());
        match command {
            Command::Spin => {
                // The lease reserves the controller before the round is spawned
                let lease = self.gate.acquire(Driver::Manual).map_err(GameError::DriverBusy)?;
                if let Some(active) = self.controller.session() {
                    return Err(SpinError::SessionActive {
                        session_id: active.id,
                        phase: active.phase,
                    }
                    .into());
                }
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = this.play_leased_round(lease).await {
                        log::warn!("Round failed: {}", e);
                    }
                });
            }
            Command::ForceStop => {
                self.controller.force_stop();
            }
            Command::StartAutoplay { count } => {
                let handle = self.autoplay.start(count)?;
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let report = match handle.await {
                        Ok(report) => report,
                        Err(e) => {
                            log::error!("Autoplay task failed: {}", e);
                            return;
                        }
                    };
                    if report.reason != AutoplayStopReason::Feature {
                        return;
                    }
                    let Some(outcome) = &report.last_outcome else {
                        return;
                    };
                    if let Err(e) = this.play_awarded_free_spins(outcome, None).await {
                        log::warn!("Free spins after autoplay failed: {}", e);
                    }
                });
            }
            Command::StopAutoplay => {
                self.autoplay.stop();
            }
            Command::SetMode { mode } => {
                self.controller.set_mode(mode);
            }
            Command::FatalError { reason } => self.on_fatal_error(&reason),
        }
        Ok(())
    }

    /// Consume commands until every sender is gone
    pub async fn run_commands(self: Arc<Self>, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            if let Err(e) = self.handle(command) {
                log::warn!("Command rejected: {}", e);
            }
        }
        log::debug!("Command channel closed");
    }

    /// Externally detected fault: stop both loops and the active spin
    pub fn on_fatal_error(&self, reason: &str) {
        log::error!("Fatal error: {}", reason);
        self.autoplay.stop_with(AutoplayStopReason::Failure);
        self.free_spins.stop_with(FreeSpinEndReason::Failed);
        self.controller.force_stop();
        self.bus.publish(Stage::FatalError {
            reason: reason.to_string(),
        });
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn subscribe(&self, kinds: &[StageKind]) -> Subscription {
        self.bus.subscribe(kinds)
    }

    pub fn subscribe_all(&self) -> Subscription {
        self.bus.subscribe_all()
    }

    pub fn config(&self) -> &SpinConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<StageBus> {
        &self.bus
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub fn controller(&self) -> &Arc<SpinController> {
        &self.controller
    }

    pub fn autoplay(&self) -> &Arc<AutoplayLoop> {
        &self.autoplay
    }

    pub fn free_spins(&self) -> &Arc<FreeSpinLoop> {
        &self.free_spins
    }

    pub fn gate(&self) -> &Arc<DriverGate> {
        &self.gate
    }
}
