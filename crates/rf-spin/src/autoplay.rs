//! Autoplay Session Loop
//!
//! Repeats base spins through the controller. After every settled spin the
//! remaining count is decremented once and the stop conditions are checked
//! in a fixed order:
//!
//! 1. the spin failed (never retried)
//! 2. the user asked to stop
//! 3. free spins were awarded (always ends autoplay)
//! 4. a bonus triggered and `stop_on_feature` is set
//! 5. the spin won and `stop_on_win` is set
//! 6. the spin won at least `single_win_limit`
//! 7. the balance dropped by at least `loss_limit`
//! 8. nothing remains

use std::sync::Arc;

use parking_lot::Mutex;
use rf_stage::{AutoplayStopReason, FeatureType, Stage, StageBus};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cancel::{CancellationToken, delay};
use crate::config::AutoplayConfig;
use crate::controller::{SpinController, SpinOutcome};
use crate::error::{AutoplayError, SpinError};
use crate::gate::{Driver, DriverGate, DriverLease};
use crate::result::SpinRequest;
use crate::timing::TimingConfig;

struct AutoplaySession {
    requested: u32,
    remaining: u32,
    played: u32,
    total_win: f64,
    /// Sum of balance deltas since autoplay started
    net_result: f64,
    stop: CancellationToken,
    stop_reason: AutoplayStopReason,
    _lease: DriverLease,
}

/// Read-only view of the running autoplay session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AutoplaySnapshot {
    pub requested: u32,
    pub remaining: u32,
    pub played: u32,
}

/// How an autoplay session ended
#[derive(Debug, Clone)]
pub struct AutoplayReport {
    pub requested: u32,
    pub played: u32,
    pub remaining: u32,
    pub total_win: f64,
    pub net_result: f64,
    pub reason: AutoplayStopReason,
    /// Failure that ended the loop
    pub error: Option<SpinError>,
    /// Last settled spin (carries a pending free-spin award)
    pub last_outcome: Option<SpinOutcome>,
}

/// Drives the spin controller N times with stop conditions
pub struct AutoplayLoop {
    controller: Arc<SpinController>,
    gate: Arc<DriverGate>,
    bus: Arc<StageBus>,
    timing: TimingConfig,
    config: Mutex<AutoplayConfig>,
    session: Mutex<Option<AutoplaySession>>,
}

impl AutoplayLoop {
    pub fn new(
        controller: Arc<SpinController>,
        gate: Arc<DriverGate>,
        timing: TimingConfig,
        config: AutoplayConfig,
    ) -> Self {
        let bus = Arc::clone(controller.bus());
        Self {
            controller,
            gate,
            bus,
            timing,
            config: Mutex::new(config),
            session: Mutex::new(None),
        }
    }

    /// Stop conditions for the next session
    pub fn set_config(&self, config: AutoplayConfig) {
        *self.config.lock() = config;
    }

    pub fn config(&self) -> AutoplayConfig {
        self.config.lock().clone()
    }

    /// Start a session in the background
    pub fn start(self: &Arc<Self>, count: u32) -> Result<JoinHandle<AutoplayReport>, AutoplayError> {
        self.begin(count)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run_loop().await }))
    }

    /// Start a session and wait for it to end
    pub async fn play(&self, count: u32) -> Result<AutoplayReport, AutoplayError> {
        self.begin(count)?;
        Ok(self.run_loop().await)
    }

    /// Halt the loop; a spin in flight still settles
    pub fn stop(&self) -> bool {
        self.stop_with(AutoplayStopReason::UserStop)
    }

    /// Halt the loop and report `reason` (first request wins)
    pub fn stop_with(&self, reason: AutoplayStopReason) -> bool {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };
        if !session.stop.cancel() {
            return false;
        }
        session.stop_reason = reason;
        log::info!("Autoplay stop requested ({:?}) after {} spins", reason, session.played);
        true
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn snapshot(&self) -> Option<AutoplaySnapshot> {
        self.session.lock().as_ref().map(|s| AutoplaySnapshot {
            requested: s.requested,
            remaining: s.remaining,
            played: s.played,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════

    fn begin(&self, count: u32) -> Result<(), AutoplayError> {
        if count == 0 {
            return Err(AutoplayError::InvalidCount);
        }
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(AutoplayError::AlreadyRunning);
        }
        if self.controller.is_active() {
            return Err(AutoplayError::SpinInFlight);
        }
        let lease = self
            .gate
            .acquire(Driver::Autoplay)
            .map_err(AutoplayError::DriverBusy)?;

        *session = Some(AutoplaySession {
            requested: count,
            remaining: count,
            played: 0,
            total_win: 0.0,
            net_result: 0.0,
            stop: CancellationToken::new(),
            stop_reason: AutoplayStopReason::UserStop,
            _lease: lease,
        });
        drop(session);

        self.bus.publish(Stage::AutoplayStart { requested: count });
        log::info!("Autoplay started: {} spins", count);
        Ok(())
    }

    async fn run_loop(&self) -> AutoplayReport {
        let Some(mut signal) = self.session.lock().as_ref().map(|s| s.stop.signal()) else {
            return self.finish(AutoplayStopReason::UserStop, None, None);
        };
        let config = self.config();
        let mut last_outcome = None;

        let (reason, error) = loop {
            if signal.is_cancelled() {
                break (self.stop_reason(), None);
            }
            if !self.gate.holds(Driver::Autoplay) {
                break (AutoplayStopReason::UserStop, None);
            }

            let result = self.controller.execute_spin(SpinRequest::Base).await;

            let (played, remaining, verdict) = {
                let mut guard = self.session.lock();
                let Some(session) = guard.as_mut() else {
                    break (AutoplayStopReason::UserStop, None);
                };
                session.remaining = session.remaining.saturating_sub(1);
                session.played += 1;
                if let Ok(outcome) = &result {
                    session.total_win += outcome.total_win();
                    session.net_result += outcome.response.balance.delta();
                }
                let verdict = evaluate(&config, session, &result);
                (session.played, session.remaining, verdict)
            };

            self.bus.publish(Stage::AutoplayProgress { played, remaining });

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("Autoplay spin {} failed: {}", played, e);
                    break (AutoplayStopReason::Failure, Some(e));
                }
            };
            last_outcome = Some(outcome);

            if let Some(reason) = verdict {
                break (reason, None);
            }

            delay(self.timing.autoplay_spin_delay(), &mut signal).await;
        };

        self.finish(reason, error, last_outcome)
    }

    fn stop_reason(&self) -> AutoplayStopReason {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.stop_reason)
            .unwrap_or(AutoplayStopReason::UserStop)
    }

    fn finish(
        &self,
        reason: AutoplayStopReason,
        error: Option<SpinError>,
        last_outcome: Option<SpinOutcome>,
    ) -> AutoplayReport {
        let finished = self.session.lock().take();
        let report = match finished {
            Some(s) => AutoplayReport {
                requested: s.requested,
                played: s.played,
                remaining: s.remaining,
                total_win: s.total_win,
                net_result: s.net_result,
                reason,
                error,
                last_outcome,
            },
            None => AutoplayReport {
                requested: 0,
                played: 0,
                remaining: 0,
                total_win: 0.0,
                net_result: 0.0,
                reason,
                error,
                last_outcome,
            },
        };

        self.bus.publish(Stage::AutoplayEnd {
            played: report.played,
            reason,
        });
        log::info!(
            "Autoplay ended ({:?}): {} played, {} remaining, win {:.2}",
            reason,
            report.played,
            report.remaining,
            report.total_win
        );
        report
    }
}

/// Stop condition for a settled spin, None to continue
fn evaluate(
    config: &AutoplayConfig,
    session: &AutoplaySession,
    result: &Result<SpinOutcome, SpinError>,
) -> Option<AutoplayStopReason> {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(_) => return Some(AutoplayStopReason::Failure),
    };

    if session.stop.is_cancelled() {
        return Some(session.stop_reason);
    }
    match outcome.triggered_feature() {
        Some(FeatureType::FreeSpins) => return Some(AutoplayStopReason::Feature),
        Some(FeatureType::BonusGame) if config.stop_on_feature => {
            return Some(AutoplayStopReason::Feature);
        }
        _ => {}
    }
    if config.stop_on_win && outcome.response.is_win() {
        return Some(AutoplayStopReason::Win);
    }
    if config
        .single_win_limit
        .is_some_and(|limit| outcome.total_win() >= limit)
    {
        return Some(AutoplayStopReason::SingleWinLimit);
    }
    if config
        .loss_limit
        .is_some_and(|limit| -session.net_result >= limit)
    {
        return Some(AutoplayStopReason::LossLimit);
    }
    if session.remaining == 0 {
        return Some(AutoplayStopReason::Exhausted);
    }
    None
}
