//! Free-Spin Session Loop
//!
//! Plays rounds through the spin controller until the remaining count
//! reaches zero. A round whose result declares extra rounds (retrigger)
//! grows both the total and the remaining count in the same step that
//! consumes the round, so no round is lost or counted twice.

use std::sync::Arc;

use parking_lot::Mutex;
use rf_stage::{FreeSpinEndReason, Stage, StageBus};
use serde::Serialize;

use crate::cancel::{CancellationToken, delay};
use crate::controller::SpinController;
use crate::error::FreeSpinError;
use crate::gate::{Driver, DriverGate, DriverLease};
use crate::result::SpinRequest;
use crate::timing::TimingConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Free-spin runtime state
#[derive(Debug)]
struct FreeSpinSession {
    total_rounds: u32,
    remaining_rounds: u32,
    played_rounds: u32,
    accumulated_win: f64,
    retriggers: u32,
    stop: CancellationToken,
    stop_reason: FreeSpinEndReason,
}

/// Counters after one settled round
#[derive(Debug, Clone, Copy, PartialEq)]
struct RoundSettlement {
    played_rounds: u32,
    remaining_rounds: u32,
    total_rounds: u32,
    accumulated_win: f64,
    extra_rounds: u32,
}

impl FreeSpinSession {
    fn new(total_rounds: u32, remaining_rounds: u32, initial_win: f64) -> Self {
        Self {
            total_rounds,
            remaining_rounds,
            played_rounds: 0,
            accumulated_win: initial_win,
            retriggers: 0,
            stop: CancellationToken::new(),
            stop_reason: FreeSpinEndReason::Stopped,
        }
    }

    /// Consume one round and apply its retrigger in a single step
    fn settle_round(&mut self, win: f64, extra_rounds: u32) -> RoundSettlement {
        self.remaining_rounds = self.remaining_rounds.saturating_sub(1);
        self.played_rounds += 1;
        self.accumulated_win += win;
        if extra_rounds > 0 {
            self.total_rounds += extra_rounds;
            self.remaining_rounds += extra_rounds;
            self.retriggers += 1;
        }
        RoundSettlement {
            played_rounds: self.played_rounds,
            remaining_rounds: self.remaining_rounds,
            total_rounds: self.total_rounds,
            accumulated_win: self.accumulated_win,
            extra_rounds,
        }
    }
}

/// Read-only view of the running free-spin session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeSpinSnapshot {
    pub total_rounds: u32,
    pub remaining_rounds: u32,
    pub played_rounds: u32,
    pub accumulated_win: f64,
}

/// How a free-spin session resolved
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeSpinSummary {
    pub total_win: f64,
    pub free_spin_count: u32,
    pub total_rounds: u32,
    pub retriggers: u32,
    pub reason: FreeSpinEndReason,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOOP
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives the spin controller across a server-declared round count
pub struct FreeSpinLoop {
    controller: Arc<SpinController>,
    gate: Arc<DriverGate>,
    bus: Arc<StageBus>,
    timing: TimingConfig,
    session: Mutex<Option<FreeSpinSession>>,
}

impl FreeSpinLoop {
    pub fn new(controller: Arc<SpinController>, gate: Arc<DriverGate>, timing: TimingConfig) -> Self {
        let bus = Arc::clone(controller.bus());
        Self {
            controller,
            gate,
            bus,
            timing,
            session: Mutex::new(None),
        }
    }

    /// Play rounds until none remain, then resolve exactly once
    ///
    /// A failed round ends the session (no retry) and is returned as
    /// [`FreeSpinError::Spin`] after `FreeSpinEnd` was published.
    pub async fn execute_free_spin(
        &self,
        total_rounds: u32,
        remaining_rounds: u32,
        initial_win: f64,
    ) -> Result<FreeSpinSummary, FreeSpinError> {
        self.run(None, total_rounds, remaining_rounds, initial_win).await
    }

    /// [`Self::execute_free_spin`] on a lease the caller already holds
    ///
    /// The lease passes to the free-spin driver without opening the gate.
    pub async fn execute_free_spin_with(
        &self,
        lease: DriverLease,
        total_rounds: u32,
        remaining_rounds: u32,
        initial_win: f64,
    ) -> Result<FreeSpinSummary, FreeSpinError> {
        self.run(Some(lease), total_rounds, remaining_rounds, initial_win).await
    }

    async fn run(
        &self,
        lease: Option<DriverLease>,
        total_rounds: u32,
        remaining_rounds: u32,
        initial_win: f64,
    ) -> Result<FreeSpinSummary, FreeSpinError> {
        if remaining_rounds > total_rounds {
            return Err(FreeSpinError::InvalidRounds {
                total: total_rounds,
                remaining: remaining_rounds,
            });
        }

        let (_lease, mut stop_signal) = {
            let mut session = self.session.lock();
            if session.is_some() {
                return Err(FreeSpinError::AlreadyRunning);
            }
            let lease = match lease {
                Some(held) => held.hand_over(Driver::FreeSpins),
                None => self
                    .gate
                    .acquire(Driver::FreeSpins)
                    .map_err(FreeSpinError::DriverBusy)?,
            };
            let fresh = FreeSpinSession::new(total_rounds, remaining_rounds, initial_win);
            let signal = fresh.stop.signal();
            *session = Some(fresh);
            (lease, signal)
        };

        self.bus.publish(Stage::FreeSpinStart {
            total_rounds,
            remaining_rounds,
        });
        log::info!(
            "Free spins started: {} of {} rounds remaining",
            remaining_rounds,
            total_rounds
        );

        let mut failure = None;
        let reason = loop {
            let round = {
                let session = self.session.lock();
                match session.as_ref() {
                    Some(s) if s.stop.is_cancelled() => break s.stop_reason,
                    Some(s) if s.remaining_rounds == 0 => break FreeSpinEndReason::Completed,
                    Some(s) => s.played_rounds + 1,
                    None => break FreeSpinEndReason::Stopped,
                }
            };
            if !self.gate.holds(Driver::FreeSpins) {
                break FreeSpinEndReason::Stopped;
            }

            let outcome = match self.controller.execute_spin(SpinRequest::FreeSpin { round }).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    log::warn!("Free-spin round {} failed: {}", round, source);
                    failure = Some(FreeSpinError::Spin { round, source });
                    break FreeSpinEndReason::Failed;
                }
            };

            let settled = {
                let mut session = self.session.lock();
                match session.as_mut() {
                    Some(s) => s.settle_round(outcome.total_win(), outcome.response.extra_rounds()),
                    None => break FreeSpinEndReason::Stopped,
                }
            };

            if settled.extra_rounds > 0 {
                self.bus.publish(Stage::FreeSpinRetrigger {
                    extra_rounds: settled.extra_rounds,
                    total_rounds: settled.total_rounds,
                });
                log::info!(
                    "Free spins retriggered: +{} (total {})",
                    settled.extra_rounds,
                    settled.total_rounds
                );
            }
            self.bus.publish(Stage::FreeSpinProgress {
                played_rounds: settled.played_rounds,
                remaining_rounds: settled.remaining_rounds,
                accumulated_win: settled.accumulated_win,
            });

            if settled.remaining_rounds > 0 {
                delay(self.timing.free_spin_round_delay(), &mut stop_signal).await;
            }
        };

        let summary = {
            let mut session = self.session.lock();
            let finished = session.take();
            match finished {
                Some(s) => FreeSpinSummary {
                    total_win: s.accumulated_win,
                    free_spin_count: s.played_rounds,
                    total_rounds: s.total_rounds,
                    retriggers: s.retriggers,
                    reason,
                },
                None => FreeSpinSummary {
                    total_win: initial_win,
                    free_spin_count: 0,
                    total_rounds,
                    retriggers: 0,
                    reason,
                },
            }
        };

        self.bus.publish(Stage::FreeSpinEnd {
            total_win: summary.total_win,
            free_spin_count: summary.free_spin_count,
            reason,
        });
        log::info!(
            "Free spins ended ({:?}): {} rounds, win {:.2}",
            reason,
            summary.free_spin_count,
            summary.total_win
        );

        match failure {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }

    /// Halt after the round in flight; the session still resolves once
    pub fn stop(&self) -> bool {
        self.stop_with(FreeSpinEndReason::Stopped)
    }

    /// Halt and end with `reason` (first request wins)
    pub fn stop_with(&self, reason: FreeSpinEndReason) -> bool {
        let mut guard = self.session.lock();
        match guard.as_mut() {
            Some(session) if session.stop.cancel() => {
                session.stop_reason = reason;
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn snapshot(&self) -> Option<FreeSpinSnapshot> {
        self.session.lock().as_ref().map(|s| FreeSpinSnapshot {
            total_rounds: s.total_rounds,
            remaining_rounds: s.remaining_rounds,
            played_rounds: s.played_rounds,
            accumulated_win: s.accumulated_win,
        })
    }
}
