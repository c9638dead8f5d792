//! Reel Coordinator — owns every reel, advances them once per tick
//!
//! The coordinator is the ONLY writer of reel state. Session logic talks to
//! it through commands that are queued and applied at the start of the next
//! [`ReelCoordinator::tick`], so reel mutation happens in exactly one place.
//!
//! ## Notification order
//!
//! `ReelStop` is published in ascending column order through a single
//! "next to notify" pointer, even if a later column settles first.
//! `AllReelsStopped` is published once per session, after the last
//! `ReelStop`, and completes the session's oneshot.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rf_stage::{Stage, StageBus};
use tokio::sync::oneshot;

use crate::config::{AnticipationConfig, GridSpec, SpinConfig};
use crate::error::SpinError;
use crate::reel::{Reel, ReelPhase, ReelSnapshot};
use crate::symbols::SymbolTable;

/// Coordinator shared between the tick driver and session logic
pub type SharedCoordinator = Arc<Mutex<ReelCoordinator>>;

/// Longest tick the reels will integrate in one step (seconds)
const MAX_TICK_SECS: f32 = 0.25;

enum CoordinatorCommand {
    Start {
        session_id: u64,
        grid: Vec<Vec<u32>>,
        allow_anticipation: bool,
        completion: oneshot::Sender<()>,
    },
    SlowDown,
    BeginStopSequence,
    StopNext,
    ResolveAll,
}

/// Per-session bookkeeping, reset by every start
#[derive(Default)]
struct SessionTrack {
    session_id: u64,
    final_grid: Vec<Vec<u32>>,
    next_to_stop: Option<usize>,
    next_to_notify: usize,
    anticipation_allowed: bool,
    anticipation_pending: bool,
    anticipation_active: bool,
    /// Last column's release waits for the rule to be evaluated
    last_release_deferred: bool,
    all_stopped_notified: bool,
    completion: Option<oneshot::Sender<()>>,
}

/// Set of reel state machines driven by one tick source
pub struct ReelCoordinator {
    reels: Vec<Reel>,
    grid: GridSpec,
    anticipation: AnticipationConfig,
    hold_secs: f32,
    bus: Arc<StageBus>,
    pending: VecDeque<CoordinatorCommand>,
    track: SessionTrack,
    running: bool,
}

impl ReelCoordinator {
    pub fn new(config: &SpinConfig, bus: Arc<StageBus>) -> Self {
        let symbols = Arc::new(config.symbols.clone());
        let seed = config.seed.unwrap_or_else(rand::random);
        Self::with_symbols(config, symbols, seed, bus)
    }

    pub fn with_symbols(
        config: &SpinConfig,
        symbols: Arc<SymbolTable>,
        seed: u64,
        bus: Arc<StageBus>,
    ) -> Self {
        let rows = config.grid.rows as usize;
        let reels = (0..config.grid.reels)
            .map(|column| {
                Reel::new(
                    column,
                    rows,
                    config.motion,
                    Arc::clone(&symbols),
                    seed.wrapping_add(column as u64),
                )
            })
            .collect();

        Self {
            reels,
            grid: config.grid,
            anticipation: config.anticipation.clone(),
            hold_secs: config.timing.anticipation_hold().as_secs_f32(),
            bus,
            pending: VecDeque::new(),
            track: SessionTrack::default(),
            running: false,
        }
    }

    /// Wrap for sharing with the tick driver
    pub fn shared(self) -> SharedCoordinator {
        Arc::new(Mutex::new(self))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Queue a new session: reset every reel, load its column, speed up
    ///
    /// The returned receiver completes once `AllReelsStopped` was published.
    pub fn start_spin(
        &mut self,
        session_id: u64,
        final_grid: &[Vec<u32>],
        allow_anticipation: bool,
    ) -> Result<oneshot::Receiver<()>, SpinError> {
        self.grid.check(final_grid).map_err(SpinError::GridMismatch)?;

        let (tx, rx) = oneshot::channel();
        self.pending.push_back(CoordinatorCommand::Start {
            session_id,
            grid: final_grid.to_vec(),
            allow_anticipation,
            completion: tx,
        });
        Ok(rx)
    }

    /// Queue: every reel still accelerating or travelling slows down
    pub fn slow_down(&mut self) {
        self.pending.push_back(CoordinatorCommand::SlowDown);
    }

    /// Queue: point the stop sequence at column 0
    pub fn begin_stop_sequence(&mut self) {
        self.pending.push_back(CoordinatorCommand::BeginStopSequence);
    }

    /// Queue: release the next reel in ascending column order
    pub fn stop_next_reel(&mut self) {
        self.pending.push_back(CoordinatorCommand::StopNext);
    }

    /// Queue: place every remaining stop symbol on the next tick
    ///
    /// Cancels any anticipation hold and disables anticipation for the rest
    /// of the session.
    pub fn resolve_all(&mut self) {
        self.pending.push_back(CoordinatorCommand::ResolveAll);
    }

    /// Force-stop entry point: stop sequence plus immediate resolution
    pub fn force_stop(&mut self) {
        self.begin_stop_sequence();
        self.resolve_all();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TICK
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply queued commands, advance moving reels, publish notifications
    pub fn tick(&mut self, dt: f32) {
        while let Some(command) = self.pending.pop_front() {
            self.apply(command);
        }

        if !self.running {
            return;
        }

        let dt = dt.clamp(0.0, MAX_TICK_SECS);
        for reel in self.reels.iter_mut().filter(|r| !r.phase().is_at_rest()) {
            reel.advance(dt);
        }

        self.publish_progress();
    }

    fn apply(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::Start {
                session_id,
                grid,
                allow_anticipation,
                completion,
            } => {
                if self.running && !self.track.all_stopped_notified {
                    log::warn!(
                        "Session {} abandoned by session {}",
                        self.track.session_id,
                        session_id
                    );
                }
                for (reel, column) in self.reels.iter_mut().zip(&grid) {
                    reel.prepare(column);
                    reel.start();
                }
                self.track = SessionTrack {
                    session_id,
                    final_grid: grid,
                    anticipation_allowed: allow_anticipation && self.anticipation.enabled,
                    completion: Some(completion),
                    ..Default::default()
                };
                self.running = true;
                log::debug!("Reels started for session {}", session_id);
            }
            CoordinatorCommand::SlowDown => {
                for reel in &mut self.reels {
                    reel.slow_down();
                }
            }
            CoordinatorCommand::BeginStopSequence => {
                if self.running && self.track.next_to_stop.is_none() {
                    self.track.next_to_stop = Some(0);
                }
            }
            CoordinatorCommand::StopNext => self.stop_next(),
            CoordinatorCommand::ResolveAll => {
                if !self.running {
                    return;
                }
                self.track.anticipation_allowed = false;
                self.track.anticipation_pending = false;
                self.track.last_release_deferred = false;
                self.track.next_to_stop = Some(self.reels.len());
                for reel in &mut self.reels {
                    reel.resolve();
                }
            }
        }
    }

    fn stop_next(&mut self) {
        let Some(index) = self.track.next_to_stop else {
            log::warn!("Stop requested before the stop sequence began");
            return;
        };
        if index >= self.reels.len() {
            return;
        }
        self.track.next_to_stop = Some(index + 1);

        if index == self.last_column() && self.awaiting_evaluation() {
            self.track.last_release_deferred = true;
            log::debug!("Reel {} release deferred until anticipation is evaluated", index);
            return;
        }
        self.release(index);
    }

    /// Stop `index`; the last column goes straight into a pending hold
    fn release(&mut self, index: usize) {
        let Some(reel) = self.reels.get_mut(index) else {
            return;
        };
        if !reel.stop() {
            return;
        }
        if index == self.last_column() && self.track.anticipation_pending {
            self.hold_last_reel();
        }
    }

    /// The upstream grid qualifies but the evaluation reel has not reported yet
    fn awaiting_evaluation(&self) -> bool {
        let Some(evaluation) = self.anticipation.evaluation_reel() else {
            return false;
        };
        let evaluation = evaluation as usize;
        evaluation < self.last_column()
            && self.track.next_to_notify <= evaluation
            && self.track.anticipation_allowed
            && self.anticipation.should_anticipate(&self.track.final_grid)
    }

    fn hold_last_reel(&mut self) {
        self.track.anticipation_pending = false;
        let last = self.last_column();
        let Some(reel) = self.reels.get_mut(last) else {
            return;
        };
        if reel.anticipate(self.hold_secs) {
            self.track.anticipation_active = true;
            self.bus.publish(Stage::AnticipationOn {
                session_id: self.track.session_id,
                reel_index: last as u8,
            });
            log::debug!("Reel {} held in anticipation", last);
        } else {
            log::debug!("Reel {} already revealing, anticipation skipped", last);
        }
    }

    fn publish_progress(&mut self) {
        let session_id = self.track.session_id;
        let last = self.last_column();

        if self.track.anticipation_active
            && self.reels[last].phase() != ReelPhase::Anticipating
        {
            self.track.anticipation_active = false;
            self.bus.publish(Stage::AnticipationOff {
                session_id,
                reel_index: last as u8,
            });
        }

        while let Some(reel) = self.reels.get(self.track.next_to_notify) {
            if reel.phase() != ReelPhase::Stopped {
                break;
            }
            let index = self.track.next_to_notify;
            self.bus.publish(Stage::ReelStop {
                session_id,
                reel_index: index as u8,
                symbols: reel.visible_symbols(),
            });
            self.track.next_to_notify += 1;

            if Some(index as u8) == self.anticipation.evaluation_reel() {
                self.evaluate_anticipation();
            }
        }

        if self.track.next_to_notify == self.reels.len() && !self.track.all_stopped_notified {
            self.track.all_stopped_notified = true;
            self.running = false;
            self.bus.publish(Stage::AllReelsStopped { session_id });
            if let Some(completion) = self.track.completion.take() {
                // The session may have stopped listening; nothing to do then.
                let _ = completion.send(());
            }
        }
    }

    /// Read the rule from the upstream grid, never from the rendered reels
    fn evaluate_anticipation(&mut self) {
        let last = self.last_column();
        let deferred = std::mem::take(&mut self.track.last_release_deferred);
        if !self.track.anticipation_allowed
            || !self.anticipation.should_anticipate(&self.track.final_grid)
        {
            if deferred {
                self.release(last);
            }
            return;
        }
        if deferred {
            self.track.anticipation_pending = true;
            self.release(last);
            return;
        }
        match self.reels[last].phase() {
            ReelPhase::Stopping => self.hold_last_reel(),
            phase if phase.can_stop() => self.track.anticipation_pending = true,
            _ => {}
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    fn last_column(&self) -> usize {
        self.reels.len().saturating_sub(1)
    }

    /// Every reel reports Stopped
    pub fn all_stopped(&self) -> bool {
        self.reels.iter().all(|r| r.phase() == ReelPhase::Stopped)
    }

    /// Reels are moving for a session that has not completed
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Commands waiting for the next tick
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn session_id(&self) -> u64 {
        self.track.session_id
    }

    pub fn reel_count(&self) -> usize {
        self.reels.len()
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn reel_phase(&self, column: usize) -> Option<ReelPhase> {
        self.reels.get(column).map(|r| r.phase())
    }

    /// Final grid of the current session
    pub fn final_grid(&self) -> &[Vec<u32>] {
        &self.track.final_grid
    }

    /// Visible symbols per column (columns of rows)
    pub fn visible_grid(&self) -> Vec<Vec<u32>> {
        self.reels.iter().map(|r| r.visible_symbols()).collect()
    }

    pub fn snapshot(&self) -> Vec<ReelSnapshot> {
        self.reels.iter().map(|r| r.snapshot()).collect()
    }
}
