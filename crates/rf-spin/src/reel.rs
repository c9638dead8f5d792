//! Reel state machine — one instance per column
//!
//! ```text
//! Idle ─▶ SpeedingUp ─▶ Spinning ─▶ SlowingDown ─▶ Stopping ─▶ Stopped ─▶ Idle
//!                                                    │   ▲
//!                                                    ▼   │ (hold elapsed / cancel)
//!                                                 Anticipating
//! ```
//!
//! ## Scroll buffer
//!
//! The reel owns `rows + 1` symbol slots and never allocates while it runs.
//! Slots `0..rows` are the visible rows (top to bottom), slot `rows` is the
//! hidden slot waiting above the window.
//!
//! ```text
//!   slot[rows]  offset = scroll - h        (hidden, entering)
//!   slot[0]     offset = scroll
//!   slot[1]     offset = scroll + h
//!   ...
//!   slot[rows-1]                           (trailing)
//! ```
//!
//! When the trailing slot crosses the bottom bound the buffer rotates (last
//! becomes first) and the slot now entering row 0 is assigned either a random
//! filler or, while stopping, the next id from the stop queue. The stop queue
//! holds the final column bottom-first, so after `rows` wraps the window
//! shows exactly the final column.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ReelMotion;
use crate::symbols::{ReelSymbol, SymbolTable};

/// Local phase of one reel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReelPhase {
    Idle,
    SpeedingUp,
    Spinning,
    SlowingDown,
    Stopping,
    Stopped,
    Anticipating,
}

impl ReelPhase {
    /// Phases in which the reel does not move
    pub fn is_at_rest(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// Phases from which a stop may be requested
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::SpeedingUp | Self::Spinning | Self::SlowingDown)
    }
}

/// Read-only view of a reel for queries and rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReelSnapshot {
    pub column: u8,
    pub phase: ReelPhase,
    pub speed: f32,
    pub consumed_stop_count: usize,
    pub anticipated: bool,
    /// Visible symbols, top to bottom
    pub symbols: Vec<u32>,
}

/// One column's scroll/stop state machine
pub struct Reel {
    column: u8,
    rows: usize,
    motion: ReelMotion,
    symbols: Arc<SymbolTable>,
    rng: StdRng,

    phase: ReelPhase,
    speed: f32,
    /// Distance travelled inside the current scroll cycle, in [0, symbol_height)
    scroll: f32,
    slots: Vec<ReelSymbol>,

    /// Final column, bottom-first
    stop_queue: VecDeque<u32>,
    consumed_stop_count: usize,
    /// Speed used while Stopping
    stop_speed: f32,

    anticipated: bool,
    hold_remaining: f32,
}

impl Reel {
    pub fn new(
        column: u8,
        rows: usize,
        motion: ReelMotion,
        symbols: Arc<SymbolTable>,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let slots = (0..=rows)
            .map(|_| symbols.resolve(random_filler(&mut rng, &symbols)))
            .collect();

        Self {
            column,
            rows,
            motion,
            symbols,
            rng,
            phase: ReelPhase::Idle,
            speed: 0.0,
            scroll: 0.0,
            slots,
            stop_queue: VecDeque::with_capacity(rows),
            consumed_stop_count: 0,
            stop_speed: motion.max_speed,
            anticipated: false,
            hold_remaining: 0.0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS (issued by the coordinator only)
    // ═══════════════════════════════════════════════════════════════════════

    /// Reset to Idle and load the final column (top to bottom)
    pub fn prepare(&mut self, final_column: &[u32]) {
        debug_assert_eq!(final_column.len(), self.rows);
        self.phase = ReelPhase::Idle;
        self.speed = 0.0;
        self.scroll = 0.0;
        self.consumed_stop_count = 0;
        self.stop_speed = self.motion.max_speed;
        self.anticipated = false;
        self.hold_remaining = 0.0;
        self.stop_queue.clear();
        self.stop_queue.extend(final_column.iter().rev().copied());
    }

    /// Idle → SpeedingUp
    pub fn start(&mut self) -> bool {
        if self.phase != ReelPhase::Idle {
            return false;
        }
        self.phase = ReelPhase::SpeedingUp;
        self.speed = self.motion.min_speed;
        true
    }

    /// SpeedingUp/Spinning → SlowingDown
    pub fn slow_down(&mut self) -> bool {
        if !matches!(self.phase, ReelPhase::SpeedingUp | ReelPhase::Spinning) {
            return false;
        }
        self.phase = ReelPhase::SlowingDown;
        true
    }

    /// Begin consuming the stop queue at full speed
    pub fn stop(&mut self) -> bool {
        if !self.phase.can_stop() {
            return false;
        }
        self.phase = ReelPhase::Stopping;
        self.stop_speed = self.motion.max_speed;
        self.speed = self.stop_speed;
        true
    }

    /// Stopping → Anticipating, only before the first stop symbol is placed
    pub fn anticipate(&mut self, hold_secs: f32) -> bool {
        if self.phase != ReelPhase::Stopping || self.consumed_stop_count != 0 {
            return false;
        }
        self.phase = ReelPhase::Anticipating;
        self.anticipated = true;
        self.hold_remaining = hold_secs.max(0.0);
        self.speed = self.motion.anticipation_speed;
        true
    }

    /// Cut an anticipation hold short; the reel resumes its stop sequence
    pub fn release_hold(&mut self) -> bool {
        if self.phase != ReelPhase::Anticipating {
            return false;
        }
        self.leave_hold();
        true
    }

    /// Place every remaining stop symbol now and come to rest
    ///
    /// Runs the same wrap as a normal stop, without motion.
    pub fn resolve(&mut self) {
        match self.phase {
            ReelPhase::Idle | ReelPhase::Stopped => return,
            ReelPhase::Anticipating => self.leave_hold(),
            ReelPhase::Stopping => {}
            _ => {
                self.phase = ReelPhase::Stopping;
            }
        }
        while self.phase == ReelPhase::Stopping {
            self.wrap();
        }
        self.scroll = 0.0;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TICK
    // ═══════════════════════════════════════════════════════════════════════

    /// Advance by one render tick
    pub fn advance(&mut self, dt: f32) {
        if dt <= 0.0 || self.phase.is_at_rest() {
            return;
        }

        match self.phase {
            ReelPhase::SpeedingUp => {
                self.speed = (self.speed + self.motion.acceleration * dt).min(self.motion.max_speed);
                if self.speed >= self.motion.max_speed {
                    self.phase = ReelPhase::Spinning;
                }
            }
            ReelPhase::Spinning => {
                self.speed = self.motion.max_speed;
            }
            ReelPhase::SlowingDown => {
                self.speed = (self.speed - self.motion.deceleration * dt).max(self.motion.min_speed);
                if self.speed <= self.motion.min_speed {
                    self.anticipated = false;
                }
            }
            ReelPhase::Stopping => {
                self.speed = self.stop_speed;
            }
            ReelPhase::Anticipating => {
                self.speed = self.motion.anticipation_speed;
                self.hold_remaining -= dt;
                if self.hold_remaining <= 0.0 {
                    self.leave_hold();
                }
            }
            ReelPhase::Idle | ReelPhase::Stopped => {}
        }

        self.scroll_by(self.speed * dt);
    }

    fn scroll_by(&mut self, distance: f32) {
        let height = self.motion.symbol_height;
        self.scroll += distance;
        while self.scroll >= height {
            self.scroll -= height;
            self.wrap();
            if self.phase == ReelPhase::Stopped {
                self.scroll = 0.0;
                break;
            }
        }
    }

    /// Trailing slot left the window: rotate and assign the entering slot
    fn wrap(&mut self) {
        self.slots.rotate_right(1);

        let id = if self.phase == ReelPhase::Stopping {
            match self.stop_queue.pop_front() {
                Some(id) => {
                    self.consumed_stop_count += 1;
                    id
                }
                None => random_filler(&mut self.rng, &self.symbols),
            }
        } else {
            random_filler(&mut self.rng, &self.symbols)
        };
        self.slots[0] = self.symbols.resolve(id);

        if self.phase == ReelPhase::Stopping && self.consumed_stop_count >= self.rows {
            self.phase = ReelPhase::Stopped;
            self.speed = 0.0;
        }
    }

    fn leave_hold(&mut self) {
        self.phase = ReelPhase::Stopping;
        self.anticipated = false;
        self.hold_remaining = 0.0;
        self.stop_speed = self.motion.anticipation_speed;
        self.speed = self.stop_speed;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn column(&self) -> u8 {
        self.column
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn phase(&self) -> ReelPhase {
        self.phase
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn consumed_stop_count(&self) -> usize {
        self.consumed_stop_count
    }

    pub fn is_anticipated(&self) -> bool {
        self.anticipated
    }

    /// Stop symbols still queued
    pub fn pending_stops(&self) -> usize {
        self.stop_queue.len()
    }

    /// Visible symbols, top to bottom
    pub fn visible_symbols(&self) -> Vec<u32> {
        self.slots[..self.rows].iter().map(|s| s.id).collect()
    }

    /// Visible slots with their resolved kinds
    pub fn visible_slots(&self) -> &[ReelSymbol] {
        &self.slots[..self.rows]
    }

    /// Every slot with its vertical offset (hidden slot first)
    pub fn slot_offsets(&self) -> Vec<(ReelSymbol, f32)> {
        let height = self.motion.symbol_height;
        std::iter::once((self.slots[self.rows], self.scroll - height))
            .chain(
                self.slots[..self.rows]
                    .iter()
                    .enumerate()
                    .map(|(row, slot)| (*slot, row as f32 * height + self.scroll)),
            )
            .collect()
    }

    pub fn snapshot(&self) -> ReelSnapshot {
        ReelSnapshot {
            column: self.column,
            phase: self.phase,
            speed: self.speed,
            consumed_stop_count: self.consumed_stop_count,
            anticipated: self.anticipated,
            symbols: self.visible_symbols(),
        }
    }
}

fn random_filler(rng: &mut StdRng, symbols: &SymbolTable) -> u32 {
    let fillers = symbols.fillers();
    if fillers.is_empty() {
        return 0;
    }
    fillers[rng.random_range(0..fillers.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::BONUS_ID;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn reel() -> Reel {
        Reel::new(0, 3, ReelMotion::default(), Arc::new(SymbolTable::standard()), 42)
    }

    fn assert_speed_invariant(reel: &Reel) {
        assert_eq!(
            reel.speed() == 0.0,
            reel.phase().is_at_rest(),
            "speed {} in phase {:?}",
            reel.speed(),
            reel.phase()
        );
    }

    fn run_until_stopped(reel: &mut Reel, max_ticks: usize) -> usize {
        for tick in 0..max_ticks {
            if reel.phase() == ReelPhase::Stopped {
                return tick;
            }
            reel.advance(DT);
            assert_speed_invariant(reel);
        }
        panic!("reel did not stop within {} ticks", max_ticks);
    }

    #[test]
    fn test_speed_up_reaches_spinning() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        assert_speed_invariant(&reel);
        assert!(reel.start());
        assert_eq!(reel.phase(), ReelPhase::SpeedingUp);
        assert_speed_invariant(&reel);

        for _ in 0..120 {
            reel.advance(DT);
            assert_speed_invariant(&reel);
            assert!(reel.speed() <= ReelMotion::default().max_speed);
        }
        assert_eq!(reel.phase(), ReelPhase::Spinning);
        assert_relative_eq!(reel.speed(), ReelMotion::default().max_speed);
    }

    #[test]
    fn test_slow_down_settles_at_floor() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        for _ in 0..30 {
            reel.advance(DT);
        }
        assert!(reel.slow_down());
        for _ in 0..120 {
            reel.advance(DT);
            assert_speed_invariant(&reel);
        }
        assert_eq!(reel.phase(), ReelPhase::SlowingDown);
        assert_relative_eq!(reel.speed(), ReelMotion::default().min_speed);
    }

    #[test]
    fn test_stop_reveals_final_column() {
        let mut reel = reel();
        reel.prepare(&[7, 8, 9]);
        reel.start();
        for _ in 0..20 {
            reel.advance(DT);
        }
        assert!(reel.stop());
        run_until_stopped(&mut reel, 600);

        assert_eq!(reel.consumed_stop_count(), 3);
        assert_eq!(reel.visible_symbols(), vec![7, 8, 9]);
        assert_eq!(reel.pending_stops(), 0);
        assert_eq!(reel.speed(), 0.0);
    }

    #[test]
    fn test_stop_consumes_one_symbol_per_cycle() {
        let motion = ReelMotion::default();
        let mut reel = reel();
        reel.prepare(&[4, 5, 6]);
        reel.start();
        reel.stop();

        // Less than one symbol height: nothing placed yet
        reel.advance(motion.symbol_height * 0.9 / motion.max_speed);
        assert_eq!(reel.consumed_stop_count(), 0);

        // Crossing the bound places exactly one
        reel.advance(motion.symbol_height * 0.2 / motion.max_speed);
        assert_eq!(reel.consumed_stop_count(), 1);
        assert_eq!(reel.phase(), ReelPhase::Stopping);
    }

    #[test]
    fn test_wrap_reuses_slots() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        let before = reel.slots.as_ptr();
        let capacity = reel.slots.capacity();
        for _ in 0..300 {
            reel.advance(DT);
        }
        assert_eq!(reel.slots.as_ptr(), before);
        assert_eq!(reel.slots.capacity(), capacity);
        assert_eq!(reel.slots.len(), 4);
    }

    #[test]
    fn test_large_delta_stops_exactly() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        reel.stop();
        // One huge tick must not overshoot the queue
        reel.advance(10.0);
        assert_eq!(reel.phase(), ReelPhase::Stopped);
        assert_eq!(reel.consumed_stop_count(), 3);
        assert_eq!(reel.visible_symbols(), vec![1, 2, 3]);
    }

    #[test]
    fn test_anticipation_only_from_stopping() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        assert!(!reel.anticipate(1.0));
        reel.start();
        assert!(!reel.anticipate(1.0));
        reel.stop();
        assert!(reel.anticipate(1.0));
        assert!(reel.is_anticipated());
        assert_eq!(reel.phase(), ReelPhase::Anticipating);
        assert_speed_invariant(&reel);
    }

    #[test]
    fn test_anticipation_hold_delays_stop() {
        let motion = ReelMotion::default();
        let mut reel = reel();
        reel.prepare(&[BONUS_ID, 2, 3]);
        reel.start();
        reel.stop();
        assert!(reel.anticipate(0.5));

        // During the hold no stop symbol is placed
        for _ in 0..29 {
            reel.advance(DT);
            assert_eq!(reel.consumed_stop_count(), 0);
            assert_eq!(reel.phase(), ReelPhase::Anticipating);
        }

        for _ in 0..3 {
            reel.advance(DT);
        }
        assert_eq!(reel.phase(), ReelPhase::Stopping);
        assert!(!reel.is_anticipated());
        assert_relative_eq!(reel.speed(), motion.anticipation_speed);

        run_until_stopped(&mut reel, 600);
        assert_eq!(reel.visible_symbols(), vec![BONUS_ID, 2, 3]);
    }

    #[test]
    fn test_release_hold_resumes_stopping() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        reel.stop();
        reel.anticipate(60.0);
        assert!(reel.release_hold());
        assert_eq!(reel.phase(), ReelPhase::Stopping);
        assert!(!reel.release_hold());
    }

    #[test]
    fn test_anticipation_rejected_after_first_stop_symbol() {
        let motion = ReelMotion::default();
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        reel.stop();
        reel.advance(motion.symbol_height * 1.5 / motion.max_speed);
        assert_eq!(reel.consumed_stop_count(), 1);
        assert!(!reel.anticipate(1.0));
    }

    #[test]
    fn test_resolve_from_any_moving_phase() {
        for setup in 0..4 {
            let mut reel = reel();
            reel.prepare(&[10, 11, 12]);
            reel.start();
            match setup {
                0 => {}
                1 => {
                    reel.slow_down();
                }
                2 => {
                    reel.stop();
                    reel.advance(0.06);
                }
                _ => {
                    reel.stop();
                    reel.anticipate(5.0);
                }
            }
            reel.resolve();
            assert_eq!(reel.phase(), ReelPhase::Stopped);
            assert_eq!(reel.consumed_stop_count(), 3);
            assert_eq!(reel.visible_symbols(), vec![10, 11, 12]);
            assert!(!reel.is_anticipated());
            assert_speed_invariant(&reel);
        }
    }

    #[test]
    fn test_stopped_reel_ignores_ticks() {
        let mut reel = reel();
        reel.prepare(&[1, 2, 3]);
        reel.start();
        reel.resolve();
        let before = reel.snapshot();
        reel.advance(DT);
        assert_eq!(reel.snapshot(), before);
    }

    #[test]
    fn test_slot_offsets_layout() {
        let reel = reel();
        let offsets = reel.slot_offsets();
        assert_eq!(offsets.len(), 4);
        assert_relative_eq!(offsets[0].1, -150.0);
        assert_relative_eq!(offsets[1].1, 0.0);
        assert_relative_eq!(offsets[3].1, 300.0);
    }
}
