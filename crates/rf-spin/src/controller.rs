//! Spin Session Controller
//!
//! ```text
//! Idle ─▶ Spinning ─▶ (Slowing) ─▶ Stopping ─▶ Completed ─▶ Idle
//!            │            │            │
//!            └────────────┴────────────┴──▶ Error ─▶ Idle
//! ```
//!
//! One session per spin request, at most one at a time. The controller
//! requests the upstream result, hands the final grid to the coordinator and
//! paces the timing phases of the session's mode. Every pause observes the
//! session's cancellation token, so a force stop shortcuts whatever phase is
//! pending. Reel state is only ever touched through coordinator commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rf_stage::{FeatureType, Stage, StageBus};
use serde::{Deserialize, Serialize};

use crate::cancel::{CancelSignal, CancellationToken, delay};
use crate::coordinator::SharedCoordinator;
use crate::error::{SpinError, SpinResult};
use crate::result::{SpinRequest, SpinResponse};
use crate::source::ResultSource;
use crate::timing::{PhaseTiming, SpinMode, TimingConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Session phase; moves forward only, Completed/Error reset to Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Spinning,
    Slowing,
    Stopping,
    Completed,
    Error,
}

impl SessionPhase {
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Spinning => 1,
            Self::Slowing => 2,
            Self::Stopping => 3,
            Self::Completed | Self::Error => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One spin request, owned exclusively by the controller
#[derive(Debug)]
pub struct SpinSession {
    id: u64,
    phase: SessionPhase,
    mode: SpinMode,
    force_stopped: bool,
    token: CancellationToken,
    final_reel_values: Option<Vec<Vec<u32>>>,
    reels_started: bool,
}

impl SpinSession {
    fn new(id: u64, mode: SpinMode) -> Self {
        Self {
            id,
            phase: SessionPhase::Spinning,
            mode,
            force_stopped: false,
            token: CancellationToken::new(),
            final_reel_values: None,
            reels_started: false,
        }
    }

    fn advance(&mut self, phase: SessionPhase) {
        if phase.rank() > self.phase.rank() {
            self.phase = phase;
        }
    }
}

/// Read-only view of the active session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: u64,
    pub phase: SessionPhase,
    pub mode: SpinMode,
    pub force_stopped: bool,
    pub final_reel_values: Option<Vec<Vec<u32>>>,
}

impl From<&SpinSession> for SessionSnapshot {
    fn from(session: &SpinSession) -> Self {
        Self {
            id: session.id,
            phase: session.phase,
            mode: session.mode,
            force_stopped: session.force_stopped,
            final_reel_values: session.final_reel_values.clone(),
        }
    }
}

/// A settled spin
#[derive(Debug, Clone)]
pub struct SpinOutcome {
    pub session_id: u64,
    pub response: SpinResponse,
    /// Mode at settlement (Turbo after a force stop)
    pub mode: SpinMode,
    pub force_stopped: bool,
}

impl SpinOutcome {
    pub fn total_win(&self) -> f64 {
        self.response.total_win
    }

    pub fn triggered_feature(&self) -> Option<FeatureType> {
        self.response.triggered_feature()
    }
}

struct ControllerState {
    default_mode: SpinMode,
    session: Option<SpinSession>,
}

/// Publishes ControlsLocked now and ControlsReleased when dropped, on every exit path
struct ControlsGuard<'a> {
    bus: &'a StageBus,
}

impl<'a> ControlsGuard<'a> {
    fn lock(bus: &'a StageBus) -> Self {
        bus.publish(Stage::ControlsLocked);
        Self { bus }
    }
}

impl Drop for ControlsGuard<'_> {
    fn drop(&mut self) {
        self.bus.publish(Stage::ControlsReleased);
    }
}

/// Abandons the session if `execute_spin` is dropped before settling
///
/// Settled and failed sessions are already reset, so dropping is a no-op.
struct SessionGuard<'a> {
    controller: &'a SpinController,
    session_id: u64,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.controller.abandon(self.session_id);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level state machine for single spin requests
pub struct SpinController {
    coordinator: SharedCoordinator,
    source: Arc<dyn ResultSource>,
    bus: Arc<StageBus>,
    timing: TimingConfig,
    reel_count: usize,
    state: Mutex<ControllerState>,
    next_session_id: AtomicU64,
}

impl SpinController {
    pub fn new(
        coordinator: SharedCoordinator,
        source: Arc<dyn ResultSource>,
        bus: Arc<StageBus>,
        timing: TimingConfig,
        default_mode: SpinMode,
    ) -> Self {
        let reel_count = coordinator.lock().reel_count();
        Self {
            coordinator,
            source,
            bus,
            timing,
            reel_count,
            state: Mutex::new(ControllerState {
                default_mode,
                session: None,
            }),
            next_session_id: AtomicU64::new(0),
        }
    }

    /// Run one spin from request to settlement
    ///
    /// Fails fast with [`SpinError::SessionActive`] if a session is active;
    /// nothing is mutated in that case.
    pub async fn execute_spin(&self, request: SpinRequest) -> SpinResult<SpinOutcome> {
        let (session_id, mode, mut signal) = {
            let mut state = self.state.lock();
            if let Some(active) = &state.session {
                return Err(SpinError::SessionActive {
                    session_id: active.id,
                    phase: active.phase,
                });
            }
            let id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
            let session = SpinSession::new(id, state.default_mode);
            let signal = session.token.signal();
            let mode = session.mode;
            state.session = Some(session);
            (id, mode, signal)
        };

        let _controls = ControlsGuard::lock(&self.bus);
        let _session = SessionGuard {
            controller: self,
            session_id,
        };
        self.bus.publish(Stage::SpinStart { session_id, mode });
        log::debug!("Session {} started ({:?}, {:?})", session_id, mode, request);

        // ─── Upstream result ───
        let response = match self.source.fetch(request).await {
            Ok(Some(response)) => response,
            Ok(None) => return Err(self.fail(session_id, SpinError::NoResult)),
            Err(e) => return Err(self.fail(session_id, e.into())),
        };

        let done = match self.start_reels(session_id, &response.reels) {
            Ok(done) => done,
            Err(e) => return Err(self.fail(session_id, e)),
        };

        // ─── Timing phases ───
        self.pause(session_id, PhaseTiming::speed_up, &mut signal).await;
        self.pause(session_id, PhaseTiming::travel, &mut signal).await;

        if !self.is_instant(session_id) {
            self.set_phase(session_id, SessionPhase::Slowing);
            self.coordinator.lock().slow_down();
            self.pause(session_id, PhaseTiming::slow_down, &mut signal).await;
        }

        self.set_phase(session_id, SessionPhase::Stopping);
        self.coordinator.lock().begin_stop_sequence();

        if self.is_instant(session_id) {
            self.coordinator.lock().resolve_all();
        } else {
            for column in 0..self.reel_count {
                if column > 0 {
                    self.pause(session_id, PhaseTiming::reel_stop_interval, &mut signal)
                        .await;
                }
                // A force stop already queued the resolution
                if self.is_instant(session_id) {
                    break;
                }
                self.coordinator.lock().stop_next_reel();
            }
        }

        // ─── Settlement ───
        if done.await.is_err() {
            return Err(self.fail(session_id, SpinError::Abandoned(session_id)));
        }

        let (mode, force_stopped) = {
            let mut state = self.state.lock();
            match state.session.as_mut().filter(|s| s.id == session_id) {
                Some(session) => {
                    session.advance(SessionPhase::Completed);
                    (session.mode, session.force_stopped)
                }
                None => (mode, false),
            }
        };

        if let Some(feature) = response.triggered_feature() {
            self.bus.publish(Stage::FeatureTriggered {
                session_id,
                feature,
            });
        }
        self.bus.publish(Stage::SpinEnd {
            session_id,
            total_win: response.total_win,
            force_stopped,
        });
        self.reset(session_id);

        log::info!(
            "Session {} settled: win {:.2}{}",
            session_id,
            response.total_win,
            if force_stopped { " (force stopped)" } else { "" }
        );

        Ok(SpinOutcome {
            session_id,
            response,
            mode,
            force_stopped,
        })
    }

    /// Cut the active session short
    ///
    /// No-op (returns false) without an active session, after settlement, or
    /// when the session already runs in Turbo. A second call is therefore
    /// always a no-op.
    pub fn force_stop(&self) -> bool {
        let session_id = {
            let mut state = self.state.lock();
            let Some(session) = state.session.as_mut() else {
                return false;
            };
            if session.phase.is_terminal() || session.mode == SpinMode::Turbo {
                return false;
            }
            session.force_stopped = true;
            session.mode = SpinMode::Turbo;
            session.token.cancel();
            if session.reels_started {
                self.coordinator.lock().force_stop();
            }
            session.id
        };

        self.bus.publish(Stage::ForceStop { session_id });
        log::info!("Session {} force stopped", session_id);
        true
    }

    /// Mode for sessions started from now on
    pub fn set_mode(&self, mode: SpinMode) {
        self.state.lock().default_mode = mode;
    }

    pub fn default_mode(&self) -> SpinMode {
        self.state.lock().default_mode
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Phase of the active session, Idle when there is none
    pub fn phase(&self) -> SessionPhase {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or(SessionPhase::Idle)
    }

    pub fn session(&self) -> Option<SessionSnapshot> {
        self.state.lock().session.as_ref().map(SessionSnapshot::from)
    }

    pub fn bus(&self) -> &Arc<StageBus> {
        &self.bus
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════

    fn start_reels(
        &self,
        session_id: u64,
        final_grid: &[Vec<u32>],
    ) -> SpinResult<tokio::sync::oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        let session = state
            .session
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or(SpinError::Abandoned(session_id))?;

        let allow_anticipation = session.mode != SpinMode::Turbo && !session.force_stopped;
        let mut coordinator = self.coordinator.lock();
        let done = coordinator.start_spin(session_id, final_grid, allow_anticipation)?;
        if session.force_stopped {
            coordinator.force_stop();
        }
        session.final_reel_values = Some(final_grid.to_vec());
        session.reels_started = true;
        Ok(done)
    }

    /// Wait one timing phase of the session's current mode
    async fn pause(
        &self,
        session_id: u64,
        phase: fn(&PhaseTiming) -> Duration,
        signal: &mut CancelSignal,
    ) {
        let duration = phase(&self.timing.for_mode(self.mode_of(session_id)));
        let outcome = delay(duration, signal).await;
        if outcome.is_cancelled() {
            log::trace!("Session {} delay cancelled", session_id);
        }
    }

    fn mode_of(&self, session_id: u64) -> SpinMode {
        self.state
            .lock()
            .session
            .as_ref()
            .filter(|s| s.id == session_id)
            .map(|s| s.mode)
            .unwrap_or(SpinMode::Turbo)
    }

    /// Turbo or force-stopped: no paced stop sequence
    fn is_instant(&self, session_id: u64) -> bool {
        self.state
            .lock()
            .session
            .as_ref()
            .filter(|s| s.id == session_id)
            .map(|s| s.mode == SpinMode::Turbo || s.force_stopped)
            .unwrap_or(true)
    }

    fn set_phase(&self, session_id: u64, phase: SessionPhase) {
        if let Some(session) = self
            .state
            .lock()
            .session
            .as_mut()
            .filter(|s| s.id == session_id)
        {
            session.advance(phase);
        }
    }

    /// Error transition: publish, reset to Idle, hand the error back
    fn fail(&self, session_id: u64, error: SpinError) -> SpinError {
        {
            let mut state = self.state.lock();
            if let Some(session) = state.session.as_mut().filter(|s| s.id == session_id) {
                session.advance(SessionPhase::Error);
                session.token.cancel();
                if session.reels_started {
                    self.coordinator.lock().force_stop();
                }
            }
        }

        log::warn!("Session {} failed: {}", session_id, error);
        self.bus.publish(Stage::SpinFailed {
            session_id,
            reason: error.to_string(),
        });
        self.reset(session_id);
        error
    }

    /// Caller stopped waiting mid-flight: stop the reels and free the slot
    fn abandon(&self, session_id: u64) {
        {
            let mut state = self.state.lock();
            let Some(session) = state.session.as_mut().filter(|s| s.id == session_id) else {
                return;
            };
            session.token.cancel();
            if session.reels_started {
                self.coordinator.lock().force_stop();
            }
            state.session = None;
        }

        let error = SpinError::Abandoned(session_id);
        log::warn!("Session {} dropped before settling", session_id);
        self.bus.publish(Stage::SpinFailed {
            session_id,
            reason: error.to_string(),
        });
    }

    fn reset(&self, session_id: u64) {
        let mut state = self.state.lock();
        if state.session.as_ref().is_some_and(|s| s.id == session_id) {
            state.session = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_stage::{StageKind, Subscription};
    use tokio::time::Instant;

    use crate::config::SpinConfig;
    use crate::coordinator::ReelCoordinator;
    use crate::driver::TickDriver;
    use crate::error::UpstreamError;
    use crate::result::Balance;
    use crate::source::ScriptedSource;
    use crate::symbols::BONUS_ID;

    struct Harness {
        controller: Arc<SpinController>,
        source: Arc<ScriptedSource>,
        sub: Subscription,
        _driver: TickDriver,
    }

    fn grid() -> Vec<Vec<u32>> {
        (0..5).map(|c| vec![c + 1, c + 2, c + 3]).collect()
    }

    fn response(win: f64) -> SpinResponse {
        SpinResponse::new(grid(), win, Balance { before: 100.0, after: 99.0 + win })
    }

    fn harness(config: SpinConfig, source: ScriptedSource) -> Harness {
        let bus = Arc::new(StageBus::new());
        let sub = bus.subscribe_all();
        let coordinator = ReelCoordinator::new(&config, Arc::clone(&bus)).shared();
        let driver = TickDriver::spawn(Arc::clone(&coordinator), config.tick_hz);
        let source = Arc::new(source);
        let controller = Arc::new(SpinController::new(
            coordinator,
            source.clone(),
            bus,
            config.timing.clone(),
            config.default_mode,
        ));
        Harness {
            controller,
            source,
            sub,
            _driver: driver,
        }
    }

    fn config() -> SpinConfig {
        SpinConfig {
            seed: Some(1),
            ..Default::default()
        }
    }

    fn kinds(sub: &Subscription) -> Vec<StageKind> {
        sub.drain().iter().map(|e| e.kind()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_reveals_grid_and_settles() {
        let h = harness(config(), ScriptedSource::responses([response(5.0)]));

        let outcome = h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        assert_eq!(outcome.total_win(), 5.0);
        assert!(!outcome.force_stopped);
        assert_eq!(outcome.mode, SpinMode::Normal);
        assert_eq!(h.controller.phase(), SessionPhase::Idle);
        assert!(!h.controller.is_active());

        let coordinator = h.controller.coordinator().lock();
        assert_eq!(coordinator.visible_grid(), grid());
        assert!(coordinator.snapshot().iter().all(|r| r.consumed_stop_count == 3));
        drop(coordinator);

        let kinds = kinds(&h.sub);
        assert_eq!(kinds.first(), Some(&StageKind::ControlsLocked));
        assert_eq!(kinds[1], StageKind::SpinStart);
        assert_eq!(kinds.last(), Some(&StageKind::ControlsReleased));
        let all = kinds.iter().position(|k| *k == StageKind::AllReelsStopped).unwrap();
        let last_stop = kinds.iter().rposition(|k| *k == StageKind::ReelStop).unwrap();
        let end = kinds.iter().position(|k| *k == StageKind::SpinEnd).unwrap();
        assert!(last_stop < all && all < end);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_spin_rejected_while_active() {
        let source = ScriptedSource::responses([response(0.0), response(0.0)])
            .with_latency(Duration::from_millis(100));
        let h = harness(config(), source);

        let controller = Arc::clone(&h.controller);
        let first = tokio::spawn(async move { controller.execute_spin(SpinRequest::Base).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let before = h.controller.session().unwrap();
        let err = h.controller.execute_spin(SpinRequest::Base).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(h.controller.session().unwrap(), before);
        assert_eq!(h.source.requests().len(), 1);

        assert!(first.await.unwrap().is_ok());
        assert_eq!(h.source.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_result_fails_and_releases_controls() {
        let h = harness(config(), ScriptedSource::new([Ok(None)]));

        let err = h.controller.execute_spin(SpinRequest::Base).await.unwrap_err();
        assert_eq!(err, SpinError::NoResult);
        assert_eq!(h.controller.phase(), SessionPhase::Idle);

        let kinds = kinds(&h.sub);
        let failed = kinds.iter().position(|k| *k == StageKind::SpinFailed).unwrap();
        assert_eq!(kinds.last(), Some(&StageKind::ControlsReleased));
        assert!(failed < kinds.len() - 1);
        assert!(!kinds.contains(&StageKind::SpinEnd));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_error_propagates() {
        let h = harness(
            config(),
            ScriptedSource::new([Err(UpstreamError::Transport("offline".into()))]),
        );
        let err = h.controller.execute_spin(SpinRequest::Base).await.unwrap_err();
        assert!(matches!(err, SpinError::Upstream(UpstreamError::Transport(_))));
        assert!(!h.controller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_grid_is_an_upstream_failure() {
        let bad = SpinResponse::new(vec![vec![1, 2, 3]; 3], 0.0, Balance { before: 1.0, after: 0.0 });
        let h = harness(config(), ScriptedSource::responses([bad, response(0.0)]));

        let err = h.controller.execute_spin(SpinRequest::Base).await.unwrap_err();
        assert!(matches!(err, SpinError::GridMismatch(_)));
        // Controller is usable again
        assert!(h.controller.execute_spin(SpinRequest::Base).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_stop_during_travel() {
        let h = harness(config(), ScriptedSource::responses([response(2.0)]));

        let controller = Arc::clone(&h.controller);
        let spin = tokio::spawn(async move { controller.execute_spin(SpinRequest::Base).await });

        // speed-up is 200ms, travel 800ms
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.controller.phase(), SessionPhase::Spinning);

        let forced_at = Instant::now();
        assert!(h.controller.force_stop());
        assert!(!h.controller.force_stop());
        assert_eq!(h.controller.session().unwrap().mode, SpinMode::Turbo);

        let outcome = spin.await.unwrap().unwrap();
        assert!(forced_at.elapsed() < Duration::from_millis(50));
        assert!(outcome.force_stopped);
        assert_eq!(outcome.mode, SpinMode::Turbo);
        assert_eq!(h.controller.coordinator().lock().visible_grid(), grid());

        let kinds = kinds(&h.sub);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::ForceStop).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::ReelStop).count(), 5);
        assert!(!kinds.contains(&StageKind::AnticipationOn));

        // Forced mode does not leak into the next session
        assert_eq!(h.controller.default_mode(), SpinMode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_stop_while_fetching() {
        let source = ScriptedSource::responses([response(0.0)]).with_latency(Duration::from_millis(300));
        let h = harness(config(), source);

        let controller = Arc::clone(&h.controller);
        let spin = tokio::spawn(async move { controller.execute_spin(SpinRequest::Base).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.controller.force_stop());

        let outcome = spin.await.unwrap().unwrap();
        assert!(outcome.force_stopped);
        assert_eq!(h.controller.coordinator().lock().visible_grid(), grid());
    }

    #[test]
    fn test_force_stop_without_session_is_noop() {
        let bus = Arc::new(StageBus::new());
        let sub = bus.subscribe_all();
        let coordinator = ReelCoordinator::new(&config(), Arc::clone(&bus)).shared();
        let controller = SpinController::new(
            coordinator,
            Arc::new(ScriptedSource::default()),
            bus,
            TimingConfig::standard(),
            SpinMode::Normal,
        );
        assert!(!controller.force_stop());
        assert!(sub.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turbo_resolves_immediately_without_anticipation() {
        let mut bonus = grid();
        bonus[0][0] = BONUS_ID;
        bonus[2][1] = BONUS_ID;
        let reply = SpinResponse::new(bonus.clone(), 0.0, Balance { before: 1.0, after: 0.0 });
        let source = ScriptedSource::responses([reply]).with_latency(Duration::from_millis(100));
        let h = harness(config(), source);
        h.controller.set_mode(SpinMode::Turbo);

        let started = Instant::now();
        let controller = Arc::clone(&h.controller);
        let spin = tokio::spawn(async move { controller.execute_spin(SpinRequest::Base).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Turbo sessions ignore force stop
        assert!(!h.controller.force_stop());

        let outcome = spin.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(outcome.mode, SpinMode::Turbo);
        assert!(!outcome.force_stopped);

        let kinds = kinds(&h.sub);
        assert!(!kinds.contains(&StageKind::ForceStop));
        assert!(!kinds.contains(&StageKind::AnticipationOn));
        assert_eq!(h.controller.coordinator().lock().visible_grid(), bonus);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_mode_is_shorter() {
        let h = harness(config(), ScriptedSource::responses([response(0.0), response(0.0)]));

        let started = Instant::now();
        h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        let normal = started.elapsed();

        h.controller.set_mode(SpinMode::Fast);
        let started = Instant::now();
        h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        let fast = started.elapsed();

        // Normal: 200 + 800 + 300 + 4 × 300 before the last release
        assert!(normal >= Duration::from_millis(2500));
        assert!(fast < normal);
        assert!(fast >= Duration::from_millis(200 + 400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_spin_frees_the_session() {
        let h = harness(config(), ScriptedSource::responses([response(0.0), response(3.0)]));

        let timed_out = tokio::time::timeout(
            Duration::from_millis(300),
            h.controller.execute_spin(SpinRequest::Base),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(!h.controller.is_active());
        assert_eq!(h.controller.phase(), SessionPhase::Idle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let kinds = kinds(&h.sub);
        let failed = kinds.iter().position(|k| *k == StageKind::SpinFailed).unwrap();
        let released = kinds.iter().position(|k| *k == StageKind::ControlsReleased).unwrap();
        assert!(failed < released);
        assert!(kinds.contains(&StageKind::AllReelsStopped));
        assert!(!kinds.contains(&StageKind::SpinEnd));

        let outcome = h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        assert_eq!(outcome.session_id, 2);
        assert_eq!(outcome.total_win(), 3.0);
        assert_eq!(h.controller.coordinator().lock().visible_grid(), grid());
    }

    #[tokio::test(start_paused = true)]
    async fn test_anticipation_holds_in_fast_studio_mode() {
        let mut bonus = grid();
        bonus[0][1] = BONUS_ID;
        bonus[2][2] = BONUS_ID;
        let reply = SpinResponse::new(bonus.clone(), 0.0, Balance { before: 1.0, after: 0.0 });
        let h = harness(SpinConfig::studio(), ScriptedSource::responses([reply]));
        h.controller.set_mode(SpinMode::Fast);

        let outcome = h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        assert_eq!(outcome.mode, SpinMode::Fast);

        let kinds = kinds(&h.sub);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::AnticipationOn).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::AnticipationOff).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == StageKind::ReelStop).count(), 5);
        assert_eq!(h.controller.coordinator().lock().visible_grid(), bonus);
    }

    #[tokio::test(start_paused = true)]
    async fn test_anticipation_extends_normal_spin() {
        let mut bonus = grid();
        bonus[0][1] = BONUS_ID;
        bonus[2][2] = BONUS_ID;
        let reply = SpinResponse::new(bonus.clone(), 0.0, Balance { before: 1.0, after: 0.0 });
        let h = harness(config(), ScriptedSource::responses([reply]));

        let started = Instant::now();
        h.controller.execute_spin(SpinRequest::Base).await.unwrap();
        // hold 1500ms on top of the nominal 2500ms
        assert!(started.elapsed() >= Duration::from_millis(4000));

        let kinds = kinds(&h.sub);
        let on = kinds.iter().position(|k| *k == StageKind::AnticipationOn).unwrap();
        let off = kinds.iter().position(|k| *k == StageKind::AnticipationOff).unwrap();
        let last_stop = kinds.iter().rposition(|k| *k == StageKind::ReelStop).unwrap();
        assert!(on < off && off < last_stop);
        assert_eq!(h.controller.coordinator().lock().visible_grid(), bonus);
    }
}
