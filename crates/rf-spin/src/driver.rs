//! Render-tick driver
//!
//! The single caller of [`ReelCoordinator::tick`](crate::coordinator::ReelCoordinator::tick).
//! Delta time is measured between ticks; missed ticks are skipped rather
//! than replayed in a burst.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cancel::CancellationToken;
use crate::coordinator::SharedCoordinator;

/// Handle to a running tick loop
pub struct TickDriver {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<u64>>,
    period: Duration,
}

impl TickDriver {
    /// Spawn the tick loop on the current tokio runtime
    pub fn spawn(coordinator: SharedCoordinator, tick_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64);
        let shutdown = CancellationToken::new();
        let mut signal = shutdown.signal();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut last = Instant::now();
            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => break,
                    now = interval.tick() => {
                        let dt = now.saturating_duration_since(last).as_secs_f32();
                        last = now;
                        coordinator.lock().tick(dt);
                        ticks += 1;
                    }
                }
            }
            log::debug!("Tick driver stopped after {} ticks", ticks);
            ticks
        });

        log::debug!("Tick driver started at {:?} per tick", period);
        Self {
            shutdown,
            handle: Some(handle),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for it; returns the number of ticks driven
    pub async fn shutdown(mut self) -> u64 {
        self.shutdown.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => 0,
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rf_stage::{StageBus, StageKind};

    use crate::config::SpinConfig;
    use crate::coordinator::ReelCoordinator;

    #[tokio::test(start_paused = true)]
    async fn test_driver_ticks_coordinator() {
        let bus = Arc::new(StageBus::new());
        let sub = bus.subscribe(&[StageKind::AllReelsStopped]);
        let coordinator = ReelCoordinator::new(&SpinConfig::studio(), bus).shared();

        let driver = TickDriver::spawn(Arc::clone(&coordinator), 60);
        let done = {
            let mut c = coordinator.lock();
            let rx = c.start_spin(1, &vec![vec![1, 2, 3]; 5], false).unwrap();
            c.resolve_all();
            rx
        };

        tokio::time::timeout(Duration::from_millis(100), done)
            .await
            .expect("reels settle within a few ticks")
            .unwrap();
        assert_eq!(sub.drain().len(), 1);

        let ticks = driver.shutdown().await;
        assert!(ticks >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let bus = Arc::new(StageBus::new());
        let coordinator = ReelCoordinator::new(&SpinConfig::studio(), bus).shared();
        let driver = TickDriver::spawn(coordinator, 60);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(driver.is_running());

        let ticks = driver.shutdown().await;
        // ~12 ticks in 200ms at 60 Hz
        assert!((10..=14).contains(&ticks));
    }
}
