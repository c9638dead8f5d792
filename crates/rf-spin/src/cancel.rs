//! Cancellation token and cancellable delays
//!
//! A [`CancellationToken`] is owned by exactly one spin session. Every
//! pending delay observes it through a [`CancelSignal`], which does not keep
//! the token alive: when the token is signalled or dropped, every waiter
//! resolves at once.

use std::time::Duration;

use tokio::sync::watch;

/// Session-owned cancellation token
#[derive(Debug)]
pub struct CancellationToken {
    tx: watch::Sender<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal every observer; returns true only for the call that cancelled
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Non-owning observer for a pending delay
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a [`CancellationToken`]
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Signalled, or the owning token is gone
    pub fn is_cancelled(&self) -> bool {
        self.rx.has_changed().is_err() || *self.rx.borrow()
    }

    /// Resolves once the token is signalled or dropped
    pub async fn cancelled(&mut self) {
        // Err means the token was dropped, which releases waiters the same way.
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// How a delay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayOutcome {
    Elapsed,
    Cancelled,
}

impl DelayOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Wait for `duration` unless the signal fires first
///
/// An already-cancelled signal resolves without suspending; a zero duration
/// resolves as elapsed without suspending.
pub async fn delay(duration: Duration, signal: &mut CancelSignal) -> DelayOutcome {
    if signal.is_cancelled() {
        return DelayOutcome::Cancelled;
    }
    if duration.is_zero() {
        return DelayOutcome::Elapsed;
    }

    tokio::select! {
        biased;
        _ = signal.cancelled() => DelayOutcome::Cancelled,
        _ = tokio::time::sleep(duration) => DelayOutcome::Elapsed,
    }
}
