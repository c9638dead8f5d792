//! Stage Bus — typed publish/subscribe channel
//!
//! Every listener registers for an explicit set of [`StageKind`]s and gets
//! its own channel. Publishing never calls into a listener, so the core can
//! publish while holding its own locks.
//!
//! ```text
//!   publish(Stage) ──▶ subscribers[kind] ──▶ Sender ──▶ Subscription.rx
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryIter};
use parking_lot::RwLock;

use crate::event::StageEvent;
use crate::stage::{Stage, StageKind};

/// Handle identifying one subscriber across all of its kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    tx: Sender<StageEvent>,
}

/// Receiving end of a bus subscription
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<StageEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next pending event, if any
    pub fn try_recv(&self) -> Option<StageEvent> {
        self.rx.try_recv().ok()
    }

    /// Iterate pending events without blocking
    pub fn try_iter(&self) -> TryIter<'_, StageEvent> {
        self.rx.try_iter()
    }

    /// Collect every pending event
    pub fn drain(&self) -> Vec<StageEvent> {
        self.rx.try_iter().collect()
    }

    /// Block until an event arrives or the timeout passes
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StageEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of events waiting
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Publish/subscribe bus with per-kind subscriber lists
pub struct StageBus {
    subscribers: RwLock<HashMap<StageKind, Vec<Subscriber>>>,
    next_id: AtomicU64,
    seq: AtomicU64,
    origin: Instant,
}

impl StageBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            origin: Instant::now(),
        }
    }

    /// Subscribe to the given kinds through one channel
    pub fn subscribe(&self, kinds: &[StageKind]) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut subscribers = self.subscribers.write();
        for kind in kinds {
            let list = subscribers.entry(*kind).or_default();
            if !list.iter().any(|s| s.id == id) {
                list.push(Subscriber { id, tx: tx.clone() });
            }
        }

        Subscription { id, rx }
    }

    /// Subscribe to every kind
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(&StageKind::ALL)
    }

    /// Remove a subscriber from every list
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            list.retain(|s| s.id != id);
        }
        subscribers.retain(|_, list| !list.is_empty());
    }

    /// Publish a stage to every subscriber of its kind, returns its sequence number
    pub fn publish(&self, stage: Stage) -> u64 {
        let kind = stage.kind();
        // Sequence assignment and delivery share the write lock so that
        // every subscriber observes events in sequence order.
        let mut subscribers = self.subscribers.write();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed_ms = self.origin.elapsed().as_secs_f64() * 1000.0;

        log::trace!("stage #{} {}", seq, stage.type_name());

        if let Some(list) = subscribers.get_mut(&kind) {
            let event = StageEvent::new(stage, seq, elapsed_ms);
            list.retain(|s| s.tx.send(event.clone()).is_ok());
        }

        seq
    }

    /// Live subscribers registered for a kind
    pub fn subscriber_count(&self, kind: StageKind) -> usize {
        self.subscribers
            .read()
            .get(&kind)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Sequence number of the most recent publish (0 = nothing published)
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}

impl Default for StageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::SpinMode;

    #[test]
    fn test_publish_reaches_only_subscribed_kinds() {
        let bus = StageBus::new();
        let reels = bus.subscribe(&[StageKind::ReelStop]);
        let ends = bus.subscribe(&[StageKind::SpinEnd]);

        bus.publish(Stage::ReelStop {
            session_id: 1,
            reel_index: 0,
            symbols: vec![1, 2, 3],
        });

        assert_eq!(reels.pending(), 1);
        assert_eq!(ends.pending(), 0);
    }

    #[test]
    fn test_multi_kind_subscriber_keeps_order() {
        let bus = StageBus::new();
        let sub = bus.subscribe(&[StageKind::ReelStop, StageKind::AllReelsStopped]);

        for reel in 0..3u8 {
            bus.publish(Stage::ReelStop {
                session_id: 1,
                reel_index: reel,
                symbols: Vec::new(),
            });
        }
        bus.publish(Stage::AllReelsStopped { session_id: 1 });

        let events = sub.drain();
        assert_eq!(events.len(), 4);
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
        assert_eq!(events[3].kind(), StageKind::AllReelsStopped);
    }

    #[test]
    fn test_unsubscribe_removes_everywhere() {
        let bus = StageBus::new();
        let sub = bus.subscribe_all();
        assert_eq!(bus.subscriber_count(StageKind::SpinStart), 1);

        bus.unsubscribe(sub.id());
        assert_eq!(bus.subscriber_count(StageKind::SpinStart), 0);

        bus.publish(Stage::SpinStart {
            session_id: 1,
            mode: SpinMode::Normal,
        });
        assert_eq!(sub.pending(), 0);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = StageBus::new();
        {
            let _sub = bus.subscribe(&[StageKind::ControlsLocked]);
        }
        assert_eq!(bus.subscriber_count(StageKind::ControlsLocked), 1);
        bus.publish(Stage::ControlsLocked);
        assert_eq!(bus.subscriber_count(StageKind::ControlsLocked), 0);
    }

    #[test]
    fn test_sequence_increases_without_subscribers() {
        let bus = StageBus::new();
        let a = bus.publish(Stage::ControlsLocked);
        let b = bus.publish(Stage::ControlsReleased);
        assert!(b > a);
        assert_eq!(bus.last_seq(), b);
    }
}
