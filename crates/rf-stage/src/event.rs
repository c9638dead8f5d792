//! StageEvent — A stage occurrence with metadata
//!
//! Wraps a Stage with its bus sequence number and publish time.

use serde::{Deserialize, Serialize};

use crate::stage::{Stage, StageKind};

/// A published stage with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The canonical stage
    pub stage: Stage,

    /// Bus-wide publish order (strictly increasing)
    pub seq: u64,

    /// Milliseconds since the bus was created
    pub elapsed_ms: f64,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, seq: u64, elapsed_ms: f64) -> Self {
        Self {
            stage,
            seq,
            elapsed_ms,
        }
    }

    /// Subscription key of the wrapped stage
    pub fn kind(&self) -> StageKind {
        self.stage.kind()
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }

    /// Session the wrapped stage belongs to
    pub fn session_id(&self) -> Option<u64> {
        self.stage.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = StageEvent::new(Stage::ForceStop { session_id: 3 }, 12, 40.5);
        assert_eq!(event.kind(), StageKind::ForceStop);
        assert_eq!(event.type_name(), "force_stop");
        assert_eq!(event.session_id(), Some(3));
        assert_eq!(event.seq, 12);
    }

    #[test]
    fn test_event_serialization() {
        let event = StageEvent::new(Stage::ControlsLocked, 1, 0.0);
        let json = serde_json::to_string(&event).unwrap();
        let back: StageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
