//! # rf-stage — Spin Stage System
//!
//! Defines the notifications the spin orchestration core publishes and the
//! commands it consumes. Presentation, audio and UI layers never call into
//! the core directly; they listen to STAGES and send COMMANDS.
//!
//! ## Philosophy
//!
//! Every spin passes through the same semantic moments:
//! - Spin starts → Reels stop → All reels stopped → Spin ends
//!
//! Autoplay and free-spin loops wrap those moments with their own
//! start/progress/end stages.

pub mod bus;
pub mod command;
pub mod event;
pub mod stage;
pub mod taxonomy;

pub use bus::*;
pub use command::*;
pub use event::*;
pub use stage::*;
pub use taxonomy::*;
