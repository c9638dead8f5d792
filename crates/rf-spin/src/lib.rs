//! # rf-spin — Spin Orchestration Core
//!
//! Drives a reel-based slot spin from request to settlement: per-reel
//! scroll/stop state machines, the coordinator that ticks them, the session
//! controller that paces a spin's timing phases, force-stop cancellation,
//! anticipation holds, and the autoplay and free-spin loops that chain spins.
//!
//! ## Architecture
//!
//! ```text
//! Command ──▶ GameSession
//!                 │
//!                 ├── AutoplayLoop ─┐   (DriverGate: one driver at a time)
//!                 ├── FreeSpinLoop ─┤
//!                 │                 v
//!                 └────────▶ SpinController ──▶ ResultSource (upstream)
//!                                   │
//!                                   v  commands
//!                            ReelCoordinator ◀── TickDriver (single writer)
//!                                   │
//!                                   └── Reel × N
//!
//! every component ──▶ StageBus ──▶ presentation / audio / UI
//! ```
//!
//! Nothing here renders, plays sound or evaluates a paytable; the result
//! server is opaque and every notification leaves through [`rf_stage`].

pub mod autoplay;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod free_spins;
pub mod gate;
pub mod reel;
pub mod result;
pub mod session;
pub mod source;
pub mod symbols;
pub mod timing;

#[cfg(test)]
mod test_support;

pub use autoplay::*;
pub use cancel::*;
pub use config::*;
pub use controller::*;
pub use coordinator::*;
pub use driver::*;
pub use error::*;
pub use free_spins::*;
pub use gate::*;
pub use reel::*;
pub use result::*;
pub use session::*;
pub use source::*;
pub use symbols::*;
pub use timing::*;

pub use rf_stage;
