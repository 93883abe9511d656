//! Riftfall - simulation core of a tile-based side-scrolling action RPG
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, actions, combat, AI, stages)
//! - `tuning`: Data-driven game balance
//! - `error`: Configuration and stage-load errors
//!
//! Rendering, audio playback and input devices live outside this crate; they
//! feed `sim::TickInput` in and read `sim::GameEvent`s and snapshots out.

pub mod error;
pub mod sim;
pub mod tuning;

pub use error::{SimError, SimResult};
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Maximum ticks per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Seed used when none is supplied
    pub const DEFAULT_SEED: u64 = 0x5EED_F411;
}
