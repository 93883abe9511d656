//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order, then entity ID)
//! - No rendering, audio or platform dependencies

pub mod action;
pub mod ai;
pub mod body;
pub mod catalog;
pub mod combat;
pub mod events;
pub mod monster;
pub mod player;
pub mod schedule;
pub mod stage;
pub mod state;
pub mod tick;
pub mod tile;

pub use action::{ActionState, Busy, Facing};
pub use body::{Aabb, Body, WallPolicy};
pub use catalog::{Catalog, Item, ItemKind, MonsterKind, MonsterStats};
pub use events::{DamageTarget, GameEvent, Notice, Playback, SoundCue};
pub use monster::{Monster, Pickup, Projectile};
pub use player::{CharacterClass, Player, Pose, StatChoice};
pub use stage::{Portal, StageId};
pub use state::{GameState, PauseReason, Snapshot};
pub use tick::{TickInput, tick};
pub use tile::{Tile, TileGrid, TileWorld};
