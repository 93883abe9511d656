//! Game state and presentation snapshot
//!
//! All state that must be persisted for determinism lives here. The RNG is
//! serialized with the rest so a restored state replays identically.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, Item, MonsterKind};
use super::events::{GameEvent, Playback, SoundCue};
use super::monster::{Monster, Pickup, Projectile};
use super::player::{CharacterClass, Equipped, Player, Pose};
use super::schedule::{Deferred, Schedule};
use super::stage::{self, Destination, Portal, PrologueState, SPAWN_X, StageId};
use super::tick::Buttons;
use super::tile::{TileGrid, TileWorld};
use crate::error::{SimError, SimResult};
use crate::tuning::Tuning;

/// Why the simulation is frozen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseReason {
    /// Waiting for the level-up stat choice
    LevelUp,
    /// Scripted hand-off out of the prologue
    Transition,
    /// Stage reload after a death
    Restarting,
    GameOver,
    Ending,
}

/// Complete game state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    pub tuning: Tuning,
    pub catalog: Catalog,
    /// Validated layouts for every stage
    pub layouts: BTreeMap<StageId, TileGrid>,
    pub stage: StageId,
    /// Bumped on every stage load; guards deferred reloads
    pub stage_epoch: u32,
    pub world: TileWorld,
    pub player: Player,
    /// Live monsters in spawn order
    pub monsters: Vec<Monster>,
    pub projectiles: Vec<Projectile>,
    pub pickups: Vec<Pickup>,
    pub portal: Option<Portal>,
    pub chest_opened: bool,
    pub pause: Option<PauseReason>,
    pub show_inventory: bool,
    /// Sanctuary class popup is up; gameplay input is ignored
    pub awaiting_class: bool,
    pub class_chosen: bool,
    pub prologue: PrologueState,
    /// Simulation tick counter (advances while paused too)
    pub time_ticks: u64,
    /// Held buttons last tick, for edge detection
    pub prev_buttons: Buttons,
    pub schedule: Schedule,
    /// Outbound events since the last drain
    #[serde(skip)]
    events: Vec<GameEvent>,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// New run on the opening stage with default balance and tables
    pub fn new(seed: u64) -> SimResult<Self> {
        Self::with_config(seed, Tuning::default(), Catalog::default())
    }

    pub fn with_config(seed: u64, tuning: Tuning, catalog: Catalog) -> SimResult<Self> {
        Self::with_layouts(seed, tuning, catalog, stage::builtin_layouts()?)
    }

    /// New run over custom layouts; every stage needs one
    pub fn with_layouts(
        seed: u64,
        tuning: Tuning,
        catalog: Catalog,
        layouts: BTreeMap<StageId, TileGrid>,
    ) -> SimResult<Self> {
        tuning.validate()?;
        if let Some(&missing) = StageId::ALL.iter().find(|id| !layouts.contains_key(id)) {
            return Err(SimError::MissingStage(missing));
        }
        let opening = layouts
            .get(&StageId::Opening)
            .cloned()
            .ok_or(SimError::MissingStage(StageId::Opening))?;
        let world = TileWorld::new(opening, tuning.tile_size);

        let mut state = Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            tuning,
            catalog,
            layouts,
            stage: StageId::Opening,
            stage_epoch: 0,
            world,
            player: Player::new(CharacterClass::Guard, 0, Vec2::new(SPAWN_X, 0.0)),
            monsters: Vec::new(),
            projectiles: Vec::new(),
            pickups: Vec::new(),
            portal: None,
            chest_opened: false,
            pause: None,
            show_inventory: false,
            awaiting_class: false,
            class_chosen: false,
            prologue: PrologueState::default(),
            time_ticks: 0,
            prev_buttons: Buttons::default(),
            schedule: Schedule::new(),
            events: Vec::new(),
            next_id: 1,
        };

        stage::load_stage(&mut state, StageId::Opening)?;
        Ok(state)
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Simulation clock in milliseconds
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.time_ticks * self.tuning.tick_ms
    }

    /// Queue a deferred event `delay_ms` from now
    pub fn defer(&mut self, delay_ms: u64, action: Deferred) {
        let now = self.now_ms();
        self.schedule.after(now, self.time_ticks, delay_ms, action);
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.pause.is_some()
    }

    /// Re-create the player as `class` in place
    ///
    /// Loops owned by the old instance are silenced; its pending deferred
    /// events no longer match the new incarnation.
    pub fn become_class(&mut self, class: CharacterClass) {
        let footsteps = self.player.profile.footstep_cue.filter(|_| self.player.action.footsteps);
        if let Some(cue) = footsteps {
            self.emit(GameEvent::sound(cue, Playback::Pause));
        }
        if self.player.action.is_firing() {
            self.emit(GameEvent::sound(SoundCue::CasterBeam, Playback::Stop));
        }

        let pos = self.player.body.pos;
        let grounded = self.player.body.grounded;
        let incarnation = self.player.incarnation + 1;
        self.player = Player::new(class, incarnation, pos);
        self.player.body.grounded = grounded;
    }

    /// Read-only view for presentation
    pub fn snapshot(&self) -> Snapshot {
        let p = &self.player;
        Snapshot {
            tick: self.time_ticks,
            time_ms: self.now_ms(),
            stage: self.stage,
            pause: self.pause,
            player: PlayerView {
                class: p.class,
                pose: p.pose(),
                hp: p.display_hp(),
                max_hp: p.max_hp,
                level: p.level,
                exp: p.exp,
                max_exp: p.max_exp,
                atk: p.atk(),
                def: p.def(),
                invincible: p.invincible > 0,
                equipped: p.equipped.clone(),
            },
            monsters: self
                .monsters
                .iter()
                .map(|m| MonsterView {
                    id: m.id,
                    kind: m.kind,
                    pos: m.body.pos,
                    size: m.body.size,
                    hp: m.display_hp(),
                    max_hp: m.max_hp,
                })
                .collect(),
            projectiles: self.projectiles.iter().map(|p| p.pos).collect(),
            pickups: self
                .pickups
                .iter()
                .map(|p| PickupView {
                    id: p.id,
                    name: p.item.name.clone(),
                    pos: p.aabb.min,
                })
                .collect(),
            portal: self.portal.map(|portal| PortalView {
                pos: portal.area.min,
                open: portal.open,
                ending: portal.destination == Destination::Ending,
            }),
            inventory: p.inventory.clone(),
            show_inventory: self.show_inventory,
            awaiting_class: self.awaiting_class,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub class: CharacterClass,
    pub pose: Pose,
    /// Clamped to [0, max_hp]
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    pub exp: u32,
    pub max_exp: u32,
    pub atk: i32,
    pub def: i32,
    pub invincible: bool,
    pub equipped: Equipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonsterView {
    pub id: u32,
    pub kind: MonsterKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupView {
    pub id: u32,
    pub name: String,
    pub pos: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortalView {
    pub pos: Vec2,
    pub open: bool,
    pub ending: bool,
}

/// Per-tick view handed to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time_ms: u64,
    pub stage: StageId,
    pub pause: Option<PauseReason>,
    pub player: PlayerView,
    pub monsters: Vec<MonsterView>,
    pub projectiles: Vec<Vec2>,
    pub pickups: Vec<PickupView>,
    pub portal: Option<PortalView>,
    pub inventory: Vec<Item>,
    pub show_inventory: bool,
    pub awaiting_class: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_starts_on_opening() {
        let state = GameState::new(1).unwrap();
        assert_eq!(state.stage, StageId::Opening);
        assert_eq!(state.stage_epoch, 1);
        assert_eq!(state.player.class, CharacterClass::Guard);
        assert!(state.monsters.is_empty());
        assert_eq!(state.portal.map(|p| p.open), Some(true));
        assert!(!state.is_paused());
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let tuning = Tuning {
            tick_ms: 0,
            ..Tuning::default()
        };
        assert!(matches!(
            GameState::with_config(1, tuning, Catalog::default()),
            Err(SimError::InvalidTuning(_))
        ));
    }

    #[test]
    fn test_missing_opening_layout_rejected() {
        let mut layouts = stage::builtin_layouts().unwrap();
        layouts.remove(&StageId::Opening);
        assert!(matches!(
            GameState::with_layouts(1, Tuning::default(), Catalog::default(), layouts),
            Err(SimError::MissingStage(StageId::Opening))
        ));
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let mut state = GameState::new(1).unwrap();
        let a = state.next_entity_id();
        let b = state.next_entity_id();
        assert!(b > a);
    }

    #[test]
    fn test_become_class_bumps_incarnation_in_place() {
        let mut state = GameState::new(1).unwrap();
        let pos = state.player.body.pos;
        state.become_class(CharacterClass::Marksman);
        assert_eq!(state.player.class, CharacterClass::Marksman);
        assert_eq!(state.player.incarnation, 1);
        assert_eq!(state.player.body.pos, pos);
    }

    #[test]
    fn test_become_class_silences_footsteps() {
        let mut state = GameState::new(1).unwrap();
        state.drain_events();
        state.player.action.footsteps = true;
        state.become_class(CharacterClass::Caster);
        let events = state.drain_events();
        assert_eq!(
            events,
            vec![GameEvent::sound(SoundCue::GuardFootsteps, Playback::Pause)]
        );
    }

    #[test]
    fn test_snapshot_roundtrips_through_json() {
        let state = GameState::new(1).unwrap();
        let snap = state.snapshot();
        assert_eq!(snap.player.hp, 100);
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_state_serializes_with_rng() {
        use rand::Rng;

        let mut state = GameState::new(9).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let mut restored: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(state.rng.random::<u32>(), restored.rng.random::<u32>());
    }
}
