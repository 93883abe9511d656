//! Events emitted to presentation and audio
//!
//! The simulation never draws, plays sounds or shows text itself. It pushes
//! these events and the host drains them after each tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::catalog::{Item, MonsterKind};
use super::player::CharacterClass;
use super::stage::StageId;

/// Named audio cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundCue {
    GuardAttack,
    GuardFootsteps,
    EngineerAttack,
    EngineerDash,
    CasterAttack,
    CasterBeam,
    MarksmanAttack,
    MarksmanSkill,
    BossProjectile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Playback {
    OneShot,
    Loop,
    Pause,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageTarget {
    Player,
    Monster(u32),
}

/// Short status messages for the log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notice {
    PortalOpened,
    BossDefeated,
    /// Prologue horde appeared
    Overwhelmed,
    /// Not every requested monster found a free tile
    SpawnShortfall,
    ClassChanged(CharacterClass),
    /// Player fell on a restartable stage
    Downed,
    GameOver,
    ChestOpened,
    Ending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Floating damage number
    Damage {
        target: DamageTarget,
        pos: Vec2,
        amount: i32,
    },
    Sound {
        cue: SoundCue,
        playback: Playback,
    },
    StageEntered(StageId),
    MonsterKilled {
        id: u32,
        kind: MonsterKind,
        exp: u32,
    },
    ItemDropped {
        pickup_id: u32,
        item: Item,
        pos: Vec2,
    },
    ItemAcquired(Item),
    InventoryChanged,
    InventoryToggled {
        open: bool,
    },
    /// Ask the UI to show the stat-choice popup
    LevelUpPopup {
        level: u32,
    },
    /// Ask the UI to show the three-way class choice
    ClassChoicePopup,
    Notice(Notice),
}

impl GameEvent {
    pub fn sound(cue: SoundCue, playback: Playback) -> Self {
        GameEvent::Sound { cue, playback }
    }
}
