//! Player character: class profile, stats, inventory and pose

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::action::{ActionState, AnimSpec, AttackStyle, Busy, ClassProfile, Facing, PoseAction};
use super::body::{Body, WallPolicy};
use super::catalog::{Item, ItemKind};
use super::combat::apply_damage;
use super::events::SoundCue;
use super::schedule::ActivationKey;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterClass {
    /// Starting class before the sanctuary
    Guard,
    Engineer,
    Caster,
    Marksman,
}

impl CharacterClass {
    /// Classes offered by the sanctuary choice
    pub const CHOICES: [CharacterClass; 3] = [
        CharacterClass::Caster,
        CharacterClass::Engineer,
        CharacterClass::Marksman,
    ];

    pub fn profile(self) -> ClassProfile {
        match self {
            CharacterClass::Guard => ClassProfile {
                size: Vec2::new(45.0, 96.0),
                base_atk: 10,
                attack: AttackStyle::Melee {
                    range: 30.0,
                    anim: AnimSpec::new(4, 7),
                    knockback: true,
                },
                dash: false,
                cast: None,
                skill: None,
                float: false,
                rooted_while_busy: false,
                attack_cue: SoundCue::GuardAttack,
                footstep_cue: Some(SoundCue::GuardFootsteps),
            },
            CharacterClass::Engineer => ClassProfile {
                size: Vec2::new(50.0, 96.0),
                base_atk: 15,
                attack: AttackStyle::Melee {
                    range: 50.0,
                    anim: AnimSpec::new(2, 6),
                    knockback: true,
                },
                dash: true,
                cast: None,
                skill: None,
                float: false,
                rooted_while_busy: false,
                attack_cue: SoundCue::EngineerAttack,
                footstep_cue: None,
            },
            CharacterClass::Caster => ClassProfile {
                size: Vec2::new(50.0, 96.0),
                base_atk: 12,
                attack: AttackStyle::Melee {
                    range: 40.0,
                    anim: AnimSpec::new(4, 7),
                    knockback: false,
                },
                dash: false,
                cast: Some(AnimSpec::new(3, 6)),
                skill: None,
                float: true,
                rooted_while_busy: false,
                attack_cue: SoundCue::CasterAttack,
                footstep_cue: None,
            },
            CharacterClass::Marksman => ClassProfile {
                size: Vec2::new(45.0, 92.0),
                base_atk: 14,
                attack: AttackStyle::Combo,
                dash: false,
                cast: None,
                skill: Some(AnimSpec::new(5, 7)),
                float: false,
                rooted_while_busy: true,
                attack_cue: SoundCue::MarksmanAttack,
                footstep_cue: None,
            },
        }
    }
}

/// Stat offered by the level-up popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatChoice {
    Atk,
    Def,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipped {
    pub weapon: Option<Item>,
    pub armor: Option<Item>,
}

/// Which point of the sprite `Pose::point` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Bottom centre
    S,
    /// Bottom left
    SW,
    /// Bottom right
    SE,
}

/// Everything presentation needs to draw the player this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub point: Vec2,
    pub anchor: Anchor,
    pub action: PoseAction,
    pub frame: u32,
    pub facing: Facing,
}

/// Result of using an inventory slot
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUse {
    Healed(i32),
    Equipped(Item),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Bumped on every re-creation so stale deferred events no-op
    pub incarnation: u32,
    pub class: CharacterClass,
    pub profile: ClassProfile,
    pub body: Body,
    pub level: u32,
    pub exp: u32,
    pub max_exp: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub base_atk: i32,
    pub equip_atk: i32,
    pub base_def: i32,
    pub equip_def: i32,
    pub inventory: Vec<Item>,
    pub equipped: Equipped,
    /// Ticks of damage immunity left
    pub invincible: u32,
    pub action: ActionState,
}

impl Player {
    pub fn new(class: CharacterClass, incarnation: u32, pos: Vec2) -> Self {
        let profile = class.profile();
        Self {
            incarnation,
            class,
            profile,
            body: Body::new(pos, profile.size, WallPolicy::Stop),
            level: 1,
            exp: 0,
            max_exp: 100,
            hp: 100,
            max_hp: 100,
            base_atk: profile.base_atk,
            equip_atk: 0,
            base_def: 0,
            equip_def: 0,
            inventory: Vec::new(),
            equipped: Equipped::default(),
            invincible: 0,
            action: ActionState::default(),
        }
    }

    #[inline]
    pub fn atk(&self) -> i32 {
        self.base_atk + self.equip_atk
    }

    #[inline]
    pub fn def(&self) -> i32 {
        self.base_def + self.equip_def
    }

    /// HP clamped for display; the raw value may go negative
    pub fn display_hp(&self) -> i32 {
        self.hp.clamp(0, self.max_hp)
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Key of the current busy activation
    pub fn key(&self) -> ActivationKey {
        ActivationKey {
            incarnation: self.incarnation,
            activation: self.action.activation,
        }
    }

    /// Apply a hit; returns the damage dealt, or `None` while invincible
    pub fn take_damage(&mut self, raw: i32, invincibility_ticks: u32) -> Option<i32> {
        if self.invincible > 0 {
            return None;
        }
        let dealt = apply_damage(raw, self.def());
        self.hp -= dealt;
        self.invincible = invincibility_ticks;
        Some(dealt)
    }

    pub fn restore(&mut self) {
        self.hp = self.max_hp;
        self.invincible = 0;
    }

    /// Add experience; returns true if this levelled up
    pub fn gain_exp(&mut self, exp: u32, growth: f32) -> bool {
        self.exp += exp;
        if self.exp < self.max_exp {
            return false;
        }
        self.level += 1;
        self.exp = 0;
        self.max_exp = (self.max_exp as f32 * growth).floor() as u32;
        true
    }

    /// Apply a level-up stat choice and refill hp
    pub fn choose_stat(&mut self, choice: StatChoice, tuning: &Tuning) {
        match choice {
            StatChoice::Atk => self.base_atk += tuning.level_up_atk,
            StatChoice::Def => self.base_def += tuning.level_up_def,
        }
        self.hp = self.max_hp;
    }

    /// Use or equip the item in `slot`
    ///
    /// Consumables are removed after use; equipment stays in the inventory.
    pub fn use_item(&mut self, slot: usize) -> Option<ItemUse> {
        let item = self.inventory.get(slot)?.clone();
        match item.kind {
            ItemKind::Consumable => {
                let before = self.hp;
                self.hp = (self.hp + item.value).min(self.max_hp);
                self.inventory.remove(slot);
                Some(ItemUse::Healed(self.hp - before))
            }
            ItemKind::Weapon => {
                self.equip_atk = item.value;
                self.equipped.weapon = Some(item.clone());
                Some(ItemUse::Equipped(item))
            }
            ItemKind::Armor => {
                self.equip_def = item.value;
                self.equipped.armor = Some(item.clone());
                Some(ItemUse::Equipped(item))
            }
        }
    }

    pub fn pose(&self) -> Pose {
        let body = &self.body;
        let facing = self.action.facing;
        let (point, anchor) = match &self.action.busy {
            Some(Busy::Dashing { from_x }) => {
                let mid = (from_x + body.pos.x) * 0.5 + body.size.x * 0.5;
                (Vec2::new(mid, body.bottom()), Anchor::S)
            }
            Some(Busy::Casting | Busy::Firing { .. } | Busy::Skilling { .. }) => {
                // Wide sprites grow from the body centre towards the target
                let point = Vec2::new(body.center().x, body.bottom());
                match facing {
                    Facing::Right => (point, Anchor::SW),
                    Facing::Left => (point, Anchor::SE),
                }
            }
            _ => (Vec2::new(body.center().x, body.bottom()), Anchor::S),
        };
        Pose {
            point,
            anchor,
            action: self.action.anim.action,
            frame: self.action.anim.frame,
            facing,
        }
    }
}
