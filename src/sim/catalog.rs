//! Static monster and item tables
//!
//! The built-in tables ship with the game; a JSON catalog may replace either
//! table wholesale. Lookups for entries a replacement table forgot fall back
//! to a placeholder instead of failing.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;

/// RGB display color passed through to presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Consumable,
    Weapon,
    Armor,
}

/// Immutable item value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    /// Heal amount, attack bonus or defense bonus depending on kind
    pub value: i32,
    pub color: Color,
}

impl Item {
    pub fn new(name: &str, kind: ItemKind, value: i32, color: Color) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MonsterKind {
    Slime,
    Ghoul,
    Shade,
    /// Unkillable prologue enemy
    Dread,
    /// Stage 3 boss
    RiftLord,
}

impl MonsterKind {
    pub fn is_boss(self) -> bool {
        self == MonsterKind::RiftLord
    }
}

/// Per-kind monster stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterStats {
    pub size: Vec2,
    pub hp: i32,
    /// Horizontal speed per tick
    pub speed: f32,
    /// Contact damage before the player's defense
    pub atk: i32,
    pub exp: u32,
    pub color: Color,
}

impl MonsterStats {
    /// Plain box used when a kind is missing from a custom table
    pub fn placeholder() -> Self {
        Self {
            size: Vec2::new(40.0, 40.0),
            hp: 30,
            speed: 2.0,
            atk: 5,
            exp: 10,
            color: Color(128, 128, 128),
        }
    }
}

fn builtin_monsters() -> BTreeMap<MonsterKind, MonsterStats> {
    let stats = |w: f32, h: f32, hp, speed, atk, exp, color| MonsterStats {
        size: Vec2::new(w, h),
        hp,
        speed,
        atk,
        exp,
        color,
    };
    BTreeMap::from([
        (MonsterKind::Slime, stats(60.0, 78.0, 30, 2.0, 8, 20, Color(76, 175, 80))),
        (MonsterKind::Ghoul, stats(60.0, 78.0, 50, 2.5, 12, 30, Color(121, 85, 72))),
        (MonsterKind::Shade, stats(60.0, 73.0, 60, 3.0, 14, 35, Color(103, 58, 183))),
        (MonsterKind::Dread, stats(60.0, 94.0, 80, 3.0, 30, 0, Color(33, 33, 33))),
        (MonsterKind::RiftLord, stats(200.0, 150.0, 1000, 1.5, 35, 300, Color(183, 28, 28))),
    ])
}

fn builtin_items() -> Vec<Item> {
    vec![
        Item::new("Healing Potion", ItemKind::Consumable, 30, Color(244, 67, 54)),
        Item::new("Steel Sword", ItemKind::Weapon, 10, Color(0, 188, 212)),
        Item::new("Old Sword", ItemKind::Weapon, 5, Color(192, 192, 192)),
        Item::new("Wooden Shield", ItemKind::Armor, 3, Color(121, 85, 72)),
    ]
}

/// Monster and item tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub monsters: BTreeMap<MonsterKind, MonsterStats>,
    pub items: Vec<Item>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            monsters: builtin_monsters(),
            items: builtin_items(),
        }
    }
}

impl Catalog {
    /// Parse a catalog; a table present in the JSON replaces the built-in one
    pub fn from_json(json: &str) -> SimResult<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        if catalog.items.is_empty() {
            log::warn!("Item table is empty; kills will never drop loot");
        }
        Ok(catalog)
    }

    /// Stats for `kind`, or a placeholder if the table lacks it
    pub fn monster(&self, kind: MonsterKind) -> MonsterStats {
        match self.monsters.get(&kind) {
            Some(stats) => stats.clone(),
            None => {
                log::warn!("No stats for {:?}; using placeholder", kind);
                MonsterStats::placeholder()
            }
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}
