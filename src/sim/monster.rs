//! Monsters, boss projectiles and dropped items

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Aabb, Body, WallPolicy};
use super::catalog::{Item, MonsterKind, MonsterStats};

/// Ranged-attack timer carried only by bosses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BossState {
    /// `None` until the first shot, so the first one fires immediately
    pub last_shot_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: u32,
    pub kind: MonsterKind,
    pub body: Body,
    pub hp: i32,
    pub max_hp: i32,
    /// Contact damage
    pub atk: i32,
    pub exp: u32,
    pub speed: f32,
    /// World-space (left, right) limits of a platform patrol
    pub patrol: Option<(f32, f32)>,
    pub tracks_player: bool,
    pub boss: Option<BossState>,
}

impl Monster {
    pub fn new(id: u32, kind: MonsterKind, stats: &MonsterStats, pos: Vec2) -> Self {
        Self {
            id,
            kind,
            body: Body::new(pos, stats.size, WallPolicy::Bounce),
            hp: stats.hp,
            max_hp: stats.hp,
            atk: stats.atk,
            exp: stats.exp,
            speed: stats.speed,
            patrol: None,
            tracks_player: false,
            boss: kind.is_boss().then(BossState::default),
        }
    }

    /// Walk back and forth between `left` and `right`
    pub fn with_patrol(mut self, left: f32, right: f32) -> Self {
        self.patrol = Some((left, right));
        self.body.vel.x = self.speed;
        self
    }

    /// Walk in `dir` (sign) until a wall turns it around
    pub fn wandering(mut self, dir: f32) -> Self {
        self.body.vel.x = self.speed * dir.signum();
        self
    }

    pub fn tracking(mut self) -> Self {
        self.tracks_player = true;
        self
    }

    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp;
        self.max_hp = hp;
        self
    }

    #[inline]
    pub fn is_boss(&self) -> bool {
        self.boss.is_some()
    }

    pub fn display_hp(&self) -> i32 {
        self.hp.clamp(0, self.max_hp)
    }
}

/// Boss shot travelling in a straight line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub pos: Vec2,
    /// Units per boss update
    pub vel: Vec2,
    pub spawned_ms: u64,
    pub expires_ms: u64,
}

/// Edge length of a dropped item's box
pub const PICKUP_SIZE: f32 = 30.0;

/// Item lying in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: u32,
    pub item: Item,
    pub aabb: Aabb,
}

impl Pickup {
    /// Drop at the bottom-left of a dead monster's box
    pub fn at_feet_of(id: u32, item: Item, body: &Body) -> Self {
        let pos = Vec2::new(body.pos.x, body.bottom() - PICKUP_SIZE);
        Self {
            id,
            item,
            aabb: Aabb::from_pos_size(pos, Vec2::splat(PICKUP_SIZE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::Catalog;

    #[test]
    fn test_spawn_from_stats() {
        let catalog = Catalog::default();
        let stats = catalog.monster(MonsterKind::Ghoul);
        let m = Monster::new(4, MonsterKind::Ghoul, &stats, Vec2::new(10.0, 20.0))
            .with_patrol(0.0, 200.0);
        assert_eq!(m.hp, 50);
        assert_eq!(m.body.size, Vec2::new(60.0, 78.0));
        assert_eq!(m.body.vel.x, 2.5);
        assert_eq!(m.body.wall, WallPolicy::Bounce);
        assert!(!m.is_boss());
    }

    #[test]
    fn test_boss_has_ranged_state() {
        let catalog = Catalog::default();
        let stats = catalog.monster(MonsterKind::RiftLord);
        let m = Monster::new(1, MonsterKind::RiftLord, &stats, Vec2::ZERO);
        assert_eq!(m.boss, Some(BossState { last_shot_ms: None }));
    }

    #[test]
    fn test_overrides_and_display_hp() {
        let catalog = Catalog::default();
        let stats = catalog.monster(MonsterKind::Dread);
        let mut m = Monster::new(1, MonsterKind::Dread, &stats, Vec2::ZERO)
            .with_hp(9999)
            .tracking();
        assert_eq!(m.max_hp, 9999);
        assert!(m.tracks_player);
        m.hp = -3;
        assert_eq!(m.display_hp(), 0);
    }

    #[test]
    fn test_pickup_sits_at_feet() {
        let catalog = Catalog::default();
        let body = Body::new(Vec2::new(50.0, 100.0), Vec2::new(60.0, 78.0), WallPolicy::Bounce);
        let pickup = Pickup::at_feet_of(9, catalog.items()[0].clone(), &body);
        assert_eq!(pickup.aabb.min, Vec2::new(50.0, 148.0));
        assert_eq!(pickup.aabb.max, Vec2::new(80.0, 178.0));
    }
}
