//! Axis-aligned bodies and tile collision
//!
//! Bodies move one axis at a time: X first, then Y. Horizontal contact with a
//! solid tile either reflects or stops horizontal velocity depending on the
//! body's wall policy; vertical contact always stops vertical velocity.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::tile::TileWorld;

/// Shaved off trailing edges so a body flush with a tile boundary does not
/// sample the next tile over
pub const EDGE_EPSILON: f32 = 0.1;

/// Closed axis-aligned box in world space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            min: Vec2::new(left, top),
            max: Vec2::new(right, bottom),
        }
    }

    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Square box of half-extent `radius` around `center`
    pub fn around(center: Vec2, radius: f32) -> Self {
        Self {
            min: center - Vec2::splat(radius),
            max: center + Vec2::splat(radius),
        }
    }

    /// Overlap on closed intervals: touching edges count
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// What happens to horizontal velocity on wall contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WallPolicy {
    /// Reflect dx (patrolling monsters turn around)
    #[default]
    Bounce,
    /// Zero dx
    Stop,
}

/// Position, size and velocity of anything that collides with tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    /// Units per tick
    pub vel: Vec2,
    pub grounded: bool,
    pub wall: WallPolicy,
}

impl Body {
    pub fn new(pos: Vec2, size: Vec2, wall: WallPolicy) -> Self {
        Self {
            pos,
            size,
            vel: Vec2::ZERO,
            grounded: false,
            wall,
        }
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.pos.x + self.size.x
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y + self.size.y
    }

    /// Apply gravity, then move and resolve X, then move and resolve Y
    pub fn integrate(&mut self, world: &TileWorld, gravity: f32, gravity_factor: f32) {
        self.vel.y += gravity * gravity_factor;
        self.pos.x += self.vel.x;
        self.resolve_x(world);
        self.pos.y += self.vel.y;
        self.resolve_y(world);
    }

    /// Column span (left, right) at the current x
    fn columns(&self, world: &TileWorld, x: f32) -> (i32, i32) {
        (
            world.index_of(x),
            world.index_of(x + self.size.x - EDGE_EPSILON),
        )
    }

    /// Row span (top, bottom) at the current y
    fn rows(&self, world: &TileWorld) -> (i32, i32) {
        (
            world.index_of(self.pos.y),
            world.index_of(self.pos.y + self.size.y - EDGE_EPSILON),
        )
    }

    pub fn resolve_x(&mut self, world: &TileWorld) {
        self.pos.x = world.clamp_x(self.pos.x, self.size.x);

        let ts = world.tile_size;
        let (left, right) = self.columns(world, self.pos.x);
        let (top, bottom) = self.rows(world);

        if self.vel.x > 0.0 {
            if world.is_solid(top, right) || world.is_solid(bottom, right) {
                self.pos.x = right as f32 * ts - self.size.x - EDGE_EPSILON;
                self.on_wall_contact();
            }
        } else if self.vel.x < 0.0 && (world.is_solid(top, left) || world.is_solid(bottom, left)) {
            self.pos.x = (left + 1) as f32 * ts + EDGE_EPSILON;
            self.on_wall_contact();
        }
    }

    pub fn resolve_y(&mut self, world: &TileWorld) {
        self.pos.x = world.clamp_x(self.pos.x, self.size.x);

        let ts = world.tile_size;
        let (left, right) = self.columns(world, self.pos.x);

        if self.vel.y >= 0.0 {
            // Row containing the bottom edge; for a body flush on a tile top
            // this is the tile directly underneath
            let below = world.index_of(self.bottom());
            if world.is_solid(below, left) || world.is_solid(below, right) {
                self.pos.y = below as f32 * ts - self.size.y;
                self.vel.y = 0.0;
                self.grounded = true;
                return;
            }
        } else {
            let top = world.index_of(self.pos.y);
            if world.is_solid(top, left) || world.is_solid(top, right) {
                self.pos.y = (top + 1) as f32 * ts;
                self.vel.y = 0.0;
            }
        }
        self.grounded = false;
    }

    fn on_wall_contact(&mut self) {
        match self.wall {
            WallPolicy::Bounce => self.vel.x = -self.vel.x,
            WallPolicy::Stop => self.vel.x = 0.0,
        }
    }

    /// Slide horizontally in quarter-tile steps, stopping before a wall or at
    /// the world edge; returns the x the body would end at
    pub fn sweep_horizontal(&self, world: &TileWorld, direction: f32, distance: f32) -> f32 {
        let step = world.tile_size / 4.0;
        let sign = direction.signum();
        let max_x = (world.width() - self.size.x).max(0.0);
        let (top, bottom) = self.rows(world);

        let mut remaining = distance.abs();
        let mut x = self.pos.x;
        while remaining > 0.0 {
            let next_x = (x + remaining.min(step) * sign).clamp(0.0, max_x);
            let (left, right) = self.columns(world, next_x);
            let probe = if sign > 0.0 { right } else { left };
            if world.is_solid(top, probe) || world.is_solid(bottom, probe) {
                break;
            }
            x = next_x;
            remaining -= step;
            if next_x == 0.0 || next_x == max_x {
                break;
            }
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tile::TileGrid;
    use proptest::prelude::*;

    const TS: f32 = 40.0;

    /// 10x10 room: floor on row 9, a wall in column 5 (rows 5-8), a ceiling
    /// block at (2, 1)
    fn room() -> TileWorld {
        let mut codes = vec![vec![0u8; 10]; 10];
        codes[9] = vec![1; 10];
        for row in codes.iter_mut().take(9).skip(5) {
            row[5] = 1;
        }
        codes[2][1] = 1;
        TileWorld::new(TileGrid::from_codes(&codes).unwrap(), TS)
    }

    #[test]
    fn test_falls_and_lands_on_floor() {
        let world = room();
        let mut body = Body::new(Vec2::new(120.0, 100.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        for _ in 0..100 {
            body.integrate(&world, 0.8, 1.0);
        }
        assert!(body.grounded);
        assert_eq!(body.vel.y, 0.0);
        assert!((body.bottom() - 360.0).abs() < 1e-4);
    }

    #[test]
    fn test_resting_body_stays_grounded() {
        let world = room();
        let mut body = Body::new(Vec2::new(40.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        body.integrate(&world, 0.8, 1.0);
        assert!(body.grounded);
        // Zero gravity (dash) keeps a flush body grounded too
        body.integrate(&world, 0.8, 0.0);
        assert!(body.grounded);
        assert!((body.pos.y - 310.0).abs() < 1e-4);
    }

    #[test]
    fn test_airborne_is_not_grounded() {
        let world = room();
        let mut body = Body::new(Vec2::new(120.0, 100.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        body.grounded = true;
        body.integrate(&world, 0.8, 1.0);
        assert!(!body.grounded);
    }

    #[test]
    fn test_wall_bounce_reverses_velocity() {
        let world = room();
        let mut body = Body::new(Vec2::new(160.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        body.vel.x = 20.0;
        body.integrate(&world, 0.8, 1.0);
        assert_eq!(body.vel.x, -20.0);
        assert!((body.right() - (200.0 - EDGE_EPSILON)).abs() < 1e-4);
    }

    #[test]
    fn test_wall_stop_zeroes_velocity() {
        let world = room();
        let mut body = Body::new(Vec2::new(250.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Stop);
        body.vel.x = -20.0;
        body.integrate(&world, 0.8, 1.0);
        assert_eq!(body.vel.x, 0.0);
        assert!((body.pos.x - (240.0 + EDGE_EPSILON)).abs() < 1e-4);
    }

    #[test]
    fn test_head_bump_zeroes_upward_velocity() {
        let world = room();
        // Column 1, just below the ceiling block on row 2 (bottom at y=120)
        let mut body = Body::new(Vec2::new(45.0, 125.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        body.vel.y = -15.0;
        body.integrate(&world, 0.8, 1.0);
        assert_eq!(body.vel.y, 0.0);
        assert_eq!(body.pos.y, 120.0);
        assert!(!body.grounded);
    }

    #[test]
    fn test_world_edge_is_solid() {
        let world = room();
        let mut body = Body::new(Vec2::new(2.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
        body.vel.x = -10.0;
        body.integrate(&world, 0.8, 1.0);
        assert!(body.pos.x >= 0.0);
    }

    #[test]
    fn test_sweep_stops_before_wall() {
        let world = room();
        let body = Body::new(Vec2::new(40.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Stop);
        let end = body.sweep_horizontal(&world, 1.0, 400.0);
        // Wall starts at x=200; the right edge may not enter it
        assert!(end + 30.0 <= 200.0);
        assert!(end > 40.0);
    }

    #[test]
    fn test_sweep_stops_at_world_edge() {
        let world = room();
        let body = Body::new(Vec2::new(30.0, 310.0), Vec2::new(30.0, 50.0), WallPolicy::Stop);
        let end = body.sweep_horizontal(&world, -1.0, 200.0);
        assert_eq!(end, 0.0);
    }

    #[test]
    fn test_aabb_touching_edges_overlap() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb::new(10.0, 0.0, 20.0, 10.0);
        let c = Aabb::new(10.1, 0.0, 20.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.union(&c).contains_point(Vec2::new(15.0, 5.0)));
    }

    proptest! {
        #[test]
        fn prop_integrate_keeps_body_in_horizontal_bounds(
            x in -500.0f32..1000.0,
            y in 0.0f32..300.0,
            vx in -60.0f32..60.0,
            vy in -20.0f32..20.0,
            factor in prop_oneof![Just(0.0f32), Just(0.2f32), Just(1.0f32)],
            stop in any::<bool>(),
        ) {
            let world = room();
            let wall = if stop { WallPolicy::Stop } else { WallPolicy::Bounce };
            let mut body = Body::new(Vec2::new(x, y), Vec2::new(30.0, 50.0), wall);
            body.vel = Vec2::new(vx, vy);
            body.integrate(&world, 0.8, factor);
            prop_assert!(body.pos.x >= 0.0);
            prop_assert!(body.pos.x <= world.width() - body.size.x);
        }

        #[test]
        fn prop_grounded_iff_solid_below(
            x in 0.0f32..370.0,
            y in 0.0f32..300.0,
            vy in 0.0f32..20.0,
        ) {
            let world = room();
            let mut body = Body::new(Vec2::new(x, y), Vec2::new(30.0, 50.0), WallPolicy::Bounce);
            body.vel.y = vy;
            body.integrate(&world, 0.8, 1.0);
            let below = world.index_of(body.bottom());
            let (left, right) = (
                world.index_of(body.pos.x),
                world.index_of(body.right() - EDGE_EPSILON),
            );
            let solid_below = world.is_solid(below, left) || world.is_solid(below, right);
            prop_assert_eq!(body.grounded, solid_below);
        }
    }
}
