//! Monster steering, boss ranged attacks and projectile flight

use glam::Vec2;

use super::events::{DamageTarget, GameEvent, Playback, SoundCue};
use super::monster::{Monster, Projectile};
use super::state::GameState;

/// Point a tracking monster at `target_x` at its walk speed
///
/// Inside the deadzone the current velocity is kept.
pub fn steer(monster: &mut Monster, target_x: f32, deadzone: f32) {
    if !monster.tracks_player || monster.is_boss() {
        return;
    }
    let dx = target_x - monster.body.pos.x;
    if dx.abs() > deadzone {
        monster.body.vel.x = monster.speed * dx.signum();
    }
}

/// Turn a patrolling monster around at its platform edges
pub fn enforce_patrol(monster: &mut Monster) {
    let Some((left, right)) = monster.patrol else {
        return;
    };
    let body = &mut monster.body;
    if body.pos.x < left {
        body.pos.x = left;
        body.vel.x = body.vel.x.abs();
    } else if body.pos.x > right - body.size.x {
        body.pos.x = right - body.size.x;
        body.vel.x = -body.vel.x.abs();
    }
}

/// Steering and physics for every monster
pub fn update_monsters(state: &mut GameState) {
    let target_x = state.player.body.pos.x;
    let (gravity, deadzone) = (state.tuning.gravity, state.tuning.chase_deadzone);
    for monster in &mut state.monsters {
        steer(monster, target_x, deadzone);
        monster.body.integrate(&state.world, gravity, 1.0);
        enforce_patrol(monster);
    }
}

/// Fire at the player from every boss whose cooldown has elapsed
pub fn boss_attacks(state: &mut GameState) {
    let now = state.now_ms();
    let tuning = &state.tuning;
    let (cooldown, speed, lifetime) = (
        tuning.boss_shot_cooldown_ms,
        tuning.projectile_speed,
        tuning.projectile_lifetime_ms,
    );
    let target = state.player.body.center();

    let mut shots = Vec::new();
    for monster in &mut state.monsters {
        let Some(boss) = &mut monster.boss else {
            continue;
        };
        if boss.last_shot_ms.is_some_and(|at| now - at < cooldown) {
            continue;
        }
        boss.last_shot_ms = Some(now);
        let origin = monster.body.center();
        let dir = (target - origin).try_normalize().unwrap_or(Vec2::X);
        shots.push((origin, dir * speed));
    }

    for (pos, vel) in shots {
        let id = state.next_entity_id();
        log::debug!("Boss projectile #{} fired", id);
        state.projectiles.push(Projectile {
            id,
            pos,
            vel,
            spawned_ms: now,
            expires_ms: now + lifetime,
        });
        state.emit(GameEvent::sound(SoundCue::BossProjectile, Playback::OneShot));
    }
}

/// Move projectiles; drop those that hit the player, expire or leave the world
pub fn update_projectiles(state: &mut GameState) {
    let now = state.now_ms();
    let (width, height) = (state.world.width(), state.world.height());
    let (damage, ticks) = (state.tuning.projectile_damage, state.tuning.invincibility_ticks);

    let player_box = state.player.body.aabb();
    let mut hits = 0;
    state.projectiles.retain_mut(|p| {
        p.pos += p.vel;
        if now >= p.expires_ms {
            return false;
        }
        if p.pos.x < 0.0 || p.pos.x > width || p.pos.y < 0.0 || p.pos.y > height {
            return false;
        }
        if player_box.contains_point(p.pos) {
            hits += 1;
            return false;
        }
        true
    });

    for _ in 0..hits {
        if let Some(amount) = state.player.take_damage(damage, ticks) {
            let pos = Vec2::new(state.player.body.center().x, state.player.body.pos.y);
            state.emit(GameEvent::Damage {
                target: DamageTarget::Player,
                pos,
                amount,
            });
        }
    }
}
