//! Hit detection, damage and kill handling
//!
//! Attacks are boxes projected in front of the player. Single-target attacks
//! hit the overlapped monster nearest to the player's leading edge; area
//! attacks hit everything they overlap. A kill removes the monster in the
//! same tick, grants its exp and may drop loot.

use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;

use super::action::{AttackStyle, Busy, Facing};
use super::body::{Aabb, Body};
use super::events::{DamageTarget, GameEvent, Notice};
use super::monster::{Monster, Pickup};
use super::stage;
use super::state::{GameState, PauseReason};

/// Damage after defense; every hit deals at least 1
#[inline]
pub fn apply_damage(raw: i32, def: i32) -> i32 {
    (raw - def).max(1)
}

/// `atk * multiplier`, rounded, at least 1
#[inline]
pub fn scaled(atk: i32, multiplier: f32) -> i32 {
    ((atk as f32 * multiplier).round() as i32).max(1)
}

/// Box of length `range` extending from the body's leading edge
pub fn attack_box(body: &Body, facing: Facing, range: f32) -> Aabb {
    match facing {
        Facing::Right => Aabb::new(body.right(), body.pos.y, body.right() + range, body.bottom()),
        Facing::Left => Aabb::new(body.pos.x - range, body.pos.y, body.pos.x, body.bottom()),
    }
}

/// Gap between the attacker's leading edge and the target's near edge
pub fn directional_distance(attacker: &Body, facing: Facing, target: &Aabb) -> f32 {
    match facing {
        Facing::Right => (target.min.x - attacker.right()).max(0.0),
        Facing::Left => (attacker.pos.x - target.max.x).max(0.0),
    }
}

/// Index of the overlapped monster closest in the facing direction;
/// the first one seen wins ties
pub fn pick_nearest(
    attacker: &Body,
    facing: Facing,
    hitbox: &Aabb,
    monsters: &[Monster],
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, monster) in monsters.iter().enumerate() {
        let target = monster.body.aabb();
        if !hitbox.overlaps(&target) {
            continue;
        }
        let distance = directional_distance(attacker, facing, &target);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

fn overlapped_ids(monsters: &[Monster], area: &Aabb) -> Vec<u32> {
    monsters
        .iter()
        .filter(|m| area.overlaps(&m.body.aabb()))
        .map(|m| m.id)
        .collect()
}

/// Deal `amount` to monster `id`; returns true if it died
pub fn damage_monster(state: &mut GameState, id: u32, amount: i32) -> bool {
    let Some(idx) = state.monsters.iter().position(|m| m.id == id) else {
        return false;
    };
    let monster = &mut state.monsters[idx];
    monster.hp -= amount;
    let dead = monster.hp <= 0;
    let pos = Vec2::new(monster.body.center().x, monster.body.pos.y);
    state.emit(GameEvent::Damage {
        target: DamageTarget::Monster(id),
        pos,
        amount,
    });
    if dead {
        kill_monster(state, idx);
    }
    dead
}

fn strike_all(state: &mut GameState, area: &Aabb, amount: i32) {
    for id in overlapped_ids(&state.monsters, area) {
        damage_monster(state, id, amount);
    }
}

/// Remove a dead monster, grant exp and roll for loot
pub fn kill_monster(state: &mut GameState, idx: usize) {
    let monster = state.monsters.remove(idx);
    log::debug!("{:?} #{} killed", monster.kind, monster.id);
    state.emit(GameEvent::MonsterKilled {
        id: monster.id,
        kind: monster.kind,
        exp: monster.exp,
    });

    if monster.is_boss() {
        state.projectiles.clear();
        state.emit(GameEvent::Notice(Notice::BossDefeated));
    }

    let growth = state.tuning.exp_growth;
    if state.player.gain_exp(monster.exp, growth) {
        let level = state.player.level;
        log::info!("Level up to {}", level);
        state.pause = Some(PauseReason::LevelUp);
        state.emit(GameEvent::LevelUpPopup { level });
    }

    roll_drop(state, &monster);
}

fn roll_drop(state: &mut GameState, monster: &Monster) {
    if state.rng.random::<f64>() >= state.tuning.drop_chance {
        return;
    }
    let Some(item) = state.catalog.items.choose(&mut state.rng).cloned() else {
        return;
    };
    let id = state.next_entity_id();
    let pickup = Pickup::at_feet_of(id, item.clone(), &monster.body);
    state.emit(GameEvent::ItemDropped {
        pickup_id: id,
        item,
        pos: pickup.aabb.min,
    });
    state.pickups.push(pickup);
}

/// Contact damage from every overlapping monster
pub fn resolve_contacts(state: &mut GameState) {
    if state.player.action.is_dashing() {
        return;
    }
    let player_box = state.player.body.aabb();
    let hits: Vec<i32> = state
        .monsters
        .iter()
        .filter(|m| player_box.overlaps(&m.body.aabb()))
        .map(|m| m.atk)
        .collect();

    let ticks = state.tuning.invincibility_ticks;
    for atk in hits {
        if let Some(amount) = state.player.take_damage(atk, ticks) {
            let pos = Vec2::new(state.player.body.center().x, state.player.body.pos.y);
            state.emit(GameEvent::Damage {
                target: DamageTarget::Player,
                pos,
                amount,
            });
        }
    }
}

/// Single-target hit of the current attack, once per activation
pub fn resolve_attack(state: &mut GameState) {
    let action = &state.player.action;
    if !action.is_attacking() {
        return;
    }
    let facing = action.facing;
    let (range, knockback) = match state.player.profile.attack {
        AttackStyle::Melee { range, knockback, .. } => (range, knockback),
        AttackStyle::Combo => (state.tuning.marksman_range, false),
    };
    let hitbox = attack_box(&state.player.body, facing, range);
    stage::strike_chest(state, &hitbox);

    if state.player.action.hit_consumed {
        return;
    }
    let Some(idx) = pick_nearest(&state.player.body, facing, &hitbox, &state.monsters) else {
        return;
    };
    state.player.action.hit_consumed = true;

    if knockback {
        let away = state.monsters[idx].body.pos.x - state.player.body.pos.x;
        let sign = if away < 0.0 { -1.0 } else { 1.0 };
        let push = state.tuning.knockback * sign;
        let body = &mut state.monsters[idx].body;
        body.pos.x = state.world.clamp_x(body.pos.x + push, body.size.x);
    }
    let id = state.monsters[idx].id;
    let amount = state.player.atk();
    damage_monster(state, id, amount);
}

/// Skill hits every monster in range once per activation
pub fn resolve_skill(state: &mut GameState) {
    let player = &state.player;
    if !player.action.is_skilling() {
        return;
    }
    let hitbox = attack_box(&player.body, player.action.facing, state.tuning.marksman_range);
    stage::strike_chest(state, &hitbox);

    let Some(Busy::Skilling { hits, .. }) = &state.player.action.busy else {
        return;
    };
    let targets: Vec<u32> = overlapped_ids(&state.monsters, &hitbox)
        .into_iter()
        .filter(|id| !hits.contains(id))
        .collect();
    if targets.is_empty() {
        return;
    }
    if let Some(Busy::Skilling { hits, .. }) = &mut state.player.action.busy {
        hits.extend(targets.iter().copied());
    }

    let amount = scaled(state.player.atk(), state.tuning.skill_multiplier);
    for id in targets {
        damage_monster(state, id, amount);
    }
}

/// One beam pulse: everything in the beam's reach
pub fn beam_pulse(state: &mut GameState) {
    let player = &state.player;
    let hitbox = attack_box(&player.body, player.action.facing, state.tuning.beam_range);
    let amount = scaled(player.atk(), state.tuning.beam_multiplier);
    strike_all(state, &hitbox, amount);
}

/// Float pulse: everything within the radius of the player's centre
pub fn float_pulse(state: &mut GameState) {
    let player = &state.player;
    let area = Aabb::around(player.body.center(), state.tuning.float_radius);
    let amount = scaled(player.atk(), state.tuning.float_multiplier);
    strike_all(state, &area, amount);
}

/// Dash damage over the swept rectangle from `from_x` to the current x
pub fn dash_strike(state: &mut GameState, from_x: f32) {
    let body = &state.player.body;
    let start = Aabb::from_pos_size(Vec2::new(from_x, body.pos.y), body.size);
    let swept = start.union(&body.aabb());
    let amount = scaled(state.player.atk(), state.tuning.dash_multiplier);
    strike_all(state, &swept, amount);
}

/// Move overlapped pickups into the inventory
pub fn collect_pickups(state: &mut GameState) {
    let player_box = state.player.body.aabb();
    let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pickups)
        .into_iter()
        .partition(|p| player_box.overlaps(&p.aabb));
    state.pickups = kept;

    if taken.is_empty() {
        return;
    }
    for pickup in taken {
        log::debug!("Picked up {}", pickup.item.name);
        state.player.inventory.push(pickup.item.clone());
        state.emit(GameEvent::ItemAcquired(pickup.item));
    }
    state.emit(GameEvent::InventoryChanged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::body::WallPolicy;
    use crate::sim::catalog::MonsterKind;
    use crate::sim::player::CharacterClass;
    use proptest::prelude::*;

    fn body_at(x: f32) -> Body {
        Body::new(Vec2::new(x, 504.0), Vec2::new(45.0, 96.0), WallPolicy::Stop)
    }

    /// Opening stage with the player at x=100, facing right, no monsters
    fn arena(class: CharacterClass) -> GameState {
        let mut state = GameState::new(11).unwrap();
        state.become_class(class);
        state.monsters.clear();
        state
    }

    fn spawn(state: &mut GameState, kind: MonsterKind, x: f32) -> u32 {
        let stats = state.catalog.monster(kind);
        let y = state.player.body.bottom() - stats.size.y;
        let id = state.next_entity_id();
        state
            .monsters
            .push(Monster::new(id, kind, &stats, Vec2::new(x, y)));
        id
    }

    #[test]
    fn test_apply_damage() {
        assert_eq!(apply_damage(10, 3), 7);
        assert_eq!(apply_damage(1, 5), 1);
    }

    #[test]
    fn test_scaled_rounds_with_floor_of_one() {
        assert_eq!(scaled(15, 1.5), 23);
        assert_eq!(scaled(12, 0.7), 8);
        assert_eq!(scaled(1, 0.2), 1);
    }

    #[test]
    fn test_attack_box_faces() {
        let body = body_at(100.0);
        let right = attack_box(&body, Facing::Right, 30.0);
        assert_eq!((right.min.x, right.max.x), (145.0, 175.0));
        let left = attack_box(&body, Facing::Left, 30.0);
        assert_eq!((left.min.x, left.max.x), (70.0, 100.0));
    }

    #[test]
    fn test_pick_nearest_prefers_closer_target() {
        let mut state = arena(CharacterClass::Guard);
        let right = state.player.body.right();
        let far = spawn(&mut state, MonsterKind::Slime, right + 12.0);
        let near = spawn(&mut state, MonsterKind::Slime, right + 5.0);
        let hitbox = attack_box(&state.player.body, Facing::Right, 50.0);
        let idx = pick_nearest(&state.player.body, Facing::Right, &hitbox, &state.monsters).unwrap();
        assert_eq!(state.monsters[idx].id, near);
        assert_ne!(state.monsters[idx].id, far);
    }

    #[test]
    fn test_pick_nearest_ties_go_to_first_seen() {
        let mut state = arena(CharacterClass::Guard);
        let right = state.player.body.right();
        let first = spawn(&mut state, MonsterKind::Slime, right - 10.0);
        spawn(&mut state, MonsterKind::Slime, right - 20.0);
        let hitbox = attack_box(&state.player.body, Facing::Right, 30.0);
        let idx = pick_nearest(&state.player.body, Facing::Right, &hitbox, &state.monsters).unwrap();
        assert_eq!(state.monsters[idx].id, first);
    }

    #[test]
    fn test_melee_hits_once_with_knockback() {
        let mut state = arena(CharacterClass::Guard);
        let x = state.player.body.right() + 10.0;
        let id = spawn(&mut state, MonsterKind::Ghoul, x);
        crate::sim::action::try_attack(&mut state);

        resolve_attack(&mut state);
        resolve_attack(&mut state);
        let ghoul = state.monsters.iter().find(|m| m.id == id).unwrap();
        assert_eq!(ghoul.hp, 40);
        assert_eq!(ghoul.body.pos.x, x + 20.0);
    }

    #[test]
    fn test_knockback_pushes_away_from_player() {
        let mut state = arena(CharacterClass::Guard);
        // Overlaps the reach from behind the player's left edge
        let x = state.player.body.pos.x - 10.0;
        let id = spawn(&mut state, MonsterKind::RiftLord, x);
        crate::sim::action::try_attack(&mut state);

        resolve_attack(&mut state);
        let lord = state.monsters.iter().find(|m| m.id == id).unwrap();
        assert_eq!(lord.hp, 990);
        assert_eq!(lord.body.pos.x, x - 20.0);
    }

    #[test]
    fn test_kill_grants_exp_same_tick() {
        let mut state = arena(CharacterClass::Engineer);
        state.tuning.drop_chance = 1.0;
        let x = state.player.body.right() + 5.0;
        spawn(&mut state, MonsterKind::Slime, x);
        state.monsters[0].hp = 10;
        crate::sim::action::try_attack(&mut state);
        resolve_attack(&mut state);

        assert!(state.monsters.is_empty());
        assert_eq!(state.player.exp, 20);
        assert_eq!(state.pickups.len(), 1);
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::MonsterKilled { exp: 20, .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::ItemDropped { .. })));
    }

    #[test]
    fn test_level_up_pauses_for_stat_choice() {
        let mut state = arena(CharacterClass::Guard);
        state.player.exp = 90;
        let x = state.player.body.right() + 5.0;
        spawn(&mut state, MonsterKind::Slime, x);
        state.monsters[0].hp = 1;
        crate::sim::action::try_attack(&mut state);
        resolve_attack(&mut state);

        assert_eq!(state.player.level, 2);
        assert_eq!(state.player.exp, 0);
        assert_eq!(state.player.max_exp, 120);
        assert_eq!(state.pause, Some(PauseReason::LevelUp));
    }

    #[test]
    fn test_skill_hits_each_monster_once_per_activation() {
        let mut state = arena(CharacterClass::Marksman);
        let x = state.player.body.right() + 100.0;
        let id = spawn(&mut state, MonsterKind::RiftLord, x);
        crate::sim::action::on_special_pressed(&mut state);

        for _ in 0..10 {
            resolve_skill(&mut state);
        }
        let hp = |s: &GameState| s.monsters.iter().find(|m| m.id == id).unwrap().hp;
        // round(14 * 1.5) = 21
        assert_eq!(hp(&state), 1000 - 21);

        state.player.action.cancel();
        crate::sim::action::on_special_pressed(&mut state);
        resolve_skill(&mut state);
        assert_eq!(hp(&state), 1000 - 42);
    }

    #[test]
    fn test_contact_damage_skipped_while_dashing() {
        let mut state = arena(CharacterClass::Engineer);
        let x = state.player.body.pos.x;
        spawn(&mut state, MonsterKind::Slime, x);

        state.player.action.busy = Some(Busy::Dashing { from_x: x });
        resolve_contacts(&mut state);
        assert_eq!(state.player.hp, 100);

        state.player.action.busy = None;
        resolve_contacts(&mut state);
        assert_eq!(state.player.hp, 92);
        // Invincibility blocks the next contact
        resolve_contacts(&mut state);
        assert_eq!(state.player.hp, 92);
    }

    #[test]
    fn test_dash_strike_hits_swept_monsters() {
        let mut state = arena(CharacterClass::Engineer);
        let start = state.player.body.pos.x;
        let passed = spawn(&mut state, MonsterKind::Shade, start + 100.0);
        let beyond = spawn(&mut state, MonsterKind::Shade, start + 600.0);
        state.player.body.pos.x = start + 200.0;
        dash_strike(&mut state, start);
        let hp = |s: &GameState, id| s.monsters.iter().find(|m| m.id == id).unwrap().hp;
        // round(15 * 1.5) = 23
        assert_eq!(hp(&state, passed), 60 - 23);
        assert_eq!(hp(&state, beyond), 60);
    }

    #[test]
    fn test_boss_kill_clears_projectiles() {
        let mut state = arena(CharacterClass::Guard);
        let x = state.player.body.right() + 5.0;
        let id = spawn(&mut state, MonsterKind::RiftLord, x);
        state.projectiles.push(crate::sim::monster::Projectile {
            id: 99,
            pos: Vec2::ZERO,
            vel: Vec2::X,
            spawned_ms: 0,
            expires_ms: 5000,
        });
        damage_monster(&mut state, id, 5000);
        assert!(state.monsters.is_empty());
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_collect_pickups() {
        let mut state = arena(CharacterClass::Guard);
        let item = state.catalog.items()[1].clone();
        let pickup = Pickup::at_feet_of(50, item.clone(), &state.player.body);
        state.pickups.push(pickup);
        collect_pickups(&mut state);
        assert!(state.pickups.is_empty());
        assert_eq!(state.player.inventory, vec![item]);
    }

    proptest! {
        #[test]
        fn prop_damage_at_least_one(raw in -100i32..1000, def in 0i32..1000) {
            let dealt = apply_damage(raw, def);
            prop_assert!(dealt >= 1);
            prop_assert!(dealt >= raw - def);
        }

        #[test]
        fn prop_scaled_at_least_one(atk in 0i32..500, mult in 0.0f32..3.0) {
            prop_assert!(scaled(atk, mult) >= 1);
        }
    }
}
