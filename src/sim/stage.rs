//! Stage layouts, monster placement and scripted progression
//!
//! Stages run in a fixed order. Layouts are validated once when the game is
//! created; loading a stage swaps the world, clears every transient entity,
//! re-spawns the player at the left edge and places that stage's monsters.

use std::collections::BTreeMap;
use std::ops::Range;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::Aabb;
use super::catalog::MonsterKind;
use super::events::{GameEvent, Notice, Playback, SoundCue};
use super::monster::Monster;
use super::player::CharacterClass;
use super::schedule::Deferred;
use super::state::{GameState, PauseReason};
use super::tile::{Tile, TileGrid, TileWorld};
use crate::error::{SimError, SimResult};

pub const MAP_COLS: usize = 48;
pub const MAP_ROWS: usize = 16;
/// Player spawn x on every stage
pub const SPAWN_X: f32 = 100.0;
pub const PORTAL_SIZE: Vec2 = Vec2::new(60.0, 90.0);
/// Portal accepts the player centre within this many units of its centre
const PORTAL_REACH: Vec2 = Vec2::new(40.0, 60.0);

const PROLOGUE_DREADS: usize = 8;
const PROLOGUE_DREAD_HP: i32 = 9999;
/// Holds until the sanctuary restores the player
const PROLOGUE_INVINCIBILITY: u32 = 1_000_000;
const GROUND_SPAWN_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageId {
    Opening,
    /// Forced-loss fight
    Prologue,
    /// Class choice
    Sanctuary,
    /// Stage 1
    Wilds,
    /// Stage 2
    Depths,
    /// Stage 3, boss
    Core,
    ControlRoom,
}

impl StageId {
    pub const ALL: [StageId; 7] = [
        StageId::Opening,
        StageId::Prologue,
        StageId::Sanctuary,
        StageId::Wilds,
        StageId::Depths,
        StageId::Core,
        StageId::ControlRoom,
    ];

    pub fn next(self) -> Option<StageId> {
        let idx = Self::ALL.iter().position(|&s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Numbered stages; the control room counts as stage 4
    pub fn number(self) -> Option<u8> {
        match self {
            StageId::Wilds => Some(1),
            StageId::Depths => Some(2),
            StageId::Core => Some(3),
            StageId::ControlRoom => Some(4),
            _ => None,
        }
    }

    /// Dying here reloads the stage instead of ending the run
    pub fn restarts_on_death(self) -> bool {
        matches!(self, StageId::Wilds | StageId::Depths | StageId::Core)
    }

    pub fn restores_health(self) -> bool {
        self == StageId::Sanctuary || self.number().is_some()
    }

    /// Portal opens once every monster is dead
    fn clears_to_exit(self) -> bool {
        self.restarts_on_death()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Stage(StageId),
    Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub area: Aabb,
    pub open: bool,
    pub destination: Destination,
}

impl Portal {
    /// Portal standing on the floor with its left edge at `x`
    fn on_floor(world: &TileWorld, x: f32, open: bool, destination: Destination) -> Self {
        let floor_top = (world.grid.rows() - 1) as f32 * world.tile_size;
        Self {
            area: Aabb::from_pos_size(Vec2::new(x, floor_top - PORTAL_SIZE.y), PORTAL_SIZE),
            open,
            destination,
        }
    }

    pub fn accepts(&self, point: Vec2) -> bool {
        let d = (point - self.area.center()).abs();
        d.x < PORTAL_REACH.x && d.y < PORTAL_REACH.y
    }
}

/// Per-visit prologue script flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrologueState {
    pub spawned: bool,
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

/// Builder for the shipped layouts: a solid floor plus platforms
struct Layout {
    codes: Vec<Vec<u8>>,
}

impl Layout {
    fn new() -> Self {
        let mut codes = vec![vec![Tile::Empty.code(); MAP_COLS]; MAP_ROWS];
        codes[MAP_ROWS - 1] = vec![Tile::Solid.code(); MAP_COLS];
        Self { codes }
    }

    fn platform(mut self, row: usize, col: usize, width: usize) -> Self {
        for cell in &mut self.codes[row][col..col + width] {
            *cell = Tile::Solid.code();
        }
        self
    }

    fn chest(mut self, row: usize, col: usize) -> Self {
        self.codes[row][col] = Tile::Interactive.code();
        self
    }

    fn build(self) -> SimResult<TileGrid> {
        TileGrid::from_codes(&self.codes)
    }
}

pub fn builtin_layout(id: StageId) -> SimResult<TileGrid> {
    let layout = Layout::new();
    match id {
        StageId::Opening | StageId::Prologue | StageId::Sanctuary => layout,
        StageId::Wilds => layout
            .platform(12, 6, 4)
            .platform(12, 14, 3)
            .platform(9, 10, 5)
            .platform(10, 20, 6)
            .platform(7, 18, 3)
            .platform(12, 27, 9)
            .platform(9, 38, 4),
        StageId::Depths => layout
            .platform(12, 6, 2)
            .platform(10, 9, 2)
            .platform(7, 12, 4)
            .platform(4, 26, 3)
            .platform(3, 16, 4)
            .platform(2, 6, 5)
            .platform(11, 20, 6)
            .platform(8, 34, 3)
            .platform(12, 40, 2),
        StageId::Core => layout.platform(11, 8, 4).platform(11, 36, 4),
        StageId::ControlRoom => layout.chest(MAP_ROWS - 2, MAP_COLS / 2),
    }
    .build()
}

/// Every shipped layout, keyed by stage
pub fn builtin_layouts() -> SimResult<BTreeMap<StageId, TileGrid>> {
    StageId::ALL
        .iter()
        .map(|&id| Ok((id, builtin_layout(id)?)))
        .collect()
}

/// Horizontal run of solid tiles with open space above, excluding the bottom row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub row: usize,
    pub col: usize,
    pub width: usize,
}

pub fn find_platforms(grid: &TileGrid) -> Vec<Platform> {
    let mut platforms = Vec::new();
    for row in 1..grid.rows().saturating_sub(1) {
        let above = grid.row(row - 1);
        let mut run: Option<usize> = None;
        for (col, tile) in grid.row(row).iter().enumerate() {
            let top = tile.is_solid() && !above[col].is_solid();
            match (top, run) {
                (true, None) => run = Some(col),
                (false, Some(start)) => {
                    platforms.push(Platform {
                        row,
                        col: start,
                        width: col - start,
                    });
                    run = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run {
            platforms.push(Platform {
                row,
                col: start,
                width: grid.cols() - start,
            });
        }
    }
    platforms
}

/// Stage 1: monsters per platform width
fn wilds_count(width: usize) -> Option<usize> {
    match width {
        3 => Some(1),
        4 => Some(2),
        5 => Some(3),
        6 => Some(4),
        9 => Some(7),
        _ => None,
    }
}

/// Stage 2: monsters per (row, width)
fn depths_count(row: usize, width: usize) -> Option<usize> {
    match (row, width) {
        (2, 5) => Some(3),
        (3, 4) => Some(2),
        (4, 3) => Some(1),
        (7, 4) => Some(2),
        (8, 3) => Some(1),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

fn random_kind(state: &mut GameState, kinds: &[MonsterKind]) -> MonsterKind {
    kinds[state.rng.random_range(0..kinds.len())]
}

/// Spread `count` monsters evenly along a platform, patrolling its edges
fn spawn_on_platform(state: &mut GameState, platform: Platform, kinds: &[MonsterKind], count: usize) {
    let ts = state.world.tile_size;
    let left = platform.col as f32 * ts;
    let right = (platform.col + platform.width) as f32 * ts;
    let slot = (right - left) / count as f32;

    for i in 0..count {
        let kind = random_kind(state, kinds);
        let stats = state.catalog.monster(kind);
        let x = (left + slot * (i as f32 + 0.5) - stats.size.x * 0.5)
            .clamp(left, (right - stats.size.x).max(left));
        let y = platform.row as f32 * ts - stats.size.y;
        let id = state.next_entity_id();
        let mut monster = Monster::new(id, kind, &stats, Vec2::new(x, y)).with_patrol(left, right);
        if i % 2 == 1 {
            monster.body.vel.x = -monster.body.vel.x;
        }
        state.monsters.push(monster);
    }
}

/// Place `count` monsters on random floor columns in `cols`
///
/// Returns how many could not be placed.
fn spawn_on_ground(
    state: &mut GameState,
    count: usize,
    cols: Range<i32>,
    kinds: &[MonsterKind],
    tracking: bool,
) -> usize {
    let row = state.world.grid.rows() as i32 - 2;
    let ts = state.world.tile_size;
    let mut missing = 0;

    for _ in 0..count {
        let mut placed = false;
        for _ in 0..GROUND_SPAWN_ATTEMPTS {
            if cols.is_empty() {
                break;
            }
            let col = state.rng.random_range(cols.clone());
            if !state.world.is_standable(row, col) || state.world.is_solid(row - 1, col) {
                continue;
            }
            let kind = random_kind(state, kinds);
            let stats = state.catalog.monster(kind);
            let x = state.world.clamp_x(col as f32 * ts, stats.size.x);
            let pos = Vec2::new(x, (row + 1) as f32 * ts - stats.size.y);
            let id = state.next_entity_id();
            let monster = Monster::new(id, kind, &stats, pos);
            let monster = if tracking {
                monster.tracking()
            } else {
                let dir = if state.rng.random_bool(0.5) { 1.0 } else { -1.0 };
                monster.wandering(dir)
            };
            state.monsters.push(monster);
            placed = true;
            break;
        }
        if !placed {
            missing += 1;
        }
    }
    missing
}

fn populate(state: &mut GameState) {
    let cols = state.world.grid.cols() as i32;
    let platforms = find_platforms(&state.world.grid);
    let mut missing = 0;

    match state.stage {
        StageId::Wilds => {
            let kinds = [MonsterKind::Slime];
            for p in platforms {
                if let Some(count) = wilds_count(p.width) {
                    spawn_on_platform(state, p, &kinds, count);
                }
            }
            missing += spawn_on_ground(state, 5, 8..cols - 4, &kinds, false);
        }
        StageId::Depths => {
            let kinds = [MonsterKind::Ghoul, MonsterKind::Shade];
            for p in platforms {
                if let Some(count) = depths_count(p.row, p.width) {
                    spawn_on_platform(state, p, &kinds, count);
                }
            }
            let half = cols / 2;
            missing += spawn_on_ground(state, 7, 4..half - 3, &kinds, true);
            missing += spawn_on_ground(state, 4, half - 1..cols - 2, &kinds, true);
        }
        StageId::Core => spawn_boss(state),
        _ => {}
    }

    if missing > 0 {
        log::warn!("{:?}: {} monsters found no free tile", state.stage, missing);
        state.emit(GameEvent::Notice(Notice::SpawnShortfall));
    }
}

/// Boss at the centre of the floor
fn spawn_boss(state: &mut GameState) {
    let kind = MonsterKind::RiftLord;
    let stats = state.catalog.monster(kind);
    let x = state.world.width() * 0.5 - stats.size.x * 0.5;
    let col = state.world.index_of(state.world.width() * 0.5);
    let y = state.world.ground_y(col, stats.size.y);
    let id = state.next_entity_id();
    state
        .monsters
        .push(Monster::new(id, kind, &stats, Vec2::new(x, y)).wandering(1.0));
}

fn spawn_prologue_horde(state: &mut GameState) {
    let kind = MonsterKind::Dread;
    let stats = state.catalog.monster(kind);
    let width = state.world.width();
    let start = width * 0.5;
    let step = (width - start - stats.size.x) / PROLOGUE_DREADS as f32;

    for i in 0..PROLOGUE_DREADS {
        let x = start + step * i as f32;
        let y = state.world.ground_y(state.world.index_of(x), stats.size.y);
        let id = state.next_entity_id();
        let dread = Monster::new(id, kind, &stats, Vec2::new(x, y))
            .with_hp(PROLOGUE_DREAD_HP)
            .tracking();
        state.monsters.push(dread);
    }
}

// ---------------------------------------------------------------------------
// Stage flow
// ---------------------------------------------------------------------------

/// Swap in a stage and reset everything it owns
pub fn load_stage(state: &mut GameState, id: StageId) -> SimResult<()> {
    let grid = state
        .layouts
        .get(&id)
        .cloned()
        .ok_or(SimError::MissingStage(id))?;
    state.world = TileWorld::new(grid, state.tuning.tile_size);
    state.stage = id;
    state.stage_epoch += 1;
    state.monsters.clear();
    state.projectiles.clear();
    state.pickups.clear();
    state.chest_opened = false;
    state.prologue = PrologueState::default();
    state.pause = None;

    if state.player.action.is_firing() {
        state.emit(GameEvent::sound(SoundCue::CasterBeam, Playback::Stop));
    }
    let player = &mut state.player;
    player.action.cancel();
    let x = state.world.clamp_x(SPAWN_X, player.body.size.x);
    let y = state
        .world
        .ground_y(state.world.index_of(x), player.body.size.y);
    player.body.pos = Vec2::new(x, y);
    player.body.vel = Vec2::ZERO;
    player.body.grounded = true;
    if id.restores_health() {
        player.restore();
    }

    let portal_x = (state.world.grid.cols() as f32 - 3.0) * state.world.tile_size;
    state.portal = match id {
        StageId::Opening => Some(Portal::on_floor(
            &state.world,
            portal_x,
            true,
            Destination::Stage(StageId::Prologue),
        )),
        StageId::Sanctuary => Some(Portal::on_floor(
            &state.world,
            portal_x,
            state.class_chosen,
            Destination::Stage(StageId::Wilds),
        )),
        StageId::Wilds | StageId::Depths | StageId::Core => id.next().map(|next| {
            Portal::on_floor(&state.world, portal_x, false, Destination::Stage(next))
        }),
        StageId::Prologue | StageId::ControlRoom => None,
    };

    populate(state);

    if id == StageId::Sanctuary && !state.class_chosen {
        state.awaiting_class = true;
        state.emit(GameEvent::ClassChoicePopup);
    }

    log::info!(
        "Entered {:?} (epoch {}, {} monsters)",
        id,
        state.stage_epoch,
        state.monsters.len()
    );
    state.emit(GameEvent::StageEntered(id));
    Ok(())
}

/// Stage scripts that run before input each tick
pub fn run_stage_script(state: &mut GameState) {
    if state.stage == StageId::Prologue && !state.prologue.spawned {
        state.prologue.spawned = true;
        spawn_prologue_horde(state);
        state.emit(GameEvent::Notice(Notice::Overwhelmed));
    }
}

/// Prologue forced loss: pin hp, clear the horde, move on to the sanctuary
pub fn check_prologue_loss(state: &mut GameState) {
    let floor = state.tuning.prologue_hp_floor;
    if state.stage != StageId::Prologue || state.prologue.finished || state.player.hp > floor {
        return;
    }
    state.prologue.finished = true;
    state.player.hp = floor;
    state.player.invincible = PROLOGUE_INVINCIBILITY;
    state.monsters.clear();
    state.pause = Some(PauseReason::Transition);

    let epoch = state.stage_epoch;
    let delay = state.tuning.prologue_exit_delay_ms;
    log::info!("Prologue lost; sanctuary in {}ms", delay);
    state.defer(
        delay,
        Deferred::LoadStage {
            target: StageId::Sanctuary,
            epoch,
        },
    );
}

/// Class picked in the sanctuary
pub fn choose_class(state: &mut GameState, class: CharacterClass) {
    if !state.awaiting_class {
        log::trace!("Class choice {:?} ignored: not offered", class);
        return;
    }
    if !CharacterClass::CHOICES.contains(&class) {
        log::trace!("Class choice {:?} ignored: not an option", class);
        return;
    }

    state.become_class(class);
    state.awaiting_class = false;
    state.class_chosen = true;
    log::info!("Became {:?}", class);
    state.emit(GameEvent::Notice(Notice::ClassChanged(class)));

    if let Some(portal) = &mut state.portal {
        portal.open = true;
        state.emit(GameEvent::Notice(Notice::PortalOpened));
    }
}

/// Open cleared stages' portals and take the player through one on interact
pub fn update_goal(state: &mut GameState, interact: bool) -> SimResult<()> {
    if state.stage.clears_to_exit() && state.monsters.is_empty() {
        if let Some(portal) = &mut state.portal {
            if !portal.open {
                portal.open = true;
                log::info!("{:?} cleared", state.stage);
                state.emit(GameEvent::Notice(Notice::PortalOpened));
            }
        }
    }

    if !interact {
        return Ok(());
    }
    let Some(portal) = state.portal else {
        return Ok(());
    };
    if !portal.open || !portal.accepts(state.player.body.center()) {
        return Ok(());
    }
    match portal.destination {
        Destination::Stage(next) => load_stage(state, next),
        Destination::Ending => {
            log::info!("Ending reached");
            state.pause = Some(PauseReason::Ending);
            state.emit(GameEvent::Notice(Notice::Ending));
            Ok(())
        }
    }
}

/// Attack boxes that reach the control-room chest open it
pub fn strike_chest(state: &mut GameState, hitbox: &Aabb) {
    if state.stage != StageId::ControlRoom || state.chest_opened {
        return;
    }
    let grid = &state.world.grid;
    let Some((row, col)) = (0..grid.rows())
        .flat_map(|r| (0..grid.cols()).map(move |c| (r, c)))
        .find(|&(r, c)| grid.get(r as i32, c as i32) == Tile::Interactive)
    else {
        return;
    };
    let ts = state.world.tile_size;
    let chest = Aabb::new(
        col as f32 * ts,
        row as f32 * ts,
        (col + 1) as f32 * ts,
        (row + 1) as f32 * ts,
    );
    if !hitbox.overlaps(&chest) {
        return;
    }

    state.chest_opened = true;
    let x = state.world.clamp_x((col + 2) as f32 * ts, PORTAL_SIZE.x);
    state.portal = Some(Portal::on_floor(&state.world, x, true, Destination::Ending));
    log::info!("Chest opened");
    state.emit(GameEvent::Notice(Notice::ChestOpened));
}

/// Death: reload numbered stages after a delay, otherwise end the run
pub fn check_defeat(state: &mut GameState) {
    if !state.player.is_dead() {
        return;
    }
    if state.stage.restarts_on_death() {
        let target = state.stage;
        let epoch = state.stage_epoch;
        let delay = state.tuning.restart_delay_ms;
        log::info!("Downed on {:?}; restarting in {}ms", target, delay);
        state.pause = Some(PauseReason::Restarting);
        state.emit(GameEvent::Notice(Notice::Downed));
        state.defer(delay, Deferred::LoadStage { target, epoch });
    } else {
        log::info!("Game over on {:?}", state.stage);
        state.pause = Some(PauseReason::GameOver);
        state.emit(GameEvent::Notice(Notice::GameOver));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(StageId::Opening.next(), Some(StageId::Prologue));
        assert_eq!(StageId::Core.next(), Some(StageId::ControlRoom));
        assert_eq!(StageId::ControlRoom.next(), None);
        assert!(StageId::Depths.restarts_on_death());
        assert!(!StageId::ControlRoom.restarts_on_death());
        assert!(StageId::Sanctuary.restores_health());
        assert!(!StageId::Prologue.restores_health());
    }

    #[test]
    fn test_builtin_layouts_are_valid() {
        let layouts = builtin_layouts().unwrap();
        assert_eq!(layouts.len(), StageId::ALL.len());
        for grid in layouts.values() {
            assert_eq!((grid.rows(), grid.cols()), (MAP_ROWS, MAP_COLS));
            assert!(grid.row(MAP_ROWS - 1).iter().all(|t| t.is_solid()));
        }
    }

    #[test]
    fn test_find_platforms() {
        let grid = builtin_layout(StageId::Wilds).unwrap();
        let platforms = find_platforms(&grid);
        assert!(platforms.contains(&Platform {
            row: 12,
            col: 27,
            width: 9
        }));
        assert_eq!(platforms.len(), 7);
    }

    #[test]
    fn test_wilds_population() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Wilds).unwrap();
        // 2 + 1 + 3 + 4 + 1 + 7 + 2 on platforms, 5 on the ground
        assert_eq!(state.monsters.len(), 25);
        assert!(state.monsters.iter().all(|m| m.kind == MonsterKind::Slime));
        let patrolling = state.monsters.iter().filter(|m| m.patrol.is_some()).count();
        assert_eq!(patrolling, 20);
    }

    #[test]
    fn test_depths_population() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Depths).unwrap();
        // 3 + 2 + 1 + 2 + 1 on platforms, 7 + 4 on the ground
        assert_eq!(state.monsters.len(), 20);
        let trackers = state.monsters.iter().filter(|m| m.tracks_player).count();
        assert_eq!(trackers, 11);
    }

    #[test]
    fn test_core_boss_on_floor_centre() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Core).unwrap();
        assert_eq!(state.monsters.len(), 1);
        let boss = &state.monsters[0];
        assert!(boss.is_boss());
        assert_eq!(boss.hp, 1000);
        assert_eq!(boss.body.center().x, state.world.width() * 0.5);
        assert_eq!(boss.body.bottom(), (MAP_ROWS - 1) as f32 * state.world.tile_size);
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let mut a = GameState::new(42).unwrap();
        let mut b = GameState::new(42).unwrap();
        load_stage(&mut a, StageId::Depths).unwrap();
        load_stage(&mut b, StageId::Depths).unwrap();
        let positions = |s: &GameState| s.monsters.iter().map(|m| (m.kind, m.body.pos)).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_load_restores_health_and_spawn_point() {
        let mut state = GameState::new(3).unwrap();
        state.player.hp = 12;
        state.player.invincible = 9;
        load_stage(&mut state, StageId::Wilds).unwrap();
        assert_eq!(state.player.hp, 100);
        assert_eq!(state.player.invincible, 0);
        assert_eq!(state.player.body.pos.x, SPAWN_X);
        assert_eq!(state.player.body.bottom(), (MAP_ROWS - 1) as f32 * state.world.tile_size);
        assert_eq!(state.portal.map(|p| p.open), Some(false));
    }

    #[test]
    fn test_missing_layout_is_an_error() {
        let mut state = GameState::new(3).unwrap();
        state.layouts.remove(&StageId::Core);
        assert!(matches!(
            load_stage(&mut state, StageId::Core),
            Err(SimError::MissingStage(StageId::Core))
        ));
    }

    #[test]
    fn test_portal_opens_when_cleared_and_accepts_player() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Wilds).unwrap();
        state.monsters.clear();
        update_goal(&mut state, false).unwrap();
        let portal = state.portal.unwrap();
        assert!(portal.open);

        // Walk onto the portal and press up
        let center = portal.area.center();
        state.player.body.pos.x = center.x - state.player.body.size.x * 0.5;
        update_goal(&mut state, true).unwrap();
        assert_eq!(state.stage, StageId::Depths);
    }

    #[test]
    fn test_prologue_forced_loss() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Prologue).unwrap();
        run_stage_script(&mut state);
        assert_eq!(state.monsters.len(), PROLOGUE_DREADS);
        assert!(state.monsters.iter().all(|m| m.hp == PROLOGUE_DREAD_HP && m.tracks_player));

        state.player.hp = -15;
        check_prologue_loss(&mut state);
        assert_eq!(state.player.hp, 10);
        assert!(state.monsters.is_empty());
        assert_eq!(state.pause, Some(PauseReason::Transition));
        assert!(state.schedule.contains(|d| matches!(
            d,
            Deferred::LoadStage {
                target: StageId::Sanctuary,
                ..
            }
        )));
    }

    #[test]
    fn test_sanctuary_class_choice() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Sanctuary).unwrap();
        assert!(state.awaiting_class);
        assert_eq!(state.portal.map(|p| p.open), Some(false));
        let pos = state.player.body.pos;
        let incarnation = state.player.incarnation;

        choose_class(&mut state, CharacterClass::Guard);
        assert!(state.awaiting_class);

        choose_class(&mut state, CharacterClass::Caster);
        assert!(!state.awaiting_class);
        assert_eq!(state.player.class, CharacterClass::Caster);
        assert_eq!(state.player.body.pos, pos);
        assert_eq!(state.player.incarnation, incarnation + 1);
        assert_eq!(state.portal.map(|p| p.open), Some(true));
    }

    #[test]
    fn test_chest_opens_ending_portal() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::ControlRoom).unwrap();
        assert!(state.portal.is_none());
        let ts = state.world.tile_size;
        let col = (MAP_COLS / 2) as f32;
        let hitbox = Aabb::new(col * ts - 10.0, 560.0, col * ts + 5.0, 590.0);
        strike_chest(&mut state, &hitbox);
        assert!(state.chest_opened);
        let portal = state.portal.unwrap();
        assert_eq!(portal.destination, Destination::Ending);

        state.player.body.pos.x = portal.area.center().x - state.player.body.size.x * 0.5;
        update_goal(&mut state, true).unwrap();
        assert_eq!(state.pause, Some(PauseReason::Ending));
    }

    #[test]
    fn test_defeat_restarts_or_ends() {
        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::Depths).unwrap();
        state.player.hp = 0;
        check_defeat(&mut state);
        assert_eq!(state.pause, Some(PauseReason::Restarting));

        let mut state = GameState::new(3).unwrap();
        load_stage(&mut state, StageId::ControlRoom).unwrap();
        state.player.hp = -1;
        check_defeat(&mut state);
        assert_eq!(state.pause, Some(PauseReason::GameOver));
    }
}
