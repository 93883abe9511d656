//! Fixed timestep simulation tick
//!
//! Core game loop that advances simulation deterministically.

use serde::{Deserialize, Serialize};

use super::action::{self, Facing};
use super::ai;
use super::combat;
use super::events::GameEvent;
use super::player::{CharacterClass, ItemUse, StatChoice};
use super::schedule::Deferred;
use super::stage;
use super::state::{GameState, PauseReason};
use crate::error::SimResult;

/// Input commands for a single tick (deterministic)
///
/// Buttons are the held state this tick; key-down and key-up edges are
/// derived against the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub left: bool,
    pub right: bool,
    /// Takes off on the press, only while grounded
    pub jump: bool,
    pub attack: bool,
    /// Caster beam / Marksman skill
    pub special: bool,
    /// Caster slow fall
    pub float: bool,
    /// Up: enter an open portal
    pub interact: bool,
    /// Inventory toggle
    pub inventory: bool,
    /// UI event: use or equip an inventory slot
    pub equip_slot: Option<usize>,
    /// UI event: level-up stat pick
    pub stat_choice: Option<StatChoice>,
    /// UI event: sanctuary class pick
    pub class_choice: Option<CharacterClass>,
}

/// Buttons whose edges matter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buttons {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub special: bool,
    pub inventory: bool,
}

impl From<&TickInput> for Buttons {
    fn from(input: &TickInput) -> Self {
        Self {
            left: input.left,
            right: input.right,
            jump: input.jump,
            special: input.special,
            inventory: input.inventory,
        }
    }
}

/// Advance the game state by one fixed timestep
///
/// A failing step is discarded: the state rolls back to how it was before
/// the tick and only the clock and edge tracking advance.
pub fn tick(state: &mut GameState, input: &TickInput) {
    let checkpoint = state.clone();
    if let Err(err) = step(state, input) {
        log::error!("Tick {} discarded: {}", state.time_ticks, err);
        *state = checkpoint;
    }
    state.prev_buttons = Buttons::from(input);
    state.time_ticks += 1;
}

fn step(state: &mut GameState, input: &TickInput) -> SimResult<()> {
    run_deferred(state)?;
    handle_ui(state, input);

    if state.is_paused() {
        return Ok(());
    }

    let neutral = TickInput::default();
    let input = if state.awaiting_class { &neutral } else { input };
    let prev = state.prev_buttons;

    stage::run_stage_script(state);

    // Key-down / key-up edges
    if input.left && !prev.left {
        action::on_direction_key(state, Facing::Left);
    }
    if input.right && !prev.right {
        action::on_direction_key(state, Facing::Right);
    }
    if input.special && !prev.special {
        action::on_special_pressed(state);
    } else if !input.special && prev.special {
        action::on_special_released(state);
    }
    if input.attack {
        action::try_attack(state);
    }

    // Player
    action::apply_intent(state, input);
    action::update_float(state, input.float);
    let factor = state.player.action.gravity_factor(&state.tuning);
    let gravity = state.tuning.gravity;
    state.player.body.integrate(&state.world, gravity, factor);
    action::advance_animation(state);
    action::update_beam(state);
    action::tick_timers(&mut state.player);

    // Monsters
    ai::update_monsters(state);
    if state.time_ticks % state.tuning.boss_update_every == 0 {
        ai::update_projectiles(state);
        ai::boss_attacks(state);
    }

    // Combat
    combat::resolve_contacts(state);
    combat::resolve_attack(state);
    combat::resolve_skill(state);
    combat::collect_pickups(state);

    // Stage flow
    stage::check_prologue_loss(state);
    stage::update_goal(state, input.interact)?;
    if !state.is_paused() {
        stage::check_defeat(state);
    }
    Ok(())
}

/// Run deferred events that came due, in order
fn run_deferred(state: &mut GameState) -> SimResult<()> {
    let due = state.schedule.take_due(state.now_ms(), state.time_ticks);
    for deferred in due {
        match deferred {
            Deferred::LoadStage { target, epoch } if epoch == state.stage_epoch => {
                stage::load_stage(state, target)?;
            }
            Deferred::LoadStage { target, epoch } => {
                log::trace!(
                    "Stale reload of {:?} ignored (epoch {} != {})",
                    target,
                    epoch,
                    state.stage_epoch
                );
            }
            other => action::handle_deferred(state, &other),
        }
    }
    Ok(())
}

/// Popup and inventory events; these are honoured while paused
fn handle_ui(state: &mut GameState, input: &TickInput) {
    if let Some(choice) = input.stat_choice {
        if state.pause == Some(PauseReason::LevelUp) {
            state.player.choose_stat(choice, &state.tuning);
            state.pause = None;
            log::info!("Level {}: +{:?}", state.player.level, choice);
        } else {
            log::trace!("Stat choice {:?} ignored: no level-up pending", choice);
        }
    }

    if let Some(class) = input.class_choice {
        stage::choose_class(state, class);
    }

    if input.inventory && !state.prev_buttons.inventory {
        state.show_inventory = !state.show_inventory;
        let open = state.show_inventory;
        state.emit(GameEvent::InventoryToggled { open });
    }

    if let Some(slot) = input.equip_slot {
        if !state.show_inventory {
            log::trace!("Slot {} ignored: inventory closed", slot);
            return;
        }
        match state.player.use_item(slot) {
            Some(ItemUse::Healed(amount)) => {
                log::debug!("Healed {}", amount);
                state.emit(GameEvent::InventoryChanged);
            }
            Some(ItemUse::Equipped(item)) => {
                log::debug!("Equipped {}", item.name);
                state.emit(GameEvent::InventoryChanged);
            }
            None => log::trace!("Slot {} is empty", slot),
        }
    }
}
