//! Player action state machine
//!
//! Busy modes (attack, dash, cast/fire, skill) are mutually exclusive and
//! suppress normal locomotion. Idle, walk and jump are derived every tick from
//! velocity and the grounded flag. Timed exits go through the deferred
//! schedule; animation-driven exits happen when a frame sequence completes.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::combat;
use super::events::{GameEvent, Playback, SoundCue};
use super::player::Player;
use super::schedule::{ActivationKey, Deferred};
use super::state::GameState;
use super::tick::TickInput;
use crate::tuning::Tuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Frame count and per-frame duration of one animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimSpec {
    pub frames: u32,
    pub frame_ticks: u32,
}

impl AnimSpec {
    pub const fn new(frames: u32, frame_ticks: u32) -> Self {
        Self {
            frames,
            frame_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AttackStyle {
    /// Single swing that ends when its animation completes
    Melee {
        range: f32,
        anim: AnimSpec,
        knockback: bool,
    },
    /// Timed three-step ranged combo
    Combo,
}

/// Per-class capabilities, resolved once when the player is created
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProfile {
    pub size: Vec2,
    pub base_atk: i32,
    pub attack: AttackStyle,
    pub dash: bool,
    /// Beam wind-up; zero frames fires immediately
    pub cast: Option<AnimSpec>,
    pub skill: Option<AnimSpec>,
    pub float: bool,
    /// No horizontal movement while attacking or using the skill
    pub rooted_while_busy: bool,
    pub attack_cue: SoundCue,
    pub footstep_cue: Option<SoundCue>,
}

/// Animation shown for the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PoseAction {
    #[default]
    Idle,
    Walk,
    Jump,
    Attack,
    Cast,
    Fire,
    Skill,
    Dash,
}

impl PoseAction {
    fn loops(self) -> bool {
        matches!(self, PoseAction::Idle | PoseAction::Walk | PoseAction::Fire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anim {
    pub action: PoseAction,
    pub frame: u32,
    /// Ticks spent on the current frame
    pub timer: u32,
}

impl Anim {
    pub fn new(action: PoseAction) -> Self {
        Self {
            action,
            frame: 0,
            timer: 0,
        }
    }
}

/// Mutually exclusive busy modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Busy {
    Attacking,
    Dashing {
        /// Left edge before the dash, for the pose midpoint
        from_x: f32,
    },
    /// Beam wind-up
    Casting,
    Firing {
        /// Unpaused time spent firing
        elapsed_ms: u64,
        pulses: u32,
    },
    Skilling {
        /// Monster ids already hit by this activation
        hits: BTreeSet<u32>,
        end_pending: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub busy: Option<Busy>,
    /// Bumped on every busy trigger
    pub activation: u32,
    pub facing: Facing,
    pub anim: Anim,
    /// The current attack activation already dealt its hit
    pub hit_consumed: bool,
    pub attack_cooldown: u32,
    /// Next combo step, 1..=3
    pub combo_step: u32,
    pub last_attack_ms: Option<u64>,
    pub dash_cooldown: u32,
    /// Activation that opened the dash-cancel window, if still open
    pub dash_window: Option<u32>,
    pub last_tap: Option<(Facing, u64)>,
    pub floating: bool,
    pub float_timer: u32,
    /// Beam expired while held; special must be released first
    pub must_release: bool,
    pub footsteps: bool,
}

impl Default for ActionState {
    fn default() -> Self {
        Self {
            busy: None,
            activation: 0,
            facing: Facing::Right,
            anim: Anim::default(),
            hit_consumed: false,
            attack_cooldown: 0,
            combo_step: 1,
            last_attack_ms: None,
            dash_cooldown: 0,
            dash_window: None,
            last_tap: None,
            floating: false,
            float_timer: 0,
            must_release: false,
            footsteps: false,
        }
    }
}

impl ActionState {
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn is_attacking(&self) -> bool {
        matches!(self.busy, Some(Busy::Attacking))
    }

    pub fn is_dashing(&self) -> bool {
        matches!(self.busy, Some(Busy::Dashing { .. }))
    }

    pub fn is_firing(&self) -> bool {
        matches!(self.busy, Some(Busy::Firing { .. }))
    }

    pub fn is_skilling(&self) -> bool {
        matches!(self.busy, Some(Busy::Skilling { .. }))
    }

    /// Enter a busy mode as a new activation
    fn begin(&mut self, busy: Busy, action: PoseAction) -> u32 {
        self.activation += 1;
        self.busy = Some(busy);
        self.anim = Anim::new(action);
        self.activation
    }

    /// Drop any busy mode and invalidate its pending deferred events
    pub fn cancel(&mut self) {
        self.busy = None;
        self.activation += 1;
        self.dash_window = None;
        self.floating = false;
        self.float_timer = 0;
    }

    /// Gravity scale for this tick
    pub fn gravity_factor(&self, tuning: &Tuning) -> f32 {
        if self.is_dashing() {
            0.0
        } else if self.floating {
            tuning.float_gravity_factor
        } else {
            1.0
        }
    }
}

fn key_of(player: &Player, activation: u32) -> ActivationKey {
    ActivationKey {
        incarnation: player.incarnation,
        activation,
    }
}

/// Key-down of a direction; a quick second tap opens an Engineer dash
pub fn on_direction_key(state: &mut GameState, dir: Facing) {
    if !state.player.profile.dash {
        return;
    }
    let now = state.now_ms();
    let double_tap_ms = state.tuning.double_tap_ms;
    let action = &mut state.player.action;

    // Taps only count while an attack holds the window open
    if action.dash_window.is_none() {
        return;
    }
    let second_tap = matches!(
        action.last_tap,
        Some((prev, at)) if prev == dir && now.saturating_sub(at) <= double_tap_ms
    );
    if !second_tap {
        action.last_tap = Some((dir, now));
        return;
    }
    if action.dash_cooldown > 0 || action.is_dashing() {
        log::trace!("Double tap ignored: dash cooling down");
        action.last_tap = Some((dir, now));
        return;
    }
    action.last_tap = None;
    trigger_dash(state, dir);
}

/// Slide up to the dash range, then hold still until the dash ends
pub fn trigger_dash(state: &mut GameState, dir: Facing) {
    let tuning = &state.tuning;
    let (range, cooldown, duration) = (
        tuning.dash_range,
        tuning.dash_cooldown_ticks,
        tuning.dash_duration_ms,
    );
    let from_x = state.player.body.pos.x;
    let to_x = state
        .player
        .body
        .sweep_horizontal(&state.world, dir.sign(), range);

    let player = &mut state.player;
    let activation = player
        .action
        .begin(Busy::Dashing { from_x }, PoseAction::Dash);
    player.action.facing = dir;
    player.action.dash_window = None;
    player.action.dash_cooldown = cooldown;
    player.body.pos.x = to_x;
    player.body.vel = Vec2::ZERO;
    let key = key_of(player, activation);

    log::debug!("Dash {:?} from {:.1} to {:.1}", dir, from_x, to_x);
    state.defer(duration, Deferred::EndDash(key));
    state.emit(GameEvent::sound(SoundCue::EngineerDash, Playback::OneShot));
    combat::dash_strike(state, from_x);
}

/// Attack command held; starts a new attack when idle
pub fn try_attack(state: &mut GameState) {
    let action = &state.player.action;
    if action.is_busy() || action.attack_cooldown > 0 {
        return;
    }
    let now = state.now_ms();
    let profile = state.player.profile;
    let tuning = &state.tuning;
    let (reset_ms, step_ms, finisher_ms, window_ms) = (
        tuning.combo_reset_ms,
        tuning.combo_step_ms,
        tuning.combo_finisher_ms,
        tuning.dash_window_ms,
    );

    let player = &mut state.player;
    let activation = player.action.begin(Busy::Attacking, PoseAction::Attack);
    player.action.hit_consumed = false;
    let key = key_of(player, activation);

    if profile.attack == AttackStyle::Combo {
        let action = &mut player.action;
        if action.last_attack_ms.is_some_and(|at| now - at > reset_ms) {
            action.combo_step = 1;
        }
        action.last_attack_ms = Some(now);
        let duration = if action.combo_step >= 3 {
            finisher_ms
        } else {
            step_ms
        };
        state.defer(duration, Deferred::EndComboAttack(key));
    }
    if profile.dash {
        state.player.action.dash_window = Some(activation);
        state.defer(window_ms, Deferred::CloseDashWindow(key));
    }
    state.emit(GameEvent::sound(profile.attack_cue, Playback::OneShot));
}

/// Special key went down: start the beam wind-up or the skill
pub fn on_special_pressed(state: &mut GameState) {
    let profile = state.player.profile;
    let action = &mut state.player.action;
    if action.is_busy() {
        log::trace!("Special ignored while {:?}", action.busy);
        return;
    }

    if let Some(windup) = profile.cast {
        if action.must_release {
            log::trace!("Special ignored until released");
            return;
        }
        if windup.frames == 0 {
            action.activation += 1;
            start_firing(state);
        } else {
            action.begin(Busy::Casting, PoseAction::Cast);
        }
    } else if profile.skill.is_some() {
        action.begin(
            Busy::Skilling {
                hits: BTreeSet::new(),
                end_pending: false,
            },
            PoseAction::Skill,
        );
        state.emit(GameEvent::sound(SoundCue::MarksmanSkill, Playback::OneShot));
    }
}

pub fn on_special_released(state: &mut GameState) {
    let action = &mut state.player.action;
    action.must_release = false;
    match action.busy {
        Some(Busy::Casting) => action.busy = None,
        Some(Busy::Firing { .. }) => stop_firing(state),
        _ => {}
    }
}

/// Switch the current activation into the firing phase
fn start_firing(state: &mut GameState) {
    let action = &mut state.player.action;
    action.busy = Some(Busy::Firing {
        elapsed_ms: 0,
        pulses: 0,
    });
    action.anim = Anim::new(PoseAction::Fire);
    state.emit(GameEvent::sound(SoundCue::CasterBeam, Playback::Loop));
}

fn stop_firing(state: &mut GameState) {
    state.player.action.busy = None;
    state.emit(GameEvent::sound(SoundCue::CasterBeam, Playback::Stop));
}

/// Beam pulses and expiry while firing
///
/// Beam time only advances on ticks that run, so a pause freezes it. At most
/// one pulse lands per tick.
pub fn update_beam(state: &mut GameState) {
    let (elapsed, pulses) = match &state.player.action.busy {
        Some(Busy::Firing { elapsed_ms, pulses }) => (*elapsed_ms, *pulses),
        _ => return,
    };
    let tuning = &state.tuning;
    let (max_pulses, interval, duration, tick_ms) = (
        tuning.beam_pulses,
        tuning.beam_pulse_interval_ms,
        tuning.fire_duration_ms,
        tuning.tick_ms,
    );

    if elapsed > duration {
        stop_firing(state);
        state.player.action.must_release = true;
        return;
    }

    let due = pulses < max_pulses && elapsed >= u64::from(pulses) * interval;
    if due {
        combat::beam_pulse(state);
    }
    if let Some(Busy::Firing { elapsed_ms, pulses }) = &mut state.player.action.busy {
        *elapsed_ms += tick_ms;
        if due {
            *pulses += 1;
        }
    }
}

/// Float modifier: slow fall while held, with a periodic area pulse
pub fn update_float(state: &mut GameState, held: bool) {
    let player = &mut state.player;
    let airborne_falling = !player.body.grounded && player.body.vel.y >= 0.0;
    if !(player.profile.float && held && airborne_falling) {
        player.action.floating = false;
        player.action.float_timer = 0;
        return;
    }

    player.action.floating = true;
    player.action.float_timer += 1;
    if player.action.float_timer >= state.tuning.float_pulse_ticks {
        player.action.float_timer = 0;
        combat::float_pulse(state);
    }
}

/// Turn held directions and a jump press into velocity
pub fn apply_intent(state: &mut GameState, input: &TickInput) {
    let (speed, jump_power) = (state.tuning.move_speed, state.tuning.jump_power);
    let jump_pressed = input.jump && !state.prev_buttons.jump;
    let player = &mut state.player;
    let action = &mut player.action;

    if action.is_dashing() {
        player.body.vel = Vec2::ZERO;
        return;
    }

    let rooted = player.profile.rooted_while_busy && (action.is_attacking() || action.is_skilling());
    let dir = f32::from(i8::from(input.right) - i8::from(input.left));
    if rooted {
        player.body.vel.x = 0.0;
    } else {
        player.body.vel.x = dir * speed;
        if dir > 0.0 {
            action.facing = Facing::Right;
        } else if dir < 0.0 {
            action.facing = Facing::Left;
        }
    }

    if jump_pressed && player.body.grounded {
        player.body.vel.y = jump_power;
    }
}

/// Derived pose: busy modes first, then airborne, walking, idle
fn derive_action(player: &Player) -> PoseAction {
    match &player.action.busy {
        Some(Busy::Dashing { .. }) => PoseAction::Dash,
        Some(Busy::Skilling { .. }) => PoseAction::Skill,
        Some(Busy::Casting) => PoseAction::Cast,
        Some(Busy::Firing { .. }) => PoseAction::Fire,
        Some(Busy::Attacking) => PoseAction::Attack,
        None if !player.body.grounded => PoseAction::Jump,
        None if player.body.vel.x != 0.0 => PoseAction::Walk,
        None => PoseAction::Idle,
    }
}

fn anim_spec(profile: &ClassProfile, action: PoseAction) -> AnimSpec {
    match action {
        PoseAction::Idle => AnimSpec::new(4, 10),
        PoseAction::Walk => AnimSpec::new(6, 5),
        PoseAction::Jump | PoseAction::Dash => AnimSpec::new(1, 1),
        PoseAction::Attack => match profile.attack {
            AttackStyle::Melee { anim, .. } => anim,
            AttackStyle::Combo => AnimSpec::new(3, 5),
        },
        PoseAction::Cast => profile.cast.unwrap_or(AnimSpec::new(1, 1)),
        PoseAction::Fire => AnimSpec::new(4, 6),
        PoseAction::Skill => profile.skill.unwrap_or(AnimSpec::new(1, 1)),
    }
}

/// Advance the animation clock and apply animation-driven exits
pub fn advance_animation(state: &mut GameState) {
    let derived = derive_action(&state.player);
    update_footsteps(state, derived == PoseAction::Walk);

    let player = &mut state.player;
    let profile = player.profile;
    let anim = &mut player.action.anim;
    if anim.action != derived {
        *anim = Anim::new(derived);
    }

    let spec = anim_spec(&profile, anim.action);
    let frames = spec.frames.max(1);
    let mut completed = false;
    anim.timer += 1;
    if anim.timer >= spec.frame_ticks {
        anim.timer = 0;
        if anim.frame + 1 < frames {
            anim.frame += 1;
        } else {
            completed = true;
            if anim.action.loops() {
                anim.frame = 0;
            }
        }
    }
    let (action, frame) = (anim.action, anim.frame);

    match action {
        PoseAction::Attack if completed => {
            if let AttackStyle::Melee { .. } = profile.attack {
                player.action.busy = None;
            }
        }
        PoseAction::Cast if completed => start_firing(state),
        PoseAction::Skill if frame + 1 >= frames => {
            let activation = player.action.activation;
            let key = key_of(player, activation);
            if let Some(Busy::Skilling { end_pending, .. }) = &mut player.action.busy {
                if !*end_pending {
                    *end_pending = true;
                    let delay = state.tuning.skill_end_delay_ms;
                    state.defer(delay, Deferred::FinishSkill(key));
                }
            }
        }
        _ => {}
    }
}

fn update_footsteps(state: &mut GameState, walking: bool) {
    let Some(cue) = state.player.profile.footstep_cue else {
        return;
    };
    let action = &mut state.player.action;
    if action.footsteps == walking {
        return;
    }
    action.footsteps = walking;
    let playback = if walking {
        Playback::Loop
    } else {
        Playback::Pause
    };
    state.emit(GameEvent::sound(cue, playback));
}

/// Per-tick countdowns
pub fn tick_timers(player: &mut Player) {
    player.invincible = player.invincible.saturating_sub(1);
    let action = &mut player.action;
    action.attack_cooldown = action.attack_cooldown.saturating_sub(1);
    action.dash_cooldown = action.dash_cooldown.saturating_sub(1);
}

fn is_live(player: &Player, key: &ActivationKey) -> bool {
    key.incarnation == player.incarnation && key.activation == player.action.activation
}

/// Apply a due player deferred event if its activation is still current
pub fn handle_deferred(state: &mut GameState, deferred: &Deferred) {
    let combo_cooldown = state.tuning.combo_cooldown_ticks;
    let player = &mut state.player;
    match deferred {
        Deferred::EndComboAttack(key) if is_live(player, key) && player.action.is_attacking() => {
            let action = &mut player.action;
            action.busy = None;
            if action.combo_step >= 3 {
                action.combo_step = 1;
                action.attack_cooldown = combo_cooldown;
            } else {
                action.combo_step += 1;
            }
        }
        Deferred::CloseDashWindow(key)
            if key.incarnation == player.incarnation
                && player.action.dash_window == Some(key.activation) =>
        {
            player.action.dash_window = None;
        }
        Deferred::EndDash(key) if is_live(player, key) && player.action.is_dashing() => {
            player.action.busy = None;
        }
        Deferred::FinishSkill(key) if is_live(player, key) && player.action.is_skilling() => {
            player.action.busy = None;
        }
        other => log::trace!("Stale deferred {:?} ignored", other),
    }
}
