//! Data-driven game balance
//!
//! Every timing window, multiplier and physics constant the simulation reads
//! lives here. Defaults reproduce the shipped balance; a JSON blob may
//! override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Balance and physics constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Clock ===
    /// Fixed tick period in milliseconds
    pub tick_ms: u64,

    // === World / physics ===
    /// Edge length of one tile in world units
    pub tile_size: f32,
    /// Downward acceleration per tick
    pub gravity: f32,
    /// Gravity scale while the float modifier is active
    pub float_gravity_factor: f32,
    /// Horizontal walk speed per tick
    pub move_speed: f32,
    /// Initial vertical velocity of a jump (negative is up)
    pub jump_power: f32,

    // === Player defense ===
    /// Ticks of invincibility after taking a hit
    pub invincibility_ticks: u32,

    // === Engineer dash ===
    pub dash_range: f32,
    pub dash_duration_ms: u64,
    pub dash_cooldown_ticks: u32,
    /// How long an attack keeps the dash-cancel window open
    pub dash_window_ms: u64,
    /// Max gap between two same-direction key-downs
    pub double_tap_ms: u64,
    pub dash_multiplier: f32,

    // === Marksman combo / skill ===
    pub combo_reset_ms: u64,
    pub combo_step_ms: u64,
    pub combo_finisher_ms: u64,
    pub combo_cooldown_ticks: u32,
    pub marksman_range: f32,
    pub skill_multiplier: f32,
    pub skill_end_delay_ms: u64,

    // === Caster beam / float ===
    pub fire_duration_ms: u64,
    pub beam_pulse_interval_ms: u64,
    pub beam_pulses: u32,
    pub beam_range: f32,
    pub beam_multiplier: f32,
    pub float_pulse_ticks: u32,
    pub float_radius: f32,
    pub float_multiplier: f32,

    // === Melee ===
    pub knockback: f32,

    // === Rewards ===
    /// Probability that a kill drops an item
    pub drop_chance: f64,
    /// maxExp multiplier applied on level-up
    pub exp_growth: f32,
    pub level_up_atk: i32,
    pub level_up_def: i32,

    // === Boss ===
    pub boss_shot_cooldown_ms: u64,
    pub projectile_speed: f32,
    pub projectile_lifetime_ms: u64,
    pub projectile_damage: i32,
    /// Boss pattern and projectiles update on every Nth tick
    pub boss_update_every: u64,

    // === Monster AI ===
    pub chase_deadzone: f32,

    // === Stage flow ===
    pub restart_delay_ms: u64,
    pub prologue_exit_delay_ms: u64,
    pub prologue_hp_floor: i32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tick_ms: 16,

            tile_size: 40.0,
            gravity: 0.8,
            float_gravity_factor: 0.2,
            move_speed: 6.0,
            jump_power: -15.0,

            invincibility_ticks: 30,

            dash_range: 200.0,
            dash_duration_ms: 300,
            dash_cooldown_ticks: 15,
            dash_window_ms: 500,
            double_tap_ms: 300,
            dash_multiplier: 1.5,

            combo_reset_ms: 1000,
            combo_step_ms: 250,
            combo_finisher_ms: 300,
            combo_cooldown_ticks: 10,
            marksman_range: 350.0,
            skill_multiplier: 1.5,
            skill_end_delay_ms: 120,

            fire_duration_ms: 2000,
            beam_pulse_interval_ms: 900,
            beam_pulses: 3,
            beam_range: 400.0,
            beam_multiplier: 0.7,
            float_pulse_ticks: 30,
            float_radius: 120.0,
            float_multiplier: 0.8,

            knockback: 20.0,

            drop_chance: 0.3,
            exp_growth: 1.2,
            level_up_atk: 5,
            level_up_def: 2,

            boss_shot_cooldown_ms: 3500,
            projectile_speed: 14.0,
            projectile_lifetime_ms: 5000,
            projectile_damage: 20,
            boss_update_every: 3,

            chase_deadzone: 2.0,

            restart_delay_ms: 1200,
            prologue_exit_delay_ms: 800,
            prologue_hp_floor: 10,
        }
    }
}

impl Tuning {
    /// Parse tuning overrides from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> SimResult<Self> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        log::info!("Loaded tuning overrides");
        Ok(tuning)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would stall or divide the simulation by zero
    pub fn validate(&self) -> SimResult<()> {
        if self.tick_ms == 0 {
            return Err(SimError::InvalidTuning("tick_ms must be positive".into()));
        }
        if self.tile_size <= 0.0 {
            return Err(SimError::InvalidTuning("tile_size must be positive".into()));
        }
        if self.boss_update_every == 0 {
            return Err(SimError::InvalidTuning(
                "boss_update_every must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.drop_chance) {
            return Err(SimError::InvalidTuning(format!(
                "drop_chance {} outside [0, 1]",
                self.drop_chance
            )));
        }
        if self.exp_growth < 1.0 {
            return Err(SimError::InvalidTuning("exp_growth below 1.0".into()));
        }
        Ok(())
    }

    /// Convert a duration to whole ticks, rounding up
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms.div_ceil(self.tick_ms)
    }
}
