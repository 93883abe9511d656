//! Riftfall headless driver
//!
//! Plays a scripted run through the fixed-step loop, logging every outbound
//! event, then prints the final snapshot as JSON.
//!
//! Usage: `riftfall [tuning.json] [seed]`

#[cfg(not(target_arch = "wasm32"))]
use riftfall::consts::{DEFAULT_SEED, MAX_SUBSTEPS};
#[cfg(not(target_arch = "wasm32"))]
use riftfall::sim::{
    CharacterClass, GameEvent, GameState, Snapshot, StatChoice, TickInput, catalog::Catalog,
    tick,
};
#[cfg(not(target_arch = "wasm32"))]
use riftfall::{SimError, SimResult, Tuning};

/// Simulated display refresh driving the accumulator
#[cfg(not(target_arch = "wasm32"))]
const FRAME_MS: f64 = 1000.0 / 60.0;

/// One stretch of scripted input
#[cfg(not(target_arch = "wasm32"))]
struct Phase {
    label: &'static str,
    duration_ms: u64,
    input: TickInput,
}

#[cfg(not(target_arch = "wasm32"))]
fn phase(label: &'static str, duration_ms: u64, input: TickInput) -> Phase {
    Phase {
        label,
        duration_ms,
        input,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn script() -> Vec<Phase> {
    let walk_in = TickInput {
        right: true,
        interact: true,
        ..Default::default()
    };
    vec![
        phase("opening: walk to the portal", 5000, walk_in.clone()),
        phase("prologue: hold the line", 8000, TickInput::default()),
        phase(
            "sanctuary: pick a class",
            100,
            TickInput {
                class_choice: Some(CharacterClass::Caster),
                ..Default::default()
            },
        ),
        phase("sanctuary: leave", 5000, walk_in),
        phase(
            "stage 1: beam",
            2500,
            TickInput {
                special: true,
                ..Default::default()
            },
        ),
        phase(
            "stage 1: hop and float",
            3000,
            TickInput {
                right: true,
                jump: true,
                float: true,
                ..Default::default()
            },
        ),
        phase(
            "stage 1: level-up pick",
            100,
            TickInput {
                stat_choice: Some(StatChoice::Atk),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(not(target_arch = "wasm32"))]
fn log_event(tick: u64, event: &GameEvent) {
    match event {
        GameEvent::StageEntered(stage) => log::info!("[{}] entered {:?}", tick, stage),
        GameEvent::Notice(notice) => log::info!("[{}] {:?}", tick, notice),
        GameEvent::MonsterKilled { id, kind, exp } => {
            log::info!("[{}] {:?} #{} down (+{} exp)", tick, kind, id, exp)
        }
        other => log::debug!("[{}] {:?}", tick, other),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run(tuning: Tuning, seed: u64) -> SimResult<Snapshot> {
    let mut state = GameState::with_config(seed, tuning, Catalog::default())?;
    let tick_ms = state.tuning.tick_ms as f64;

    for Phase {
        label,
        duration_ms,
        mut input,
    } in script()
    {
        let ticks = state.tuning.ms_to_ticks(duration_ms);
        log::info!("Phase '{}' ({} ticks)", label, ticks);

        let mut accumulator = 0.0;
        let mut done = 0;
        while done < ticks {
            accumulator += FRAME_MS;
            let mut substeps = 0;
            while accumulator >= tick_ms && substeps < MAX_SUBSTEPS && done < ticks {
                tick(&mut state, &input);
                accumulator -= tick_ms;
                substeps += 1;
                done += 1;

                // UI events are one-shot
                input.equip_slot = None;
                input.stat_choice = None;
                input.class_choice = None;

                for event in state.drain_events() {
                    log_event(state.time_ticks, &event);
                }
            }
        }
    }

    Ok(state.snapshot())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Riftfall (headless) starting...");

    let mut args = std::env::args().skip(1);
    let tuning = match args.next() {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(SimError::from)
            .and_then(|json| Tuning::from_json(&json))
        {
            Ok(tuning) => tuning,
            Err(err) => {
                log::error!("Could not load tuning from {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => Tuning::default(),
    };
    let seed = match args.next().map(|s| s.parse::<u64>()) {
        Some(Ok(seed)) => seed,
        Some(Err(err)) => {
            log::warn!("Ignoring bad seed ({}); using default", err);
            DEFAULT_SEED
        }
        None => DEFAULT_SEED,
    };
    log::info!("Seed: {}", seed);

    let snapshot = match run(tuning, seed) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            log::error!("Run aborted: {}", err);
            std::process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("Snapshot serialization failed: {}", err),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is embedded by a host; there is no standalone wasm driver
}
