#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawning system that turns due spawns into concrete opponent requests.

use enemy_down_core::{
    Difficulty, Event, OpponentKind, PlayerId, Position, SPAWN_OFFSET_RADIUS,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    spawn_radius: i32,
    rng_seed: Option<u64>,
}

impl Config {
    /// Creates a new configuration. A `None` seed draws one from the OS.
    #[must_use]
    pub const fn new(spawn_radius: i32, rng_seed: Option<u64>) -> Self {
        Self {
            spawn_radius,
            rng_seed,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(SPAWN_OFFSET_RADIUS, None)
    }
}

/// Opponent the host should create on behalf of a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequest {
    /// Participant whose session requested the spawn.
    pub player: PlayerId,
    /// Start epoch of the run that requested the spawn.
    pub epoch: u64,
    /// Kind of opponent to create.
    pub kind: OpponentKind,
    /// Location to create the opponent at.
    pub position: Position,
}

/// Offsets `origin` horizontally by two independent draws from `-radius..=radius`.
///
/// The vertical coordinate is unchanged. Negative radii are treated as zero.
pub fn pick_spawn_point<R: Rng + ?Sized>(origin: Position, radius: i32, rng: &mut R) -> Position {
    let radius = radius.max(0);
    let dx = rng.gen_range(-radius..=radius);
    let dz = rng.gen_range(-radius..=radius);
    origin.offset_horizontal(dx, dz)
}

/// Draws an opponent kind uniformly from the difficulty's eligible kinds.
pub fn pick_opponent<R: Rng + ?Sized>(difficulty: Difficulty, rng: &mut R) -> OpponentKind {
    let kinds = difficulty.eligible_kinds();
    kinds[rng.gen_range(0..kinds.len())]
}

/// System that emits one spawn request per `Event::SpawnDue`.
#[derive(Debug)]
pub struct Spawning {
    spawn_radius: i32,
    rng: ChaCha8Rng,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            spawn_radius: config.spawn_radius,
            rng,
        }
    }

    /// Consumes session events and emits spawn requests around each participant.
    ///
    /// `locate` resolves a participant's current position; participants that
    /// cannot be located are skipped.
    pub fn handle<F>(&mut self, events: &[Event], mut locate: F, out: &mut Vec<SpawnRequest>)
    where
        F: FnMut(PlayerId) -> Option<Position>,
    {
        for event in events {
            let Event::SpawnDue {
                player,
                epoch,
                difficulty,
            } = *event
            else {
                continue;
            };

            let Some(origin) = locate(player) else {
                log::warn!("skipping spawn for {player}: position unavailable");
                continue;
            };

            let kind = pick_opponent(difficulty, &mut self.rng);
            let position = pick_spawn_point(origin, self.spawn_radius, &mut self.rng);
            out.push(SpawnRequest {
                player,
                epoch,
                kind,
                position,
            });
        }
    }
}
