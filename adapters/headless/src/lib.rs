#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! In-process game server used to drive Enemy Down without a real host.
//!
//! [`HeadlessHost`] keeps players and entities in memory and records every
//! message and title it is asked to deliver. [`ManualScheduler`] runs periodic
//! tasks against a virtual clock that only moves when [`ManualScheduler::advance`]
//! is called.

mod scheduler;

pub use scheduler::ManualScheduler;

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use enemy_down_core::{
    Host, HostError, Loadout, OpponentId, OpponentKind, PlayerId, Position, FULL_VITALS,
};

/// Observable state of a player connected to the headless host.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerState {
    /// Current location.
    pub position: Position,
    /// Health points.
    pub health: u32,
    /// Hunger points.
    pub food: u32,
    /// Names of active status effects.
    pub status_effects: Vec<String>,
    /// Equipment most recently handed out.
    pub loadout: Option<Loadout>,
    /// Chat messages received, oldest first.
    pub messages: Vec<String>,
    /// Title announcements received as `(title, subtitle)`, oldest first.
    pub titles: Vec<(String, String)>,
}

impl PlayerState {
    fn at(position: Position) -> Self {
        Self {
            position,
            health: FULL_VITALS,
            food: FULL_VITALS,
            status_effects: Vec::new(),
            loadout: None,
            messages: Vec::new(),
            titles: Vec::new(),
        }
    }
}

/// Hostile entity alive in the headless world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entity {
    /// Instance identifier.
    pub id: OpponentId,
    /// Entity kind.
    pub kind: OpponentKind,
    /// Location the entity was created at.
    pub position: Position,
}

#[derive(Debug, Default)]
struct World {
    players: BTreeMap<PlayerId, PlayerState>,
    entities: BTreeMap<OpponentId, Entity>,
    next_entity: u64,
    spawn_failure: Option<String>,
}

/// Memory-backed [`Host`] implementation.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    world: Mutex<World>,
}

impl HeadlessHost {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a player at the provided location, replacing any previous state.
    pub fn join(&self, player: PlayerId, position: Position) {
        let _ = self.world().players.insert(player, PlayerState::at(position));
    }

    /// Disconnects a player. Their messages are discarded.
    pub fn leave(&self, player: PlayerId) {
        let _ = self.world().players.remove(&player);
    }

    /// Moves a connected player.
    pub fn teleport(&self, player: PlayerId, position: Position) {
        if let Some(state) = self.world().players.get_mut(&player) {
            state.position = position;
        }
    }

    /// Overrides a connected player's health and hunger.
    pub fn set_vitals(&self, player: PlayerId, health: u32, food: u32) {
        if let Some(state) = self.world().players.get_mut(&player) {
            state.health = health;
            state.food = food;
        }
    }

    /// Applies a named status effect to a connected player.
    pub fn add_status_effect(&self, player: PlayerId, effect: &str) {
        if let Some(state) = self.world().players.get_mut(&player) {
            state.status_effects.push(effect.to_owned());
        }
    }

    /// Makes every subsequent spawn fail with `reason`, or succeed again with `None`.
    pub fn fail_spawns(&self, reason: Option<&str>) {
        self.world().spawn_failure = reason.map(str::to_owned);
    }

    /// Creates an entity that no session asked for, such as a natural spawn.
    pub fn spawn_wild(&self, kind: OpponentKind, at: Position) -> OpponentId {
        insert_entity(&mut self.world(), kind, at)
    }

    /// Removes a living entity as if it died, returning it.
    pub fn kill(&self, opponent: OpponentId) -> Option<Entity> {
        self.world().entities.remove(&opponent)
    }

    /// Snapshot of a connected player's state.
    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<PlayerState> {
        self.world().players.get(&player).cloned()
    }

    /// Every living entity in identifier order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.world().entities.values().copied().collect()
    }

    /// Reports whether the entity is still alive.
    #[must_use]
    pub fn is_alive(&self, opponent: OpponentId) -> bool {
        self.world().entities.contains_key(&opponent)
    }

    /// Chat messages delivered to the player, oldest first.
    #[must_use]
    pub fn messages(&self, player: PlayerId) -> Vec<String> {
        self.world()
            .players
            .get(&player)
            .map(|state| state.messages.clone())
            .unwrap_or_default()
    }

    /// Title announcements delivered to the player, oldest first.
    #[must_use]
    pub fn titles(&self, player: PlayerId) -> Vec<(String, String)> {
        self.world()
            .players
            .get(&player)
            .map(|state| state.titles.clone())
            .unwrap_or_default()
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert_entity(world: &mut World, kind: OpponentKind, position: Position) -> OpponentId {
    world.next_entity += 1;
    let id = OpponentId::new(world.next_entity);
    let _ = world.entities.insert(id, Entity { id, kind, position });
    id
}

impl Host for HeadlessHost {
    fn position_of(&self, player: PlayerId) -> Option<Position> {
        self.world().players.get(&player).map(|state| state.position)
    }

    fn reset_vitals(&self, player: PlayerId) {
        self.set_vitals(player, FULL_VITALS, FULL_VITALS);
    }

    fn clear_status_effects(&self, player: PlayerId) {
        if let Some(state) = self.world().players.get_mut(&player) {
            state.status_effects.clear();
        }
    }

    fn equip(&self, player: PlayerId, loadout: &Loadout) {
        if let Some(state) = self.world().players.get_mut(&player) {
            state.loadout = Some(*loadout);
        }
    }

    fn spawn_opponent(&self, kind: OpponentKind, at: Position) -> Result<OpponentId, HostError> {
        let mut world = self.world();
        if let Some(reason) = world.spawn_failure.clone() {
            return Err(HostError::SpawnRejected { kind, reason });
        }
        Ok(insert_entity(&mut world, kind, at))
    }

    fn remove_opponent(&self, opponent: OpponentId) {
        let _ = self.world().entities.remove(&opponent);
    }

    fn send_message(&self, player: PlayerId, text: &str) {
        match self.world().players.get_mut(&player) {
            Some(state) => state.messages.push(text.to_owned()),
            None => log::debug!("dropping message for offline {player}: {text}"),
        }
    }

    fn send_title(&self, player: PlayerId, title: &str, subtitle: &str) {
        match self.world().players.get_mut(&player) {
            Some(state) => state.titles.push((title.to_owned(), subtitle.to_owned())),
            None => log::debug!("dropping title for offline {player}: {title}"),
        }
    }
}
