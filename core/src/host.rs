//! Boundary between the minigame and the game server that hosts it.
//!
//! The host owns the world, the participants' inventories and the chat/title
//! channels; the minigame only ever asks it to perform side effects. Both
//! traits are object-safe and `Send + Sync` because the host invokes timer
//! callbacks and death notifications from its own threads.

use std::time::Duration;

use thiserror::Error;

use crate::{Loadout, OpponentId, OpponentKind, PlayerId, Position, TimerId};

/// Callback invoked on every firing of a periodic task.
pub type TimerTask = Box<dyn FnMut() + Send + 'static>;

/// Failures reported by the host when a side effect cannot be performed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    /// The world refused to create the entity.
    #[error("world refused to spawn {kind:?}: {reason}")]
    SpawnRejected {
        /// Kind of opponent that was requested.
        kind: OpponentKind,
        /// Host-provided explanation.
        reason: String,
    },
}

/// Side effects the minigame requests from the game server.
pub trait Host: Send + Sync {
    /// Current location of the participant, if they are online.
    fn position_of(&self, player: PlayerId) -> Option<Position>;

    /// Restores health and hunger to [`crate::FULL_VITALS`].
    fn reset_vitals(&self, player: PlayerId);

    /// Removes every active status effect from the participant.
    fn clear_status_effects(&self, player: PlayerId);

    /// Replaces the participant's armor and main-hand item.
    fn equip(&self, player: PlayerId, loadout: &Loadout);

    /// Creates a hostile entity and returns its instance identifier.
    fn spawn_opponent(&self, kind: OpponentKind, at: Position) -> Result<OpponentId, HostError>;

    /// Removes an entity from the world. Unknown or dead entities are ignored.
    fn remove_opponent(&self, opponent: OpponentId);

    /// Sends a transient chat message to the participant.
    fn send_message(&self, player: PlayerId, text: &str);

    /// Shows a prominent title announcement to the participant.
    fn send_title(&self, player: PlayerId, title: &str, subtitle: &str);
}

/// Periodic-callback primitive provided by the game server.
pub trait Scheduler: Send + Sync {
    /// Registers `task` to run immediately and then once every `period`.
    fn schedule_repeating(&self, period: Duration, task: TimerTask) -> TimerId;

    /// Stops a periodic task. Returns `false` when the task was already
    /// canceled or never existed; cancelling twice is not an error.
    fn cancel(&self, timer: TimerId) -> bool;
}
