#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Enemy Down minigame.
//!
//! This crate defines the message surface that connects the host adapter, the
//! authoritative session state, and pure systems. The adapter submits
//! [`Command`] values describing desired session mutations, the world executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values for systems and the adapter to react to. Everything the game server
//! itself owns (entities, inventories, messaging, scheduling) is reached only
//! through the [`Host`] and [`Scheduler`] traits.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod host;

pub use host::{Host, HostError, Scheduler, TimerTask};

/// Length of a session measured in game time units (seconds).
pub const GAME_DURATION_SECS: u32 = 20;

/// Interval between two session ticks measured in game time units (seconds).
pub const TICK_INTERVAL_SECS: u32 = 5;

/// Maximum horizontal distance, per axis, between a player and a spawned opponent.
///
/// Offsets are drawn from the inclusive range `-SPAWN_OFFSET_RADIUS..=SPAWN_OFFSET_RADIUS`.
pub const SPAWN_OFFSET_RADIUS: i32 = 10;

/// Health and hunger value a participant is restored to before a session.
pub const FULL_VITALS: u32 = 20;

/// Session lifecycle phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Session exists in the registry but has not been started yet.
    Initializing,
    /// Timer is active; opponents spawn and kills are credited.
    Running,
    /// Remaining time ran out and the session awaits its final bookkeeping.
    Finalizing,
    /// Absorbing end state. Further finalize or abandon requests are no-ops.
    Terminated,
}

impl SessionPhase {
    /// Reports whether the session still owns a timer and live spawns.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Finalizing)
    }
}

/// Commands that express all permissible session mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Starts (or restarts) the session at the provided difficulty.
    Begin {
        /// Difficulty selected by the participant.
        difficulty: Difficulty,
    },
    /// Records the periodic task that drives the session.
    AttachTimer {
        /// Identifier returned by the scheduler.
        timer: TimerId,
    },
    /// Advances the session by one tick interval.
    Tick {
        /// Start epoch the firing timer was scheduled for.
        epoch: u64,
    },
    /// Adds a freshly spawned opponent to the session's live spawns.
    TrackOpponent {
        /// Start epoch of the run that requested the spawn.
        epoch: u64,
        /// Host identifier of the spawned opponent.
        opponent: OpponentId,
        /// Kind of opponent that was spawned.
        kind: OpponentKind,
    },
    /// Removes a dead opponent from the session's live spawns.
    ReleaseOpponent {
        /// Host identifier of the opponent that died.
        opponent: OpponentId,
    },
    /// Credits the session with the points awarded for a kill.
    CreditKill {
        /// Start epoch of the run the kill was attributed to.
        epoch: u64,
        /// Host identifier of the opponent that was killed.
        opponent: OpponentId,
        /// Kind of the killed opponent, which determines the points awarded.
        kind: OpponentKind,
    },
    /// Completes the session, surrendering its residual spawns and timer.
    Finalize {
        /// Start epoch of the run whose time expired.
        epoch: u64,
    },
    /// Terminates the session without completing it.
    Abandon,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Announces that a session entered the running phase.
    SessionStarted {
        /// Participant owning the session.
        player: PlayerId,
        /// Difficulty the session runs at.
        difficulty: Difficulty,
        /// Game time available to the participant.
        remaining_time: i64,
    },
    /// Reports that a running session was terminated without completing.
    SessionAbandoned {
        /// Participant owning the session.
        player: PlayerId,
        /// Opponents that were still alive and must be removed from the world.
        residual: Vec<OpponentId>,
        /// Periodic task that must be canceled, if one was attached.
        timer: Option<TimerId>,
    },
    /// Requests that one opponent be spawned for the session.
    SpawnDue {
        /// Participant owning the session.
        player: PlayerId,
        /// Start epoch of the run requesting the spawn.
        epoch: u64,
        /// Difficulty used to select the opponent kind.
        difficulty: Difficulty,
    },
    /// Indicates that the session clock advanced by one interval.
    TimeAdvanced {
        /// Participant owning the session.
        player: PlayerId,
        /// Game time left after the decrement. May be negative.
        remaining_time: i64,
    },
    /// Indicates that a tick observed no remaining time.
    TimeExpired {
        /// Participant owning the session.
        player: PlayerId,
        /// Start epoch of the run that expired.
        epoch: u64,
    },
    /// Confirms that a spawned opponent is tracked by the session.
    OpponentTracked {
        /// Participant owning the session.
        player: PlayerId,
        /// Host identifier of the opponent.
        opponent: OpponentId,
        /// Kind of the opponent.
        kind: OpponentKind,
    },
    /// Confirms that a tracked opponent left the session's live spawns.
    OpponentReleased {
        /// Participant owning the session.
        player: PlayerId,
        /// Host identifier of the opponent.
        opponent: OpponentId,
        /// Kind of the opponent.
        kind: OpponentKind,
    },
    /// Confirms that points were added to the session score.
    KillCredited {
        /// Participant owning the session.
        player: PlayerId,
        /// Host identifier of the killed opponent.
        opponent: OpponentId,
        /// Points awarded for the kill.
        points: u32,
        /// Session score after the credit.
        score: u32,
    },
    /// Reports that a session completed and must be reported and persisted.
    SessionFinished {
        /// Participant owning the session.
        player: PlayerId,
        /// Difficulty the session ran at.
        difficulty: Difficulty,
        /// Final score.
        score: u32,
        /// Opponents that were still alive and must be removed from the world.
        residual: Vec<OpponentId>,
        /// Periodic task that must be canceled, if one was attached.
        timer: Option<TimerId>,
    },
}

/// Opaque stable identifier of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Host-assigned identifier of a spawned opponent instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpponentId(u64);

impl OpponentId {
    /// Creates a new opponent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Scheduler-assigned identifier of a periodic task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Creates a new timer identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Player taking part in a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Participant {
    /// Stable identity used to key the session registry.
    pub id: PlayerId,
    /// Display name recorded in score records.
    pub name: String,
}

impl Participant {
    /// Creates a participant from an identifier and display name.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Location in the host world. `y` is the vertical axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the position shifted horizontally by whole-block offsets.
    #[must_use]
    pub fn offset_horizontal(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + f64::from(dx),
            y: self.y,
            z: self.z + f64::from(dz),
        }
    }
}

/// Difficulty tiers a participant can choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Zombies only, iron equipment.
    Easy,
    /// Zombies and skeletons, diamond equipment.
    Normal,
    /// Zombies, skeletons and witches, netherite equipment.
    Hard,
}

impl Difficulty {
    /// Every difficulty in ascending order.
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// Command-line tag of the difficulty.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }

    /// Opponent kinds the spawner may draw from at this difficulty.
    #[must_use]
    pub const fn eligible_kinds(self) -> &'static [OpponentKind] {
        match self {
            Self::Easy => &[OpponentKind::Zombie],
            Self::Normal => &[OpponentKind::Zombie, OpponentKind::Skeleton],
            Self::Hard => &[
                OpponentKind::Zombie,
                OpponentKind::Skeleton,
                OpponentKind::Witch,
            ],
        }
    }

    /// Equipment tier handed to the participant at this difficulty.
    #[must_use]
    pub const fn equipment_tier(self) -> EquipmentTier {
        match self {
            Self::Easy => EquipmentTier::Iron,
            Self::Normal => EquipmentTier::Diamond,
            Self::Hard => EquipmentTier::Netherite,
        }
    }

    /// Full loadout handed to the participant at this difficulty.
    #[must_use]
    pub const fn loadout(self) -> Loadout {
        Loadout::of_tier(self.equipment_tier())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a difficulty tag is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown difficulty `{0}`; expected one of easy, normal, hard")]
pub struct ParseDifficultyError(pub String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            other => Err(ParseDifficultyError(other.to_owned())),
        }
    }
}

/// Kinds of hostile entities the host can report.
///
/// Only the first three are ever spawned by a session; the rest exist so that
/// deaths of unrelated hostiles can be described and score nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpponentKind {
    /// Common opponent.
    Zombie,
    /// Elevated ranged opponent.
    Skeleton,
    /// Elevated potion-throwing opponent.
    Witch,
    /// Unlisted opponent.
    Spider,
    /// Unlisted opponent.
    Creeper,
    /// Unlisted opponent.
    Enderman,
}

impl OpponentKind {
    /// Every opponent kind the host can report.
    pub const ALL: [OpponentKind; 6] = [
        Self::Zombie,
        Self::Skeleton,
        Self::Witch,
        Self::Spider,
        Self::Creeper,
        Self::Enderman,
    ];

    /// Points awarded for killing an opponent of this kind.
    #[must_use]
    pub const fn points(self) -> u32 {
        match self {
            Self::Zombie => 10,
            Self::Skeleton | Self::Witch => 20,
            Self::Spider | Self::Creeper | Self::Enderman => 0,
        }
    }
}

/// Material tier of the equipment handed out before a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EquipmentTier {
    /// Iron gear.
    Iron,
    /// Diamond gear.
    Diamond,
    /// Netherite gear.
    Netherite,
}

/// Inventory slots populated by a loadout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EquipmentSlot {
    /// Head armor slot.
    Helmet,
    /// Chest armor slot.
    Chestplate,
    /// Leg armor slot.
    Leggings,
    /// Foot armor slot.
    Boots,
    /// Weapon held in the main hand.
    MainHand,
}

impl EquipmentSlot {
    /// Every slot a loadout fills, in equip order.
    pub const ALL: [EquipmentSlot; 5] = [
        Self::Helmet,
        Self::Chestplate,
        Self::Leggings,
        Self::Boots,
        Self::MainHand,
    ];
}

/// Full set of equipment handed to a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Loadout {
    tier: EquipmentTier,
}

impl Loadout {
    /// Creates a loadout made entirely of the provided tier.
    #[must_use]
    pub const fn of_tier(tier: EquipmentTier) -> Self {
        Self { tier }
    }

    /// Material tier of every item in the loadout.
    #[must_use]
    pub const fn tier(&self) -> EquipmentTier {
        self.tier
    }

    /// Slot and tier pairs, one per equipped item.
    pub fn items(&self) -> impl Iterator<Item = (EquipmentSlot, EquipmentTier)> {
        let tier = self.tier;
        EquipmentSlot::ALL.into_iter().map(move |slot| (slot, tier))
    }
}

/// Death notification delivered by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpponentDeath {
    /// Host identifier of the entity that died.
    pub opponent: OpponentId,
    /// Kind of the entity that died.
    pub kind: OpponentKind,
    /// Player credited with the kill, if any.
    pub killer: Option<PlayerId>,
}

/// Persisted outcome of one completed session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Identifier assigned by the store.
    pub id: u64,
    /// Display name of the participant.
    pub player_name: String,
    /// Final score.
    pub score: u32,
    /// Difficulty the session ran at.
    pub difficulty: Difficulty,
    /// Local time the record was written.
    pub registered_at: NaiveDateTime,
}

/// Score record awaiting insertion; the store assigns the identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewScoreRecord {
    /// Display name of the participant.
    pub player_name: String,
    /// Final score.
    pub score: u32,
    /// Difficulty the session ran at.
    pub difficulty: Difficulty,
    /// Explicit timestamp; the store uses the current local time when absent.
    pub registered_at: Option<NaiveDateTime>,
}

impl NewScoreRecord {
    /// Creates a record stamped at insertion time.
    #[must_use]
    pub fn new(player_name: impl Into<String>, score: u32, difficulty: Difficulty) -> Self {
        Self {
            player_name: player_name.into(),
            score,
            difficulty,
            registered_at: None,
        }
    }
}

/// Read-only snapshot of which session owns each live spawn.
#[derive(Clone, Debug, Default)]
pub struct SessionRosterView {
    owners: Vec<(OpponentId, PlayerId)>,
    running: Vec<(PlayerId, u64)>,
}

impl SessionRosterView {
    /// Creates a roster view from spawn ownership pairs and the start epoch
    /// of every running player's session.
    #[must_use]
    pub fn new(
        mut owners: Vec<(OpponentId, PlayerId)>,
        mut running: Vec<(PlayerId, u64)>,
    ) -> Self {
        owners.sort_unstable_by_key(|(opponent, _)| *opponent);
        running.sort_unstable_by_key(|(player, _)| *player);
        running.dedup_by_key(|(player, _)| *player);
        Self { owners, running }
    }

    /// Returns the player whose session tracks the opponent, if any.
    #[must_use]
    pub fn owner_of(&self, opponent: OpponentId) -> Option<PlayerId> {
        self.owners
            .binary_search_by_key(&opponent, |(tracked, _)| *tracked)
            .ok()
            .map(|index| self.owners[index].1)
    }

    /// Reports whether the player currently owns a running session.
    #[must_use]
    pub fn is_running(&self, player: PlayerId) -> bool {
        self.running_epoch(player).is_some()
    }

    /// Start epoch of the player's running session, if any.
    #[must_use]
    pub fn running_epoch(&self, player: PlayerId) -> Option<u64> {
        self.running
            .binary_search_by_key(&player, |(running, _)| *running)
            .ok()
            .map(|index| self.running[index].1)
    }

    /// Number of opponents tracked across all sessions.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.owners.len()
    }
}
