#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state management for Enemy Down.
//!
//! A [`Session`] only changes through [`apply`], which validates each
//! [`Command`] against the current [`SessionPhase`] and reports what happened
//! as [`Event`] values. The [`Registry`] keys sessions by participant and hands
//! out [`SessionHandle`]s so that timer callbacks and death notifications
//! arriving on different threads serialize on the same per-session lock.

use std::{collections::BTreeMap, mem};

use enemy_down_core::{
    Command, Difficulty, Event, OpponentId, OpponentKind, Participant, PlayerId, SessionPhase,
    TimerId, GAME_DURATION_SECS, TICK_INTERVAL_SECS,
};

mod registry;

pub use registry::{lock, Registry, SessionHandle};

/// Timing parameters shared by every session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    duration: u32,
    tick_interval: u32,
}

impl SessionConfig {
    /// Creates a configuration from a session length and tick interval, both in game seconds.
    #[must_use]
    pub const fn new(duration: u32, tick_interval: u32) -> Self {
        Self {
            duration,
            tick_interval,
        }
    }

    /// Game time granted to a freshly started session.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.duration
    }

    /// Game time consumed by every tick.
    #[must_use]
    pub const fn tick_interval(&self) -> u32 {
        self.tick_interval
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(GAME_DURATION_SECS, TICK_INTERVAL_SECS)
    }
}

/// One participant's timed challenge.
#[derive(Debug)]
pub struct Session {
    participant: Participant,
    config: SessionConfig,
    phase: SessionPhase,
    difficulty: Option<Difficulty>,
    remaining_time: i64,
    score: u32,
    live_spawns: BTreeMap<OpponentId, OpponentKind>,
    epoch: u64,
    timer: Option<TimerId>,
}

impl Session {
    /// Creates a session that has not been started yet.
    #[must_use]
    pub fn new(participant: Participant, config: SessionConfig) -> Self {
        Self {
            participant,
            config,
            phase: SessionPhase::Initializing,
            difficulty: None,
            remaining_time: 0,
            score: 0,
            live_spawns: BTreeMap::new(),
            epoch: 0,
            timer: None,
        }
    }

    /// Participant owning the session.
    #[must_use]
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Identity of the participant owning the session.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.participant.id
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Difficulty of the current or last run; `None` before the first start.
    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    /// Game time left. Becomes zero or negative on the last tick.
    #[must_use]
    pub fn remaining_time(&self) -> i64 {
        self.remaining_time
    }

    /// Points accumulated during the current or last run.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Start counter; ticks carrying an older epoch are ignored.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Periodic task currently attached to the session.
    #[must_use]
    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Reports whether the opponent was spawned by this session and is still alive.
    #[must_use]
    pub fn tracks(&self, opponent: OpponentId) -> bool {
        self.live_spawns.contains_key(&opponent)
    }

    /// Live spawns in ascending identifier order.
    pub fn live_spawns(&self) -> impl Iterator<Item = (OpponentId, OpponentKind)> + '_ {
        self.live_spawns
            .iter()
            .map(|(opponent, kind)| (*opponent, *kind))
    }

    pub(crate) fn rename(&mut self, name: &str) {
        if self.participant.name != name {
            self.participant.name = name.to_owned();
        }
    }

    fn surrender(&mut self) -> (Vec<OpponentId>, Option<TimerId>) {
        let residual = mem::take(&mut self.live_spawns).into_keys().collect();
        (residual, self.timer.take())
    }

    fn finish(&mut self, out_events: &mut Vec<Event>) {
        let Some(difficulty) = self.difficulty else {
            return;
        };
        let (residual, timer) = self.surrender();
        self.phase = SessionPhase::Terminated;
        out_events.push(Event::SessionFinished {
            player: self.player(),
            difficulty,
            score: self.score,
            residual,
            timer,
        });
    }

    fn abandon(&mut self, out_events: &mut Vec<Event>) {
        let (residual, timer) = self.surrender();
        self.phase = SessionPhase::Terminated;
        out_events.push(Event::SessionAbandoned {
            player: self.player(),
            residual,
            timer,
        });
    }

    fn accepts(&self, epoch: u64) -> bool {
        self.phase == SessionPhase::Running && self.epoch == epoch
    }
}

/// Applies the provided command to the session, mutating state deterministically.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    let player = session.player();
    match command {
        Command::Begin { difficulty } => {
            // An expired run is complete even if its finalization has not landed yet.
            match session.phase {
                SessionPhase::Running => session.abandon(out_events),
                SessionPhase::Finalizing => session.finish(out_events),
                SessionPhase::Initializing | SessionPhase::Terminated => {}
            }

            session.epoch = session.epoch.wrapping_add(1);
            session.difficulty = Some(difficulty);
            session.score = 0;
            session.remaining_time = i64::from(session.config.duration);
            session.phase = SessionPhase::Running;
            out_events.push(Event::SessionStarted {
                player,
                difficulty,
                remaining_time: session.remaining_time,
            });
        }
        Command::AttachTimer { timer } => {
            if session.phase == SessionPhase::Running {
                session.timer = Some(timer);
            }
        }
        Command::Tick { epoch } => {
            if !session.accepts(epoch) {
                log::debug!(
                    "ignoring tick for {player}: phase {:?}, epoch {epoch} (current {})",
                    session.phase,
                    session.epoch
                );
                return;
            }

            if session.remaining_time <= 0 {
                session.phase = SessionPhase::Finalizing;
                out_events.push(Event::TimeExpired { player, epoch });
                return;
            }

            let Some(difficulty) = session.difficulty else {
                return;
            };
            out_events.push(Event::SpawnDue {
                player,
                epoch,
                difficulty,
            });
            session.remaining_time -= i64::from(session.config.tick_interval);
            out_events.push(Event::TimeAdvanced {
                player,
                remaining_time: session.remaining_time,
            });
        }
        Command::TrackOpponent {
            epoch,
            opponent,
            kind,
        } => {
            if !session.accepts(epoch) {
                return;
            }
            let _ = session.live_spawns.insert(opponent, kind);
            out_events.push(Event::OpponentTracked {
                player,
                opponent,
                kind,
            });
        }
        Command::ReleaseOpponent { opponent } => {
            if let Some(kind) = session.live_spawns.remove(&opponent) {
                out_events.push(Event::OpponentReleased {
                    player,
                    opponent,
                    kind,
                });
            }
        }
        Command::CreditKill {
            epoch,
            opponent,
            kind,
        } => {
            if !session.accepts(epoch) {
                return;
            }
            let points = kind.points();
            session.score = session.score.saturating_add(points);
            out_events.push(Event::KillCredited {
                player,
                opponent,
                points,
                score: session.score,
            });
        }
        Command::Finalize { epoch } => {
            if !session.phase.is_live() || epoch != session.epoch {
                log::debug!(
                    "ignoring finalize for {player}: phase {:?}, epoch {epoch} (current {})",
                    session.phase,
                    session.epoch
                );
                return;
            }
            session.finish(out_events);
        }
        Command::Abandon => {
            if session.phase.is_live() {
                session.abandon(out_events);
            }
        }
    }
}

/// Query functions that provide read-only access to session state.
pub mod query {
    use enemy_down_core::{Difficulty, OpponentId, PlayerId, SessionPhase, SessionRosterView};

    use super::{lock, Registry, Session};

    /// Immutable copy of a session's observable state.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct SessionSnapshot {
        /// Identity of the participant.
        pub player: PlayerId,
        /// Display name of the participant.
        pub name: String,
        /// Lifecycle phase at capture time.
        pub phase: SessionPhase,
        /// Difficulty of the current or last run.
        pub difficulty: Option<Difficulty>,
        /// Game time left.
        pub remaining_time: i64,
        /// Points accumulated so far.
        pub score: u32,
        /// Opponents still tracked, in ascending identifier order.
        pub live_spawns: Vec<OpponentId>,
    }

    /// Captures a snapshot of a single session.
    #[must_use]
    pub fn snapshot(session: &Session) -> SessionSnapshot {
        SessionSnapshot {
            player: session.player(),
            name: session.participant().name.clone(),
            phase: session.phase(),
            difficulty: session.difficulty(),
            remaining_time: session.remaining_time(),
            score: session.score(),
            live_spawns: session.live_spawns().map(|(opponent, _)| opponent).collect(),
        }
    }

    /// Captures a snapshot of the participant's registered session, if any.
    #[must_use]
    pub fn session(registry: &Registry, player: PlayerId) -> Option<SessionSnapshot> {
        registry
            .get(player)
            .map(|handle| snapshot(&lock(&handle)))
    }

    /// Captures which session owns every live spawn and which players are running.
    #[must_use]
    pub fn roster(registry: &Registry) -> SessionRosterView {
        let mut owners = Vec::new();
        let mut running = Vec::new();
        for handle in registry.handles() {
            let session = lock(&handle);
            if session.phase() != SessionPhase::Running {
                continue;
            }
            running.push((session.player(), session.epoch()));
            owners.extend(
                session
                    .live_spawns()
                    .map(|(opponent, _)| (opponent, session.player())),
            );
        }
        SessionRosterView::new(owners, running)
    }
}
