#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Enemy Down bound to a game server.
//!
//! [`EnemyDown`] receives command invocations and death notifications from the
//! host, drives sessions through the world crate and turns the resulting events
//! into host side effects. Timer callbacks hold only a weak reference to the
//! plugin state, so dropping the plugin stops every session from advancing.

pub mod command;
pub mod config;
pub mod messages;
mod recorder;

use std::{
    io,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use enemy_down_core::{
    Command, Difficulty, Event, Host, NewScoreRecord, OpponentDeath, OpponentId, Participant,
    PlayerId, Scheduler, SessionPhase, TimerId, TimerTask,
};
use enemy_down_score_store::{format_listing, ScoreStore};
use enemy_down_system_kill_attribution::{Attribution, IgnoreReason, KillAttribution};
use enemy_down_system_spawning::Spawning;
use enemy_down_world::{apply, lock, query, Registry, Session, SessionHandle};
use thiserror::Error;

pub use command::{CommandOutcome, CommandSender, Invocation, InvocationError};
pub use config::{ConfigError, GameConfig, PluginConfig, StoreConfig};

use recorder::ScoreRecorder;

/// Failures raised while enabling the plugin.
#[derive(Debug, Error)]
pub enum EnableError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The background score recorder could not be started.
    #[error("failed to start the score recorder: {0}")]
    Recorder(#[source] io::Error),
}

/// The minigame, generic over the host and its scheduler.
pub struct EnemyDown<H, S>
where
    H: Host + 'static,
    S: Scheduler + 'static,
{
    shared: Arc<Shared<H, S>>,
}

struct Shared<H, S> {
    host: Arc<H>,
    scheduler: Arc<S>,
    registry: Registry,
    spawning: Mutex<Spawning>,
    attribution: Mutex<KillAttribution>,
    store: Arc<dyn ScoreStore>,
    recorder: ScoreRecorder,
    tick_period: Duration,
}

impl<H, S> EnemyDown<H, S>
where
    H: Host + 'static,
    S: Scheduler + 'static,
{
    /// Validates the configuration and starts the background score recorder.
    pub fn enable(
        host: Arc<H>,
        scheduler: Arc<S>,
        store: Arc<dyn ScoreStore>,
        config: &PluginConfig,
    ) -> Result<Self, EnableError> {
        config.validate()?;
        let recorder = ScoreRecorder::spawn(Arc::clone(&store)).map_err(EnableError::Recorder)?;
        log::info!(
            "enemy down enabled: {}s sessions, {}s ticks, spawn radius {}",
            config.game.duration_secs,
            config.game.tick_interval_secs,
            config.game.spawn_radius
        );

        Ok(Self {
            shared: Arc::new(Shared {
                host,
                scheduler,
                registry: Registry::new(config.game.session()),
                spawning: Mutex::new(Spawning::new(config.game.spawning())),
                attribution: Mutex::new(KillAttribution::new()),
                store,
                recorder,
                tick_period: config.game.tick_period(),
            }),
        })
    }

    /// Handles `/enemydown <args>`.
    pub fn on_command(&self, sender: &CommandSender, args: &[&str]) -> CommandOutcome {
        let CommandSender::Player(participant) = sender else {
            log::info!("ignoring enemy down invocation from a non-player sender");
            return CommandOutcome::Rejected(InvocationError::NotAPlayer);
        };

        match command::parse(args) {
            Ok(Invocation::List) => self.list(participant.id),
            Ok(Invocation::Start(difficulty)) => Shared::start(&self.shared, participant, difficulty),
            Err(error) => {
                log::debug!("rejected invocation from {}: {error}", participant.id);
                self.shared
                    .host
                    .send_message(participant.id, &messages::rejection());
                CommandOutcome::Rejected(error)
            }
        }
    }

    /// Handles a hostile entity death reported by the host.
    ///
    /// Returns the applied outcome; a credit the system granted can still be
    /// dropped here when the owning or scoring session ended concurrently.
    pub fn on_opponent_died(&self, death: OpponentDeath) -> Attribution {
        self.shared.opponent_died(death)
    }

    /// Snapshot of the participant's registered session.
    #[must_use]
    pub fn active_session(&self, player: PlayerId) -> Option<query::SessionSnapshot> {
        query::session(&self.shared.registry, player)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Blocks until every finished session submitted so far has been written.
    pub fn flush_scores(&self) {
        self.shared.recorder.flush();
    }

    /// Abandons every session, then drains and stops the score recorder.
    ///
    /// Abandoned sessions write no record. Calling this again does nothing.
    pub fn disable(&self) {
        for handle in self.shared.registry.handles() {
            let mut events = Vec::new();
            let player = {
                let mut session = lock(&handle);
                apply(&mut session, Command::Abandon, &mut events);
                session.player()
            };
            self.shared.process(&handle, events);
            let _ = self.shared.registry.remove(player);
        }
        self.shared.recorder.shutdown();
        let attribution = lock(&self.shared.attribution);
        log::info!(
            "enemy down disabled: {} kills credited, {} deaths ignored",
            attribution.credited(),
            attribution.ignored()
        );
    }

    fn list(&self, player: PlayerId) -> CommandOutcome {
        match self.shared.store.select_all() {
            Ok(records) => {
                for record in &records {
                    self.shared.host.send_message(player, &format_listing(record));
                }
                CommandOutcome::Listed {
                    count: records.len(),
                }
            }
            Err(error) => {
                log::error!("failed to list scores for {player}: {error}");
                self.shared
                    .host
                    .send_message(player, messages::LISTING_UNAVAILABLE);
                CommandOutcome::Rejected(error.into())
            }
        }
    }
}

impl<H, S> Shared<H, S>
where
    H: Host + 'static,
    S: Scheduler + 'static,
{
    fn start(this: &Arc<Self>, participant: &Participant, difficulty: Difficulty) -> CommandOutcome {
        let mut events = Vec::new();
        let (handle, epoch) = this.registry.resolve_with(participant, |session| {
            apply(session, Command::Begin { difficulty }, &mut events);
            session.epoch()
        });
        let replaced = events.iter().any(|event| {
            matches!(
                event,
                Event::SessionAbandoned { .. } | Event::SessionFinished { .. }
            )
        });
        this.process(&handle, events);

        let task = tick_task(Arc::downgrade(this), Arc::downgrade(&handle), epoch);
        let timer = this.scheduler.schedule_repeating(this.tick_period, task);

        let attached = {
            let mut session = lock(&handle);
            let current = session.epoch() == epoch && session.phase() == SessionPhase::Running;
            if current {
                let mut events = Vec::new();
                apply(&mut session, Command::AttachTimer { timer }, &mut events);
            }
            current
        };
        if !attached {
            let _ = this.scheduler.cancel(timer);
        }

        CommandOutcome::Started {
            difficulty,
            replaced,
        }
    }

    fn tick(&self, handle: &SessionHandle, epoch: u64) {
        let mut events = Vec::new();
        {
            let mut session = lock(handle);
            apply(&mut session, Command::Tick { epoch }, &mut events);
            // Expiry and finalization share one critical section.
            if events
                .iter()
                .any(|event| matches!(event, Event::TimeExpired { .. }))
            {
                apply(&mut session, Command::Finalize { epoch }, &mut events);
            }
        }
        self.process(handle, events);
    }

    fn opponent_died(&self, death: OpponentDeath) -> Attribution {
        let roster = query::roster(&self.registry);
        let attribution = lock(&self.attribution).attribute(&death, &roster);
        let credit = match attribution {
            Attribution::Credit(credit) => credit,
            Attribution::Ignored(reason) => {
                log::debug!("ignoring death of {:?}: {reason:?}", death.opponent);
                return attribution;
            }
        };

        let released = self.registry.get(credit.owner).is_some_and(|owner| {
            let mut events = Vec::new();
            apply(
                &mut lock(&owner),
                Command::ReleaseOpponent {
                    opponent: credit.opponent,
                },
                &mut events,
            );
            !events.is_empty()
        });
        if !released {
            log::debug!(
                "{:?} was released before its death could be credited",
                credit.opponent
            );
            return Attribution::Ignored(IgnoreReason::UntrackedOpponent);
        }

        let Some(scorer) = self.registry.get(credit.scorer) else {
            return Attribution::Ignored(IgnoreReason::ScorerInactive);
        };
        let mut events = Vec::new();
        apply(
            &mut lock(&scorer),
            Command::CreditKill {
                epoch: credit.scorer_epoch,
                opponent: credit.opponent,
                kind: credit.kind,
            },
            &mut events,
        );
        if events.is_empty() {
            return Attribution::Ignored(IgnoreReason::ScorerInactive);
        }
        self.process(&scorer, events);
        attribution
    }

    /// Performs the side effects of `events` emitted by the session behind `handle`.
    fn process(&self, handle: &SessionHandle, events: Vec<Event>) {
        for event in events {
            match event {
                Event::SessionStarted {
                    player,
                    difficulty,
                    remaining_time,
                } => {
                    log::info!("{player} started a {difficulty} session ({remaining_time}s)");
                    self.host.reset_vitals(player);
                    self.host.clear_status_effects(player);
                    self.host.equip(player, &difficulty.loadout());
                }
                Event::SpawnDue { .. } => self.spawn(handle, &event),
                Event::TimeAdvanced {
                    player,
                    remaining_time,
                } => log::debug!("{player} has {remaining_time}s left"),
                Event::TimeExpired { player, .. } => log::debug!("{player} ran out of time"),
                Event::KillCredited { player, score, .. } => {
                    self.host.send_message(player, &messages::kill_credited(score));
                }
                Event::SessionFinished {
                    player,
                    difficulty,
                    score,
                    residual,
                    timer,
                } => {
                    self.tear_down(residual, timer);
                    self.host.clear_status_effects(player);
                    let name = lock(handle).participant().name.clone();
                    self.host.send_title(
                        player,
                        messages::GAME_OVER_TITLE,
                        &messages::final_score(&name, score),
                    );
                    log::info!("{player} finished {difficulty} with {score} points");
                    self.recorder
                        .submit(NewScoreRecord::new(name, score, difficulty));
                    let _ = self.registry.evict_terminated(player);
                }
                Event::SessionAbandoned {
                    player,
                    residual,
                    timer,
                } => {
                    log::info!("{player} abandoned a session; no score recorded");
                    self.tear_down(residual, timer);
                }
                Event::OpponentTracked { .. } | Event::OpponentReleased { .. } => {}
            }
        }
    }

    fn spawn(&self, handle: &SessionHandle, due: &Event) {
        let mut requests = Vec::new();
        lock(&self.spawning).handle(
            std::slice::from_ref(due),
            |player| self.host.position_of(player),
            &mut requests,
        );

        for request in requests {
            let opponent = match self.host.spawn_opponent(request.kind, request.position) {
                Ok(opponent) => opponent,
                Err(error) => {
                    log::warn!("spawn for {} failed: {error}", request.player);
                    continue;
                }
            };
            let mut events = Vec::new();
            apply(
                &mut lock(handle),
                Command::TrackOpponent {
                    epoch: request.epoch,
                    opponent,
                    kind: request.kind,
                },
                &mut events,
            );
            if events.is_empty() {
                self.host.remove_opponent(opponent);
            }
        }
    }

    fn tear_down(&self, residual: Vec<OpponentId>, timer: Option<TimerId>) {
        if let Some(timer) = timer {
            if !self.scheduler.cancel(timer) {
                log::debug!("timer {timer:?} was already canceled");
            }
        }
        for opponent in residual {
            self.host.remove_opponent(opponent);
        }
    }
}

/// Timer callback bound to one run of one session.
///
/// The session is referenced directly rather than looked up by player, so a
/// late firing can never advance a newer session registered for the same player.
fn tick_task<H, S>(shared: Weak<Shared<H, S>>, session: Weak<Mutex<Session>>, epoch: u64) -> TimerTask
where
    H: Host + 'static,
    S: Scheduler + 'static,
{
    Box::new(move || {
        let (Some(shared), Some(session)) = (shared.upgrade(), session.upgrade()) else {
            return;
        };
        shared.tick(&session, epoch);
    })
}
