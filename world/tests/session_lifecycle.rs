use enemy_down_core::{
    Command, Difficulty, Event, OpponentId, OpponentKind, Participant, PlayerId, SessionPhase,
    TimerId, GAME_DURATION_SECS,
};
use enemy_down_world::{apply, query, Session, SessionConfig};

const ALICE: PlayerId = PlayerId::new(7);

fn fresh_session() -> Session {
    Session::new(Participant::new(ALICE, "alice"), SessionConfig::default())
}

fn run(session: &mut Session, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    apply(session, command, &mut events);
    events
}

fn started(difficulty: Difficulty) -> Session {
    let mut session = fresh_session();
    let _ = run(&mut session, Command::Begin { difficulty });
    let _ = run(
        &mut session,
        Command::AttachTimer {
            timer: TimerId::new(1),
        },
    );
    session
}

fn tick(session: &mut Session) -> Vec<Event> {
    let epoch = session.epoch();
    run(session, Command::Tick { epoch })
}

fn track(session: &mut Session, opponent: u64, kind: OpponentKind) -> Vec<Event> {
    let epoch = session.epoch();
    run(
        session,
        Command::TrackOpponent {
            epoch,
            opponent: OpponentId::new(opponent),
            kind,
        },
    )
}

fn credit(session: &mut Session, opponent: u64, kind: OpponentKind) -> Vec<Event> {
    let epoch = session.epoch();
    run(
        session,
        Command::CreditKill {
            epoch,
            opponent: OpponentId::new(opponent),
            kind,
        },
    )
}

fn finalize(session: &mut Session) -> Vec<Event> {
    let epoch = session.epoch();
    run(session, Command::Finalize { epoch })
}

#[test]
fn begin_initializes_time_and_score_for_every_difficulty() {
    for difficulty in Difficulty::ALL {
        let mut session = fresh_session();
        assert_eq!(session.phase(), SessionPhase::Initializing);

        let events = run(&mut session, Command::Begin { difficulty });

        assert_eq!(session.phase(), SessionPhase::Running);
        assert_eq!(session.remaining_time(), i64::from(GAME_DURATION_SECS));
        assert_eq!(session.score(), 0);
        assert_eq!(session.difficulty(), Some(difficulty));
        assert_eq!(
            events,
            vec![Event::SessionStarted {
                player: ALICE,
                difficulty,
                remaining_time: 20,
            }]
        );
    }
}

#[test]
fn normal_session_ticks_down_and_finalizes_once() {
    let mut session = started(Difficulty::Normal);
    let mut observed = Vec::new();
    let mut spawns = 0;
    let mut next_opponent = 100;

    loop {
        observed.push(session.remaining_time());
        let events = tick(&mut session);
        if events.contains(&Event::TimeExpired {
            player: ALICE,
            epoch: 1,
        }) {
            break;
        }
        for event in events {
            if let Event::SpawnDue { difficulty, .. } = event {
                assert_eq!(difficulty, Difficulty::Normal);
                spawns += 1;
                next_opponent += 1;
                let _ = track(&mut session, next_opponent, OpponentKind::Skeleton);
            }
        }
        assert!(observed.len() < 10, "session never expired");
    }

    assert_eq!(observed, vec![20, 15, 10, 5, 0]);
    assert_eq!(spawns, 4);
    assert_eq!(session.phase(), SessionPhase::Finalizing);

    let _ = credit(&mut session, 101, OpponentKind::Skeleton);
    assert_eq!(session.score(), 0, "kills after expiry are not credited");

    let events = finalize(&mut session);
    assert_eq!(
        events,
        vec![Event::SessionFinished {
            player: ALICE,
            difficulty: Difficulty::Normal,
            score: 0,
            residual: (101..=104).map(OpponentId::new).collect(),
            timer: Some(TimerId::new(1)),
        }]
    );
    assert_eq!(session.phase(), SessionPhase::Terminated);
    assert_eq!(session.live_spawns().count(), 0);

    assert!(finalize(&mut session).is_empty());
    assert!(run(&mut session, Command::Abandon).is_empty());
    assert!(tick(&mut session).is_empty());
}

#[test]
fn each_tick_decrements_by_the_interval_even_below_zero() {
    let mut session = Session::new(
        Participant::new(ALICE, "alice"),
        SessionConfig::new(7, 5),
    );
    let _ = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Easy,
        },
    );

    let events = tick(&mut session);
    assert_eq!(
        events,
        vec![
            Event::SpawnDue {
                player: ALICE,
                epoch: 1,
                difficulty: Difficulty::Easy,
            },
            Event::TimeAdvanced {
                player: ALICE,
                remaining_time: 2,
            },
        ]
    );

    let events = tick(&mut session);
    assert_eq!(
        events.last(),
        Some(&Event::TimeAdvanced {
            player: ALICE,
            remaining_time: -3,
        })
    );

    assert_eq!(
        tick(&mut session),
        vec![Event::TimeExpired {
            player: ALICE,
            epoch: 1,
        }]
    );
    assert!(tick(&mut session).is_empty(), "finalizing ignores ticks");
}

#[test]
fn zero_duration_expires_on_first_tick() {
    let mut session = Session::new(
        Participant::new(ALICE, "alice"),
        SessionConfig::new(0, 5),
    );
    let _ = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Hard,
        },
    );

    assert_eq!(
        tick(&mut session),
        vec![Event::TimeExpired {
            player: ALICE,
            epoch: 1,
        }]
    );
}

#[test]
fn stale_epoch_ticks_are_ignored() {
    let mut session = started(Difficulty::Easy);
    let stale = session.epoch();
    let _ = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Hard,
        },
    );

    assert!(run(&mut session, Command::Tick { epoch: stale }).is_empty());
    assert_eq!(session.remaining_time(), 20);
}

#[test]
fn credit_applies_the_point_table() {
    let mut session = started(Difficulty::Hard);

    let credits = [
        (OpponentKind::Skeleton, 20),
        (OpponentKind::Zombie, 30),
        (OpponentKind::Creeper, 30),
        (OpponentKind::Witch, 50),
    ];
    for (index, (kind, expected)) in credits.into_iter().enumerate() {
        let events = credit(&mut session, index as u64, kind);
        assert_eq!(
            events,
            vec![Event::KillCredited {
                player: ALICE,
                opponent: OpponentId::new(index as u64),
                points: kind.points(),
                score: expected,
            }]
        );
    }
    assert_eq!(session.score(), 50);
}

#[test]
fn release_only_reports_tracked_opponents() {
    let mut session = started(Difficulty::Normal);
    let opponent = OpponentId::new(3);
    let _ = track(&mut session, 3, OpponentKind::Zombie);
    assert!(session.tracks(opponent));

    let events = run(&mut session, Command::ReleaseOpponent { opponent });
    assert_eq!(
        events,
        vec![Event::OpponentReleased {
            player: ALICE,
            opponent,
            kind: OpponentKind::Zombie,
        }]
    );
    assert!(!session.tracks(opponent));
    assert!(run(&mut session, Command::ReleaseOpponent { opponent }).is_empty());
}

#[test]
fn restarting_a_running_session_abandons_it_first() {
    let mut session = started(Difficulty::Normal);
    let _ = track(&mut session, 11, OpponentKind::Zombie);
    let _ = credit(&mut session, 12, OpponentKind::Zombie);
    let _ = tick(&mut session);

    let events = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Easy,
        },
    );

    assert_eq!(
        events,
        vec![
            Event::SessionAbandoned {
                player: ALICE,
                residual: vec![OpponentId::new(11)],
                timer: Some(TimerId::new(1)),
            },
            Event::SessionStarted {
                player: ALICE,
                difficulty: Difficulty::Easy,
                remaining_time: 20,
            },
        ]
    );
    assert_eq!(session.score(), 0);
    assert_eq!(session.timer(), None);
    assert_eq!(session.live_spawns().count(), 0);
}

#[test]
fn abandon_surrenders_spawns_without_finishing() {
    let mut session = started(Difficulty::Easy);
    let _ = track(&mut session, 5, OpponentKind::Zombie);

    let events = run(&mut session, Command::Abandon);
    assert_eq!(
        events,
        vec![Event::SessionAbandoned {
            player: ALICE,
            residual: vec![OpponentId::new(5)],
            timer: Some(TimerId::new(1)),
        }]
    );
    assert_eq!(session.phase(), SessionPhase::Terminated);
    assert!(run(&mut session, Command::Abandon).is_empty());
}

#[test]
fn untouched_sessions_ignore_lifecycle_commands() {
    let mut session = fresh_session();
    assert!(finalize(&mut session).is_empty());
    assert!(run(&mut session, Command::Tick { epoch: 0 }).is_empty());
    assert!(track(&mut session, 1, OpponentKind::Zombie).is_empty());
    assert_eq!(session.phase(), SessionPhase::Initializing);
}

#[test]
fn snapshot_reflects_session_state() {
    let mut session = started(Difficulty::Hard);
    let _ = track(&mut session, 9, OpponentKind::Witch);
    let _ = tick(&mut session);

    let snapshot = query::snapshot(&session);
    assert_eq!(snapshot.player, ALICE);
    assert_eq!(snapshot.name, "alice");
    assert_eq!(snapshot.phase, SessionPhase::Running);
    assert_eq!(snapshot.difficulty, Some(Difficulty::Hard));
    assert_eq!(snapshot.remaining_time, 15);
    assert_eq!(snapshot.live_spawns, vec![OpponentId::new(9)]);
}

#[test]
fn restart_after_expiry_finishes_the_expired_run() {
    let mut session = Session::new(
        Participant::new(ALICE, "alice"),
        SessionConfig::new(5, 5),
    );
    let _ = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Normal,
        },
    );
    let _ = run(
        &mut session,
        Command::AttachTimer {
            timer: TimerId::new(1),
        },
    );
    let expired = session.epoch();
    let _ = credit(&mut session, 40, OpponentKind::Skeleton);
    let _ = tick(&mut session);
    let _ = track(&mut session, 41, OpponentKind::Zombie);
    assert_eq!(
        tick(&mut session),
        vec![Event::TimeExpired {
            player: ALICE,
            epoch: expired,
        }]
    );
    assert_eq!(session.phase(), SessionPhase::Finalizing);

    let events = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Hard,
        },
    );
    assert_eq!(
        events,
        vec![
            Event::SessionFinished {
                player: ALICE,
                difficulty: Difficulty::Normal,
                score: 20,
                residual: vec![OpponentId::new(41)],
                timer: Some(TimerId::new(1)),
            },
            Event::SessionStarted {
                player: ALICE,
                difficulty: Difficulty::Hard,
                remaining_time: 5,
            },
        ]
    );

    assert!(run(&mut session, Command::Finalize { epoch: expired }).is_empty());
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(session.difficulty(), Some(Difficulty::Hard));
    assert_eq!(session.remaining_time(), 5);
}

#[test]
fn follow_ups_from_a_replaced_run_are_ignored() {
    let mut session = started(Difficulty::Easy);
    let stale = session.epoch();
    let _ = run(
        &mut session,
        Command::Begin {
            difficulty: Difficulty::Normal,
        },
    );

    let stale_commands = [
        Command::TrackOpponent {
            epoch: stale,
            opponent: OpponentId::new(8),
            kind: OpponentKind::Zombie,
        },
        Command::CreditKill {
            epoch: stale,
            opponent: OpponentId::new(8),
            kind: OpponentKind::Zombie,
        },
        Command::Finalize { epoch: stale },
    ];
    for command in stale_commands {
        assert!(run(&mut session, command).is_empty());
    }
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(session.score(), 0);
    assert_eq!(session.live_spawns().count(), 0);
}
