use std::{sync::Arc, thread};

use enemy_down_core::{
    Command, Difficulty, OpponentId, OpponentKind, Participant, PlayerId, SessionPhase,
};
use enemy_down_world::{apply, lock, query, Registry, SessionConfig};

fn participant(id: u64, name: &str) -> Participant {
    Participant::new(PlayerId::new(id), name)
}

fn begin(registry: &Registry, who: &Participant, difficulty: Difficulty) {
    let handle = registry.resolve(who);
    let mut events = Vec::new();
    apply(&mut lock(&handle), Command::Begin { difficulty }, &mut events);
}

#[test]
fn resolve_reuses_the_entry_for_the_same_identity() {
    let registry = Registry::new(SessionConfig::default());
    let first = registry.resolve(&participant(1, "alice"));
    let second = registry.resolve(&participant(1, "alice-renamed"));

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert_eq!(lock(&first).participant().name, "alice-renamed");
}

#[test]
fn resolve_keeps_identities_isolated() {
    let registry = Registry::new(SessionConfig::default());
    let alice = registry.resolve(&participant(1, "alice"));
    let bob = registry.resolve(&participant(2, "bob"));

    assert!(!Arc::ptr_eq(&alice, &bob));
    assert_eq!(registry.len(), 2);
    assert_eq!(lock(&bob).player(), PlayerId::new(2));
}

#[test]
fn remove_is_a_no_op_for_absent_players() {
    let registry = Registry::new(SessionConfig::default());
    assert!(registry.remove(PlayerId::new(3)).is_none());

    let _ = registry.resolve(&participant(3, "carol"));
    assert!(registry.remove(PlayerId::new(3)).is_some());
    assert!(registry.is_empty());
    assert!(registry.remove(PlayerId::new(3)).is_none());
}

#[test]
fn evict_terminated_spares_running_sessions() {
    let registry = Registry::new(SessionConfig::default());
    let alice = participant(1, "alice");
    begin(&registry, &alice, Difficulty::Easy);

    assert!(!registry.evict_terminated(alice.id));
    assert_eq!(registry.len(), 1);

    let handle = registry.get(alice.id).expect("registered");
    let mut events = Vec::new();
    apply(&mut lock(&handle), Command::Abandon, &mut events);
    assert_eq!(lock(&handle).phase(), SessionPhase::Terminated);

    assert!(registry.evict_terminated(alice.id));
    assert!(registry.get(alice.id).is_none());
    assert!(!registry.evict_terminated(alice.id));
}

#[test]
fn roster_lists_spawn_owners_of_running_sessions() {
    let registry = Registry::new(SessionConfig::default());
    let alice = participant(1, "alice");
    let bob = participant(2, "bob");
    let carol = participant(3, "carol");
    begin(&registry, &alice, Difficulty::Normal);
    begin(&registry, &bob, Difficulty::Hard);
    let _ = registry.resolve(&carol);

    for (owner, opponent) in [(&alice, 10), (&bob, 20), (&bob, 21)] {
        let handle = registry.get(owner.id).expect("registered");
        let mut session = lock(&handle);
        let epoch = session.epoch();
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::TrackOpponent {
                epoch,
                opponent: OpponentId::new(opponent),
                kind: OpponentKind::Zombie,
            },
            &mut events,
        );
    }

    let roster = query::roster(&registry);
    assert_eq!(roster.owner_of(OpponentId::new(10)), Some(alice.id));
    assert_eq!(roster.owner_of(OpponentId::new(21)), Some(bob.id));
    assert_eq!(roster.owner_of(OpponentId::new(30)), None);
    assert_eq!(roster.running_epoch(alice.id), Some(1));
    assert!(!roster.is_running(carol.id), "initializing sessions are not running");
    assert_eq!(roster.tracked_count(), 3);

    let snapshot = query::session(&registry, bob.id).expect("bob registered");
    assert_eq!(snapshot.live_spawns.len(), 2);
    assert!(query::session(&registry, PlayerId::new(99)).is_none());
}

#[test]
fn concurrent_resolution_yields_one_session_per_player() {
    let registry = Arc::new(Registry::new(SessionConfig::default()));
    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for id in 0..16 {
                    let handle = registry.resolve(&participant(id, "player"));
                    let mut events = Vec::new();
                    let difficulty = Difficulty::ALL[(worker + id as usize) % 3];
                    apply(&mut lock(&handle), Command::Begin { difficulty }, &mut events);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert_eq!(registry.len(), 16);
    for handle in registry.handles() {
        let session = lock(&handle);
        assert_eq!(session.phase(), SessionPhase::Running);
        assert_eq!(session.epoch(), 8, "every worker restarted every session");
    }
}

#[test]
fn resolve_with_applies_under_the_pinned_entry() {
    let registry = Registry::new(SessionConfig::default());
    let alice = participant(1, "alice");

    let (handle, epoch) = registry.resolve_with(&alice, |session| {
        let mut events = Vec::new();
        apply(
            session,
            Command::Begin {
                difficulty: Difficulty::Hard,
            },
            &mut events,
        );
        assert_eq!(events.len(), 1);
        session.epoch()
    });

    assert_eq!(epoch, 1);
    assert!(Arc::ptr_eq(
        &handle,
        &registry.get(alice.id).expect("registered")
    ));
    assert_eq!(lock(&handle).phase(), SessionPhase::Running);
}
