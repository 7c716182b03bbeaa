use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use enemy_down_core::{Participant, PlayerId, SessionPhase};

use crate::{Session, SessionConfig};

/// Shared, lock-guarded session. Timer callbacks and kill credit both go through it.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Locks a session or any other shared state, recovering it if a previous
/// holder panicked.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed store holding at most one session per participant.
///
/// The map lock is always taken before any session lock, never after.
#[derive(Debug, Default)]
pub struct Registry {
    config: SessionConfig,
    sessions: Mutex<HashMap<PlayerId, SessionHandle>>,
}

impl Registry {
    /// Creates an empty registry whose sessions use the provided timing.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the participant's session, creating and registering one if absent.
    ///
    /// An existing entry is reused as-is apart from refreshing the display name.
    pub fn resolve(&self, participant: &Participant) -> SessionHandle {
        self.resolve_with(participant, |_| ()).0
    }

    /// Resolves the participant's session and runs `f` on it while the entry
    /// is pinned, so a concurrent [`Registry::evict_terminated`] cannot detach it.
    pub fn resolve_with<R>(
        &self,
        participant: &Participant,
        f: impl FnOnce(&mut Session) -> R,
    ) -> (SessionHandle, R) {
        let mut sessions = self.entries();
        let handle = match sessions.get(&participant.id) {
            Some(handle) => Arc::clone(handle),
            None => {
                let handle = Arc::new(Mutex::new(Session::new(participant.clone(), self.config)));
                let _ = sessions.insert(participant.id, Arc::clone(&handle));
                log::debug!("registered session for {}", participant.id);
                handle
            }
        };

        let result = {
            let mut session = lock(&handle);
            session.rename(&participant.name);
            f(&mut session)
        };
        (handle, result)
    }

    /// Returns the participant's session without creating one.
    #[must_use]
    pub fn get(&self, player: PlayerId) -> Option<SessionHandle> {
        self.entries().get(&player).cloned()
    }

    /// Evicts the participant's entry. Absent entries are ignored.
    pub fn remove(&self, player: PlayerId) -> Option<SessionHandle> {
        self.entries().remove(&player)
    }

    /// Evicts the participant's entry only if that session has terminated.
    ///
    /// A session restarted between finalization and eviction stays registered.
    pub fn evict_terminated(&self, player: PlayerId) -> bool {
        let mut sessions = self.entries();
        let terminated = sessions
            .get(&player)
            .is_some_and(|handle| lock(handle).phase() == SessionPhase::Terminated);
        if terminated {
            let _ = sessions.remove(&player);
        }
        terminated
    }

    /// Every registered session, ordered by participant identity.
    #[must_use]
    pub fn handles(&self) -> Vec<SessionHandle> {
        let sessions = self.entries();
        let mut entries: Vec<_> = sessions.iter().collect();
        entries.sort_unstable_by_key(|(player, _)| **player);
        entries
            .into_iter()
            .map(|(_, handle)| Arc::clone(handle))
            .collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Reports whether no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PlayerId, SessionHandle>> {
        lock(&self.sessions)
    }
}
