#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that decides which session a death notification credits.

use enemy_down_core::{OpponentDeath, OpponentId, OpponentKind, PlayerId, SessionRosterView};

/// Credit to apply after an opponent death.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KillCredit {
    /// Participant whose session spawned and tracks the opponent.
    pub owner: PlayerId,
    /// Participant whose session receives the points.
    pub scorer: PlayerId,
    /// Start epoch of the scorer's run when the death arrived.
    pub scorer_epoch: u64,
    /// Host identifier of the opponent that died.
    pub opponent: OpponentId,
    /// Kind of the opponent that died.
    pub kind: OpponentKind,
    /// Points the kind is worth.
    pub points: u32,
}

/// Why a death notification produced no credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The opponent died without a player killer.
    NoKiller,
    /// The opponent is not tracked by any running session.
    UntrackedOpponent,
    /// The killer has no running session to credit.
    ScorerInactive,
}

/// Outcome of attributing a single death notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribution {
    /// Points should be credited.
    Credit(KillCredit),
    /// The notification is orphaned and must be dropped.
    Ignored(IgnoreReason),
}

/// Kill attribution system with running tallies for diagnostics.
#[derive(Debug, Default)]
pub struct KillAttribution {
    credited: u64,
    ignored: u64,
}

impl KillAttribution {
    /// Creates a new kill attribution system with zeroed tallies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes a death against the roster captured when it arrived.
    ///
    /// The opponent must be tracked by some running session, and the killer
    /// must own a running session; the killer's session is the one credited,
    /// even when a different session spawned the opponent.
    pub fn attribute(&mut self, death: &OpponentDeath, roster: &SessionRosterView) -> Attribution {
        let attribution = resolve(death, roster);
        match attribution {
            Attribution::Credit(_) => self.credited += 1,
            Attribution::Ignored(_) => self.ignored += 1,
        }
        attribution
    }

    /// Number of notifications that produced a credit.
    #[must_use]
    pub fn credited(&self) -> u64 {
        self.credited
    }

    /// Number of notifications that were dropped.
    #[must_use]
    pub fn ignored(&self) -> u64 {
        self.ignored
    }
}

fn resolve(death: &OpponentDeath, roster: &SessionRosterView) -> Attribution {
    let Some(scorer) = death.killer else {
        return Attribution::Ignored(IgnoreReason::NoKiller);
    };

    let Some(owner) = roster.owner_of(death.opponent) else {
        return Attribution::Ignored(IgnoreReason::UntrackedOpponent);
    };

    let Some(scorer_epoch) = roster.running_epoch(scorer) else {
        return Attribution::Ignored(IgnoreReason::ScorerInactive);
    };

    Attribution::Credit(KillCredit {
        owner,
        scorer,
        scorer_epoch,
        opponent: death.opponent,
        kind: death.kind,
        points: death.kind.points(),
    })
}
