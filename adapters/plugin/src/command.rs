//! Parsing of `/enemydown` arguments.

use enemy_down_core::{Difficulty, ParseDifficultyError, Participant};
use enemy_down_score_store::StoreError;
use thiserror::Error;

/// Argument that lists stored scores instead of starting a session.
pub const LIST_ARGUMENT: &str = "list";

/// Who issued the command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandSender {
    /// An in-game participant.
    Player(Participant),
    /// The server console or another non-player source.
    Console,
}

/// Action requested by a well-formed invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invocation {
    /// Start or restart a session at the difficulty.
    Start(Difficulty),
    /// Show every stored score record.
    List,
}

/// Reasons an invocation is refused.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Only participants can play or list scores.
    #[error("only players can run this command")]
    NotAPlayer,
    /// The command expects exactly one argument.
    #[error("expected exactly one argument, got {0}")]
    ArgumentCount(usize),
    /// The argument is not a difficulty tag.
    #[error(transparent)]
    UnknownDifficulty(#[from] ParseDifficultyError),
    /// Stored scores could not be read.
    #[error("failed to read stored scores: {0}")]
    Store(#[from] StoreError),
}

/// Result of handling one invocation.
#[derive(Debug)]
pub enum CommandOutcome {
    /// A session was started; `replaced` reports whether an earlier run was still live.
    Started {
        /// Difficulty of the new session.
        difficulty: Difficulty,
        /// Whether a live run was abandoned, or completed after expiring, first.
        replaced: bool,
    },
    /// Stored scores were sent to the participant.
    Listed {
        /// Number of records sent.
        count: usize,
    },
    /// Nothing was started.
    Rejected(InvocationError),
}

impl CommandOutcome {
    /// Whether the host should treat the command as successful.
    ///
    /// Listing scores is reported as unsuccessful, matching the host
    /// convention that only a started game counts as handled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Interprets raw command arguments.
pub fn parse(args: &[&str]) -> Result<Invocation, InvocationError> {
    match args {
        [LIST_ARGUMENT] => Ok(Invocation::List),
        [tag] => Ok(Invocation::Start(tag.parse::<Difficulty>()?)),
        other => Err(InvocationError::ArgumentCount(other.len())),
    }
}
