//! Player-facing text.

/// Legacy formatting code that renders the rest of a chat line in red.
pub const RED: &str = "\u{a7}c";

/// Title shown when a session ends.
pub const GAME_OVER_TITLE: &str = "Game over!";

/// Sent when a listing cannot be produced.
pub const LISTING_UNAVAILABLE: &str = "Scores are unavailable right now.";

/// Sent when the arguments do not select a difficulty.
#[must_use]
pub fn rejection() -> String {
    format!("{RED}Cannot start: the first argument must be a difficulty. [easy, normal, hard]")
}

/// Subtitle shown with [`GAME_OVER_TITLE`].
#[must_use]
pub fn final_score(name: &str, score: u32) -> String {
    format!("{name}: {score} points!")
}

/// Sent to the scorer after every credited kill.
#[must_use]
pub fn kill_credited(score: u32) -> String {
    format!("Enemy down! Current score: {score}")
}
