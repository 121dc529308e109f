//! Test fixtures and helpers.
//!
//! Pre-built word banks and rosters for consistent testing.

use wordgame_core::player::{Player, PlayerId};
use wordgame_core::word_bank::WordBank;

/// A small mixed dictionary with two- and three-letter entries.
pub const SAMPLE_WORDS: &[&str] = &[
    "at", "ox", "cat", "dog", "hat", "scatter", "catalog", "doghouse", "bird", "planet",
    "rocket", "table", "letter", "hedgehog", "frog", "bulldog", "atlas", "boat", "castle",
    "tower",
];

/// Build a bank from a word list, panicking on an empty list.
#[must_use]
pub fn bank(words: &[&str]) -> WordBank {
    WordBank::from_words(words.iter().copied()).expect("fixture word list must not be empty")
}

/// Bank over [`SAMPLE_WORDS`].
#[must_use]
pub fn sample_bank() -> WordBank {
    bank(SAMPLE_WORDS)
}

/// Roster of players named `p0`, `p1`, ... with the given lives.
#[must_use]
pub fn roster(lives: &[u32]) -> Vec<Player> {
    lives
        .iter()
        .enumerate()
        .map(|(i, &l)| Player::new(PlayerId(i as u32 + 1), format!("p{i}"), l))
        .collect()
}
