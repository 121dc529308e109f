//! # Word Game Core
//!
//! Deterministic rules for the sequence word game.
//!
//! This crate contains **only** game logic:
//! - No networking
//! - No IO apart from reading the dictionary file
//! - No system randomness (callers pass in an RNG)
//!
//! This separation enables:
//! - A thin network server that only moves bytes and applies verdicts
//! - Seeded, reproducible matches in tests
//! - Offline dictionary checks from the tools crate
//!
//! ## Crate Structure
//!
//! - [`word_bank`] - Dictionary membership and challenge sequences
//! - [`player`] - Per-player lives and connectivity flags
//! - [`validation`] - Judging a submitted word
//! - [`turn`] - Round-robin turn state machine

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod player;
pub mod turn;
pub mod validation;
pub mod word_bank;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{GameError, Result};
    pub use crate::player::{Player, PlayerId};
    pub use crate::turn::{TurnOutcome, TurnPhase, TurnStart, TurnState};
    pub use crate::validation::{judge, normalize_submission, Rejection, Verdict};
    pub use crate::word_bank::WordBank;
}
