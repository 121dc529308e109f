//! Per-player game state.
//!
//! Connection handles live in the server; this is only the part of a
//! participant the rules care about.

use std::fmt;

/// Session-unique player identifier, assigned in admission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A participant's lives and connectivity flags.
///
/// Invariant: `disconnected` implies `!active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identifier.
    pub id: PlayerId,
    /// Display name, unique within a session.
    pub name: String,
    /// Remaining lives.
    pub lives: u32,
    /// Still taking part in the session.
    pub active: bool,
    /// Channel has failed.
    pub disconnected: bool,
}

impl Player {
    /// Create a connected, active player.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, lives: u32) -> Self {
        Self {
            id,
            name: name.into(),
            lives,
            active: true,
            disconnected: false,
        }
    }

    /// Connected and active, regardless of lives.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.active && !self.disconnected
    }

    /// Connected, active, and with lives left.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.is_connected() && self.lives > 0
    }

    /// Take one life. Never goes below zero.
    ///
    /// Returns the remaining lives.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    /// Flag a channel failure.
    pub fn mark_disconnected(&mut self) {
        self.disconnected = true;
        self.active = false;
    }
}
