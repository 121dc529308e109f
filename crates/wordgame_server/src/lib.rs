//! # Word Game Server
//!
//! Session engine for the networked sequence word game.
//!
//! Participants connect over TCP and speak a newline-framed text protocol.
//! The server admits them in a lobby, runs the turn loop once someone types
//! `start`, and tears the whole session down if any channel fails.
//!
//! ## Crate Structure
//!
//! - [`connection`] - Cancel-safe line reader and wire rendering
//! - [`registry`] - Locked roster of players and their write halves
//! - [`broadcast`] - Delivery to one or all eligible players
//! - [`lobby`] - Admission, per-connection listeners, start hand-off
//! - [`engine`] - Turn loop over a frozen roster
//! - [`supervisor`] - Lobby/match cycle and fail-fast shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod broadcast;
pub mod connection;
pub mod engine;
pub mod error;
pub mod lobby;
pub mod registry;
pub mod supervisor;

use error::{Result, ServerError};

/// What happens after a match ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReplayPolicy {
    /// Ask the operator on stdin.
    #[default]
    Prompt,
    /// Reopen the lobby without asking.
    Always,
    /// Stop after one match.
    Never,
}

impl FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prompt" => Ok(ReplayPolicy::Prompt),
            "always" => Ok(ReplayPolicy::Always),
            "never" => Ok(ReplayPolicy::Never),
            other => Err(format!("unknown replay policy '{other}'")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Players required before `start` is honored.
    pub min_players: usize,
    /// Lobby capacity.
    pub max_players: usize,
    /// Seconds a player has to answer.
    pub round_time_secs: u64,
    /// Lives each player starts with.
    pub lives_per_player: u32,
    /// Word list, one word per line.
    pub dictionary: PathBuf,
    /// Seconds a new connection has to send its name.
    pub name_timeout_secs: u64,
    /// Cosmetic delay between consecutive announcements.
    pub pacing_ms: u64,
    /// Seed for sequence generation; entropy when unset.
    pub seed: Option<u64>,
    /// What to do after a match.
    pub replay: ReplayPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 65432,
            min_players: 4,
            max_players: 4,
            round_time_secs: 5,
            lives_per_player: 3,
            dictionary: PathBuf::from("words.txt"),
            name_timeout_secs: 30,
            pacing_ms: 100,
            seed: None,
            replay: ReplayPolicy::Prompt,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ServerError::ConfigNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: ServerConfig = ron::from_str(ron)?;
        Ok(config)
    }

    /// Reject settings that cannot produce a playable match.
    pub fn validate(&self) -> Result<()> {
        if self.min_players < 2 {
            return Err(ServerError::InvalidConfig(format!(
                "min_players must be at least 2, got {}",
                self.min_players
            )));
        }
        if self.min_players > self.max_players {
            return Err(ServerError::InvalidConfig(format!(
                "min_players ({}) exceeds max_players ({})",
                self.min_players, self.max_players
            )));
        }
        if self.round_time_secs == 0 {
            return Err(ServerError::InvalidConfig(
                "round_time_secs must be positive".to_string(),
            ));
        }
        if self.lives_per_player == 0 {
            return Err(ServerError::InvalidConfig(
                "lives_per_player must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-turn answer deadline.
    #[must_use]
    pub fn round_time(&self) -> Duration {
        Duration::from_secs(self.round_time_secs)
    }

    /// Deadline for the name line during admission.
    #[must_use]
    pub fn name_timeout(&self) -> Duration {
        Duration::from_secs(self.name_timeout_secs)
    }

    /// Delay between announcements.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_four_player_game() {
        let config = ServerConfig::default();
        assert_eq!(config.min_players, 4);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.round_time_secs, 5);
        assert_eq!(config.lives_per_player, 3);
        assert_eq!(config.bind_addr(), "127.0.0.1:65432");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config =
            ServerConfig::from_ron_str("(port: 7000, min_players: 2, replay: Never)").unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.replay, ReplayPolicy::Never);
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let err = ServerConfig::from_ron_str("(port: \"nope\")").unwrap_err();
        assert!(matches!(err, ServerError::ConfigParse(_)));
        assert!(err.is_startup_failure());
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::load("/no/such/server.ron").unwrap_err();
        assert!(matches!(err, ServerError::ConfigNotFound(_)));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = ServerConfig {
            min_players: 5,
            max_players: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_solo_game() {
        let config = ServerConfig {
            min_players: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_replay_policy_parses() {
        assert_eq!("ALWAYS".parse::<ReplayPolicy>(), Ok(ReplayPolicy::Always));
        assert!("sometimes".parse::<ReplayPolicy>().is_err());
    }
}
