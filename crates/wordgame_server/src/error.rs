//! Error types for the session engine.

use thiserror::Error;
use wordgame_core::error::GameError;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Top-level error type for the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A game rule error, including dictionary failures at startup.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Socket or stdin failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file not found.
    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    /// Config file did not parse.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Config values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A participant's channel failed.
    #[error("Channel failure for {player}: {reason}")]
    ChannelFailure {
        /// Player name, or peer address before admission.
        player: String,
        /// What went wrong.
        reason: String,
    },

    /// Admission attempted after the roster was frozen.
    #[error("Lobby is closed to new players")]
    LobbyClosed,
}

impl ServerError {
    /// Whether the server should refuse to start.
    #[must_use]
    pub fn is_startup_failure(&self) -> bool {
        match self {
            ServerError::Game(e) => e.is_dictionary_failure(),
            ServerError::ConfigNotFound(_)
            | ServerError::ConfigParse(_)
            | ServerError::InvalidConfig(_) => true,
            _ => false,
        }
    }
}
