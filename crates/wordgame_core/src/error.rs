//! Error types for the game rules.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for game rule errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// The dictionary source could not be read.
    #[error("Dictionary unavailable at '{path}': {reason}")]
    DictionaryUnavailable {
        /// Path that was tried.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// The dictionary was read but held no usable words.
    #[error("Dictionary contains no usable words")]
    EmptyDictionary,

    /// A turn operation was called in the wrong phase.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Whether this error means no session can run at all.
    #[must_use]
    pub fn is_dictionary_failure(&self) -> bool {
        matches!(
            self,
            GameError::DictionaryUnavailable { .. } | GameError::EmptyDictionary
        )
    }
}
