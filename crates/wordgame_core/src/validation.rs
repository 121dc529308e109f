//! Judging a submitted word against the current challenge.
//!
//! Checks run in a fixed priority order and the first failure wins:
//!
//! 1. empty submission (or timeout)
//! 2. sequence not contained in the word
//! 3. word not in the bank
//! 4. word already used this session

use std::collections::HashSet;
use std::fmt;

use crate::word_bank::WordBank;

/// Why a submission cost the player a life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Nothing arrived before the deadline, or an empty line did.
    Timeout,
    /// The word does not contain the sequence.
    MissingSequence,
    /// The word is not in the dictionary.
    UnknownWord,
    /// The word was accepted earlier in the session.
    AlreadyUsed,
}

impl Rejection {
    /// Human-readable reason shown to players.
    #[must_use]
    pub fn reason(self, sequence: &str) -> String {
        match self {
            Rejection::Timeout => "TIMEOUT".to_string(),
            Rejection::MissingSequence => format!("Word doesn't contain '{sequence}'"),
            Rejection::UnknownWord => "Not a valid word".to_string(),
            Rejection::AlreadyUsed => "Word already used".to_string(),
        }
    }
}

/// Outcome of judging one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Word accepted.
    Accepted(String),
    /// Word rejected for the given reason.
    Rejected(Rejection),
}

impl Verdict {
    /// Whether the submission was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted(word) => write!(f, "accepted '{word}'"),
            Verdict::Rejected(rejection) => write!(f, "rejected ({rejection:?})"),
        }
    }
}

/// Trim and lowercase a raw line from a client.
#[must_use]
pub fn normalize_submission(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Judge a normalized submission. Does not record anything.
#[must_use]
pub fn judge(word: &str, sequence: &str, bank: &WordBank, used: &HashSet<String>) -> Verdict {
    if word.is_empty() {
        Verdict::Rejected(Rejection::Timeout)
    } else if !word.contains(sequence) {
        Verdict::Rejected(Rejection::MissingSequence)
    } else if !bank.contains(word) {
        Verdict::Rejected(Rejection::UnknownWord)
    } else if used.contains(word) {
        Verdict::Rejected(Rejection::AlreadyUsed)
    } else {
        Verdict::Accepted(word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> WordBank {
        WordBank::from_words(["cat", "dog", "scatter"]).unwrap()
    }

    #[test]
    fn test_accepts_fresh_matching_word() {
        let verdict = judge("cat", "ca", &bank(), &HashSet::new());
        assert_eq!(verdict, Verdict::Accepted("cat".to_string()));
        assert!(verdict.is_accepted());
    }

    #[test]
    fn test_empty_is_timeout() {
        let verdict = judge("", "ca", &bank(), &HashSet::new());
        assert_eq!(verdict, Verdict::Rejected(Rejection::Timeout));
    }

    #[test]
    fn test_missing_sequence_beats_unknown_word() {
        // "bird" is neither in the bank nor contains "at"; sequence check wins.
        let verdict = judge("bird", "at", &bank(), &HashSet::new());
        assert_eq!(verdict, Verdict::Rejected(Rejection::MissingSequence));
    }

    #[test]
    fn test_unknown_word_beats_already_used() {
        let used: HashSet<String> = ["chat".to_string()].into_iter().collect();
        let verdict = judge("chat", "at", &bank(), &used);
        assert_eq!(verdict, Verdict::Rejected(Rejection::UnknownWord));
    }

    #[test]
    fn test_already_used() {
        let used: HashSet<String> = ["cat".to_string()].into_iter().collect();
        let verdict = judge("cat", "at", &bank(), &used);
        assert_eq!(verdict, Verdict::Rejected(Rejection::AlreadyUsed));
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(Rejection::Timeout.reason("at"), "TIMEOUT");
        assert_eq!(
            Rejection::MissingSequence.reason("at"),
            "Word doesn't contain 'at'"
        );
        assert_eq!(Rejection::UnknownWord.reason("at"), "Not a valid word");
        assert_eq!(Rejection::AlreadyUsed.reason("at"), "Word already used");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_submission("  SCATTER\r\n"), "scatter");
        assert_eq!(normalize_submission("   "), "");
    }
}
