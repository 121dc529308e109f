//! Dictionary membership and challenge sequence generation.
//!
//! The word bank is loaded once per server start and shared read-only
//! afterwards. Every challenge sequence it produces is a contiguous slice
//! of one of its own words, so a valid answer always exists.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rand::Rng;

use crate::error::{GameError, Result};

/// Sequence handed out when the bank holds no words at all.
///
/// Loading rejects empty dictionaries, so this is only reachable through
/// [`WordBank::default`].
pub const FALLBACK_SEQUENCE: &str = "ab";

/// Shortest challenge sequence.
pub const MIN_SEQUENCE_LEN: usize = 2;

/// Longest challenge sequence.
pub const MAX_SEQUENCE_LEN: usize = 3;

/// Immutable set of lowercase dictionary words.
#[derive(Debug, Clone, Default)]
pub struct WordBank {
    /// Words in load order, for uniform random picks.
    words: Vec<String>,
    /// Membership index.
    index: HashSet<String>,
}

impl WordBank {
    /// Load a newline-separated word list from disk.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DictionaryUnavailable`] if the file cannot be
    /// read and [`GameError::EmptyDictionary`] if no line survives filtering.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| GameError::DictionaryUnavailable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let bank = Self::from_words(contents.lines())?;
        tracing::info!(path = %path.display(), words = bank.len(), "Loaded dictionary");
        Ok(bank)
    }

    /// Build a bank from any iterator of candidate words.
    ///
    /// Candidates are trimmed and lowercased. Entries of one character or
    /// fewer, and entries containing whitespace, are dropped. Duplicates
    /// collapse to a single entry.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EmptyDictionary`] if nothing is left.
    pub fn from_words<I, S>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut words = Vec::new();
        let mut index = HashSet::new();

        for candidate in candidates {
            let word = candidate.as_ref().trim().to_lowercase();
            if word.chars().count() <= 1 || word.chars().any(char::is_whitespace) {
                continue;
            }
            if index.insert(word.clone()) {
                words.push(word);
            }
        }

        if words.is_empty() {
            return Err(GameError::EmptyDictionary);
        }

        Ok(Self { words, index })
    }

    /// Case-insensitive exact membership test.
    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        let trimmed = word.trim();
        if self.index.contains(trimmed) {
            return true;
        }
        self.index.contains(&trimmed.to_lowercase())
    }

    /// Pick a 2-3 letter challenge that is a slice of some bank word.
    ///
    /// A two-letter word is returned whole. Longer words yield a slice of
    /// uniformly chosen length (2 or 3) at a uniformly chosen offset.
    pub fn random_sequence<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if self.words.is_empty() {
            return FALLBACK_SEQUENCE.to_string();
        }

        let word = &self.words[rng.gen_range(0..self.words.len())];
        let chars: Vec<char> = word.chars().collect();
        if chars.len() == MIN_SEQUENCE_LEN {
            return word.clone();
        }

        let len = rng.gen_range(MIN_SEQUENCE_LEN..=MAX_SEQUENCE_LEN);
        let start = rng.gen_range(0..=chars.len() - len);
        chars[start..start + len].iter().collect()
    }

    /// Number of words in the bank.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the bank is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate words in load order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_filters_short_and_blank_entries() {
        let bank = WordBank::from_words(["a", "", "  ", "Cat", "dog ", "ice cream"]).unwrap();
        assert_eq!(bank.len(), 2);
        assert!(bank.contains("cat"));
        assert!(bank.contains("dog"));
        assert!(!bank.contains("a"));
        assert!(!bank.contains("ice cream"));
    }

    #[test]
    fn test_deduplicates_case_variants() {
        let bank = WordBank::from_words(["Tree", "tree", "TREE"]).unwrap();
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let bank = WordBank::from_words(["planet"]).unwrap();
        assert!(bank.contains("PLANET"));
        assert!(bank.contains("Planet"));
        assert!(!bank.contains("planets"));
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let err = WordBank::from_words(["x", ""]).unwrap_err();
        assert!(matches!(err, GameError::EmptyDictionary));
        assert!(err.is_dictionary_failure());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = WordBank::load("/definitely/not/here/words.txt").unwrap_err();
        assert!(matches!(err, GameError::DictionaryUnavailable { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "apple\nq\nBanana\n\ncherry").unwrap();

        let bank = WordBank::load(file.path()).unwrap();
        assert_eq!(bank.len(), 3);
        assert!(bank.contains("banana"));
    }

    #[test]
    fn test_two_letter_word_returned_whole() {
        let bank = WordBank::from_words(["ox"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(bank.random_sequence(&mut rng), "ox");
        }
    }

    #[test]
    fn test_three_letter_word_slices() {
        let bank = WordBank::from_words(["cat"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let seq = bank.random_sequence(&mut rng);
            assert!(["ca", "at", "cat"].contains(&seq.as_str()), "got {seq}");
        }
    }

    #[test]
    fn test_empty_bank_falls_back() {
        let bank = WordBank::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(bank.random_sequence(&mut rng), FALLBACK_SEQUENCE);
    }

    #[test]
    fn test_non_ascii_words_slice_on_chars() {
        let bank = WordBank::from_words(["café"]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let seq = bank.random_sequence(&mut rng);
            assert!("café".contains(&seq));
        }
    }
}
