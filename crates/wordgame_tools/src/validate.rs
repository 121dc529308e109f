//! Data validation utilities.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use wordgame_core::error::GameError;
use wordgame_core::word_bank::WordBank;
use wordgame_server::error::ServerError;
use wordgame_server::ServerConfig;

/// Error type for validation commands.
#[derive(Error, Debug)]
pub enum ValidateError {
    /// Dictionary could not be used.
    #[error(transparent)]
    Dictionary(#[from] GameError),
    /// Config could not be used.
    #[error(transparent)]
    Config(#[from] ServerError),
}

/// Summary of a usable dictionary.
#[derive(Debug, Clone)]
pub struct DictionaryReport {
    /// Words kept after filtering.
    pub words: usize,
    /// Shortest kept word, in characters.
    pub shortest: usize,
    /// Longest kept word, in characters.
    pub longest: usize,
    /// Example challenge sequences.
    pub samples: Vec<String>,
}

/// Load a dictionary the way the server does and summarize it.
///
/// # Errors
///
/// Returns an error if the file is missing or holds no usable words.
pub fn check_dictionary(path: &Path, samples: usize) -> Result<DictionaryReport, ValidateError> {
    let bank = WordBank::load(path)?;
    let (shortest, longest) = bank
        .iter()
        .map(|w| w.chars().count())
        .fold((usize::MAX, 0), |(lo, hi), len| (lo.min(len), hi.max(len)));

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let samples = (0..samples).map(|_| bank.random_sequence(&mut rng)).collect();

    Ok(DictionaryReport {
        words: bank.len(),
        shortest,
        longest,
        samples,
    })
}

/// Parse and validate a RON server config.
///
/// # Errors
///
/// Returns an error if the file is missing, malformed, or inconsistent.
pub fn check_config(path: &Path) -> Result<ServerConfig, ValidateError> {
    let config = ServerConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_dictionary_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a\nox\nplanet\ncat").unwrap();

        let report = check_dictionary(file.path(), 5).unwrap();
        assert_eq!(report.words, 3);
        assert_eq!(report.shortest, 2);
        assert_eq!(report.longest, 6);
        assert_eq!(report.samples.len(), 5);
        assert!(report
            .samples
            .iter()
            .all(|s| ["ox", "planet", "cat"].iter().any(|w| w.contains(s.as_str()))));
    }

    #[test]
    fn test_empty_dictionary_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a\n\nb").unwrap();
        assert!(matches!(
            check_dictionary(file.path(), 1),
            Err(ValidateError::Dictionary(GameError::EmptyDictionary))
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(min_players: 6, max_players: 4)").unwrap();
        assert!(matches!(
            check_config(file.path()),
            Err(ValidateError::Config(ServerError::InvalidConfig(_)))
        ));

        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "(port: 9000)").unwrap();
        assert_eq!(check_config(good.path()).unwrap().port, 9000);
    }
}
