//! Round-robin turn state machine.
//!
//! `TurnState` owns everything about a match except the players
//! themselves: the turn and round counters, the used-word set, and the
//! current challenge. The server holds the players behind its registry
//! lock and lends them in for each step.
//!
//! # Phases
//!
//! ```text
//! AwaitingTurn --begin_turn--> AwaitingResponse(seat)
//! AwaitingResponse(seat) --resolve--> Resolved(seat, verdict)
//! Resolved --begin_turn--> AwaitingResponse(next) | GameOver(winner)
//! ```
//!
//! # Sequence policy
//!
//! A fresh sequence is drawn on the first turn and after every accepted
//! word. After a rejection or timeout the same sequence is carried over to
//! the next eligible player, who may be someone else.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{GameError, Result};
use crate::player::Player;
use crate::validation::{judge, Verdict};
use crate::word_bank::WordBank;

/// Where the match currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn in progress yet.
    AwaitingTurn,
    /// Waiting on the player at `seat`.
    AwaitingResponse {
        /// Roster position of the acting player.
        seat: usize,
    },
    /// The last turn has been judged.
    Resolved {
        /// Roster position of the player who acted.
        seat: usize,
        /// What happened.
        verdict: Verdict,
    },
    /// Match finished.
    GameOver {
        /// Roster position of the winner, if anyone is left.
        winner: Option<usize>,
    },
}

/// A turn handed to one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Roster position of the acting player.
    pub seat: usize,
    /// Challenge the answer must contain.
    pub sequence: String,
    /// Whether the sequence was drawn for this turn.
    pub fresh_sequence: bool,
    /// Round number, starting at 1.
    pub round: u32,
    /// Turn counter at the time the turn began.
    pub turn: u64,
}

/// Result of [`TurnState::begin_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStart {
    /// Someone has to answer.
    Play(Turn),
    /// At most one eligible player remains.
    GameOver {
        /// Roster position of the winner.
        winner: Option<usize>,
    },
}

/// Result of [`TurnState::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Roster position of the player who acted.
    pub seat: usize,
    /// Judgment on the submission.
    pub verdict: Verdict,
    /// Sequence the submission was judged against.
    pub sequence: String,
    /// Lives the player has left.
    pub lives: u32,
}

/// Match bookkeeping over a frozen roster.
#[derive(Debug, Clone)]
pub struct TurnState {
    roster_size: usize,
    turn: u64,
    round: u32,
    used_words: HashSet<String>,
    sequence: Option<String>,
    last_word_valid: bool,
    phase: TurnPhase,
}

impl TurnState {
    /// Start a match over `roster_size` seats.
    #[must_use]
    pub fn new(roster_size: usize) -> Self {
        Self {
            roster_size,
            turn: 0,
            round: 1,
            used_words: HashSet::new(),
            sequence: None,
            last_word_valid: true,
            phase: TurnPhase::AwaitingTurn,
        }
    }

    /// Pick the next eligible player and the sequence they must match.
    ///
    /// Ineligible seats are skipped, and skipping still advances the turn
    /// counter. Returns [`TurnStart::GameOver`] once one or fewer players
    /// are eligible.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if a response is still pending
    /// or `players` does not match the roster size.
    pub fn begin_turn<R: Rng + ?Sized>(
        &mut self,
        players: &[Player],
        bank: &WordBank,
        rng: &mut R,
    ) -> Result<TurnStart> {
        self.check_roster(players)?;
        match self.phase {
            TurnPhase::AwaitingResponse { seat } => {
                return Err(GameError::InvalidState(format!(
                    "turn for seat {seat} has not been resolved"
                )));
            }
            TurnPhase::GameOver { winner } => return Ok(TurnStart::GameOver { winner }),
            TurnPhase::AwaitingTurn | TurnPhase::Resolved { .. } => {}
        }

        if Self::remaining(players) <= 1 {
            let winner = Self::winner(players);
            self.phase = TurnPhase::GameOver { winner };
            return Ok(TurnStart::GameOver { winner });
        }

        // At least two eligible players exist, so one full lap finds one.
        let mut seat = self.current_seat();
        while !players[seat].is_eligible() {
            tracing::debug!(
                player = %players[seat].name,
                lives = players[seat].lives,
                "Skipping ineligible player"
            );
            self.advance();
            seat = self.current_seat();
        }

        let fresh_sequence = self.last_word_valid || self.sequence.is_none();
        if fresh_sequence {
            self.sequence = Some(bank.random_sequence(rng));
        }
        let sequence = self.sequence.clone().unwrap_or_default();

        self.phase = TurnPhase::AwaitingResponse { seat };
        Ok(TurnStart::Play(Turn {
            seat,
            sequence,
            fresh_sequence,
            round: self.round,
            turn: self.turn,
        }))
    }

    /// Judge the pending player's normalized submission and apply it.
    ///
    /// An empty submission counts as a timeout. A rejection costs exactly
    /// one life; an acceptance costs none and retires the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if no turn is pending.
    pub fn resolve(
        &mut self,
        players: &mut [Player],
        submission: &str,
        bank: &WordBank,
    ) -> Result<TurnOutcome> {
        self.check_roster(players)?;
        let TurnPhase::AwaitingResponse { seat } = self.phase else {
            return Err(GameError::InvalidState(
                "resolve called with no pending turn".to_string(),
            ));
        };

        let sequence = self.sequence.clone().unwrap_or_default();
        let verdict = judge(submission, &sequence, bank, &self.used_words);
        let player = &mut players[seat];

        match &verdict {
            Verdict::Accepted(word) => {
                self.used_words.insert(word.clone());
                self.last_word_valid = true;
            }
            Verdict::Rejected(_) => {
                player.lose_life();
                self.last_word_valid = false;
            }
        }

        let outcome = TurnOutcome {
            seat,
            verdict: verdict.clone(),
            sequence,
            lives: player.lives,
        };

        self.advance();
        self.phase = TurnPhase::Resolved { seat, verdict };
        Ok(outcome)
    }

    /// Number of eligible players.
    #[must_use]
    pub fn remaining(players: &[Player]) -> usize {
        players.iter().filter(|p| p.is_eligible()).count()
    }

    /// The sole eligible player, if exactly one is left.
    #[must_use]
    pub fn winner(players: &[Player]) -> Option<usize> {
        if Self::remaining(players) != 1 {
            return None;
        }
        players.iter().position(Player::is_eligible)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> &TurnPhase {
        &self.phase
    }

    /// Current round, starting at 1.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Turns taken or skipped so far.
    #[must_use]
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Current challenge, once one has been drawn.
    #[must_use]
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    /// Words accepted so far.
    #[must_use]
    pub fn used_words(&self) -> &HashSet<String> {
        &self.used_words
    }

    /// Whether the last resolved turn was an acceptance.
    #[must_use]
    pub fn last_word_valid(&self) -> bool {
        self.last_word_valid
    }

    fn current_seat(&self) -> usize {
        // roster_size is non-zero whenever check_roster passed with players.
        (self.turn % self.roster_size as u64) as usize
    }

    fn advance(&mut self) {
        self.turn += 1;
        if self.turn % self.roster_size as u64 == 0 {
            self.round += 1;
        }
    }

    fn check_roster(&self, players: &[Player]) -> Result<()> {
        if self.roster_size == 0 || players.len() != self.roster_size {
            return Err(GameError::InvalidState(format!(
                "roster has {} players, expected {}",
                players.len(),
                self.roster_size
            )));
        }
        Ok(())
    }
}
