//! The turn loop.
//!
//! Drives [`TurnState`] over the frozen roster: announce the turn, prompt
//! the acting player, wait up to the round time for one line, then judge
//! it and report. The engine owns every player's read half for the whole
//! match, so it is the only reader once the lobby has handed over.
//!
//! Validation outcomes never leave a turn. A channel failure on the acting
//! player, or any player flagged disconnected by the broadcaster, ends the
//! match with [`MatchOutcome::Disconnected`] so the supervisor can fail fast.

use std::collections::HashMap;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use tokio::time::{sleep, timeout};
use wordgame_core::player::{Player, PlayerId};
use wordgame_core::turn::{Turn, TurnOutcome, TurnStart, TurnState};
use wordgame_core::validation::{normalize_submission, Rejection, Verdict};
use wordgame_core::word_bank::WordBank;

use crate::broadcast::Broadcaster;
use crate::connection::LineReader;
use crate::error::{Result, ServerError};
use crate::lobby::Roster;
use crate::registry::PlayerRegistry;
use crate::ServerConfig;

/// How a match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// One player kept lives.
    Winner(String),
    /// Nobody was left eligible.
    NoWinner,
    /// A channel failed; the named player triggered fail-fast.
    Disconnected(String),
}

/// Runs one match to completion.
pub struct TurnEngine {
    registry: PlayerRegistry,
    broadcaster: Broadcaster,
    bank: Arc<WordBank>,
    config: ServerConfig,
    rng: ChaCha8Rng,
    readers: HashMap<PlayerId, LineReader>,
    state: TurnState,
}

impl TurnEngine {
    /// Engine over a roster handed off by the lobby.
    #[must_use]
    pub fn new(
        registry: PlayerRegistry,
        broadcaster: Broadcaster,
        bank: Arc<WordBank>,
        config: ServerConfig,
        rng: ChaCha8Rng,
        roster: Roster,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            bank,
            config,
            rng,
            state: TurnState::new(roster.players.len()),
            readers: roster.readers,
        }
    }

    /// Play turns until one player is left or a channel fails.
    pub async fn run(mut self) -> Result<MatchOutcome> {
        self.announce_start().await;

        loop {
            if let Some(gone) = self.registry.first_disconnected().await {
                return Ok(MatchOutcome::Disconnected(gone.name));
            }

            let start = {
                let state = &mut self.state;
                let bank = &self.bank;
                let rng = &mut self.rng;
                self.registry
                    .with_players(|players| state.begin_turn(players, bank, rng))
                    .await?
            };

            let turn = match start {
                TurnStart::Play(turn) => turn,
                TurnStart::GameOver { winner } => {
                    let players = self.registry.snapshot().await;
                    return Ok(winner
                        .and_then(|seat| players.get(seat))
                        .map_or(MatchOutcome::NoWinner, |p| {
                            MatchOutcome::Winner(p.name.clone())
                        }));
                }
            };

            let players = self.registry.snapshot().await;
            let actor = players
                .get(turn.seat)
                .cloned()
                .ok_or_else(|| ServerError::ChannelFailure {
                    player: format!("seat {}", turn.seat),
                    reason: "seat outside roster".to_string(),
                })?;

            self.announce_turn(&turn, &actor, &players).await;

            let Some(submission) = self.read_answer(&actor).await? else {
                self.registry.mark_disconnected(actor.id).await;
                return Ok(MatchOutcome::Disconnected(actor.name));
            };

            // The prompt or summary writes may have failed meanwhile.
            if let Some(gone) = self.registry.first_disconnected().await {
                return Ok(MatchOutcome::Disconnected(gone.name));
            }

            let outcome = {
                let state = &mut self.state;
                let bank = &self.bank;
                self.registry
                    .with_players(|players| state.resolve(players, &submission, bank))
                    .await?
            };

            tracing::info!(
                player = %actor.name,
                round = turn.round,
                turn = turn.turn,
                sequence = %outcome.sequence,
                verdict = %outcome.verdict,
                lives = outcome.lives,
                "Turn resolved"
            );
            self.report(&actor, &outcome).await;
            sleep(self.config.pacing()).await;
        }
    }

    /// Wait for the acting player's line.
    ///
    /// `Some("")` for a timeout or empty line, `None` if the channel is gone.
    async fn read_answer(&mut self, actor: &Player) -> Result<Option<String>> {
        let reader = self
            .readers
            .get_mut(&actor.id)
            .ok_or_else(|| ServerError::ChannelFailure {
                player: actor.name.clone(),
                reason: "no reader handed over".to_string(),
            })?;

        match timeout(self.config.round_time(), reader.next_line()).await {
            Err(_) => {
                tracing::debug!(player = %actor.name, "Turn timed out");
                Ok(Some(String::new()))
            }
            Ok(Ok(Some(line))) => Ok(Some(normalize_submission(&line))),
            Ok(Ok(None)) => {
                tracing::warn!(player = %actor.name, "Connection closed during turn");
                Ok(None)
            }
            Ok(Err(e)) => {
                tracing::warn!(player = %actor.name, error = %e, "Read failed during turn");
                Ok(None)
            }
        }
    }

    async fn announce_start(&mut self) {
        let players = self.registry.snapshot().await;
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        let lives = self.config.lives_per_player;
        let secs = self.config.round_time_secs;

        let lines = [
            "=== GAME STARTED ===\n".to_string(),
            format!("Players: {}\n", names.join(", ")),
            format!("Rules: Each player has {lives} lives\n"),
            format!("Type a word containing the given sequence within {secs} seconds\n"),
            "Used words cannot be repeated\n".to_string(),
            "Last player with lives wins!\n".to_string(),
        ];
        for line in &lines {
            self.broadcaster.send_all(line).await;
            sleep(self.config.pacing()).await;
        }
    }

    async fn announce_turn(&mut self, turn: &Turn, actor: &Player, players: &[Player]) {
        let remaining: Vec<String> = players
            .iter()
            .filter(|p| p.is_eligible())
            .map(|p| format!("{}({})", p.name, p.lives))
            .collect();

        self.broadcaster
            .send_all(&format!(
                "=== ROUND {} ===\nRemaining players: {} \nTurn: {} (Lives: {}) \n",
                turn.round,
                remaining.join(", "),
                actor.name,
                actor.lives
            ))
            .await;

        // Anything typed before the prompt is not an answer to it.
        if let Some(reader) = self.readers.get_mut(&actor.id) {
            let stale = reader.discard_ready().await;
            if stale > 0 {
                tracing::debug!(player = %actor.name, lines = stale, "Dropped early input");
            }
        }

        self.broadcaster
            .send_one(
                actor.id,
                &format!(
                    "Your turn, {}! Sequence: '{}' (You have {} seconds) \nType your word now: ",
                    actor.name, turn.sequence, self.config.round_time_secs
                ),
            )
            .await;
        self.broadcaster
            .send_others(
                actor.id,
                &format!("{}'s turn! Sequence: '{}' \n", actor.name, turn.sequence),
            )
            .await;
    }

    async fn report(&mut self, actor: &Player, outcome: &TurnOutcome) {
        let lives = outcome.lives;
        let (to_actor, to_others) = match &outcome.verdict {
            Verdict::Accepted(word) => (
                format!("Correct! '{word}' is valid.\n"),
                format!("{} answered: '{word}'\n", actor.name),
            ),
            Verdict::Rejected(Rejection::Timeout) => (
                format!("\nTIMEOUT! You lose a life. Lives remaining: {lives}\n"),
                format!("{} timed out! Lives remaining: {lives}\n", actor.name),
            ),
            Verdict::Rejected(rejection) => {
                let reason = rejection.reason(&outcome.sequence);
                (
                    format!("Wrong! {reason}. You lose a life. Lives remaining: {lives}\n"),
                    format!("{} is wrong! ({reason}) Lives remaining: {lives}\n", actor.name),
                )
            }
        };

        self.broadcaster.send_one(actor.id, &to_actor).await;
        self.broadcaster.send_others(actor.id, &to_others).await;

        if !outcome.verdict.is_accepted() && lives == 0 {
            self.broadcaster
                .send_all(&format!("{} is out of lives!\n", actor.name))
                .await;
        }
    }
}
