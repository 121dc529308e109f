//! Session lifecycle and fail-fast shutdown.
//!
//! The supervisor alternates between the lobby and a match in an explicit
//! loop. Any channel failure ends the whole session: everyone still
//! connected gets an error notice, every channel is closed, and
//! [`SessionSupervisor::run`] returns [`SessionEnd::Disconnected`], which
//! the binary maps to [`EXIT_DISCONNECT`].

use std::net::SocketAddr;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::sleep;
use wordgame_core::word_bank::WordBank;

use crate::broadcast::Broadcaster;
use crate::connection::{Acceptor, LineReader};
use crate::engine::{MatchOutcome, TurnEngine};
use crate::error::Result;
use crate::lobby::{Lobby, LobbyOutcome};
use crate::registry::PlayerRegistry;
use crate::{ReplayPolicy, ServerConfig};

/// Exit status after a normal end.
pub const EXIT_OK: u8 = 0;

/// Exit status when the server could not start.
pub const EXIT_STARTUP_FAILURE: u8 = 1;

/// Exit status after a fail-fast shutdown.
pub const EXIT_DISCONNECT: u8 = 3;

const REPLAY_PROMPT: &str =
    "Game over! Type 'quit' to shut down server, or press Enter to start a new game: ";

/// Session-wide fail-fast trigger.
///
/// The first call to [`Shutdown::trigger`] records who caused it; later
/// calls are ignored. Subscribers are woken once.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Untriggered shutdown handle.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request fail-fast shutdown. Returns `true` if this call was first.
    pub fn trigger(&self, player: &str) -> bool {
        self.tx.send_if_modified(|reason| {
            if reason.is_some() {
                return false;
            }
            *reason = Some(player.to_string());
            true
        })
    }

    /// Who triggered shutdown, if anyone.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Receiver that changes when shutdown is triggered.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

/// How a supervised session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Matches were played and the operator (or policy) stopped.
    Finished,
    /// The lobby could never reach the minimum headcount.
    LobbyAborted,
    /// Fail-fast shutdown after the named player's channel failed.
    Disconnected(String),
}

impl SessionEnd {
    /// Process exit status for this ending.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionEnd::Finished | SessionEnd::LobbyAborted => EXIT_OK,
            SessionEnd::Disconnected(_) => EXIT_DISCONNECT,
        }
    }
}

/// Owns the listener and the word bank across matches.
pub struct SessionSupervisor<A = TcpListener> {
    config: ServerConfig,
    bank: Arc<WordBank>,
    listener: A,
    matches_played: u64,
}

impl SessionSupervisor<TcpListener> {
    /// Load the dictionary, then bind the listener.
    ///
    /// Nothing is bound if the config or dictionary is unusable.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let bank = WordBank::load(&config.dictionary)?;
        let listener = TcpListener::bind(config.bind_addr()).await?;
        tracing::info!(addr = %config.bind_addr(), "Server listening");
        Ok(Self::new(config, bank, listener))
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<A: Acceptor> SessionSupervisor<A> {
    /// Supervisor over an already bound listener.
    #[must_use]
    pub fn new(config: ServerConfig, bank: WordBank, listener: A) -> Self {
        Self {
            config,
            bank: Arc::new(bank),
            listener,
            matches_played: 0,
        }
    }

    /// Run lobbies and matches until the session ends.
    pub async fn run(mut self) -> Result<SessionEnd> {
        loop {
            let registry = PlayerRegistry::new(self.config.lives_per_player);
            let broadcaster = Broadcaster::new(registry.clone());
            let shutdown = Shutdown::new();

            let lobby = Lobby::new(
                &self.listener,
                registry.clone(),
                broadcaster.clone(),
                &self.config,
                shutdown.clone(),
            );
            let roster = match lobby.run().await {
                Ok(LobbyOutcome::Started(roster)) => roster,
                Ok(LobbyOutcome::Aborted) => {
                    registry.close_all().await;
                    return Ok(SessionEnd::LobbyAborted);
                }
                Ok(LobbyOutcome::Disconnected(name)) => {
                    fail_fast(&registry, &broadcaster, &name).await;
                    return Ok(SessionEnd::Disconnected(name));
                }
                Err(e) => {
                    registry.close_all().await;
                    return Err(e);
                }
            };

            let engine = TurnEngine::new(
                registry.clone(),
                broadcaster.clone(),
                Arc::clone(&self.bank),
                self.config.clone(),
                self.match_rng(),
                roster,
            );
            self.matches_played += 1;

            let winner = match engine.run().await {
                Ok(MatchOutcome::Winner(name)) => Some(name),
                Ok(MatchOutcome::NoWinner) => None,
                Ok(MatchOutcome::Disconnected(name)) => {
                    fail_fast(&registry, &broadcaster, &name).await;
                    return Ok(SessionEnd::Disconnected(name));
                }
                Err(e) => {
                    broadcaster
                        .send_all("\\nERROR: Internal server error. Server will shut down.\\n")
                        .await;
                    registry.close_all().await;
                    return Err(e);
                }
            };

            if !self.on_game_over(&registry, &broadcaster, winner.as_deref()).await? {
                return Ok(SessionEnd::Finished);
            }
            tracing::info!(matches = self.matches_played, "Reopening lobby");
        }
    }

    /// Announce the result, close the match's channels, and decide on a replay.
    async fn on_game_over(
        &self,
        registry: &PlayerRegistry,
        broadcaster: &Broadcaster,
        winner: Option<&str>,
    ) -> Result<bool> {
        match winner {
            Some(name) => tracing::info!(winner = %name, "Game over"),
            None => tracing::info!("Game over without a winner"),
        }

        let result = winner.map_or_else(
            || "No winner this time.\n".to_string(),
            |name| format!("Winner: {name}!! Congrats\n"),
        );
        for line in ["\\n=== GAME OVER ===\\n", result.as_str(), "Thanks for playing!\n"] {
            broadcaster.send_all(line).await;
            sleep(self.config.pacing()).await;
        }
        registry.close_all().await;

        match self.config.replay {
            ReplayPolicy::Always => Ok(true),
            ReplayPolicy::Never => Ok(false),
            ReplayPolicy::Prompt => ask_operator().await,
        }
    }

    fn match_rng(&self) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(self.matches_played)),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

/// Tear the session down after a channel failure.
///
/// Notifies everyone still reachable, then closes every channel.
pub async fn fail_fast(registry: &PlayerRegistry, broadcaster: &Broadcaster, player: &str) {
    tracing::error!(player = %player, "Player disconnected, shutting down session");
    broadcaster
        .send_all(&format!(
            "\\nERROR: {player} disconnected! Server will shut down.\\n"
        ))
        .await;
    registry.close_all().await;
}

/// Ask on stdin whether to start another match. EOF or `quit` means no.
async fn ask_operator() -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(REPLAY_PROMPT.as_bytes()).await?;
    stdout.flush().await?;

    let mut stdin = LineReader::new(tokio::io::stdin());
    let again = match stdin.next_line().await? {
        Some(answer) => !answer.trim().eq_ignore_ascii_case("quit"),
        None => false,
    };
    if !again {
        tracing::info!("Operator ended the session");
    }
    Ok(again)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::sync::{mpsc, Mutex};
    use tokio::time::timeout;
    use wordgame_test_utils::fixtures::bank;

    use super::*;
    use crate::connection::Connection;
    use crate::registry::NAME_PROMPT;

    const WAIT: Duration = Duration::from_secs(5);

    /// Hands out in-memory connections queued by the test.
    struct Queue(Mutex<mpsc::UnboundedReceiver<Connection>>);

    impl Acceptor for Queue {
        async fn accept(&self) -> io::Result<Connection> {
            self.0
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionAborted, "queue closed"))
        }
    }

    /// Client ends of one queued connection.
    struct Peer {
        to_server: DuplexStream,
        from_server: DuplexStream,
    }

    fn connect(queue: &mpsc::UnboundedSender<Connection>, name: &str) -> Peer {
        let (to_server, server_in) = duplex(1024);
        let (server_out, from_server) = duplex(1024);
        queue
            .send(Connection::new(server_in, server_out, name))
            .unwrap();
        Peer {
            to_server,
            from_server,
        }
    }

    async fn read_until(stream: &mut DuplexStream, needle: &str) -> String {
        let mut seen = String::new();
        let mut chunk = [0u8; 256];
        while !seen.contains(needle) {
            let n = timeout(WAIT, stream.read(&mut chunk)).await.unwrap().unwrap();
            assert!(n > 0, "closed before {needle:?}; got {seen:?}");
            seen.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
        seen
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_shutdown_records_first_trigger() {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.trigger("ada"));
        assert!(!shutdown.trigger("bo"));
        assert_eq!(shutdown.reason().as_deref(), Some("ada"));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(SessionEnd::Finished.exit_code(), EXIT_OK);
        assert_eq!(SessionEnd::LobbyAborted.exit_code(), EXIT_OK);
        assert_eq!(
            SessionEnd::Disconnected("ada".into()).exit_code(),
            EXIT_DISCONNECT
        );
        assert_ne!(EXIT_DISCONNECT, EXIT_STARTUP_FAILURE);
    }

    #[tokio::test]
    async fn test_bind_refuses_missing_dictionary() {
        let config = ServerConfig {
            dictionary: "/no/such/words.txt".into(),
            port: 0,
            ..Default::default()
        };
        let err = SessionSupervisor::bind(config).await.err().unwrap();
        assert!(err.is_startup_failure());
    }

    #[tokio::test]
    async fn test_session_future_is_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let supervisor = SessionSupervisor::new(ServerConfig::default(), bank(&["cat"]), listener);
        let session = supervisor.run();
        assert_send(&session);
    }

    #[tokio::test]
    async fn test_full_lobby_below_minimum_aborts() {
        let config = ServerConfig {
            min_players: 2,
            max_players: 2,
            pacing_ms: 0,
            name_timeout_secs: 5,
            replay: ReplayPolicy::Never,
            ..Default::default()
        };
        let (queue, incoming) = mpsc::unbounded_channel();
        let supervisor = SessionSupervisor::new(config, bank(&["cat"]), Queue(Mutex::new(incoming)));
        let session = tokio::spawn(supervisor.run());

        let mut ada = connect(&queue, "ada");
        read_until(&mut ada.from_server, NAME_PROMPT).await;
        ada.to_server.write_all(b"ada\n").await.unwrap();
        read_until(&mut ada.from_server, "Welcome, ada").await;

        // Bo stops reading after the prompt but keeps sending, so the
        // welcome write fails without the channel ever reaching EOF.
        let Peer {
            mut to_server,
            mut from_server,
        } = connect(&queue, "bo");
        read_until(&mut from_server, NAME_PROMPT).await;
        drop(from_server);
        to_server.write_all(b"bo\n").await.unwrap();

        let end = timeout(WAIT, session).await.unwrap().unwrap().unwrap();
        assert_eq!(end, SessionEnd::LobbyAborted);
        assert_eq!(end.exit_code(), EXIT_OK);

        let mut rest = Vec::new();
        timeout(WAIT, ada.from_server.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        drop(to_server);
    }
}
