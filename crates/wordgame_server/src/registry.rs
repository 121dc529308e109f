//! The authoritative roster of connected players.
//!
//! Every read-modify-write of a player's lives or flags happens while
//! holding the registry lock. Lobby listeners, the broadcaster and the
//! turn engine all share one [`PlayerRegistry`] handle; none of them gets a
//! raw reference to a [`Player`].
//!
//! Write halves live here as well, each behind its own lock so a slow
//! client never holds up the roster. Read halves do not: they are handed
//! back to the caller on admission and move from the lobby listener to the
//! turn engine exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use wordgame_core::player::{Player, PlayerId};

use crate::connection::{BoxedWriter, Connection, LineReader};
use crate::error::{Result, ServerError};

/// Longest display name kept, in characters.
pub const MAX_NAME_CHARS: usize = 24;

/// Prompt sent to every new connection.
pub const NAME_PROMPT: &str = "Enter your name: ";

/// Sent to a connection that arrives after the roster froze.
pub const LOBBY_CLOSED_NOTICE: &str = "Game already started. Try again later.\n";

const NOTICE_TIMEOUT: Duration = Duration::from_secs(1);

/// A write half shared between broadcaster calls.
pub type SharedWriter = Arc<Mutex<BoxedWriter>>;

/// Which connected players a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Everyone connected.
    All,
    /// A single player.
    One(PlayerId),
    /// Everyone connected except one player.
    AllExcept(PlayerId),
}

impl Audience {
    fn includes(self, id: PlayerId) -> bool {
        match self {
            Audience::All => true,
            Audience::One(target) => target == id,
            Audience::AllExcept(excluded) => excluded != id,
        }
    }
}

/// A player accepted into the lobby, with the read half now owned by the caller.
#[derive(Debug)]
pub struct Admission {
    /// The stored player state at admission time.
    pub player: Player,
    /// Framed read half of the player's channel.
    pub reader: LineReader,
}

#[derive(Default)]
struct RegistryInner {
    players: Vec<Player>,
    writers: HashMap<PlayerId, SharedWriter>,
    next_id: u32,
    frozen: bool,
}

/// Shared handle to the session roster.
#[derive(Clone)]
pub struct PlayerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    starting_lives: u32,
}

impl PlayerRegistry {
    /// Empty registry; admitted players start with `starting_lives`.
    #[must_use]
    pub fn new(starting_lives: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            starting_lives,
        }
    }

    /// Store a connection that has named itself as a new player.
    ///
    /// The name is trimmed and shortened; an empty name becomes `Player<N>`
    /// and a taken name gets a `#<n>` suffix.
    ///
    /// # Errors
    ///
    /// [`ServerError::LobbyClosed`] if the roster is frozen. The connection
    /// is told so and closed.
    pub async fn admit(&self, connection: Connection, raw_name: &str) -> Result<Admission> {
        let mut inner = self.inner.lock().await;
        if inner.frozen {
            drop(inner);
            turn_away(connection).await;
            return Err(ServerError::LobbyClosed);
        }

        let Connection {
            reader,
            writer,
            peer,
        } = connection;

        inner.next_id += 1;
        let id = PlayerId(inner.next_id);
        let name = unique_name(raw_name, id, &inner.players);
        let player = Player::new(id, name, self.starting_lives);

        inner.players.push(player.clone());
        inner.writers.insert(id, Arc::new(Mutex::new(writer)));
        tracing::info!(player = %player.name, id = %id, %peer, "Player admitted");

        Ok(Admission { player, reader })
    }

    /// Copy of every player, in admission order.
    pub async fn snapshot(&self) -> Vec<Player> {
        self.inner.lock().await.players.clone()
    }

    /// Look up one player.
    pub async fn get(&self, id: PlayerId) -> Option<Player> {
        let inner = self.inner.lock().await;
        inner.players.iter().find(|p| p.id == id).cloned()
    }

    /// Flag a channel failure. Returns `true` the first time.
    pub async fn mark_disconnected(&self, id: PlayerId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.players.iter_mut().find(|p| p.id == id) {
            Some(player) if !player.disconnected => {
                player.mark_disconnected();
                tracing::warn!(player = %player.name, "Player marked disconnected");
                true
            }
            _ => false,
        }
    }

    /// Players that are active and not disconnected.
    pub async fn active_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.players.iter().filter(|p| p.is_connected()).count()
    }

    /// Number of admitted players, connected or not.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.players.len()
    }

    /// Whether nobody has been admitted.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.players.is_empty()
    }

    /// Close admission and return the roster in admission order.
    pub async fn freeze(&self) -> Vec<PlayerId> {
        let mut inner = self.inner.lock().await;
        inner.frozen = true;
        inner.players.iter().map(|p| p.id).collect()
    }

    /// Run `f` over the roster while holding the lock.
    pub async fn with_players<T>(&self, f: impl FnOnce(&mut [Player]) -> T) -> T {
        let mut inner = self.inner.lock().await;
        f(inner.players.as_mut_slice())
    }

    /// The first player whose channel has failed, if any.
    pub async fn first_disconnected(&self) -> Option<Player> {
        let inner = self.inner.lock().await;
        inner.players.iter().find(|p| p.disconnected).cloned()
    }

    /// Write halves of the connected players in `audience`.
    pub async fn targets(&self, audience: Audience) -> Vec<(PlayerId, SharedWriter)> {
        let inner = self.inner.lock().await;
        inner
            .players
            .iter()
            .filter(|p| p.is_connected() && audience.includes(p.id))
            .filter_map(|p| inner.writers.get(&p.id).map(|w| (p.id, Arc::clone(w))))
            .collect()
    }

    /// Shut down every write half and deactivate everyone.
    ///
    /// Read halves close when their owner drops them.
    pub async fn close_all(&self) {
        let writers: Vec<(PlayerId, SharedWriter)> = {
            let mut inner = self.inner.lock().await;
            inner.frozen = true;
            for player in &mut inner.players {
                player.active = false;
            }
            inner.writers.drain().collect()
        };

        for (id, writer) in writers {
            let mut writer = writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(id = %id, error = %e, "Error closing channel");
            }
        }
        tracing::info!("All player channels closed");
    }
}

impl std::fmt::Debug for PlayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerRegistry")
            .field("starting_lives", &self.starting_lives)
            .finish_non_exhaustive()
    }
}

/// Prompt a new connection for its name and read one line.
///
/// Safe to cancel while waiting for the line; the connection stays usable.
///
/// # Errors
///
/// [`ServerError::ChannelFailure`] if the connection closes, fails, or
/// sends nothing within `name_timeout`.
pub async fn read_name(connection: &mut Connection, name_timeout: Duration) -> Result<String> {
    let peer = connection.peer.clone();
    let failure = |reason: String| ServerError::ChannelFailure {
        player: peer.clone(),
        reason,
    };

    let writer = &mut connection.writer;
    let prompt = async {
        writer.write_all(NAME_PROMPT.as_bytes()).await?;
        writer.flush().await
    };
    if let Err(e) = prompt.await {
        return Err(failure(e.to_string()));
    }

    match timeout(name_timeout, connection.reader.next_line()).await {
        Ok(Ok(Some(line))) => Ok(line),
        Ok(Ok(None)) => Err(failure("closed before sending a name".to_string())),
        Ok(Err(e)) => Err(failure(e.to_string())),
        Err(_) => Err(failure("no name within timeout".to_string())),
    }
}

/// Tell a connection the match has already started, then close it.
pub async fn turn_away(mut connection: Connection) {
    tracing::info!(peer = %connection.peer, "Refusing connection, match already started");
    let writer = &mut connection.writer;
    let notice = async {
        writer.write_all(LOBBY_CLOSED_NOTICE.as_bytes()).await?;
        writer.shutdown().await
    };
    match timeout(NOTICE_TIMEOUT, notice).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(peer = %connection.peer, error = %e, "Could not deliver refusal"),
        Err(_) => tracing::debug!(peer = %connection.peer, "Refusal write timed out"),
    }
}

fn unique_name(raw: &str, id: PlayerId, taken: &[Player]) -> String {
    let base: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
    let base = if base.is_empty() {
        format!("Player{}", id.0)
    } else {
        base
    };

    let in_use = |candidate: &str| {
        taken
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(candidate))
    };
    if !in_use(&base) {
        return base;
    }
    let free = (2..)
        .map(|n| format!("{base}#{n}"))
        .find(|candidate| !in_use(candidate));
    free.unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    /// Returns the server-side connection plus the client's ends.
    fn pipe() -> (Connection, DuplexStream, DuplexStream) {
        let (client_out, server_in) = duplex(1024);
        let (server_out, client_in) = duplex(1024);
        (
            Connection::new(server_in, server_out, "test"),
            client_out,
            client_in,
        )
    }

    async fn admit_named(registry: &PlayerRegistry, name: &str) -> (Admission, DuplexStream) {
        let (conn, mut client_out, client_in) = pipe();
        client_out
            .write_all(format!("{name}\n").as_bytes())
            .await
            .unwrap();
        let mut conn = conn;
        let raw = read_name(&mut conn, WAIT).await.unwrap();
        let admission = registry.admit(conn, &raw).await.unwrap();
        (admission, client_in)
    }

    #[tokio::test]
    async fn test_admit_prompts_and_stores() {
        let registry = PlayerRegistry::new(3);
        let (admission, mut client_in) = admit_named(&registry, "  ada  ").await;

        assert_eq!(admission.player.name, "ada");
        assert_eq!(admission.player.lives, 3);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.active_count().await, 1);

        let mut prompt = vec![0u8; NAME_PROMPT.len()];
        client_in.read_exact(&mut prompt).await.unwrap();
        assert_eq!(prompt, NAME_PROMPT.as_bytes());
    }

    #[tokio::test]
    async fn test_names_are_unique_and_non_empty() {
        let registry = PlayerRegistry::new(3);
        let (first, _a) = admit_named(&registry, "bo").await;
        let (second, _b) = admit_named(&registry, "BO").await;
        let (third, _c) = admit_named(&registry, "").await;

        assert_eq!(first.player.name, "bo");
        assert_eq!(second.player.name, "BO#2");
        assert_eq!(third.player.name, "Player3");
    }

    #[tokio::test]
    async fn test_read_name_fails_on_closed_connection() {
        let (mut conn, client_out, _client_in) = pipe();
        drop(client_out);

        let err = read_name(&mut conn, WAIT).await.unwrap_err();
        assert!(matches!(err, ServerError::ChannelFailure { .. }));
    }

    #[tokio::test]
    async fn test_read_name_times_out_silent_connection() {
        let (mut conn, _client_out, _client_in) = pipe();
        let err = read_name(&mut conn, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::ChannelFailure { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_name_read_keeps_connection() {
        let (mut conn, mut client_out, _client_in) = pipe();
        let pending = timeout(Duration::from_millis(20), read_name(&mut conn, WAIT)).await;
        assert!(pending.is_err());

        client_out.write_all(b"late\n").await.unwrap();
        assert_eq!(conn.reader.next_line().await.unwrap().as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_frozen_registry_turns_connection_away() {
        let registry = PlayerRegistry::new(3);
        registry.freeze().await;
        let (conn, _client_out, mut client_in) = pipe();

        let err = registry.admit(conn, "late").await.unwrap_err();
        assert!(matches!(err, ServerError::LobbyClosed));
        assert!(registry.is_empty().await);

        let mut notice = String::new();
        client_in.read_to_string(&mut notice).await.unwrap();
        assert_eq!(notice, LOBBY_CLOSED_NOTICE);
    }

    #[tokio::test]
    async fn test_disconnect_excludes_from_targets() {
        let registry = PlayerRegistry::new(3);
        let (a, _a) = admit_named(&registry, "a").await;
        let (b, _b) = admit_named(&registry, "b").await;

        assert!(registry.mark_disconnected(a.player.id).await);
        assert!(!registry.mark_disconnected(a.player.id).await);
        assert_eq!(registry.active_count().await, 1);

        let ids: Vec<PlayerId> = registry
            .targets(Audience::All)
            .await
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![b.player.id]);
        assert_eq!(
            registry.first_disconnected().await.map(|p| p.id),
            Some(a.player.id)
        );
    }

    #[tokio::test]
    async fn test_close_all_ends_client_streams() {
        let registry = PlayerRegistry::new(3);
        let (_a, mut client_in) = admit_named(&registry, "a").await;
        registry.close_all().await;

        let mut rest = Vec::new();
        client_in.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, NAME_PROMPT.as_bytes());
        assert_eq!(registry.active_count().await, 0);
    }
}
