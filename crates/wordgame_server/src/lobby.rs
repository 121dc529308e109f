//! Lobby admission and the start hand-off.
//!
//! Connections are accepted one at a time until the lobby is full. Each
//! admitted player gets a listener task that is the only reader of that
//! player's channel until the match starts. When someone types `start`
//! with enough players present, the started flag flips, every listener
//! returns its [`LineReader`], and the lobby passes those readers to the
//! turn engine as part of the [`Roster`]. Read ownership moves once and
//! never comes back.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use wordgame_core::player::PlayerId;

use crate::broadcast::Broadcaster;
use crate::connection::{Acceptor, Connection, LineReader};
use crate::error::{Result, ServerError};
use crate::registry::{read_name, turn_away, PlayerRegistry};
use crate::supervisor::Shutdown;
use crate::ServerConfig;

/// Command that starts the match, compared case-insensitively.
pub const START_COMMAND: &str = "start";

/// Frozen match roster with the read halves handed over by the listeners.
#[derive(Debug)]
pub struct Roster {
    /// Players in admission order.
    pub players: Vec<PlayerId>,
    /// Read half for every roster player.
    pub readers: HashMap<PlayerId, LineReader>,
}

/// How the lobby ended.
#[derive(Debug)]
pub enum LobbyOutcome {
    /// A match can begin.
    Started(Roster),
    /// Too few players remained to ever start.
    Aborted,
    /// A player's channel failed; the named player triggered fail-fast.
    Disconnected(String),
}

/// Why a listener task returned.
#[derive(Debug)]
pub enum ListenerExit {
    /// The match started; the reader goes to the turn engine.
    HandedOff(PlayerId, LineReader),
    /// The channel closed or failed.
    Disconnected(PlayerId),
    /// Fail-fast was triggered elsewhere.
    Cancelled(PlayerId),
}

/// State shared by every listener in one lobby.
#[derive(Clone)]
struct ListenerContext {
    registry: PlayerRegistry,
    broadcaster: Broadcaster,
    started: Arc<watch::Sender<bool>>,
    shutdown: Shutdown,
    min_players: usize,
}

/// One lobby pass over a bound listener.
pub struct Lobby<'a, A> {
    listener: &'a A,
    registry: PlayerRegistry,
    broadcaster: Broadcaster,
    config: &'a ServerConfig,
    shutdown: Shutdown,
}

impl<'a, A: Acceptor> Lobby<'a, A> {
    /// Lobby filling `registry` from `listener`.
    #[must_use]
    pub fn new(
        listener: &'a A,
        registry: PlayerRegistry,
        broadcaster: Broadcaster,
        config: &'a ServerConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            listener,
            registry,
            broadcaster,
            config,
            shutdown,
        }
    }

    /// Admit players until the match starts, the lobby dies, or a channel fails.
    ///
    /// On [`LobbyOutcome::Started`] the registry is frozen and every
    /// listener has finished.
    pub async fn run(self) -> Result<LobbyOutcome> {
        let (started_tx, mut started_rx) = watch::channel(false);
        let context = ListenerContext {
            registry: self.registry.clone(),
            broadcaster: self.broadcaster.clone(),
            started: Arc::new(started_tx),
            shutdown: self.shutdown.clone(),
            min_players: self.config.min_players,
        };
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut listeners = JoinSet::new();

        tracing::info!(
            min = self.config.min_players,
            max = self.config.max_players,
            "Lobby open"
        );

        loop {
            if let Some(name) = self.shutdown.reason() {
                return Ok(LobbyOutcome::Disconnected(name));
            }
            if *started_rx.borrow_and_update() {
                break;
            }

            let accepting = self.registry.len().await < self.config.max_players;
            if !accepting && self.registry.active_count().await < self.config.min_players {
                tracing::warn!("Not enough players to start");
                return Ok(LobbyOutcome::Aborted);
            }

            tokio::select! {
                accepted = self.listener.accept(), if accepting => match accepted {
                    Ok(mut connection) => {
                        // A pending name must not hold up a start or a shutdown.
                        let named = tokio::select! {
                            biased;
                            _ = shutdown_rx.changed() => continue,
                            _ = started_rx.changed() => {
                                turn_away(connection).await;
                                continue;
                            }
                            named = read_name(&mut connection, self.config.name_timeout()) => named,
                        };
                        match named {
                            Ok(raw) => self.admit(connection, &raw, &context, &mut listeners).await,
                            Err(e) => tracing::warn!(peer = %connection.peer, error = %e, "Admission failed"),
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
                _ = started_rx.changed() => {}
                _ = shutdown_rx.changed() => {}
            }
        }

        let players = self.registry.freeze().await;
        let mut readers = HashMap::new();
        while let Some(joined) = listeners.join_next().await {
            match joined {
                Ok(ListenerExit::HandedOff(id, reader)) => {
                    readers.insert(id, reader);
                }
                Ok(ListenerExit::Disconnected(_) | ListenerExit::Cancelled(_)) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Listener task failed");
                }
            }
        }

        if let Some(name) = self.shutdown.reason() {
            return Ok(LobbyOutcome::Disconnected(name));
        }
        if let Some(id) = players.iter().find(|id| !readers.contains_key(id)) {
            return Err(ServerError::ChannelFailure {
                player: id.to_string(),
                reason: "listener ended without handing over its reader".to_string(),
            });
        }

        tracing::info!(players = players.len(), "Lobby closed, match starting");
        Ok(LobbyOutcome::Started(Roster { players, readers }))
    }

    async fn admit(
        &self,
        connection: Connection,
        raw_name: &str,
        context: &ListenerContext,
        listeners: &mut JoinSet<ListenerExit>,
    ) {
        let peer = connection.peer.clone();
        let admission = match self.registry.admit(connection, raw_name).await {
            Ok(admission) => admission,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "Admission failed");
                return;
            }
        };

        let id = admission.player.id;
        let name = admission.player.name.clone();
        listeners.spawn(listen(id, name.clone(), admission.reader, context.clone()));

        let count = self.registry.active_count().await;
        let max = self.config.max_players;
        let min = self.config.min_players;
        self.broadcaster
            .send_one(id, &format!("Welcome, {name}! ({count}/{max} players)\n"))
            .await;
        if count >= min {
            self.broadcaster
                .send_all(&format!(
                    "Type '{START_COMMAND}' to begin the game (need {min} players)\n"
                ))
                .await;
        } else {
            self.broadcaster
                .send_one(id, &format!("Waiting for {} more players...\n", min - count))
                .await;
        }
        self.broadcaster
            .send_others(id, &format!("{name} joined ({count}/{max} players)\n"))
            .await;
    }
}

/// Sole reader of one player's channel while the lobby is open.
async fn listen(
    id: PlayerId,
    name: String,
    mut reader: LineReader,
    context: ListenerContext,
) -> ListenerExit {
    let mut started = context.started.subscribe();
    let mut shutdown = context.shutdown.subscribe();

    loop {
        if *started.borrow_and_update() {
            return ListenerExit::HandedOff(id, reader);
        }
        if shutdown.borrow_and_update().is_some() {
            return ListenerExit::Cancelled(id);
        }

        tokio::select! {
            biased;
            _ = started.changed() => {}
            _ = shutdown.changed() => {}
            line = reader.next_line() => match line {
                Ok(Some(text)) => {
                    if !text.trim().eq_ignore_ascii_case(START_COMMAND) {
                        continue;
                    }
                    let present = context.registry.active_count().await;
                    if present < context.min_players {
                        context
                            .broadcaster
                            .send_one(id, &format!(
                                "Need {} players to start ({present} connected)\n",
                                context.min_players
                            ))
                            .await;
                        continue;
                    }

                    // No late joins: an admission still reading its name is refused.
                    context.registry.freeze().await;
                    let first = context.started.send_if_modified(|flag| {
                        let changed = !*flag;
                        *flag = true;
                        changed
                    });
                    if first {
                        tracing::info!(player = %name, "Game start requested");
                        context
                            .broadcaster
                            .send_all(&format!("\\n{name} started the game!\\n"))
                            .await;
                    }
                    return ListenerExit::HandedOff(id, reader);
                }
                Ok(None) => {
                    tracing::warn!(player = %name, "Connection closed in lobby");
                    return disconnect(id, &name, &context).await;
                }
                Err(e) => {
                    tracing::warn!(player = %name, error = %e, "Read failed in lobby");
                    return disconnect(id, &name, &context).await;
                }
            },
        }
    }
}

async fn disconnect(id: PlayerId, name: &str, context: &ListenerContext) -> ListenerExit {
    context.registry.mark_disconnected(id).await;
    context.shutdown.trigger(name);
    ListenerExit::Disconnected(id)
}
