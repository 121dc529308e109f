//! Message delivery to players.
//!
//! A failed or stalled write marks that player disconnected and moves on.
//! Whether the session survives is not decided here; the supervisor
//! notices the flag through the registry.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use wordgame_core::player::PlayerId;

use crate::connection::render_wire;
use crate::registry::{Audience, PlayerRegistry};

/// How long one write may block before the player counts as gone.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends text to connected players.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: PlayerRegistry,
    write_timeout: Duration,
}

impl Broadcaster {
    /// Broadcaster over the given registry.
    #[must_use]
    pub fn new(registry: PlayerRegistry) -> Self {
        Self {
            registry,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    /// Override the per-write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Send to every connected player.
    pub async fn send_all(&self, text: &str) {
        self.deliver(Audience::All, text).await;
    }

    /// Send to one player, if still connected.
    pub async fn send_one(&self, id: PlayerId, text: &str) {
        self.deliver(Audience::One(id), text).await;
    }

    /// Send to every connected player except `id`.
    pub async fn send_others(&self, id: PlayerId, text: &str) {
        self.deliver(Audience::AllExcept(id), text).await;
    }

    /// Deliver to `audience`; returns how many writes failed.
    pub async fn deliver(&self, audience: Audience, text: &str) -> usize {
        let wire = render_wire(text);
        let mut failures = 0;

        for (id, writer) in self.registry.targets(audience).await {
            let write = async {
                let mut writer = writer.lock().await;
                writer.write_all(wire.as_bytes()).await?;
                writer.flush().await
            };

            let error = match timeout(self.write_timeout, write).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "write timed out".to_string(),
            };

            failures += 1;
            tracing::warn!(id = %id, %error, "Delivery failed");
            self.registry.mark_disconnected(id).await;
        }

        failures
    }
}
