//! Participant channels and line framing.
//!
//! Client submissions are `\n`-terminated lines; a trailing `\r` is
//! stripped and anything past [`MAX_LINE_BYTES`] is cut off. Server text
//! goes out as-is after [`render_wire`].
//!
//! [`LineReader`] keeps partially received lines in its own buffer and only
//! awaits on a plain `read`, so dropping a pending [`LineReader::next_line`]
//! future loses no bytes. The lobby relies on that when it stops a listener
//! to hand the reader to the turn engine.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// Longest accepted line, in bytes.
pub const MAX_LINE_BYTES: usize = 256;

const READ_CHUNK: usize = 512;

/// Read half of a participant channel.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a participant channel.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Turn literal `\n` escapes in composed text into real line breaks.
#[must_use]
pub fn render_wire(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// A freshly accepted, not yet admitted connection.
pub struct Connection {
    /// Framed read half.
    pub reader: LineReader,
    /// Raw write half.
    pub writer: BoxedWriter,
    /// Peer description for logs.
    pub peer: String,
}

impl Connection {
    /// Wrap an accepted TCP stream.
    #[must_use]
    pub fn tcp(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
        let (read, write) = stream.into_split();
        Self::new(read, write, peer)
    }

    /// Wrap arbitrary byte streams, e.g. an in-memory duplex in tests.
    pub fn new<R, W>(reader: R, writer: W, peer: impl Into<String>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: LineReader::new(reader),
            writer: Box::new(writer),
            peer: peer.into(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish()
    }
}

/// Source of new participant connections for the lobby.
pub trait Acceptor: Send + Sync {
    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = io::Result<Connection>> + Send;
}

impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<Connection> {
        let (stream, addr) = TcpListener::accept(self).await?;
        tracing::debug!(%addr, "Connection accepted");
        Ok(Connection::tcp(stream))
    }
}

/// Cancel-safe newline framing over a byte stream.
pub struct LineReader {
    inner: BoxedReader,
    buffer: Vec<u8>,
    eof: bool,
}

impl LineReader {
    /// Frame an arbitrary reader.
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            inner: Box::new(reader),
            buffer: Vec::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Next complete line, or `None` once the peer has closed.
    ///
    /// A partial line left at end of stream is dropped.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.buffer.extend_from_slice(&chunk[..n]);

            // Bytes past the limit on an unterminated line are never used.
            if self.buffer.len() > MAX_LINE_BYTES && !self.buffer.contains(&b'\n') {
                self.buffer.truncate(MAX_LINE_BYTES);
            }
        }
    }

    /// Drop every line that is already available without waiting.
    ///
    /// Clears typed-ahead input so it cannot count as the next answer.
    /// End of stream and errors are left for the next real read to report.
    pub async fn discard_ready(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(Ok(Some(line))) =
            tokio::time::timeout(Duration::ZERO, self.next_line()).await
        {
            tracing::trace!(line = %line, "Discarding stale input");
            dropped += 1;
        }
        if !self.eof {
            self.buffer.clear();
        }
        dropped
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        line.truncate(MAX_LINE_BYTES);
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl std::fmt::Debug for LineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("buffered", &self.buffer.len())
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncWriteExt};

    use super::*;

    #[test]
    fn test_render_wire_expands_escapes() {
        assert_eq!(render_wire("a\\nb\\n"), "a\nb\n");
        assert_eq!(render_wire("plain\n"), "plain\n");
    }

    #[tokio::test]
    async fn test_lines_split_across_writes() {
        let (mut client, server) = duplex(64);
        let mut reader = LineReader::new(server);

        client.write_all(b"hel").await.unwrap();
        client.write_all(b"lo\r\nworld\n").await.unwrap();

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let (mut client, server) = duplex(64);
        let mut reader = LineReader::new(server);
        client.write_all(b"last\npartial").await.unwrap();
        drop(client);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlong_line_is_truncated() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        let long = "x".repeat(MAX_LINE_BYTES * 3);
        client.write_all(format!("{long}\nok\n").as_bytes()).await.unwrap();

        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_BYTES);
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_buffered_bytes() {
        let (mut client, server) = duplex(64);
        let mut reader = LineReader::new(server);
        client.write_all(b"sta").await.unwrap();

        let pending =
            tokio::time::timeout(Duration::from_millis(20), reader.next_line()).await;
        assert!(pending.is_err());

        client.write_all(b"rt\n").await.unwrap();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("start"));
    }

    #[tokio::test]
    async fn test_discard_ready_drops_typed_ahead_lines() {
        let (mut client, server) = duplex(64);
        let mut reader = LineReader::new(server);
        client.write_all(b"early\nlate\nhalf").await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(reader.discard_ready().await, 2);

        client.write_all(b"fresh\n").await.unwrap();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("fresh"));
    }
}
