//! Scripted TCP client for end-to-end session tests.
//!
//! Server text is not always newline terminated (prompts end mid-line),
//! so the client searches an accumulated buffer instead of reading lines.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// How long `expect` waits before failing the test.
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A participant driven by the test.
#[derive(Debug)]
pub struct TestClient {
    stream: TcpStream,
    buffer: String,
    wait: Duration,
}

impl TestClient {
    /// Open a connection to the server.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            buffer: String::new(),
            wait: DEFAULT_EXPECT_TIMEOUT,
        })
    }

    /// Connect, wait for the name prompt, and answer it.
    pub async fn join(addr: SocketAddr, name: &str) -> io::Result<Self> {
        let mut client = Self::connect(addr).await?;
        client.expect("Enter your name").await?;
        client.send_line(name).await?;
        client.expect(&format!("Welcome, {name}")).await?;
        Ok(client)
    }

    /// Override how long `expect` waits.
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Send one newline-terminated line.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(format!("{line}\n").as_bytes()).await?;
        self.stream.flush().await
    }

    /// Read until `needle` appears; return everything up to and including it.
    ///
    /// Text after the match stays buffered for the next call.
    pub async fn expect(&mut self, needle: &str) -> io::Result<String> {
        let wait = self.wait;
        match timeout(wait, self.read_until(needle)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out waiting for {needle:?}; buffered: {:?}", self.buffer),
            )),
        }
    }

    /// Read until the server closes the connection; return the remainder.
    pub async fn expect_closed(&mut self) -> io::Result<String> {
        let wait = self.wait;
        let mut chunk = [0u8; 1024];
        loop {
            let read = timeout(wait, self.stream.read(&mut chunk))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection stayed open"))?;
            match read {
                Ok(0) | Err(_) => return Ok(std::mem::take(&mut self.buffer)),
                Ok(n) => self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n])),
            }
        }
    }

    /// Drop the connection without saying goodbye.
    pub async fn disconnect(mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn read_until(&mut self, needle: &str) -> io::Result<String> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(pos) = self.buffer.find(needle) {
                let end = pos + needle.len();
                let head = self.buffer[..end].to_string();
                self.buffer.drain(..end);
                return Ok(head);
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("closed before {needle:?}; buffered: {:?}", self.buffer),
                ));
            }
            self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    }
}
