//! Transport layer - raw string exchange with the language server process
//!
//! The transport knows nothing about message framing or JSON-RPC; it moves
//! UTF-8 chunks in both directions. Framing lives in `lsp::framing`.

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tracing::{error, trace};

// ============================================================================
// Constants
// ============================================================================

/// Size of a single stdout read
const READ_CHUNK_SIZE: usize = 4096;

/// Capacity the pending-bytes buffer is shrunk back to after bursts
const PENDING_BYTES_CAPACITY: usize = 8192;

/// Bidirectional raw message exchange
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send a raw chunk
    async fn send(&mut self, message: &str) -> Result<(), Self::Error>;

    /// Receive the next raw chunk
    async fn receive(&mut self) -> Result<String, Self::Error>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Whether the transport can still carry messages
    fn is_connected(&self) -> bool;
}

// ============================================================================
// Stdio Transport
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StdioTransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport is disconnected")]
    Disconnected,

    #[error("Channel error: {0}")]
    Channel(String),
}

/// Transport over a child process' stdin/stdout
#[derive(Debug)]
pub struct StdioTransport {
    stdin_sender: Option<mpsc::UnboundedSender<String>>,
    stdout_receiver: Option<mpsc::UnboundedReceiver<String>>,
    connected: bool,
}

/// Holds bytes read from stdout until they form complete UTF-8 sequences.
///
/// A multi-byte character may be split across two reads; the tail of the
/// first read stays here until the rest arrives.
struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    fn new() -> Self {
        Self {
            pending: Vec::with_capacity(PENDING_BYTES_CAPACITY),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Take the longest prefix that is valid UTF-8, if any
    fn take_complete(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let valid_len = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) => e.valid_up_to(),
        };
        if valid_len == 0 {
            return None;
        }

        let bytes: Vec<u8> = self.pending.drain(..valid_len).collect();
        if self.pending.capacity() > PENDING_BYTES_CAPACITY * 2 {
            self.pending.shrink_to(PENDING_BYTES_CAPACITY);
        }
        String::from_utf8(bytes).ok()
    }

    fn leftover(&self) -> usize {
        self.pending.len()
    }
}

impl StdioTransport {
    /// Wrap the streams of a spawned child process
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let (stdin_sender, stdin_receiver) = mpsc::unbounded_channel();
        let (stdout_sender, stdout_receiver) = mpsc::unbounded_channel();

        tokio::spawn(Self::write_stdin(stdin, stdin_receiver));
        tokio::spawn(Self::read_stdout(stdout, stdout_sender));

        Self {
            stdin_sender: Some(stdin_sender),
            stdout_receiver: Some(stdout_receiver),
            connected: true,
        }
    }

    async fn write_stdin(mut stdin: ChildStdin, mut receiver: mpsc::UnboundedReceiver<String>) {
        while let Some(message) = receiver.recv().await {
            trace!("StdioTransport: writing {} bytes", message.len());

            if let Err(e) = stdin.write_all(message.as_bytes()).await {
                error!("Failed to write to server stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("Failed to flush server stdin: {}", e);
                break;
            }
        }

        trace!("StdioTransport: stdin writer finished");
    }

    async fn read_stdout(stdout: ChildStdout, sender: mpsc::UnboundedSender<String>) {
        let mut reader = BufReader::new(stdout);
        let mut accumulator = Utf8Accumulator::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    trace!("StdioTransport: server stdout reached EOF");
                    if let Some(rest) = accumulator.take_complete() {
                        let _ = sender.send(rest);
                    }
                    if accumulator.leftover() > 0 {
                        error!(
                            "StdioTransport: {} incomplete UTF-8 bytes left at EOF",
                            accumulator.leftover()
                        );
                    }
                    break;
                }
                Ok(n) => {
                    accumulator.push(&chunk[..n]);
                    if let Some(text) = accumulator.take_complete()
                        && sender.send(text).is_err()
                    {
                        trace!("StdioTransport: receiver dropped, stopping reader");
                        return;
                    }
                }
                Err(e) => {
                    error!("Failed to read from server stdout: {}", e);
                    break;
                }
            }
        }

        trace!("StdioTransport: stdout reader finished");
    }
}

#[async_trait]
impl Transport for StdioTransport {
    type Error = StdioTransportError;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(StdioTransportError::Disconnected);
        }

        self.stdin_sender
            .as_ref()
            .ok_or(StdioTransportError::Disconnected)?
            .send(message.to_string())
            .map_err(|e| StdioTransportError::Channel(e.to_string()))
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        if !self.connected {
            return Err(StdioTransportError::Disconnected);
        }

        self.stdout_receiver
            .as_mut()
            .ok_or(StdioTransportError::Disconnected)?
            .recv()
            .await
            .ok_or(StdioTransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        self.stdin_sender.take();
        self.stdout_receiver.take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MockTransportError {
    #[error("Mock transport is disconnected")]
    Disconnected,
}

/// In-memory transport driven by a [`MockTransportHandle`]
///
/// `receive` waits until the handle pushes a chunk, so a test can answer
/// requests after inspecting what was sent.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedReceiver<String>,
    connected: bool,
}

/// Test-side end of a [`MockTransport`]
#[derive(Clone)]
pub struct MockTransportHandle {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::UnboundedSender<String>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (inbound_sender, inbound_receiver) = mpsc::unbounded_channel();
        (
            Self {
                sent: Arc::clone(&sent),
                inbound: inbound_receiver,
                connected: true,
            },
            MockTransportHandle {
                sent,
                inbound: inbound_sender,
            },
        )
    }
}

#[allow(dead_code)]
impl MockTransportHandle {
    /// Queue a chunk for the transport's next `receive`
    pub fn push(&self, chunk: impl Into<String>) {
        let _ = self.inbound.send(chunk.into());
    }

    /// Everything sent through the transport so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        if !self.connected {
            return Err(MockTransportError::Disconnected);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.to_string());
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        if !self.connected {
            return Err(MockTransportError::Disconnected);
        }
        self.inbound
            .recv()
            .await
            .ok_or(MockTransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
