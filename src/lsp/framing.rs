//! LSP base protocol framing
//!
//! Wraps a raw [`Transport`] and turns its chunk stream into whole
//! messages, each sent as `Content-Length: <n>\r\n\r\n<content>`.

use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::trace;

use crate::io::transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum LspFramingError<T: std::error::Error + Send + Sync + 'static> {
    #[error("Transport error: {0}")]
    Transport(T),

    #[error("Invalid LSP message format: {0}")]
    InvalidFormat(String),

    #[error("Invalid content length: {0}")]
    InvalidContentLength(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Transport closed with {buffered} unparsed bytes")]
    Closed { buffered: usize },
}

/// Upper bound on a single message body
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const HEADER_SEPARATOR: &str = "\r\n\r\n";

/// Content-Length framing over any transport
pub struct LspFraming<T: Transport> {
    transport: T,
    buffer: String,
    ready: VecDeque<String>,
}

impl<T: Transport> LspFraming<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: String::new(),
            ready: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Pop one complete message off the front of the buffer, if present
    fn next_buffered_message(&mut self) -> Result<Option<String>, LspFramingError<T::Error>> {
        let Some(header_end) = self.buffer.find(HEADER_SEPARATOR) else {
            return Ok(None);
        };

        let content_length = Self::content_length(&self.buffer[..header_end])?;
        let body_start = header_end + HEADER_SEPARATOR.len();
        let body_end = body_start + content_length;

        if self.buffer.len() < body_end || !self.buffer.is_char_boundary(body_end) {
            trace!(
                "LspFraming: waiting for {} more bytes",
                body_end.saturating_sub(self.buffer.len())
            );
            return Ok(None);
        }

        let body = self.buffer[body_start..body_end].to_string();
        self.buffer.drain(..body_end);
        trace!("LspFraming: parsed message ({} bytes)", content_length);
        Ok(Some(body))
    }

    fn content_length(header: &str) -> Result<usize, LspFramingError<T::Error>> {
        let value = header
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length:"))
            .map(str::trim)
            .ok_or_else(|| {
                LspFramingError::InvalidFormat("Missing Content-Length header".to_string())
            })?;

        let length = value
            .parse::<usize>()
            .map_err(|_| LspFramingError::InvalidContentLength(value.to_string()))?;

        if length > MAX_MESSAGE_SIZE {
            return Err(LspFramingError::MessageTooLarge {
                size: length,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(length)
    }
}

#[async_trait]
impl<T: Transport> Transport for LspFraming<T> {
    type Error = LspFramingError<T::Error>;

    async fn send(&mut self, message: &str) -> Result<(), Self::Error> {
        let framed = format!("Content-Length: {}{}{}", message.len(), HEADER_SEPARATOR, message);
        self.transport
            .send(&framed)
            .await
            .map_err(LspFramingError::Transport)
    }

    async fn receive(&mut self) -> Result<String, Self::Error> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(message);
            }

            if !self.transport.is_connected() {
                return Err(LspFramingError::Closed {
                    buffered: self.buffer.len(),
                });
            }

            let chunk = self
                .transport
                .receive()
                .await
                .map_err(LspFramingError::Transport)?;
            self.buffer.push_str(&chunk);

            while let Some(message) = self.next_buffered_message()? {
                self.ready.push_back(message);
            }
        }
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.transport
            .close()
            .await
            .map_err(LspFramingError::Transport)
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::transport::MockTransport;

    fn frame(body: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
    }

    #[tokio::test]
    async fn test_send_adds_header() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);

        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        framing.send(body).await.unwrap();

        assert_eq!(handle.sent(), vec![frame(body)]);
        assert!(framing.transport().is_connected());
    }

    #[tokio::test]
    async fn test_message_split_across_chunks() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);

        let body = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let framed = frame(body);
        handle.push(&framed[..20]);
        handle.push(&framed[20..]);

        assert_eq!(framing.receive().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_two_messages_in_one_chunk() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);

        let first = r#"{"jsonrpc":"2.0","method":"window/logMessage"}"#;
        let second = r#"{"jsonrpc":"2.0","id":2,"result":[]}"#;
        handle.push(format!("{}{}", frame(first), frame(second)));

        assert_eq!(framing.receive().await.unwrap(), first);
        assert_eq!(framing.receive().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_content_length_counts_bytes() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);

        let body = r#"{"result":"naïve"}"#;
        handle.push(frame(body));

        assert_eq!(framing.receive().await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_invalid_content_length() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);
        handle.push("Content-Length: many\r\n\r\n{}");

        assert!(matches!(
            framing.receive().await,
            Err(LspFramingError::InvalidContentLength(_))
        ));
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let (transport, handle) = MockTransport::new();
        let mut framing = LspFraming::new(transport);
        handle.push(format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_SIZE + 1));

        match framing.receive().await {
            Err(LspFramingError::MessageTooLarge { size, max }) => {
                assert_eq!(size, MAX_MESSAGE_SIZE + 1);
                assert_eq!(max, MAX_MESSAGE_SIZE);
            }
            other => panic!("Expected MessageTooLarge, got: {other:?}"),
        }
    }
}
