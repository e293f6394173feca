// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the realtime socket.
//!
//! A [`Transport`] opens one socket per call and hands back its two halves:
//! a [`FrameSink`] for outbound text frames and a [`FrameStream`] for inbound
//! ones. The connection manager owns both halves and never reuses a socket
//! across generations.
//!
//! Implementations:
//! - [`WebSocketTransport`] for production, built on tokio-tungstenite
//! - `MockTransport` (tests only) for scripting servers in memory

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Error type for transport operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// One inbound item from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The peer closed the socket.
    Closed { code: u16, reason: String },
}

/// Outbound half of an open socket.
pub trait FrameSink: Send {
    /// Send a text frame.
    fn send(&mut self, text: String) -> TransportFuture<'_, ()>;

    /// Start a graceful close with the given code.
    ///
    /// The peer's acknowledgement arrives on the matching [`FrameStream`] as
    /// [`Inbound::Closed`].
    fn close(&mut self, code: u16, reason: String) -> TransportFuture<'_, ()>;
}

/// Inbound half of an open socket.
pub trait FrameStream: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` if the stream ended without a close frame.
    fn recv(&mut self) -> TransportFuture<'_, Option<Inbound>>;
}

/// An open socket, split into its two halves.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Opens sockets.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send + Sync {
    /// Open a socket to `url`.
    fn open(&self, url: &str) -> TransportFuture<'_, Connection>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport implementation using tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        WebSocketTransport
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> TransportFuture<'_, Connection> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            Ok(Connection {
                sink: Box::new(WsSink { sink }),
                stream: Box::new(WsSource { stream }),
            })
        })
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

impl FrameSink for WsSink {
    fn send(&mut self, text: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn close(&mut self, code: u16, reason: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            };
            self.sink
                .send(Message::Close(Some(frame)))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }
}

struct WsSource {
    stream: SplitStream<WsStream>,
}

impl FrameStream for WsSource {
    fn recv(&mut self) -> TransportFuture<'_, Option<Inbound>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Some(Inbound::Text(text.as_str().to_owned())));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                            None => (crate::frame::CLOSE_NO_STATUS, String::new()),
                        };
                        return Ok(Some(Inbound::Closed { code, reason }));
                    }
                    Some(Ok(_)) => {
                        // Ping/pong is answered by tungstenite; binary frames are not part of the protocol
                        continue;
                    }
                    Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                    None => return Ok(None),
                }
            }
        })
    }
}
