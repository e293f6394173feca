// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: an in-memory transport with scriptable servers.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::transport::{
    Connection, FrameSink, FrameStream, Inbound, Transport, TransportError, TransportFuture,
};

/// What the server does with the next `open()`.
#[derive(Debug, Clone)]
pub enum OpenScript {
    /// Refuse the socket.
    Fail,
    /// Accept and send a handshake right away.
    Handshake,
    /// Accept and send these frames.
    Frames(Vec<Value>),
    /// Accept and close right away with this code.
    Close(u16),
    /// Accept and say nothing.
    Silent,
}

/// Mock transport for testing without real sockets.
///
/// Each `open()` consumes one [`OpenScript`]; once the script is empty every
/// open succeeds with a handshake.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<OpenScript>,
    urls: Vec<String>,
    sockets: Vec<MockSocket>,
    ignore_close: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, steps: impl IntoIterator<Item = OpenScript>) {
        self.state.lock().unwrap().script.extend(steps);
    }

    /// Sockets opened from now on never acknowledge a client close.
    pub fn ignore_close(&self) {
        self.state.lock().unwrap().ignore_close = true;
    }

    /// Number of `open()` calls, failed ones included.
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().urls.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    /// The n-th successfully opened socket.
    pub fn socket(&self, n: usize) -> MockSocket {
        self.state.lock().unwrap().sockets[n].clone()
    }

    pub fn socket_count(&self) -> usize {
        self.state.lock().unwrap().sockets.len()
    }
}

/// A handshake frame for the given connection id.
pub fn handshake(connection_id: &str) -> Value {
    json!({
        "type": "health.check",
        "connection_id": connection_id,
        "me": {"id": "alice"},
    })
}

/// An error frame as sent in place of a handshake.
pub fn error_frame(code: i64, message: &str) -> Value {
    json!({"error": {"code": code, "message": message, "StatusCode": 401}})
}

impl Transport for MockTransport {
    fn open(&self, url: &str) -> TransportFuture<'_, Connection> {
        let url = url.to_string();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.urls.push(url);
            let script = state.script.pop_front().unwrap_or(OpenScript::Handshake);
            if let OpenScript::Fail = script {
                return Err(TransportError::ConnectionFailed("mock refused".into()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let socket = MockSocket {
                to_client: tx,
                sent: Arc::new(Mutex::new(Vec::new())),
                client_close: Arc::new(Mutex::new(None)),
                ack_close: !state.ignore_close,
            };
            match script {
                OpenScript::Handshake => {
                    let id = format!("conn-{}", state.sockets.len() + 1);
                    socket.push(handshake(&id));
                }
                OpenScript::Frames(frames) => frames.into_iter().for_each(|f| socket.push(f)),
                OpenScript::Close(code) => socket.close(code),
                OpenScript::Silent | OpenScript::Fail => {}
            }
            state.sockets.push(socket.clone());

            Ok(Connection {
                sink: Box::new(MockSink { socket }),
                stream: Box::new(MockStream { rx }),
            })
        })
    }
}

/// Server side of one mock socket.
#[derive(Clone)]
pub struct MockSocket {
    to_client: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    client_close: Arc<Mutex<Option<u16>>>,
    ack_close: bool,
}

impl MockSocket {
    /// Send a frame to the client.
    pub fn push(&self, frame: Value) {
        let _ = self.to_client.send(Inbound::Text(frame.to_string()));
    }

    /// Close the socket from the server side.
    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(Inbound::Closed {
            code,
            reason: format!("mock close {code}"),
        });
    }

    /// Frames the client sent, parsed.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    /// Code of the client's close, if it sent one.
    pub fn client_close(&self) -> Option<u16> {
        *self.client_close.lock().unwrap()
    }
}

struct MockSink {
    socket: MockSocket,
}

impl FrameSink for MockSink {
    fn send(&mut self, text: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.socket.sent.lock().unwrap().push(text);
            Ok(())
        })
    }

    fn close(&mut self, code: u16, reason: String) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            *self.socket.client_close.lock().unwrap() = Some(code);
            if self.socket.ack_close {
                let _ = self.socket.to_client.send(Inbound::Closed { code, reason });
            }
            Ok(())
        })
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl FrameStream for MockStream {
    fn recv(&mut self) -> TransportFuture<'_, Option<Inbound>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}
