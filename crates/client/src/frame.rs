// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire helpers: the connect URL, the handshake frame and heartbeats.

use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ConnectError;

/// Close code the server uses to refuse a connection outright, and the code
/// the client sends when it disconnects on purpose.
pub const CLOSE_NORMAL: u16 = 1000;
/// Reported when the stream ends without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Reported when a close frame carries no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Server error code for an expired credential.
pub const TOKEN_EXPIRED_CODE: i64 = 40;

/// The first frame of a healthy connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    /// Server-assigned connection id.
    pub connection_id: String,
    /// The connected user as the server sees it.
    pub me: Option<Value>,
    /// The frame as received.
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "StatusCode")]
    status_code: Option<u16>,
}

/// Credentials and identity for one connect request.
#[derive(Debug, Clone)]
pub struct ConnectRequest<'a> {
    pub token: Option<&'a str>,
    pub auth_type: &'a str,
    pub request_id: &'a str,
}

/// Build the socket URL: `{base_url}/connect?json=...&api_key=...`.
///
/// The `json` parameter carries the user id, user details, the token and a
/// per-request id so the server can correlate this attempt in its logs.
pub fn connect_url(config: &ClientConfig, request: &ConnectRequest<'_>) -> Result<Url, ConnectError> {
    let mut url = Url::parse(&config.base_url)
        .map_err(|e| ConnectError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;

    url.path_segments_mut()
        .map_err(|()| ConnectError::InvalidEndpoint(format!("{} cannot be a base", config.base_url)))?
        .pop_if_empty()
        .push("connect");

    let payload = json!({
        "user_id": config.user_id,
        "user_details": Value::Object(config.user_details.clone()),
        "user_token": request.token,
        "server_determines_connection_id": true,
        "client_request_id": request.request_id,
    });

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("json", &payload.to_string());
        query.append_pair("api_key", &config.api_key);
        if let Some(token) = request.token {
            query.append_pair("authorization", token);
        }
        query.append_pair("stream-auth-type", request.auth_type);
        query.append_pair("X-Stream-Client", &config.client_name);
    }
    Ok(url)
}

/// Interpret the first frame on a new socket.
///
/// An `error` object fails the attempt with [`ConnectError::Server`]; a frame
/// without a `connection_id` fails it with [`ConnectError::Protocol`].
pub fn parse_handshake(frame: &Value) -> Result<Handshake, ConnectError> {
    if let Some(error) = frame.get("error") {
        let body: ErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| ConnectError::Protocol(format!("malformed error frame: {}", e)))?;
        return Err(ConnectError::Server {
            code: body.code,
            message: body.message,
            status: body.status_code,
        });
    }

    let connection_id = frame
        .get("connection_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConnectError::Protocol("handshake without connection_id".into()))?;

    Ok(Handshake {
        connection_id: connection_id.to_string(),
        me: frame.get("me").cloned(),
        raw: frame.clone(),
    })
}

/// The heartbeat frame: a one-element array holding a `health.check` event.
pub fn heartbeat(client_id: &str, user_id: &str) -> String {
    json!([{
        "type": "health.check",
        "client_id": client_id,
        "user_id": user_id,
    }])
    .to_string()
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
