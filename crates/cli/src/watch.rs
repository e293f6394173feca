// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `ripple watch`: follow a live connection until Ctrl-C.
//!
//! Every dispatched event goes through the receipt tracker. `message.new`
//! events are indexed first so later receipts that only carry a timestamp
//! can be resolved to a message id.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::DateTime;
use rp_client::{ClientConfig, ConnectionManager};
use rp_core::{Event, MessageIndex, ReceiptTracker};
use serde_json::Value;
use tracing::{debug, info};

use crate::display;
use crate::error::Result;

type SharedTracker = Arc<Mutex<ReceiptTracker<MessageIndex>>>;

pub async fn run(config: ClientConfig, all_events: bool) -> Result<()> {
    let manager = ConnectionManager::new(config);
    let tracker: SharedTracker = Arc::new(Mutex::new(ReceiptTracker::new(MessageIndex::new())));

    let _subscription = {
        let tracker = Arc::clone(&tracker);
        manager.dispatcher().subscribe_all(move |event| {
            if let Some(line) = on_event(&tracker, event, all_events) {
                println!("{}", line);
            }
        })
    };

    let handshake = manager.connect().await?;
    info!("connected as {} ({})", manager.client_id(), handshake.connection_id);

    tokio::signal::ctrl_c().await?;
    info!("interrupted, disconnecting");
    manager.disconnect().await;

    print!("{}", display::render_summary(&*lock(&tracker)));
    Ok(())
}

/// Feeds one event into the tracker and returns the line to print, if any.
pub(crate) fn on_event(
    tracker: &Mutex<ReceiptTracker<MessageIndex>>,
    event: &Event,
    all_events: bool,
) -> Option<String> {
    let mut tracker = lock(tracker);
    if let Some((timestamp_ms, msg_id)) = new_message(event) {
        debug!("indexing message {} at {}", msg_id, timestamp_ms);
        tracker.locator_mut().insert(timestamp_ms, msg_id);
    }
    let changed = tracker.handle_event(event);
    display::describe(event, changed, all_events)
}

/// Position of the message carried by a `message.new` event.
pub(crate) fn new_message(event: &Event) -> Option<(i64, String)> {
    let Event::Other { kind, payload } = event else {
        return None;
    };
    if kind != "message.new" {
        return None;
    }
    let message = payload.get("message")?;
    let id = message.get("id").and_then(Value::as_str)?;
    let created_at = message.get("created_at").and_then(Value::as_str)?;
    let created_at = DateTime::parse_from_rfc3339(created_at).ok()?;
    Some((created_at.timestamp_millis(), id.to_string()))
}

fn lock(tracker: &Mutex<ReceiptTracker<MessageIndex>>) -> MutexGuard<'_, ReceiptTracker<MessageIndex>> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
