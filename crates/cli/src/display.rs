// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use rp_client::ClientConfig;
use rp_core::{Event, MessageLocator, ReceiptTracker, User};

use crate::error::Result;

const REDACTED: &str = "<redacted>";

/// One output line for an event, or `None` when it is not worth printing.
///
/// Receipt events are printed only when they changed the tracker.
pub fn describe(event: &Event, changed: bool, all_events: bool) -> Option<String> {
    match event {
        Event::ConnectionChanged { online: true } => Some("connection online".to_string()),
        Event::ConnectionChanged { online: false } => Some("connection offline".to_string()),
        Event::ConnectionRecovered => Some("connection recovered".to_string()),
        Event::MessageRead(e) if changed => Some(format!(
            "{} read up to {}",
            e.user.id,
            e.read_at.to_rfc3339()
        )),
        Event::MessageDelivered(e) if changed => Some(format!(
            "{} received up to {}",
            e.user.id,
            e.delivered_at.to_rfc3339()
        )),
        Event::NotificationMarkUnread(e) if changed => match &e.last_read_at {
            Some(at) => Some(format!("{} marked unread after {}", e.user.id, at.to_rfc3339())),
            None => Some(format!("{} marked the channel unread", e.user.id)),
        },
        Event::Other { kind, .. } if all_events => Some(format!("event {}", kind)),
        _ if all_events => Some(format!("event {}", event.kind().as_str())),
        _ => None,
    }
}

/// Receipt summary printed when `watch` exits.
pub fn render_summary<L: MessageLocator>(tracker: &ReceiptTracker<L>) -> String {
    let mut out = String::new();
    out.push_str("read receipts:\n");
    render_groups(&mut out, tracker.group_users_by_last_read_message());
    out.push_str("delivery receipts:\n");
    render_groups(&mut out, tracker.group_users_by_last_delivered_message());
    out
}

fn render_groups(out: &mut String, groups: HashMap<String, Vec<&User>>) {
    if groups.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    for (msg_id, users) in groups {
        let mut ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        ids.sort_unstable();
        out.push_str(&format!("  {}: {}\n", msg_id, ids.join(", ")));
    }
}

/// The effective config as TOML, with the token masked.
pub fn render_config(config: &ClientConfig) -> Result<String> {
    let mut shown = config.clone();
    if shown.token.is_some() {
        shown.token = Some(REDACTED.to_string());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
