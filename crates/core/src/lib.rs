// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rp-core: Shared library for the ripple real-time client
//!
//! This crate provides the event model, the per-client event dispatcher and
//! the read/delivery receipt tracker. It has no networking of its own; the
//! `rp-client` crate feeds it from a live connection.

pub mod dispatch;
pub mod error;
pub mod event;
pub mod msg_ref;
pub mod receipts;

pub use dispatch::{EventDispatcher, Subscription};
pub use error::{Error, Result};
pub use event::{
    Event, EventKind, HealthCheck, MarkUnreadEvent, MessageDeliveredEvent, MessageReadEvent,
    ReadResponse, User,
};
pub use msg_ref::{MessageIndex, MessageLocator, MsgRef};
pub use receipts::{ReceiptTracker, UserProgress};
