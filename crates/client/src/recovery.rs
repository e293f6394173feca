// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Post-reconnect recovery hook.
//!
//! After an automatic reconnect the application usually needs to re-sync
//! state it may have missed (re-query channels, refetch read state). The
//! connection manager runs the configured [`RecoveryHandler`] and publishes
//! `connection.recovered` once it succeeds.

use std::future::Future;
use std::pin::Pin;

use crate::error::RecoveryError;
use crate::frame::Handshake;

pub type RecoveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RecoveryError>> + Send + 'a>>;

pub trait RecoveryHandler: Send + Sync {
    fn recover<'a>(&'a self, handshake: &'a Handshake) -> RecoveryFuture<'a>;
}

/// Recovery that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecovery;

impl RecoveryHandler for NoRecovery {
    fn recover<'a>(&'a self, _handshake: &'a Handshake) -> RecoveryFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

impl<F, Fut> RecoveryHandler for F
where
    F: Fn(Handshake) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), RecoveryError>> + Send + 'static,
{
    fn recover<'a>(&'a self, handshake: &'a Handshake) -> RecoveryFuture<'a> {
        Box::pin(self(handshake.clone()))
    }
}
