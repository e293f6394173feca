// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token providers.
//!
//! The connection manager asks an [`AuthProvider`] for the current token
//! before every socket attempt, and asks it to refresh after the server
//! reports an expired token.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

/// Error type for token providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The provider could not produce a token.
    #[error("token provider failed: {0}")]
    Provider(String),

    /// A token is required but none is available.
    #[error("no token available")]
    Missing,
}

/// Boxed future returned by auth operations.
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>>;

/// Source of connection credentials.
pub trait AuthProvider: Send + Sync {
    /// The token to present right now, if any.
    fn token(&self) -> Option<String>;

    /// Scheme tag sent alongside the token.
    fn auth_type(&self) -> &'static str {
        if self.token().is_some() {
            "jwt"
        } else {
            "anonymous"
        }
    }

    /// True when the token can never change. Expired static tokens are not
    /// refreshed and the failure is reported as permanent.
    fn is_static(&self) -> bool;

    /// Wait until a token is available (or any refresh in flight is done).
    fn token_ready(&self) -> AuthFuture<'_>;

    /// Fetch a fresh token.
    fn refresh(&self) -> AuthFuture<'_>;
}

/// A fixed token, or none for anonymous connections.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        StaticToken { token: None }
    }
}

impl AuthProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn token_ready(&self) -> AuthFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn refresh(&self) -> AuthFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

type TokenFuture = Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send>>;
type Loader = Arc<dyn Fn() -> TokenFuture + Send + Sync>;

/// A token fetched on demand from a loader, e.g. an HTTP call to the
/// application backend.
///
/// Concurrent refreshes are serialized; callers of
/// [`AuthProvider::token_ready`] wait for an in-flight refresh to finish.
pub struct RefreshingToken {
    loader: Loader,
    current: Mutex<Option<String>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl RefreshingToken {
    /// Create a provider. With no `initial` token the first
    /// [`AuthProvider::token_ready`] call runs the loader.
    pub fn new<F, Fut>(initial: Option<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AuthError>> + Send + 'static,
    {
        RefreshingToken {
            loader: Arc::new(move || Box::pin(loader()) as TokenFuture),
            current: Mutex::new(initial),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let token = (self.loader)().await?;
        tracing::debug!("token refreshed");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }
}

impl AuthProvider for RefreshingToken {
    fn token(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn auth_type(&self) -> &'static str {
        "jwt"
    }

    fn is_static(&self) -> bool {
        false
    }

    fn token_ready(&self) -> AuthFuture<'_> {
        Box::pin(async move {
            if self.token().is_none() {
                return self.load().await;
            }
            // Waits out a refresh that is already running
            drop(self.refresh_lock.lock().await);
            Ok(())
        })
    }

    fn refresh(&self) -> AuthFuture<'_> {
        Box::pin(self.load())
    }
}

impl std::fmt::Debug for RefreshingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshingToken")
            .field("has_token", &self.token().is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
