// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry intervals for automatic reconnection.

use std::time::Duration;

use rand::Rng;

use crate::error::RetryPolicyError;

/// Decides how long to wait before the next reconnect attempt.
///
/// Returning an error stops automatic reconnection for that outage.
pub trait RetryPolicy: Send + Sync {
    fn interval(&self, consecutive_failures: u32) -> Result<Duration, RetryPolicyError>;
}

impl<F> RetryPolicy for F
where
    F: Fn(u32) -> Result<Duration, RetryPolicyError> + Send + Sync,
{
    fn interval(&self, consecutive_failures: u32) -> Result<Duration, RetryPolicyError> {
        self(consecutive_failures)
    }
}

/// Linear backoff with uniform jitter, capped at a ceiling.
///
/// With `n` consecutive failures the interval is drawn from
/// `[max(250, (n-1)*2000), 500 + n*2000)` milliseconds, both bounds capped.
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    ceiling_ms: u64,
}

impl JitteredBackoff {
    pub fn new(ceiling: Duration) -> Self {
        JitteredBackoff {
            ceiling_ms: u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The `[min, max)` window in milliseconds for `n` failures.
    pub fn bounds(&self, consecutive_failures: u32) -> (u64, u64) {
        let n = u64::from(consecutive_failures);
        let max = (500 + n * 2000).min(self.ceiling_ms);
        let min = (n.saturating_sub(1) * 2000).max(250).min(self.ceiling_ms);
        (min, max)
    }
}

impl Default for JitteredBackoff {
    fn default() -> Self {
        JitteredBackoff::new(Duration::from_millis(25_000))
    }
}

impl RetryPolicy for JitteredBackoff {
    fn interval(&self, consecutive_failures: u32) -> Result<Duration, RetryPolicyError> {
        let (min, max) = self.bounds(consecutive_failures);
        let ms = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..max)
        };
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
