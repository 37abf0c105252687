// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::config::LinkConfig;

/// Exponential reconnect backoff with a cap and a retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            base: config.reconnect_base(),
            max_delay: config.reconnect_max(),
            max_retries: config.max_reconnect_attempts,
        }
    }

    /// Delay before reconnect number `retry` (0-based): `min(base * 2^retry, max_delay)`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max_delay)
    }

    pub fn exhausted(&self, retry: u32) -> bool {
        retry >= self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_retries: 8,
        }
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
