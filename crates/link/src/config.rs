// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the journal-link client core.
#[derive(Debug, Clone, clap::Args)]
pub struct LinkConfig {
    /// REST API base URL (the realtime URL is derived from it).
    #[arg(long, default_value = "http://127.0.0.1:8000/api", env = "JOURNAL_LINK_API_URL")]
    pub api_url: String,

    /// Directory holding the token file. Defaults to the XDG state dir.
    #[arg(long, env = "JOURNAL_LINK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Client-side REST timeout in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "JOURNAL_LINK_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// First reconnect delay in milliseconds (doubles per attempt).
    #[arg(long, default_value_t = 1_000, env = "JOURNAL_LINK_RECONNECT_BASE_MS")]
    pub reconnect_base_ms: u64,

    /// Upper bound on the reconnect delay in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "JOURNAL_LINK_RECONNECT_MAX_MS")]
    pub reconnect_max_ms: u64,

    /// Consecutive reconnect attempts before giving up.
    #[arg(long, default_value_t = 8, env = "JOURNAL_LINK_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: u32,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "JOURNAL_LINK_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "JOURNAL_LINK_LOG_LEVEL")]
    pub log_level: String,
}

impl LinkConfig {
    /// Defaults for embedding and tests, pointed at `api_url`.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            state_dir: None,
            request_timeout_ms: 10_000,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 8,
            log_format: "text".to_owned(),
            log_level: "info".to_owned(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    /// Realtime endpoint derived from the REST base URL.
    pub fn realtime_url(&self) -> String {
        realtime_url(&self.api_url)
    }

    /// Resolved state directory.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }
}

/// Resolve the default state directory.
///
/// Checks `JOURNAL_LINK_STATE_DIR`, then `$XDG_STATE_HOME/journal-link`,
/// then `$HOME/.local/state/journal-link`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("JOURNAL_LINK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("journal-link");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/journal-link");
    }
    PathBuf::from(".journal-link")
}

/// Build the realtime WebSocket URL from a REST base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, and a trailing `/api` path
/// segment becomes `/ws`. A base without `/api` gets `/ws` appended.
pub fn realtime_url(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let ws_base = if base.starts_with("https://") {
        base.replacen("https://", "wss://", 1)
    } else {
        base.replacen("http://", "ws://", 1)
    };

    match ws_base.strip_suffix("/api") {
        Some(prefix) => format!("{prefix}/ws"),
        None => format!("{ws_base}/ws"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
