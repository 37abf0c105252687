// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime connection: one authenticated WebSocket with reconnect/backoff.
//!
//! The server expects the raw access token as the first text frame after the
//! socket opens and closes with [`AUTH_REJECTED`] when it refuses it. Every
//! other frame is a JSON object carrying an `event` name.

pub mod backoff;
pub mod manager;
pub mod ws;

use std::time::Duration;

use futures_util::future::BoxFuture;

pub use backoff::ReconnectPolicy;
pub use manager::ConnectionManager;
pub use ws::TungsteniteConnector;

/// Close code the server uses for "authentication rejected".
pub const AUTH_REJECTED: u16 = 4001;

/// Close code reported for a close frame that carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the socket dies without a close frame, or never
/// opened at all.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Observable state of the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not authenticated, or no access token stored.
    Idle,
    /// A connect attempt is in progress. `attempt` is the retry count.
    Connecting { attempt: u32 },
    /// Socket open and the access token sent.
    Open,
    /// Closed with `code`; reconnect `retry` fires after `delay`.
    ClosedRetrying { retry: u32, delay: Duration, code: u16 },
    /// No further automatic attempts until authentication toggles.
    ClosedGaveUp { reason: GiveUpReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The retry ceiling was reached.
    RetriesExhausted,
    /// The server rejected the token and refreshing it failed.
    AuthRejected,
}

/// What an open connection produced next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(String),
    Closed { code: u16 },
}

/// An open realtime socket. Owned by exactly one connection session.
pub trait Connection: Send {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Wait for the next frame or closure. Must be cancel-safe.
    fn next_event(&mut self) -> BoxFuture<'_, TransportEvent>;

    /// Close the socket intentionally.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Opens realtime sockets.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Box<dyn Connection>>>;
}
