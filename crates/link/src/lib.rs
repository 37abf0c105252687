// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal link: authenticated REST and realtime client core.
//!
//! REST calls go through one [`http::AuthPipeline`] that attaches the stored
//! access token and, on a 401, refreshes it once through the shared
//! [`refresh::RefreshCoordinator`]. The [`realtime::ConnectionManager`] keeps
//! one WebSocket open while authenticated, reconnecting with exponential
//! backoff and consulting the same coordinator when the server rejects the
//! token. Inbound events fan out through [`dispatch::EventDispatcher`].

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod realtime;
pub mod refresh;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use session::AppSession;

/// Install the ring crypto provider for rustls. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
