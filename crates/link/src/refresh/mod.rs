// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access-token refresh.
//!
//! At most one refresh-token exchange runs at a time. The exchange runs on its
//! own task, so dropping any caller (including the one that started it) never
//! abandons a grant the server already issued. Every caller is queued and
//! receives that exchange's outcome, in arrival order. A failed refresh ends
//! the local session: both tokens are deleted and [`SessionEvent::Ended`] is
//! published.

pub mod exchange;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::store::{clear_pair, save_pair, TokenPair, TokenStore, REFRESH_TOKEN_KEY};

pub use exchange::HttpRefreshExchange;

/// Why a refresh did not produce a new access token.
///
/// `Clone` because one value is handed to every caller of a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token stored; no network call was made.
    MissingToken,
    /// The server refused the refresh token.
    Rejected { status: u16, message: String },
    /// The exchange never got a usable answer.
    Network(String),
    /// The refresh response could not be decoded.
    Malformed(String),
    /// Reading or writing the token store failed.
    Storage(String),
    /// The refresh task ended without producing an outcome.
    Cancelled,
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => f.write_str("no refresh token available"),
            Self::Rejected { status, message } => write!(f, "refresh rejected ({status}): {message}"),
            Self::Network(e) => write!(f, "refresh request failed: {e}"),
            Self::Malformed(e) => write!(f, "invalid refresh response: {e}"),
            Self::Storage(e) => write!(f, "token store error: {e}"),
            Self::Cancelled => f.write_str("refresh cancelled"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Token grant returned by the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

pub type ExchangeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + Send + 'a>>;

/// Performs the network half of a refresh: refresh token in, grant out.
pub trait RefreshExchange: Send + Sync {
    fn exchange<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a>;
}

/// Session lifecycle notifications from the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new token pair was stored.
    Refreshed,
    /// Tokens were cleared after a failed refresh; the user must log in again.
    Ended { reason: String },
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

/// Shared by the HTTP pipeline and the realtime connection manager.
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn RefreshExchange>,
    /// `Some` while a refresh is in flight; holds callers queued behind it.
    inflight: Mutex<Option<Vec<Waiter>>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, exchange: Arc<dyn RefreshExchange>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(16);
        Arc::new(Self { store, exchange, inflight: Mutex::new(None), event_tx })
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Return a freshly minted access token.
    ///
    /// Joins the in-flight refresh if there is one, otherwise starts one.
    pub async fn ensure_fresh_token(self: &Arc<Self>) -> Result<String, RefreshError> {
        let (tx, rx) = oneshot::channel();
        let leads = {
            let mut inflight = self.inflight.lock();
            match inflight.as_mut() {
                Some(waiters) => {
                    waiters.push(tx);
                    false
                }
                None => {
                    *inflight = Some(vec![tx]);
                    true
                }
            }
        };

        if leads {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                let mut flight = Flight { coordinator: &coordinator, finished: false };
                let result = flight.coordinator.refresh().await;
                flight.finish(&result);
            });
        } else {
            debug!("refresh in flight, queued");
        }
        rx.await.unwrap_or(Err(RefreshError::Cancelled))
    }

    async fn refresh(&self) -> Result<String, RefreshError> {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) => token,
            Ok(None) => return self.end_session(RefreshError::MissingToken).await,
            Err(e) => return self.end_session(RefreshError::Storage(e.to_string())).await,
        };

        debug!("exchanging refresh token");
        let grant = match self.exchange.exchange(&refresh_token).await {
            Ok(grant) => grant,
            Err(e) => return self.end_session(e).await,
        };

        let pair = TokenPair {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or(refresh_token),
        };
        if let Err(e) = save_pair(self.store.as_ref(), &pair).await {
            return self.end_session(RefreshError::Storage(e.to_string())).await;
        }

        info!("access token refreshed");
        let _ = self.event_tx.send(SessionEvent::Refreshed);
        Ok(pair.access_token)
    }

    async fn end_session(&self, err: RefreshError) -> Result<String, RefreshError> {
        warn!(err = %err, "token refresh failed, clearing session");
        if let Err(e) = clear_pair(self.store.as_ref()).await {
            warn!(err = %e, "failed to clear tokens");
        }
        let _ = self.event_tx.send(SessionEvent::Ended { reason: err.to_string() });
        Err(err)
    }

    /// Hand `result` to every queued caller and clear the in-flight flag.
    fn settle(&self, result: &Result<String, RefreshError>) {
        let waiters = self.inflight.lock().take().unwrap_or_default();
        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), "resolving queued refresh callers");
        }
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

/// Settles the in-flight refresh even if the refresh task is torn down.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    finished: bool,
}

impl Flight<'_> {
    fn finish(&mut self, result: &Result<String, RefreshError>) {
        self.finished = true;
        self.coordinator.settle(result);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.coordinator.settle(&Err(RefreshError::Cancelled));
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
