// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection manager: drives one realtime session per authenticated period.
//!
//! Each session is a single task that owns the socket, the retry counter and
//! the pending reconnect sleep, so at most one of each exists. Turning
//! authentication off cancels the session's token and publishes `Idle` before
//! returning; the task then closes its socket without scheduling anything.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::EventDispatcher;
use crate::realtime::{
    Connection, ConnectionState, Connector, GiveUpReason, ReconnectPolicy, TransportEvent,
    ABNORMAL_CLOSURE, AUTH_REJECTED,
};
use crate::refresh::RefreshCoordinator;
use crate::store::{TokenStore, ACCESS_TOKEN_KEY};

/// Upper bound on an intentional close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the realtime connection lifecycle.
///
/// `set_authenticated(true)` and `reconnect()` spawn onto the current tokio
/// runtime.
pub struct ConnectionManager {
    inner: Arc<Inner>,
    control: Mutex<Control>,
}

struct Inner {
    url: String,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<EventDispatcher>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    transition_tx: broadcast::Sender<ConnectionState>,
}

#[derive(Default)]
struct Control {
    authenticated: bool,
    session: Option<Session>,
    /// Task of a cancelled session that may still be closing its socket.
    draining: Option<JoinHandle<()>>,
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(
        url: String,
        store: Arc<dyn TokenStore>,
        refresh: Arc<RefreshCoordinator>,
        connector: Arc<dyn Connector>,
        dispatcher: Arc<EventDispatcher>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (transition_tx, _) = broadcast::channel(64);
        let inner = Inner {
            url,
            store,
            refresh,
            connector,
            dispatcher,
            policy,
            state_tx,
            transition_tx,
        };
        Self { inner: Arc::new(inner), control: Mutex::new(Control::default()) }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch the latest state.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every state transition in order.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.transition_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.control.lock().authenticated
    }

    /// Follow the application's authentication flag.
    ///
    /// `true` starts a session (no-op if already authenticated); `false` tears
    /// the current one down and resets to `Idle`.
    pub fn set_authenticated(&self, authenticated: bool) {
        let mut control = self.control.lock();
        if control.authenticated == authenticated {
            return;
        }
        control.authenticated = authenticated;
        if authenticated {
            self.start(&mut control);
        } else {
            self.stop(&mut control);
        }
    }

    /// Tear down the current session and start a fresh one with the retry
    /// counter at zero. Ignored while unauthenticated.
    pub fn reconnect(&self) {
        let mut control = self.control.lock();
        if control.authenticated {
            self.start(&mut control);
        }
    }

    /// Tear down and wait for the session task to finish closing.
    pub async fn shutdown(&self) {
        let pending = {
            let mut control = self.control.lock();
            control.authenticated = false;
            self.stop(&mut control);
            control.draining.take()
        };
        if let Some(task) = pending {
            let _ = task.await;
        }
    }

    fn start(&self, control: &mut Control) {
        let previous = match control.session.take() {
            Some(session) => {
                session.cancel.cancel();
                Some(session.task)
            }
            None => control.draining.take(),
        };

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let session_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            // The previous socket must be gone before this session opens one.
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            inner.run(session_cancel).await;
        });
        control.session = Some(Session { cancel, task });
    }

    fn stop(&self, control: &mut Control) {
        if let Some(session) = control.session.take() {
            session.cancel.cancel();
            control.draining = Some(session.task);
        }
        self.inner.force_state(ConnectionState::Idle);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(session) = self.control.get_mut().session.take() {
            session.cancel.cancel();
        }
    }
}

impl Inner {
    /// Publish `state` unless the session was cancelled.
    ///
    /// The check runs under the watch lock, so a cancelled session can never
    /// overwrite the `Idle` published by [`ConnectionManager::stop`].
    fn publish(&self, cancel: &CancellationToken, state: ConnectionState) {
        let mut published = None;
        self.state_tx.send_if_modified(|current| {
            if cancel.is_cancelled() {
                return false;
            }
            *current = state.clone();
            published = Some(state);
            true
        });
        if let Some(state) = published {
            let _ = self.transition_tx.send(state);
        }
    }

    fn force_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state.clone());
        let _ = self.transition_tx.send(state);
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut retry: u32 = 0;
        loop {
            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                token = self.store.get(ACCESS_TOKEN_KEY) => token,
            };
            let token = match token {
                Ok(Some(token)) => token,
                Ok(None) => {
                    debug!("no access token, realtime stays idle");
                    self.publish(&cancel, ConnectionState::Idle);
                    return;
                }
                Err(e) => {
                    warn!(err = %e, "failed to read access token");
                    self.publish(&cancel, ConnectionState::Idle);
                    return;
                }
            };

            self.publish(&cancel, ConnectionState::Connecting { attempt: retry });
            let Some(code) = self.run_connection(&cancel, token, &mut retry).await else {
                return;
            };

            if self.policy.exhausted(retry) {
                info!(code, retry, "realtime reconnect attempts exhausted");
                self.publish(
                    &cancel,
                    ConnectionState::ClosedGaveUp { reason: GiveUpReason::RetriesExhausted },
                );
                return;
            }

            let delay = self.policy.delay(retry);
            retry += 1;
            info!(code, retry, delay_ms = delay.as_millis() as u64, "realtime closed, reconnecting");
            self.publish(&cancel, ConnectionState::ClosedRetrying { retry, delay, code });
            let reconnect_at = tokio::time::Instant::now() + delay;

            if code == AUTH_REJECTED {
                // Cancel-safe: the coordinator owns the exchange.
                let refreshed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    r = self.refresh.ensure_fresh_token() => r,
                };
                if let Err(e) = refreshed {
                    warn!(err = %e, "realtime auth rejected and refresh failed");
                    self.publish(
                        &cancel,
                        ConnectionState::ClosedGaveUp { reason: GiveUpReason::AuthRejected },
                    );
                    return;
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep_until(reconnect_at) => {}
            }
        }
    }

    /// Run one connection to completion. Returns the close code, or `None`
    /// if the session was cancelled.
    async fn run_connection(
        &self,
        cancel: &CancellationToken,
        token: String,
        retry: &mut u32,
    ) -> Option<u16> {
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            r = self.connector.connect(&self.url) => r,
        };
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                debug!(url = %self.url, err = %e, "realtime connect failed");
                return Some(ABNORMAL_CLOSURE);
            }
        };

        // Out-of-band auth: the raw token is the first frame.
        if let Err(e) = conn.send_text(token).await {
            debug!(err = %e, "failed to send realtime auth frame");
            close_quietly(conn.as_mut()).await;
            return Some(ABNORMAL_CLOSURE);
        }
        *retry = 0;
        info!(url = %self.url, "realtime connection open");
        self.publish(cancel, ConnectionState::Open);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    close_quietly(conn.as_mut()).await;
                    return None;
                }
                event = conn.next_event() => event,
            };
            match event {
                TransportEvent::Message(text) => self.handle_message(&text),
                TransportEvent::Closed { code } => {
                    debug!(code, "realtime connection closed");
                    return Some(code);
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(msg) => {
                let delivered = self.dispatcher.dispatch(&msg);
                debug!(delivered, "realtime message dispatched");
            }
            Err(e) => debug!(err = %e, "dropping malformed realtime message"),
        }
    }
}

async fn close_quietly(conn: &mut dyn Connection) {
    if tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await.is_err() {
        debug!("realtime close timed out");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
