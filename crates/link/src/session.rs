// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application session: one store, one refresh coordinator, one pipeline,
//! one dispatcher and one connection manager, wired together.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::api::{AuthService, AuthTokens, JournalService};
use crate::config::LinkConfig;
use crate::dispatch::EventDispatcher;
use crate::error::ApiError;
use crate::http::{AuthPipeline, ReqwestTransport, Transport};
use crate::realtime::{ConnectionManager, Connector, ReconnectPolicy, TungsteniteConnector};
use crate::refresh::{HttpRefreshExchange, RefreshCoordinator, RefreshExchange, SessionEvent};
use crate::store::TokenStore;

/// Everything a signed-in client needs, built from a [`LinkConfig`].
///
/// Must be created inside a tokio runtime.
pub struct AppSession {
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    auth: AuthService,
    journal: JournalService,
    dispatcher: Arc<EventDispatcher>,
    realtime: ConnectionManager,
}

impl AppSession {
    /// Production wiring: reqwest for REST, tungstenite for realtime.
    pub fn new(config: &LinkConfig, store: Arc<dyn TokenStore>) -> Self {
        let timeout = config.request_timeout();
        Self::with_parts(
            config,
            store,
            Arc::new(ReqwestTransport::new(&config.api_url, timeout)),
            Arc::new(HttpRefreshExchange::new(&config.api_url, timeout)),
            Arc::new(TungsteniteConnector::new()),
        )
    }

    pub fn with_parts(
        config: &LinkConfig,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
        exchange: Arc<dyn RefreshExchange>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let refresh = RefreshCoordinator::new(Arc::clone(&store), exchange);
        let pipeline = AuthPipeline::new(transport, Arc::clone(&store), Arc::clone(&refresh));
        let dispatcher = EventDispatcher::new();
        let realtime = ConnectionManager::new(
            config.realtime_url(),
            Arc::clone(&store),
            Arc::clone(&refresh),
            connector,
            Arc::clone(&dispatcher),
            ReconnectPolicy::from_config(config),
        );
        Self {
            store,
            refresh,
            auth: AuthService::new(pipeline.clone()),
            journal: JournalService::new(pipeline),
            dispatcher,
            realtime,
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn journal(&self) -> &JournalService {
        &self.journal
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn realtime(&self) -> &ConnectionManager {
        &self.realtime
    }

    /// Refresh and session-end notifications from the shared coordinator.
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.refresh.subscribe()
    }

    /// Resume a stored session. Returns whether tokens were found.
    pub async fn restore(&self) -> Result<bool, ApiError> {
        let authenticated = self.auth.is_authenticated().await?;
        if authenticated {
            info!("restoring stored session");
            self.activate();
        }
        Ok(authenticated)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let tokens = self.auth.login(email, password).await?;
        self.activate();
        Ok(tokens)
    }

    /// Close the realtime connection, then revoke and clear the tokens.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.realtime.set_authenticated(false);
        self.auth.logout().await
    }

    pub async fn logout_all(&self) -> Result<(), ApiError> {
        self.realtime.set_authenticated(false);
        self.auth.logout_all().await
    }

    /// Drop realtime back to idle after the coordinator ended the session.
    pub fn handle_session_event(&self, event: &SessionEvent) {
        if let SessionEvent::Ended { reason } = event {
            info!(reason = %reason, "session ended");
            self.realtime.set_authenticated(false);
        }
    }

    pub async fn shutdown(&self) {
        self.realtime.shutdown().await;
    }

    /// Start realtime, or restart it so a new token is used.
    fn activate(&self) {
        if self.realtime.is_authenticated() {
            self.realtime.reconnect();
        } else {
            self.realtime.set_authenticated(true);
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
