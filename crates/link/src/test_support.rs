// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles for the refresh exchange, REST transport and realtime socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::error::ApiError;
use crate::http::{ApiRequest, ApiResponse, SendFuture, Transport};
use crate::realtime::{Connection, Connector, TransportEvent, ABNORMAL_CLOSURE};
use crate::refresh::{ExchangeFuture, RefreshError, RefreshExchange, TokenGrant};

// -- Refresh exchange --------------------------------------------------------

/// Scripted refresh endpoint that counts calls and can hold them open.
pub struct FakeExchange {
    outcome: Result<TokenGrant, RefreshError>,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
    gated: AtomicBool,
    gate: Notify,
}

impl FakeExchange {
    pub fn granting(access: &str, refresh: Option<&str>) -> Arc<Self> {
        Arc::new(Self::with_outcome(Ok(TokenGrant {
            access_token: access.to_owned(),
            refresh_token: refresh.map(str::to_owned),
        })))
    }

    pub fn failing(err: RefreshError) -> Arc<Self> {
        Arc::new(Self::with_outcome(Err(err)))
    }

    fn with_outcome(outcome: Result<TokenGrant, RefreshError>) -> Self {
        Self {
            outcome,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
        }
    }

    /// Hold every exchange until [`FakeExchange::release`] is called.
    pub fn gated(self: Arc<Self>) -> Arc<Self> {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl RefreshExchange for FakeExchange {
    fn exchange<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(refresh_token.to_owned());
            if self.gated.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            self.outcome.clone()
        })
    }
}

// -- REST transport ----------------------------------------------------------

type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Transport answering from a closure and recording every request.
pub struct FakeTransport {
    respond: Responder,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new(
        respond: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { respond: Box::new(respond), requests: Mutex::new(Vec::new()) })
    }

    /// Answer 200 with `body` only when the bearer is `valid`, else 401.
    pub fn accepting_bearer(valid: &'static str, body: serde_json::Value) -> Arc<Self> {
        Self::new(move |req| {
            if req.bearer.as_deref() == Some(valid) {
                Ok(json_response(200, &body))
            } else {
                Ok(json_response(401, &serde_json::json!({"detail": "Token expired"})))
            }
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, req: ApiRequest) -> SendFuture<'_> {
        let result = (self.respond)(&req);
        self.requests.lock().push(req);
        Box::pin(async move {
            tokio::task::yield_now().await;
            result
        })
    }
}

pub fn json_response(status: u16, body: &serde_json::Value) -> ApiResponse {
    ApiResponse { status, body: Bytes::from(body.to_string()) }
}

// -- Realtime socket ---------------------------------------------------------

/// How the next connect attempt behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Refuse,
    Accept,
}

/// Server side of an accepted fake connection.
pub struct FakeServer {
    pub events: mpsc::UnboundedSender<TransportEvent>,
    pub received: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl FakeServer {
    pub fn send(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_owned()));
    }

    pub fn close(&self, code: u16) {
        let _ = self.events.send(TransportEvent::Closed { code });
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn was_closed_by_client(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector following a script of [`Plan`]s; refuses once the script runs out.
pub struct FakeConnector {
    plans: Mutex<VecDeque<Plan>>,
    servers: mpsc::UnboundedSender<FakeServer>,
    attempts: AtomicU32,
    live: Arc<AtomicI32>,
    max_live: Arc<AtomicI32>,
}

impl FakeConnector {
    pub fn new(plans: &[Plan]) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            plans: Mutex::new(plans.iter().copied().collect()),
            servers,
            attempts: AtomicU32::new(0),
            live: Arc::new(AtomicI32::new(0)),
            max_live: Arc::new(AtomicI32::new(0)),
        });
        (connector, rx)
    }

    pub fn push(&self, plan: Plan) {
        self.plans.lock().push_back(plan);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> i32 {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> i32 {
        self.max_live.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, anyhow::Result<Box<dyn Connection>>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let plan = self.plans.lock().pop_front().unwrap_or(Plan::Refuse);
            if plan == Plan::Refuse {
                anyhow::bail!("connection refused");
            }

            let (events, rx) = mpsc::unbounded_channel();
            let received = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(now_live, Ordering::SeqCst);

            let _ = self.servers.send(FakeServer {
                events,
                received: Arc::clone(&received),
                closed: Arc::clone(&closed),
            });
            Ok(Box::new(FakeConnection { events: rx, received, closed, live: Arc::clone(&self.live) })
                as Box<dyn Connection>)
        })
    }
}

struct FakeConnection {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    received: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    live: Arc<AtomicI32>,
}

impl Connection for FakeConnection {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        self.received.lock().push(text);
        Box::pin(async { Ok(()) })
    }

    fn next_event(&mut self) -> BoxFuture<'_, TransportEvent> {
        Box::pin(async move {
            self.events.recv().await.unwrap_or(TransportEvent::Closed { code: ABNORMAL_CLOSURE })
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.closed.store(true, Ordering::SeqCst);
        Box::pin(async {})
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
