// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tokio-tungstenite transport for the realtime connection.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::realtime::{
    Connection, Connector, TransportEvent, ABNORMAL_CLOSURE, NO_STATUS_RECEIVED,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens realtime sockets with tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        crate::install_crypto_provider();
        Self
    }
}

impl Connector for TungsteniteConnector {
    fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<Box<dyn Connection>>> {
        Box::pin(async move {
            let (stream, _) = tokio_tungstenite::connect_async(url).await?;
            Ok(Box::new(WsConnection { stream }) as Box<dyn Connection>)
        })
    }
}

struct WsConnection {
    stream: WsStream,
}

impl Connection for WsConnection {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            self.stream.send(Message::text(text)).await?;
            Ok(())
        })
    }

    fn next_event(&mut self) -> BoxFuture<'_, TransportEvent> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return TransportEvent::Message(text.to_string());
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => return TransportEvent::Message(text),
                        Err(e) => tracing::debug!(err = %e, "dropping non-UTF-8 realtime frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                        return TransportEvent::Closed { code };
                    }
                    Some(Err(e)) => {
                        tracing::debug!(err = %e, "realtime socket error");
                        return TransportEvent::Closed { code: ABNORMAL_CLOSURE };
                    }
                    None => return TransportEvent::Closed { code: ABNORMAL_CLOSURE },
                    _ => {} // ping/pong
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let frame = CloseFrame { code: CloseCode::Normal, reason: "logout".into() };
            let _ = self.stream.close(Some(frame)).await;
        })
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
