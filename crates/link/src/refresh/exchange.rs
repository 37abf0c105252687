// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh-token exchange against `POST /auth/refresh`.

use std::time::Duration;

use crate::error::ErrorBody;
use crate::refresh::{ExchangeFuture, RefreshError, RefreshExchange, TokenGrant};

/// Exchanges refresh tokens over HTTP.
///
/// Uses its own client rather than the auth pipeline so a 401 from the
/// refresh endpoint can never trigger another refresh.
pub struct HttpRefreshExchange {
    client: reqwest::Client,
    url: String,
}

impl HttpRefreshExchange {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        crate::install_crypto_provider();
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client, url: format!("{}/auth/refresh", api_url.trim_end_matches('/')) }
    }

    async fn do_refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| RefreshError::Network(e.to_string()))?;
        if !status.is_success() {
            let message =
                ErrorBody::detail_from(&body).unwrap_or_else(|| "Session expired".to_owned());
            return Err(RefreshError::Rejected { status: status.as_u16(), message });
        }

        serde_json::from_slice(&body).map_err(|e| RefreshError::Malformed(e.to_string()))
    }
}

impl RefreshExchange for HttpRefreshExchange {
    fn exchange<'a>(&'a self, refresh_token: &'a str) -> ExchangeFuture<'a> {
        Box::pin(self.do_refresh(refresh_token))
    }
}
