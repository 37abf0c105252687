// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! reqwest-backed [`Transport`].

use std::time::Duration;

use reqwest::Client;

use crate::error::{ApiError, ErrorCode};
use crate::http::{ApiRequest, ApiResponse, SendFuture, Transport};

/// HTTP client wrapper for the journal API.
pub struct ReqwestTransport {
    base_url: String,
    client: Client,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        crate::install_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn do_send(&self, req: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self.client.request(req.method, self.url(&req.path));
        if let Some(ref token) = req.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(transport_error)?;
        Ok(ApiResponse { status, body })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, req: ApiRequest) -> SendFuture<'_> {
        Box::pin(self.do_send(req))
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::new(ErrorCode::Timeout, "request timed out")
    } else {
        ApiError::new(ErrorCode::Network, format!("network error: {e}"))
    }
}
