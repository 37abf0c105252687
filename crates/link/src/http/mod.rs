// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST plumbing: a minimal send primitive and the auth pipeline around it.

pub mod pipeline;
pub mod transport;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ErrorBody, ErrorCode};

pub use pipeline::{send_with_refresh, AuthPipeline};
pub use reqwest::Method;
pub use transport::ReqwestTransport;

/// An outbound REST call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
    /// Set once the request has been re-sent after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, bearer: None, retried: false }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response: status plus undecoded body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(body).map_err(|e| {
            ApiError::with_status(ErrorCode::Decode, self.status, format!("invalid response: {e}"))
        })
    }

    /// Convert a non-2xx response into an error, preferring the server's
    /// `detail` message over `fallback`.
    pub fn into_error(self, fallback: &str) -> ApiError {
        let code = if self.status == 401 { ErrorCode::Unauthorized } else { ErrorCode::Api };
        let message = ErrorBody::detail_from(&self.body).unwrap_or_else(|| fallback.to_owned());
        ApiError::with_status(code, self.status, message)
    }
}

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse, ApiError>> + Send + 'a>>;

/// Sends one request and returns whatever the server answered.
///
/// Only transport failures (unreachable, timeout) are errors here; every HTTP
/// status, 401 included, comes back as an [`ApiResponse`].
pub trait Transport: Send + Sync {
    fn send(&self, req: ApiRequest) -> SendFuture<'_>;
}
