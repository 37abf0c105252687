// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer attachment and one-shot refresh-and-retry for REST calls.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, ErrorCode};
use crate::http::{ApiRequest, ApiResponse, Transport};
use crate::refresh::RefreshCoordinator;
use crate::store::{TokenStore, ACCESS_TOKEN_KEY};

/// The one pipeline every REST service sends through.
#[derive(Clone)]
pub struct AuthPipeline {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl AuthPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        Self { transport, store, refresh }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn refresh(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Send `req` with the stored access token attached, refreshing once on 401.
    ///
    /// Returns the final response whatever its status.
    pub async fn send(&self, mut req: ApiRequest) -> Result<ApiResponse, ApiError> {
        req.bearer = self
            .store
            .get(ACCESS_TOKEN_KEY)
            .await
            .map_err(|e| ApiError::new(ErrorCode::Storage, e.to_string()))?;
        send_with_refresh(self.transport.as_ref(), &self.refresh, req).await
    }

    /// Send `req` and turn a non-2xx answer into an [`ApiError`].
    pub async fn call(&self, req: ApiRequest, fallback: &str) -> Result<ApiResponse, ApiError> {
        let resp = self.send(req).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(resp.into_error(fallback))
        }
    }

    /// Send `req` and decode a 2xx JSON body.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        req: ApiRequest,
        fallback: &str,
    ) -> Result<T, ApiError> {
        self.call(req, fallback).await?.json()
    }

    /// Send `req`, discarding any 2xx body.
    pub async fn call_empty(&self, req: ApiRequest, fallback: &str) -> Result<(), ApiError> {
        self.call(req, fallback).await.map(|_| ())
    }
}

/// Send `req`; on a first 401, refresh through `refresh` and send it again.
///
/// A request is retried at most once. If the refresh fails, the original 401
/// response is returned. Transport errors are returned untouched and never
/// trigger a refresh.
pub async fn send_with_refresh(
    transport: &dyn Transport,
    refresh: &Arc<RefreshCoordinator>,
    req: ApiRequest,
) -> Result<ApiResponse, ApiError> {
    let resp = transport.send(req.clone()).await?;
    if resp.status != 401 || req.retried {
        return Ok(resp);
    }

    match refresh.ensure_fresh_token().await {
        Ok(token) => {
            debug!(path = %req.path, "retrying after token refresh");
            let retry = ApiRequest { bearer: Some(token), retried: true, ..req };
            transport.send(retry).await
        }
        Err(e) => {
            debug!(path = %req.path, err = %e, "refresh failed, returning original 401");
            Ok(resp)
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
