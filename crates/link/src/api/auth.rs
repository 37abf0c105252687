// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication endpoints.
//!
//! Every operation that yields a token pair stores it before returning.
//! Logging out clears the pair whether or not the server call succeeded.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{ApiError, ErrorCode};
use crate::http::{ApiRequest, AuthPipeline};
use crate::store::{
    clear_pair, save_pair, TokenPair, TokenStore, ACCESS_TOKEN_KEY, BIOMETRIC_ENABLED_KEY,
    REFRESH_TOKEN_KEY,
};

/// Token pair returned by login-style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl AuthTokens {
    fn pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Profile returned by `/auth/me`. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Value,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub provider: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client for the `/auth/*` endpoints.
#[derive(Clone)]
pub struct AuthService {
    pipeline: AuthPipeline,
}

impl AuthService {
    pub fn new(pipeline: AuthPipeline) -> Self {
        Self { pipeline }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ApiError> {
        let req = ApiRequest::post("/auth/login").json(json!({
            "email": email,
            "password": password,
        }));
        self.sign_in(req, "Login failed").await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthTokens, ApiError> {
        let req = ApiRequest::post("/auth/register").json(json!({
            "email": email,
            "password": password,
            "name": name,
        }));
        self.sign_in(req, "Registration failed").await
    }

    pub async fn google_sign_in(&self, id_token: &str) -> Result<AuthTokens, ApiError> {
        let req = ApiRequest::post("/auth/google").json(json!({ "id_token": id_token }));
        self.sign_in(req, "Google sign-in failed").await
    }

    pub async fn facebook_sign_in(&self, access_token: &str) -> Result<AuthTokens, ApiError> {
        let req = ApiRequest::post("/auth/facebook").json(json!({ "access_token": access_token }));
        self.sign_in(req, "Facebook sign-in failed").await
    }

    /// Confirm an emailed one-time code. Stores the pair when the server
    /// returns one; returns `None` for a message-only answer.
    pub async fn verify_email(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<AuthTokens>, ApiError> {
        let req =
            ApiRequest::post("/auth/verify-email").json(json!({ "email": email, "code": code }));
        let body: Value = self.pipeline.call_json(req, "Email verification failed").await?;
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let tokens: AuthTokens = serde_json::from_value(body).map_err(|e| {
            ApiError::new(ErrorCode::Decode, format!("invalid verification response: {e}"))
        })?;
        self.store_tokens(&tokens).await?;
        Ok(Some(tokens))
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/resend-verification").json(json!({ "email": email }));
        self.pipeline.call_empty(req, "Failed to resend verification code").await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/reset-password").json(json!({ "email": email }));
        self.pipeline.call_empty(req, "Failed to request password reset").await
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/reset-password/confirm").json(json!({
            "token": token,
            "new_password": new_password,
        }));
        self.pipeline.call_empty(req, "Failed to reset password").await
    }

    pub async fn set_password(&self, password: &str) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/set-password").json(json!({ "password": password }));
        self.pipeline.call_empty(req, "Failed to set password").await
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.pipeline.call_json(ApiRequest::get("/auth/me"), "Failed to load profile").await
    }

    /// Whether the server still accepts the stored token (after at most one
    /// refresh). Only a final 401 maps to `false`.
    pub async fn verify_token(&self) -> Result<bool, ApiError> {
        let resp = self.pipeline.send(ApiRequest::get("/auth/verify-token")).await?;
        match resp.status {
            401 => Ok(false),
            _ if resp.is_success() => Ok(true),
            _ => Err(resp.into_error("Failed to verify token")),
        }
    }

    pub async fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, ApiError> {
        let req = ApiRequest::get("/auth/linked-accounts");
        self.pipeline.call_json(req, "Failed to load linked accounts").await
    }

    pub async fn unlink_account(&self, provider: &str) -> Result<(), ApiError> {
        let req = ApiRequest::delete(format!("/auth/link/{provider}"));
        self.pipeline.call_empty(req, "Failed to unlink account").await
    }

    /// Revoke the stored refresh token on the server, then clear local tokens.
    ///
    /// The local pair is cleared even when the server call fails; that
    /// failure is logged, not returned. Only a storage error is returned.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let refresh_token = self.pipeline.store().get(REFRESH_TOKEN_KEY).await.ok().flatten();
        if let Some(refresh_token) = refresh_token {
            let req =
                ApiRequest::post("/auth/logout").json(json!({ "refresh_token": refresh_token }));
            if let Err(e) = self.pipeline.call_empty(req, "Logout failed").await {
                warn!(err = %e, "server logout failed, clearing local session anyway");
            }
        }
        self.clear_tokens().await
    }

    /// Revoke every session of this user, then clear local tokens.
    pub async fn logout_all(&self) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/logout-all");
        if let Err(e) = self.pipeline.call_empty(req, "Logout failed").await {
            warn!(err = %e, "server logout-all failed, clearing local session anyway");
        }
        self.clear_tokens().await
    }

    /// Force a refresh through the shared coordinator.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        self.pipeline
            .refresh()
            .ensure_fresh_token()
            .await
            .map_err(|e| ApiError::new(ErrorCode::RefreshFailed, e.to_string()))
    }

    /// True when an access token is stored. Says nothing about its validity.
    pub async fn is_authenticated(&self) -> Result<bool, ApiError> {
        let token = self.pipeline.store().get(ACCESS_TOKEN_KEY).await.map_err(storage_error)?;
        Ok(token.is_some())
    }

    pub async fn biometric_enabled(&self) -> Result<bool, ApiError> {
        let flag =
            self.pipeline.store().get(BIOMETRIC_ENABLED_KEY).await.map_err(storage_error)?;
        Ok(flag.as_deref() == Some("true"))
    }

    pub async fn set_biometric_enabled(&self, enabled: bool) -> Result<(), ApiError> {
        self.pipeline
            .store()
            .set(BIOMETRIC_ENABLED_KEY, enabled.to_string())
            .await
            .map_err(storage_error)
    }

    async fn sign_in(&self, req: ApiRequest, fallback: &str) -> Result<AuthTokens, ApiError> {
        let tokens: AuthTokens = self.pipeline.call_json(req, fallback).await?;
        self.store_tokens(&tokens).await?;
        info!("signed in");
        Ok(tokens)
    }

    async fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), ApiError> {
        save_pair(self.pipeline.store().as_ref(), &tokens.pair()).await.map_err(storage_error)
    }

    async fn clear_tokens(&self) -> Result<(), ApiError> {
        clear_pair(self.pipeline.store().as_ref()).await.map_err(storage_error)?;
        info!("signed out");
        Ok(())
    }
}

fn storage_error(e: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Storage, format!("{e:#}"))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
