// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: async key/value abstraction holding the credential pair.
//!
//! The store is the single source of truth for credentials. It is read and
//! written by both the HTTP pipeline and the realtime connection manager; the
//! refresh coordinator's single-flight guarantee is what keeps writes ordered,
//! not the store itself.

pub mod file;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use file::FileStore;
pub use memory::MemoryStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const BIOMETRIC_ENABLED_KEY: &str = "biometric_enabled";

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Durable key/value storage for credentials.
///
/// Object-safe for use as `Arc<dyn TokenStore>`. `get` returning `None` means
/// the key was never set and is not an error.
pub trait TokenStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Write several entries. Implementations override this to make the
    /// batch atomic.
    fn set_many<'a>(&'a self, entries: Vec<(&'static str, String)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            for (key, value) in entries {
                self.set(key, value).await?;
            }
            Ok(())
        })
    }

    /// Delete several entries. Implementations override this to make the
    /// batch atomic.
    fn delete_many<'a>(&'a self, keys: &'a [&'static str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            for key in keys {
                self.delete(key).await?;
            }
            Ok(())
        })
    }
}

/// Access/refresh credential pair. Always written and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Load the stored pair. Returns `None` unless both tokens are present.
pub async fn load_pair(store: &dyn TokenStore) -> anyhow::Result<Option<TokenPair>> {
    let access = store.get(ACCESS_TOKEN_KEY).await?;
    let refresh = store.get(REFRESH_TOKEN_KEY).await?;
    Ok(match (access, refresh) {
        (Some(access_token), Some(refresh_token)) => {
            Some(TokenPair { access_token, refresh_token })
        }
        _ => None,
    })
}

/// Overwrite both tokens in one batch.
pub async fn save_pair(store: &dyn TokenStore, pair: &TokenPair) -> anyhow::Result<()> {
    store
        .set_many(vec![
            (ACCESS_TOKEN_KEY, pair.access_token.clone()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.clone()),
        ])
        .await
}

/// Delete both tokens in one batch.
pub async fn clear_pair(store: &dyn TokenStore) -> anyhow::Result<()> {
    store.delete_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]).await
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
