// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{StoreFuture, TokenStore};

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `entries`.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
        Self { entries: RwLock::new(map) }
    }
}

impl TokenStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.read().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_owned(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
            Ok(())
        })
    }

    fn set_many<'a>(&'a self, entries: Vec<(&'static str, String)>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut map = self.entries.write().await;
            for (key, value) in entries {
                map.insert(key.to_owned(), value);
            }
            Ok(())
        })
    }

    fn delete_many<'a>(&'a self, keys: &'a [&'static str]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut map = self.entries.write().await;
            for key in keys {
                map.remove(*key);
            }
            Ok(())
        })
    }
}
