// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed token store: JSON map with atomic writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::{StoreFuture, TokenStore};

/// File name used inside the state directory.
pub const TOKEN_FILE: &str = "tokens.json";

/// Token store persisted to a single JSON file.
///
/// Every mutation rewrites the whole file through a temp file + rename, so a
/// batch (e.g. the token pair) lands on disk all at once. On Unix the file is
/// created owner read/write only.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() { load(&path)? } else { BTreeMap::new() };
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    /// Open `tokens.json` inside `dir`, creating the directory if needed.
    pub fn in_dir(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open(dir.join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        apply(&mut next);
        if next == *entries {
            return Ok(());
        }
        save(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl TokenStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(move |m| {
            m.insert(key.to_owned(), value);
        }))
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(move |m| {
            m.remove(key);
        }))
    }

    fn set_many<'a>(&'a self, entries: Vec<(&'static str, String)>) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(move |m| {
            for (key, value) in entries {
                m.insert(key.to_owned(), value);
            }
        }))
    }

    fn delete_many<'a>(&'a self, keys: &'a [&'static str]) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(move |m| {
            for key in keys {
                m.remove(*key);
            }
        }))
    }
}

fn load(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

/// Write the map atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never share
/// a `.tmp` file.
fn save(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(entries)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    write_private(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Create `path` (which must not exist yet) owner-only and write `contents`.
///
/// On Unix the mode is set at creation, so the bytes are never readable by
/// other users.
fn write_private(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
