// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::{clear_pair, load_pair, save_pair, TokenPair, ACCESS_TOKEN_KEY};

fn pair(access: &str, refresh: &str) -> TokenPair {
    TokenPair { access_token: access.to_owned(), refresh_token: refresh.to_owned() }
}

#[tokio::test]
async fn pair_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let store = FileStore::in_dir(dir.path())?;
        save_pair(&store, &pair("a1", "r1")).await?;
    }

    let reopened = FileStore::in_dir(dir.path())?;
    assert_eq!(load_pair(&reopened).await?, Some(pair("a1", "r1")));
    Ok(())
}

#[tokio::test]
async fn clear_removes_pair_from_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileStore::in_dir(dir.path())?;
    save_pair(&store, &pair("a1", "r1")).await?;
    clear_pair(&store).await?;

    let contents = std::fs::read_to_string(store.path())?;
    let parsed: serde_json::Value = serde_json::from_str(&contents)?;
    assert!(parsed.get(ACCESS_TOKEN_KEY).is_none(), "contents: {contents}");
    assert!(FileStore::in_dir(dir.path())?.get(ACCESS_TOKEN_KEY).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn no_temp_files_left_behind() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = FileStore::in_dir(dir.path())?;
    for i in 0..5 {
        save_pair(&store, &pair(&format!("a{i}"), &format!("r{i}"))).await?;
    }

    let names: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![TOKEN_FILE.to_owned()]);
    Ok(())
}

#[tokio::test]
async fn empty_file_opens_as_empty_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(TOKEN_FILE);
    std::fs::write(&path, "")?;
    let store = FileStore::open(&path)?;
    assert!(store.get(ACCESS_TOKEN_KEY).await?.is_none());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn token_file_is_owner_only() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let store = FileStore::in_dir(dir.path())?;
    save_pair(&store, &pair("a1", "r1")).await?;
    let mode = std::fs::metadata(store.path())?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    Ok(())
}

#[cfg(unix)]
#[test]
fn temp_file_is_created_owner_only() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tokens.json.tmp");
    write_private(&path, b"{}")?;
    let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    assert_eq!(std::fs::read_to_string(&path)?, "{}");

    // An existing file may carry looser permissions; never reuse it.
    assert!(write_private(&path, b"{}").is_err());
    Ok(())
}
