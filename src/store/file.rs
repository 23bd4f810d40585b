// ABOUTME: Plain JSON file-backed storage tier for the general connection-state tier
// ABOUTME: Whole-map write-through with an in-memory cache behind a mutex
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use super::StorageTier;
use crate::errors::{Result, SyncError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// General-purpose tier: one JSON object per file, rewritten on every put.
///
/// Connection records are tiny and writes are rare (authorization, sync
/// completion, disconnect), so whole-file rewrite keeps the format trivially
/// inspectable.
pub struct FileTier {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileTier {
    /// Open (or create) the tier file. Existing content is loaded eagerly so
    /// later reads never touch the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] when an existing file cannot be read
    /// or does not contain a JSON object.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| SyncError::Storage(format!("corrupt tier file {}: {e}", path.display())))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageTier for FileTier {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}
