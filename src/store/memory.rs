// ABOUTME: In-memory storage tier backing tests and ephemeral hosts
// ABOUTME: Lock-free concurrent map; optionally fails every operation to exercise error paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use super::StorageTier;
use crate::errors::{Result, SyncError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Non-durable tier over a concurrent map.
#[derive(Default)]
pub struct MemoryTier {
    entries: DashMap<String, String>,
    poisoned: AtomicBool,
}

impl MemoryTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a storage error. Test seam
    /// for the "swallow storage errors" contracts.
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            Err(SyncError::Storage("tier poisoned".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageTier for MemoryTier {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }
}
