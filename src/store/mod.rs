// ABOUTME: Durable provider-keyed storage for tokens, connections and handshake secrets
// ABOUTME: Two tiers: plain key-value for connection state, encrypted-at-rest for tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

//! # Credential Store
//!
//! Provider-keyed durable storage shared by all nine adapters. Connection
//! state lives in a general-purpose tier; tokens and in-flight handshake
//! secrets (PKCE verifiers, OAuth1 temporary token secrets) live in a
//! secure tier that is encrypted at rest.
//!
//! Each adapter only ever reads and writes its own provider's keys, so no
//! cross-provider locking is needed. The one true critical section is the
//! per-provider token read-check-refresh-write sequence, serialized through
//! [`CredentialStore::refresh_guard`].

mod encrypted;
mod file;
mod memory;

pub use encrypted::EncryptedFileTier;
pub use file::FileTier;
pub use memory::MemoryTier;

use crate::constants::storage_keys;
use crate::errors::Result;
use crate::models::{Provider, ProviderConnection, TokenData};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A durable string-keyed, string-valued storage tier.
#[async_trait]
pub trait StorageTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Provider-keyed credential and connection persistence.
pub struct CredentialStore {
    general: Arc<dyn StorageTier>,
    secure: Arc<dyn StorageTier>,
    refresh_locks: DashMap<Provider, Arc<Mutex<()>>>,
}

impl CredentialStore {
    /// Build a store over caller-supplied tiers.
    #[must_use]
    pub fn new(general: Arc<dyn StorageTier>, secure: Arc<dyn StorageTier>) -> Self {
        Self {
            general,
            secure,
            refresh_locks: DashMap::new(),
        }
    }

    /// Open file-backed tiers under `dir`: `connections.json` plain,
    /// `credentials.enc` encrypted with the supplied 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when existing tier files cannot be read.
    pub fn open(dir: &Path, secure_key: [u8; 32]) -> Result<Self> {
        let general = FileTier::open(&dir.join("connections.json"))?;
        let secure = EncryptedFileTier::open(&dir.join("credentials.enc"), secure_key)?;
        Ok(Self::new(Arc::new(general), Arc::new(secure)))
    }

    /// In-memory tiers; used by tests and ephemeral hosts.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTier::new()), Arc::new(MemoryTier::new()))
    }

    /// General-tier key for a provider's connection record.
    ///
    /// Pure mapping over the fixed provider set; never derived from user
    /// input beyond the provider identifier itself.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownProvider`](crate::errors::SyncError::UnknownProvider) for an unrecognized provider string.
    pub fn connection_storage_key(provider: &str) -> Result<String> {
        let provider = Provider::from_str(provider)?;
        Ok(format!(
            "{}{}",
            storage_keys::CONNECTION_PREFIX,
            provider.as_str()
        ))
    }

    /// Secure-tier key for a provider's tokens.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownProvider`](crate::errors::SyncError::UnknownProvider) for an unrecognized provider string.
    pub fn token_storage_key(provider: &str) -> Result<String> {
        let provider = Provider::from_str(provider)?;
        Ok(format!(
            "{}{}",
            storage_keys::TOKENS_PREFIX,
            provider.as_str()
        ))
    }

    fn handshake_key(provider: Provider) -> String {
        format!("{}{}", storage_keys::HANDSHAKE_PREFIX, provider.as_str())
    }

    /// Load the connection record for a provider.
    ///
    /// Never errors: storage failures and corrupt records are logged and
    /// swallowed to `None`, so a damaged store degrades to "not connected"
    /// instead of crashing the host.
    pub async fn provider_connection(&self, provider: Provider) -> Option<ProviderConnection> {
        let key = format!("{}{}", storage_keys::CONNECTION_PREFIX, provider.as_str());
        match self.general.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(conn) => Some(conn),
                Err(err) => {
                    warn!(provider = %provider, error = %err, "corrupt connection record, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(provider = %provider, error = %err, "failed to read connection record");
                None
            }
        }
    }

    /// Overwrite the connection record for `conn.provider`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when the general tier write fails.
    pub async fn save_provider_connection(&self, conn: &ProviderConnection) -> Result<()> {
        let key = format!(
            "{}{}",
            storage_keys::CONNECTION_PREFIX,
            conn.provider.as_str()
        );
        let raw = serde_json::to_string(conn)?;
        self.general.put(&key, &raw).await
    }

    /// Delete the connection record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when the general tier delete fails.
    pub async fn remove_provider_connection(&self, provider: Provider) -> Result<()> {
        let key = format!("{}{}", storage_keys::CONNECTION_PREFIX, provider.as_str());
        self.general.remove(&key).await
    }

    /// All providers with a durable connected record.
    pub async fn all_connected(&self) -> Vec<ProviderConnection> {
        let mut out = Vec::new();
        for provider in Provider::ALL {
            if let Some(conn) = self.provider_connection(provider).await {
                if conn.connected {
                    out.push(conn);
                }
            }
        }
        out
    }

    /// Load token material from the secure tier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) on tier failure or [`SyncError::Parse`](crate::errors::SyncError::Parse)
    /// for an undecodable record.
    pub async fn token_data(&self, provider: Provider) -> Result<Option<TokenData>> {
        let key = format!("{}{}", storage_keys::TOKENS_PREFIX, provider.as_str());
        match self.secure.get(&key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Persist token material to the secure tier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when the secure tier write fails.
    pub async fn save_token_data(&self, provider: Provider, tokens: &TokenData) -> Result<()> {
        let key = format!("{}{}", storage_keys::TOKENS_PREFIX, provider.as_str());
        let raw = serde_json::to_string(tokens)?;
        self.secure.put(&key, &raw).await
    }

    /// Delete token material.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when the secure tier delete fails.
    pub async fn remove_token_data(&self, provider: Provider) -> Result<()> {
        let key = format!("{}{}", storage_keys::TOKENS_PREFIX, provider.as_str());
        self.secure.remove(&key).await
    }

    /// Stash a short-lived, single-use handshake secret (PKCE verifier or
    /// OAuth1 temporary token secret) in the secure tier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`](crate::errors::SyncError::Storage) when the secure tier write fails.
    pub async fn stash_handshake_secret(&self, provider: Provider, value: &str) -> Result<()> {
        self.secure
            .put(&Self::handshake_key(provider), value)
            .await
    }

    /// Take (and delete) the stashed handshake secret. The delete happens
    /// unconditionally so the secret is single-use on both the success and
    /// failure paths of the handshake.
    pub async fn take_handshake_secret(&self, provider: Provider) -> Option<String> {
        let key = Self::handshake_key(provider);
        let value = match self.secure.get(&key).await {
            Ok(v) => v,
            Err(err) => {
                warn!(provider = %provider, error = %err, "failed to read handshake secret");
                None
            }
        };
        if let Err(err) = self.secure.remove(&key).await {
            warn!(provider = %provider, error = %err, "failed to clear handshake secret");
        }
        value
    }

    /// Discard any stashed handshake secret without reading it.
    pub async fn clear_handshake_secret(&self, provider: Provider) {
        if let Err(err) = self.secure.remove(&Self::handshake_key(provider)).await {
            warn!(provider = %provider, error = %err, "failed to clear handshake secret");
        }
    }

    /// Per-provider mutex serializing the token read-check-refresh-write
    /// sequence. Two overlapping refreshes racing on the same refresh token
    /// can invalidate each other.
    #[must_use]
    pub fn refresh_guard(&self, provider: Provider) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(provider)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Remove everything stored for a provider (disconnect path).
    pub async fn purge_provider(&self, provider: Provider) {
        if let Err(err) = self.remove_token_data(provider).await {
            warn!(provider = %provider, error = %err, "failed to remove tokens");
        }
        if let Err(err) = self.remove_provider_connection(provider).await {
            warn!(provider = %provider, error = %err, "failed to remove connection");
        }
        self.clear_handshake_secret(provider).await;
        debug!(provider = %provider, "provider state purged");
    }
}
