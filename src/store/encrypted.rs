// ABOUTME: AES-256-GCM encrypted file tier for tokens and handshake secrets
// ABOUTME: Values are encrypted per entry with a fresh nonce; key material is zeroized on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use super::{FileTier, StorageTier};
use crate::errors::{Result, SyncError};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// Secure tier: same file layout as [`FileTier`], but every value is
/// `base64(nonce || AES-256-GCM ciphertext)` under a host-supplied key.
///
/// Tokens must never land on disk in the clear; this tier is what the
/// credential store uses for them and for in-flight handshake secrets.
pub struct EncryptedFileTier {
    inner: FileTier,
    key: Zeroizing<[u8; 32]>,
}

impl EncryptedFileTier {
    /// Open (or create) the encrypted tier file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] when an existing file cannot be read.
    pub fn open(path: &Path, key: [u8; 32]) -> Result<Self> {
        Ok(Self {
            inner: FileTier::open(path)?,
            key: Zeroizing::new(key),
        })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()))
    }

    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SyncError::Storage("secure tier encryption failed".into()))?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|e| SyncError::Storage(format!("secure tier entry is not base64: {e}")))?;
        if blob.len() <= NONCE_LEN {
            return Err(SyncError::Storage("secure tier entry too short".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SyncError::Storage("secure tier decryption failed (wrong key?)".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| SyncError::Storage(format!("secure tier entry is not UTF-8: {e}")))
    }
}

#[async_trait]
impl StorageTier for EncryptedFileTier {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.inner.get(key).await? {
            Some(encoded) => Ok(Some(self.decrypt(&encoded)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let encoded = self.encrypt(value)?;
        self.inner.put(key, &encoded).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}
