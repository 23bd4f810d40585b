// ABOUTME: Bridge trait for on-device health stores (Health Connect, HealthKit)
// ABOUTME: The host injects a platform implementation; adapters stay pure Rust
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record read from a device health store, already resolved to a
/// numeric-or-text value by the platform side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Platform record type (`StepsRecord`, `HKQuantityTypeIdentifierStepCount`).
    pub record_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Originating app or device, when the store exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Host-injected access to an on-device health store.
///
/// Permission grants and record reads happen on the platform side of this
/// trait; the adapters translate between catalog metric keys and platform
/// record types and normalize whatever comes back.
#[async_trait]
pub trait DeviceHealthBridge: Send + Sync {
    /// Whether the store exists on this host (Health Connect installed,
    /// HealthKit entitlement present).
    async fn is_store_present(&self) -> bool;

    /// Request read permission for the given platform permission strings or
    /// record types. Returns the subset actually granted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::SyncError::AuthorizationFailed`] when the
    /// permission UI could not be shown.
    async fn request_read_permissions(&self, permissions: &[String]) -> Result<Vec<String>>;

    /// Read all records of `record_type` with a start time in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::SyncError::Storage`] when the platform read
    /// fails.
    async fn read_records(
        &self,
        record_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DeviceRecord>>;

    /// Drop previously granted permissions. Best-effort.
    async fn revoke_permissions(&self);
}
