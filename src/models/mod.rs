// ABOUTME: Shared domain models for normalized health data and provider state
// ABOUTME: Provider identifiers, tokens, connections, samples, payloads and sync reports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::errors::SyncError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The nine supported health data platforms.
///
/// Seven are wearable-vendor cloud APIs; `HealthConnect` and `AppleHealth`
/// are on-device health stores reached through an injected bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Fitbit,
    GoogleFit,
    Garmin,
    Oura,
    Polar,
    Withings,
    Whoop,
    HealthConnect,
    AppleHealth,
}

impl Provider {
    /// All providers, in stable order.
    pub const ALL: [Self; 9] = [
        Self::Fitbit,
        Self::GoogleFit,
        Self::Garmin,
        Self::Oura,
        Self::Polar,
        Self::Withings,
        Self::Whoop,
        Self::HealthConnect,
        Self::AppleHealth,
    ];

    /// Stable string identifier, used in storage keys and wire payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fitbit => "fitbit",
            Self::GoogleFit => "google_fit",
            Self::Garmin => "garmin",
            Self::Oura => "oura",
            Self::Polar => "polar",
            Self::Withings => "withings",
            Self::Whoop => "whoop",
            Self::HealthConnect => "health_connect",
            Self::AppleHealth => "apple_health",
        }
    }

    /// Whether data is read from an on-device health store instead of a cloud API.
    #[must_use]
    pub const fn is_device_store(self) -> bool {
        matches!(self, Self::HealthConnect | Self::AppleHealth)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fitbit" => Ok(Self::Fitbit),
            "google_fit" | "googlefit" => Ok(Self::GoogleFit),
            "garmin" => Ok(Self::Garmin),
            "oura" => Ok(Self::Oura),
            "polar" => Ok(Self::Polar),
            "withings" => Ok(Self::Withings),
            "whoop" => Ok(Self::Whoop),
            "health_connect" | "healthconnect" => Ok(Self::HealthConnect),
            "apple_health" | "applehealth" | "healthkit" => Ok(Self::AppleHealth),
            other => Err(SyncError::UnknownProvider(other.to_owned())),
        }
    }
}

/// The eight physiological metric categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricGroup {
    Activity,
    Heart,
    Body,
    Sleep,
    Respiratory,
    Metabolic,
    Nutrition,
    Wellness,
}

/// OAuth token material for one provider.
///
/// All providers share this shape; the two-legged-signed provider additionally
/// carries a `token_secret` and has no natural expiry (`expires_at: None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Epoch milliseconds. `None` means the token never expires on the
    /// timeline used by bearer-token providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// OAuth1 token secret; present only for the two-legged-signed provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
}

impl TokenData {
    /// True when `expires_at` falls within `buffer` from now.
    ///
    /// Tokens inside the buffer must be refreshed before use, never used stale.
    /// Tokens without a natural expiry never report as expiring.
    #[must_use]
    pub fn expires_within(&self, buffer: Duration) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now() + buffer >= epoch_ms_to_datetime(at))
    }
}

/// Durable record of a provider authorization and its sync state.
///
/// One per provider per installation; created on successful authorization,
/// `last_sync_at` is bumped on every sync, deleted on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConnection {
    pub provider: Provider,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub selected_metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_metrics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_metrics: Option<Vec<String>>,
}

impl ProviderConnection {
    /// Fresh connection record for a just-authorized provider.
    #[must_use]
    pub fn connected_now(provider: Provider, selected_metrics: Vec<String>) -> Self {
        Self {
            provider,
            connected: true,
            connected_at: Some(Utc::now()),
            last_sync_at: None,
            selected_metrics,
            granted_metrics: None,
            denied_metrics: None,
        }
    }
}

/// One normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: SampleValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MetricSample {
    /// Point-in-time numeric sample with the catalog's canonical unit.
    #[must_use]
    pub fn number(value: f64, unit: Option<&str>, at: DateTime<Utc>) -> Self {
        Self {
            value: SampleValue::Number(value),
            unit: unit.map(ToOwned::to_owned),
            start_date: at,
            end_date: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_owned());
        self
    }
}

/// Sample values are numeric for almost every metric; a few (e.g. sleep stage
/// labels from device stores) arrive as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(t) => t.trim().parse().ok(),
        }
    }
}

/// All samples produced for one (provider, metric key) pair in one fetch.
///
/// Samples are append-only within a single fetch; merging or de-duplicating
/// across fetches is a caller concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetricPayload {
    pub provider: Provider,
    pub metric_key: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub samples: Vec<MetricSample>,
}

/// Report produced exactly once per `sync_health_data` invocation,
/// including the single permitted retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub provider: Provider,
    pub synced_at: DateTime<Utc>,
    pub metrics_count: usize,
    pub samples_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    #[must_use]
    pub fn failure(provider: Provider, error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider,
            synced_at: Utc::now(),
            metrics_count: 0,
            samples_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Host device metadata forwarded to the backend sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

/// The `[start, end)` range for which samples were requested in one sync pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRange {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Wire payload sent best-effort to the backend sink after each sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    pub provider: Provider,
    pub selected_metrics: Vec<String>,
    pub range: SyncRange,
    pub device: DeviceInfo,
    pub metrics: Vec<NormalizedMetricPayload>,
}

/// Convert epoch milliseconds into a UTC timestamp, saturating on overflow.
#[must_use]
pub fn epoch_ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
