// ABOUTME: Sync orchestrator: gating, window calculation, retry-once and report production
// ABOUTME: Produces exactly one report per invocation and never throws past its boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

//! # Sync Orchestration
//!
//! One [`SyncOrchestrator::sync_health_data`] call runs the full pipeline
//! for a provider: runtime gating, window calculation, token freshness,
//! fetch, delivery and the connection-record bump. The call returns a
//! [`SyncReport`] in every case; errors are folded into the report rather
//! than propagated, and only a transient network failure earns the single
//! permitted retry.

pub mod sink;

pub use sink::{BackendSink, VitalsSink};

use crate::constants::limits;
use crate::errors::{Result, SyncError};
use crate::models::{
    DeviceInfo, Provider, ProviderConnection, SyncPayload, SyncRange, SyncReport,
};
use crate::providers::ProviderRegistry;
use crate::store::CredentialStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Host runtime state. Syncs run only while the app is in the active
/// (foreground) state; a backgrounded host defers with no network or
/// storage I/O.
pub trait RuntimeStateProbe: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Probe for hosts without a background state (servers, tests).
pub struct AlwaysActive;

impl RuntimeStateProbe for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

pub struct SyncOrchestrator {
    registry: Arc<ProviderRegistry>,
    store: Arc<CredentialStore>,
    probe: Arc<dyn RuntimeStateProbe>,
    backend: Option<BackendSink>,
    vitals: Option<Arc<dyn VitalsSink>>,
    device: DeviceInfo,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<CredentialStore>) -> Self {
        Self {
            registry,
            store,
            probe: Arc::new(AlwaysActive),
            backend: None,
            vitals: None,
            device: DeviceInfo::default(),
        }
    }

    #[must_use]
    pub fn with_runtime_probe(mut self, probe: Arc<dyn RuntimeStateProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_backend_sink(mut self, sink: BackendSink) -> Self {
        self.backend = Some(sink);
        self
    }

    #[must_use]
    pub fn with_vitals_sink(mut self, sink: Arc<dyn VitalsSink>) -> Self {
        self.vitals = Some(sink);
        self
    }

    #[must_use]
    pub fn with_device_info(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    /// Run one full sync for `provider`. Always returns a report; a
    /// transient network failure is retried exactly once, every other
    /// failure (and a second transient one) lands in the report as-is.
    pub async fn sync_health_data(&self, provider: Provider) -> SyncReport {
        if !self.probe.is_active() {
            // Deferred before any network or storage I/O.
            return SyncReport::failure(provider, SyncError::SyncDeferred.to_string());
        }

        let Some(conn) = self.store.provider_connection(provider).await else {
            return SyncReport::failure(
                provider,
                SyncError::NotConnected(provider).to_string(),
            );
        };
        if !conn.connected {
            return SyncReport::failure(
                provider,
                SyncError::NotConnected(provider).to_string(),
            );
        }

        let end = Utc::now();
        let start = sync_window_start(&conn, end);

        match self.attempt_sync(provider, &conn, start, end).await {
            Ok(report) => report,
            Err(err) if err.is_transient() => {
                warn!(provider = %provider, error = %err, "transient failure, retrying once");
                match self.attempt_sync(provider, &conn, start, end).await {
                    Ok(report) => report,
                    Err(retry_err) => SyncReport::failure(provider, retry_err.to_string()),
                }
            }
            Err(err) => SyncReport::failure(provider, err.to_string()),
        }
    }

    /// Sync every connected provider sequentially, one report each.
    /// A provider that fails does not stop the ones after it.
    pub async fn sync_all(&self) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        for conn in self.store.all_connected().await {
            reports.push(self.sync_health_data(conn.provider).await);
        }
        reports
    }

    async fn attempt_sync(
        &self,
        provider: Provider,
        conn: &ProviderConnection,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| SyncError::UnknownProvider(provider.as_str().to_owned()))?;

        // Denied metrics are excluded up front; their endpoints would only
        // answer 403.
        let selected: Vec<String> = match &conn.granted_metrics {
            Some(granted) => conn
                .selected_metrics
                .iter()
                .filter(|key| granted.contains(key))
                .cloned()
                .collect(),
            None => conn.selected_metrics.clone(),
        };

        let payloads = adapter.fetch_metrics(&selected, start, end).await?;
        let metrics_count = payloads.len();
        let samples_count = payloads.iter().map(|p| p.samples.len()).sum();

        // Delivery is best-effort on both paths; the fetch already succeeded.
        if let Some(vitals) = &self.vitals {
            if let Err(err) = vitals.persist(&payloads).await {
                warn!(provider = %provider, error = %err, "vitals persistence failed, continuing");
            }
        }
        if let Some(backend) = &self.backend {
            let payload = SyncPayload {
                provider,
                selected_metrics: selected,
                range: SyncRange {
                    start_date: start,
                    end_date: end,
                },
                device: self.device.clone(),
                metrics: payloads,
            };
            backend.submit(&payload).await;
        }

        let mut updated = conn.clone();
        updated.last_sync_at = Some(end);
        self.store.save_provider_connection(&updated).await?;

        info!(provider = %provider, metrics_count, samples_count, "sync complete");
        Ok(SyncReport {
            success: true,
            provider,
            synced_at: end,
            metrics_count,
            samples_count,
            error: None,
        })
    }

    /// When this provider last completed a sync.
    pub async fn get_last_sync_timestamp(&self, provider: Provider) -> Option<DateTime<Utc>> {
        self.store
            .provider_connection(provider)
            .await
            .and_then(|conn| conn.last_sync_at)
    }

    /// All providers with a durable connected record.
    pub async fn get_all_connected_providers(&self) -> Vec<ProviderConnection> {
        self.store.all_connected().await
    }

    /// Disconnect one provider: remote revocation where the platform has
    /// one, then unconditional local deletion.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownProvider`] when no adapter is registered
    /// for `provider`.
    pub async fn disconnect_provider(&self, provider: Provider) -> Result<()> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| SyncError::UnknownProvider(provider.as_str().to_owned()))?;
        adapter.disconnect().await?;
        info!(provider = %provider, "disconnected");
        Ok(())
    }
}

/// Window start for one sync: thirty days back on the first sync, and
/// afterwards the last sync time but never later than the trailing
/// re-fetch window, so late-arriving provider data is picked up.
fn sync_window_start(conn: &ProviderConnection, end: DateTime<Utc>) -> DateTime<Utc> {
    let trailing = end - Duration::hours(limits::MIN_RESYNC_WINDOW_HOURS);
    match conn.last_sync_at {
        Some(last) => last.min(trailing),
        None => end - Duration::days(limits::INITIAL_SYNC_WINDOW_DAYS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(last_sync: Option<DateTime<Utc>>) -> ProviderConnection {
        ProviderConnection {
            provider: Provider::Fitbit,
            connected: true,
            connected_at: Some(Utc::now()),
            last_sync_at: last_sync,
            selected_metrics: vec!["steps".to_owned()],
            granted_metrics: None,
            denied_metrics: None,
        }
    }

    #[test]
    fn first_sync_reaches_thirty_days_back() {
        let end = Utc::now();
        let start = sync_window_start(&conn(None), end);
        assert_eq!((end - start).num_days(), 30);
    }

    #[test]
    fn recent_sync_still_refetches_the_trailing_day() {
        let end = Utc::now();
        let start = sync_window_start(&conn(Some(end - Duration::hours(2))), end);
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn stale_sync_resumes_from_last_sync_time() {
        let end = Utc::now();
        let last = end - Duration::days(5);
        let start = sync_window_start(&conn(Some(last)), end);
        assert_eq!(start, last);
    }
}
