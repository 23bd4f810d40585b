// ABOUTME: Apple Health adapter: HealthKit sample types behind the injected bridge
// ABOUTME: Category samples (sleep, mindfulness) become durations; quantity samples pass through
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog;
use crate::config::ProviderConfig;
use crate::errors::{Result, SyncError};
use crate::models::{MetricSample, NormalizedMetricPayload, Provider, ProviderConnection};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::device::{DeviceHealthBridge, DeviceRecord};
use crate::providers::utils;
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AppleHealthProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
    bridge: Option<Arc<dyn DeviceHealthBridge>>,
}

impl AppleHealthProvider {
    #[must_use]
    pub fn new(
        config: ProviderConfig,
        store: Arc<CredentialStore>,
        bridge: Option<Arc<dyn DeviceHealthBridge>>,
    ) -> Self {
        Self {
            config,
            store,
            bridge,
        }
    }

    fn bridge(&self) -> Result<&Arc<dyn DeviceHealthBridge>> {
        self.bridge.as_ref().ok_or_else(|| {
            SyncError::Configuration("no HealthKit bridge injected on this host".into())
        })
    }
}

#[async_trait]
impl HealthProvider for AppleHealthProvider {
    fn provider(&self) -> Provider {
        Provider::AppleHealth
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        match &self.bridge {
            None => Availability::unavailable("no HealthKit bridge injected on this host"),
            Some(bridge) => {
                if bridge.is_store_present().await {
                    Availability::available()
                } else {
                    Availability::unavailable("HealthKit is not available on this device")
                }
            }
        }
    }

    /// HealthKit authorization is an in-process prompt, not a redirect; the
    /// returned request carries an empty URL and hosts proceed straight to
    /// [`Self::complete_authorization`].
    async fn begin_authorization(
        &self,
        _selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        self.bridge()?;
        Ok(AuthorizationRequest {
            provider: Provider::AppleHealth,
            url: String::new(),
            state: Uuid::new_v4().to_string(),
        })
    }

    async fn complete_authorization(
        &self,
        _params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let bridge = self.bridge()?;
        // HealthKit is addressed by sample type identifier; the wire ids
        // double as the permission strings.
        let sample_types: Vec<String> = selected_metrics
            .iter()
            .filter_map(|key| catalog::mapping_for(key, Provider::AppleHealth))
            .map(|mapping| mapping.wire_id.to_owned())
            .collect();
        let granted_types: BTreeSet<String> = bridge
            .request_read_permissions(&sample_types)
            .await?
            .into_iter()
            .collect();

        let mut granted = Vec::new();
        let mut denied = Vec::new();
        for key in selected_metrics {
            if let Some(mapping) = catalog::mapping_for(key, Provider::AppleHealth) {
                if granted_types.contains(mapping.wire_id) {
                    granted.push(key.clone());
                } else {
                    denied.push(key.clone());
                }
            }
        }

        let mut conn =
            ProviderConnection::connected_now(Provider::AppleHealth, selected_metrics.to_vec());
        conn.granted_metrics = Some(granted);
        conn.denied_metrics = Some(denied);
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "apple_health", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let bridge = self.bridge()?;
        let resolved = catalog::resolve_available(Provider::AppleHealth, selected);

        let mut payloads = Vec::new();
        for metric in resolved {
            let Some(mapping) = metric.mapping_for(Provider::AppleHealth) else {
                continue;
            };
            let records = match bridge.read_records(mapping.wire_id, start, end).await {
                Ok(records) => records,
                Err(err) => {
                    warn!(
                        provider = "apple_health",
                        sample_type = mapping.wire_id,
                        error = %err,
                        "sample read failed, skipping"
                    );
                    continue;
                }
            };
            let samples: Vec<MetricSample> = if mapping.wire_id.starts_with("HKCategoryType") {
                records
                    .iter()
                    .filter_map(|r| category_duration_sample(r, metric.unit))
                    .collect()
            } else {
                records
                    .into_iter()
                    .map(|record| {
                        let mut sample = MetricSample::number(
                            record.value,
                            record.unit.as_deref().or(metric.unit),
                            record.start,
                        );
                        if let Some(record_end) = record.end {
                            sample = sample.with_end(record_end);
                        }
                        if let Some(origin) = record.origin.as_deref() {
                            sample = sample.with_source(origin);
                        }
                        sample
                    })
                    .collect()
            };
            if !samples.is_empty() {
                payloads.push(utils::payload(Provider::AppleHealth, metric, samples));
            }
        }
        Ok(payloads)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(bridge) = &self.bridge {
            bridge.revoke_permissions().await;
        }
        self.store.purge_provider(Provider::AppleHealth).await;
        Ok(())
    }
}

/// Category samples carry a stage label, not a quantity; the observation is
/// the interval itself. Awake/in-bed sleep stages contribute nothing.
fn category_duration_sample(record: &DeviceRecord, unit: Option<&str>) -> Option<MetricSample> {
    if let Some(label) = record.text_value.as_deref() {
        let lowered = label.to_lowercase();
        if lowered.contains("awake") || lowered == "inbed" || lowered == "in_bed" {
            return None;
        }
    }
    let end = record.end?;
    let minutes = (end - record.start).num_seconds() as f64 / 60.0;
    if minutes <= 0.0 {
        return None;
    }
    let mut sample = MetricSample::number(minutes, unit, record.start).with_end(end);
    if let Some(origin) = record.origin.as_deref() {
        sample = sample.with_source(origin);
    }
    Some(sample)
}
