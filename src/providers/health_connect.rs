// ABOUTME: Health Connect adapter: on-device record store behind the injected bridge
// ABOUTME: Runtime permission strings instead of OAuth; no tokens, no refresh
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
use crate::providers::device::DeviceHealthBridge;
use crate::providers::utils;
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct HealthConnectProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
    bridge: Option<Arc<dyn DeviceHealthBridge>>,
}

impl HealthConnectProvider {
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
            SyncError::Configuration("no Health Connect bridge injected on this host".into())
        })
    }
}

#[async_trait]
impl HealthProvider for HealthConnectProvider {
    fn provider(&self) -> Provider {
        Provider::HealthConnect
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        match &self.bridge {
            None => Availability::unavailable("no Health Connect bridge injected on this host"),
            Some(bridge) => {
                if bridge.is_store_present().await {
                    Availability::available()
                } else {
                    Availability::unavailable("Health Connect is not installed on this device")
                }
            }
        }
    }

    /// No user-agent redirect exists for an on-device store; the returned
    /// request carries an empty URL and hosts proceed straight to
    /// [`Self::complete_authorization`], which raises the platform
    /// permission prompt.
    async fn begin_authorization(
        &self,
        _selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        self.bridge()?;
        Ok(AuthorizationRequest {
            provider: Provider::HealthConnect,
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
        let permissions: Vec<String> = catalog::health_connect_permissions_for_metrics(
            selected_metrics,
        )
        .into_iter()
        .collect();
        let granted_permissions: BTreeSet<String> = bridge
            .request_read_permissions(&permissions)
            .await?
            .into_iter()
            .collect();

        let mut granted = Vec::new();
        let mut denied = Vec::new();
        for key in selected_metrics {
            match catalog::mapping_for(key, Provider::HealthConnect) {
                Some(mapping) => match mapping.scope {
                    Some(required) if !granted_permissions.contains(required) => {
                        denied.push(key.clone());
                    }
                    _ => granted.push(key.clone()),
                },
                None => {}
            }
        }

        let mut conn =
            ProviderConnection::connected_now(Provider::HealthConnect, selected_metrics.to_vec());
        conn.granted_metrics = Some(granted);
        conn.denied_metrics = Some(denied);
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "health_connect", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        // Device stores have no token material.
        Ok(None)
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let bridge = self.bridge()?;
        let resolved = catalog::resolve_available(Provider::HealthConnect, selected);

        let mut payloads = Vec::new();
        for metric in resolved {
            let Some(mapping) = metric.mapping_for(Provider::HealthConnect) else {
                continue;
            };
            let records = match bridge.read_records(mapping.wire_id, start, end).await {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(
                        provider = "health_connect",
                        record_type = mapping.wire_id,
                        error = %err,
                        "record read failed, skipping"
                    );
                    continue;
                }
            };
            let samples: Vec<MetricSample> = records
                .into_iter()
                .filter_map(|record| {
                    // Blood pressure arrives as one combined "sys/dia" record
                    // serving both catalog keys; a failed split drops it.
                    let value = if mapping.wire_id == "BloodPressureRecord" {
                        let (systolic, diastolic) =
                            utils::split_blood_pressure(record.text_value.as_deref()?)?;
                        if metric.key == "blood_pressure_systolic" {
                            systolic
                        } else {
                            diastolic
                        }
                    } else {
                        record.value
                    };
                    let mut sample = MetricSample::number(
                        value,
                        record.unit.as_deref().or(metric.unit),
                        record.start,
                    );
                    if let Some(record_end) = record.end {
                        sample = sample.with_end(record_end);
                    }
                    if let Some(origin) = record.origin.as_deref() {
                        sample = sample.with_source(origin);
                    }
                    Some(sample)
                })
                .collect();
            if !samples.is_empty() {
                payloads.push(utils::payload(Provider::HealthConnect, metric, samples));
            }
        }
        Ok(payloads)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(bridge) = &self.bridge {
            bridge.revoke_permissions().await;
        }
        self.store.purge_provider(Provider::HealthConnect).await;
        Ok(())
    }
}
