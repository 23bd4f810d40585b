// ABOUTME: Integration tests for the device-store adapters over a fake bridge
// ABOUTME: Availability probing, permission partitioning and record normalization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

#![cfg(feature = "provider-health-connect")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use healthsync::errors::{Result, SyncError};
use healthsync::models::{Provider, SampleValue};
use healthsync::providers::health_connect::HealthConnectProvider;
use healthsync::providers::{
    default_config, CallbackParams, DeviceHealthBridge, DeviceRecord, HealthProvider,
};
use healthsync::store::CredentialStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fake bridge granting a configured subset of permissions and answering
/// record reads from a canned list.
struct FakeBridge {
    present: bool,
    granted: Vec<String>,
    records: Vec<DeviceRecord>,
    failing_record_type: Option<String>,
    revoked: AtomicBool,
}

impl FakeBridge {
    fn granting(granted: &[&str], records: Vec<DeviceRecord>) -> Self {
        Self {
            present: true,
            granted: granted.iter().map(|&p| p.to_owned()).collect(),
            records,
            failing_record_type: None,
            revoked: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DeviceHealthBridge for FakeBridge {
    async fn is_store_present(&self) -> bool {
        self.present
    }

    async fn request_read_permissions(&self, permissions: &[String]) -> Result<Vec<String>> {
        Ok(permissions
            .iter()
            .filter(|p| self.granted.contains(p))
            .cloned()
            .collect())
    }

    async fn read_records(
        &self,
        record_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DeviceRecord>> {
        if self.failing_record_type.as_deref() == Some(record_type) {
            return Err(SyncError::Parse(format!("{record_type} read failed")));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.record_type == record_type && r.start >= start && r.start < end)
            .cloned()
            .collect())
    }

    async fn revoke_permissions(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

fn step_record(at: DateTime<Utc>, value: f64) -> DeviceRecord {
    DeviceRecord {
        record_type: "StepsRecord".into(),
        value,
        text_value: None,
        unit: Some("count".into()),
        start: at,
        end: Some(at + Duration::hours(1)),
        origin: Some("com.example.pedometer".into()),
    }
}

fn adapter(bridge: Option<Arc<dyn DeviceHealthBridge>>) -> (HealthConnectProvider, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::in_memory());
    let provider = HealthConnectProvider::new(
        default_config(Provider::HealthConnect),
        Arc::clone(&store),
        bridge,
    );
    (provider, store)
}

#[tokio::test]
async fn missing_bridge_reports_unavailable_not_an_error() {
    let (provider, _store) = adapter(None);
    let availability = provider.is_available().await;
    assert!(!availability.available);
    assert!(availability.reason.unwrap().contains("bridge"));
}

#[tokio::test]
async fn authorization_partitions_granted_and_denied_metrics() {
    let bridge = Arc::new(FakeBridge::granting(
        &["android.permission.health.READ_STEPS"],
        Vec::new(),
    ));
    let (provider, store) = adapter(Some(bridge));

    let request = provider
        .begin_authorization(&["steps".into(), "heart_rate".into()])
        .await
        .unwrap();
    // Device stores have no user-agent leg.
    assert!(request.url.is_empty());

    let conn = provider
        .complete_authorization(
            CallbackParams::default(),
            &["steps".into(), "heart_rate".into()],
        )
        .await
        .unwrap();

    assert!(conn.connected);
    assert_eq!(conn.granted_metrics.as_deref(), Some(&["steps".to_owned()][..]));
    assert_eq!(
        conn.denied_metrics.as_deref(),
        Some(&["heart_rate".to_owned()][..])
    );
    assert!(store
        .provider_connection(Provider::HealthConnect)
        .await
        .is_some());
}

#[tokio::test]
async fn fetch_normalizes_records_into_catalog_samples() {
    let now = Utc::now();
    let bridge = Arc::new(FakeBridge::granting(
        &["android.permission.health.READ_STEPS"],
        vec![
            step_record(now - Duration::hours(3), 1200.0),
            step_record(now - Duration::hours(2), 800.0),
            // Outside the requested range, must be dropped.
            step_record(now - Duration::days(2), 9999.0),
        ],
    ));
    let (provider, _store) = adapter(Some(bridge));

    let payloads = provider
        .fetch_metrics(&["steps".into()], now - Duration::days(1), now)
        .await
        .unwrap();

    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.provider, Provider::HealthConnect);
    assert_eq!(payload.metric_key, "steps");
    assert_eq!(payload.samples.len(), 2);
    assert_eq!(payload.samples[0].value, SampleValue::Number(1200.0));
    assert_eq!(payload.samples[0].unit.as_deref(), Some("count"));
    assert_eq!(
        payload.samples[0].source.as_deref(),
        Some("com.example.pedometer")
    );
    assert!(payload.samples[0].end_date.is_some());
}

#[tokio::test]
async fn disconnect_revokes_permissions_and_purges_state() {
    let bridge = Arc::new(FakeBridge::granting(
        &["android.permission.health.READ_STEPS"],
        Vec::new(),
    ));
    let (provider, store) = adapter(Some(bridge.clone()));
    provider
        .complete_authorization(CallbackParams::default(), &["steps".into()])
        .await
        .unwrap();

    provider.disconnect().await.unwrap();

    assert!(bridge.revoked.load(Ordering::SeqCst));
    assert!(store
        .provider_connection(Provider::HealthConnect)
        .await
        .is_none());
}

#[tokio::test]
async fn combined_blood_pressure_record_splits_into_both_keys() {
    let now = Utc::now();
    let reading = DeviceRecord {
        record_type: "BloodPressureRecord".into(),
        value: 0.0,
        text_value: Some("120/80".into()),
        unit: Some("mmHg".into()),
        start: now - Duration::hours(1),
        end: None,
        origin: None,
    };
    let malformed = DeviceRecord {
        text_value: Some("not-a-reading".into()),
        start: now - Duration::hours(2),
        ..reading.clone()
    };
    let bridge = Arc::new(FakeBridge::granting(
        &["android.permission.health.READ_BLOOD_PRESSURE"],
        vec![reading, malformed],
    ));
    let (provider, _store) = adapter(Some(bridge));

    let payloads = provider
        .fetch_metrics(
            &[
                "blood_pressure_systolic".into(),
                "blood_pressure_diastolic".into(),
            ],
            now - Duration::days(1),
            now,
        )
        .await
        .unwrap();

    assert_eq!(payloads.len(), 2);
    let systolic = payloads
        .iter()
        .find(|p| p.metric_key == "blood_pressure_systolic")
        .unwrap();
    let diastolic = payloads
        .iter()
        .find(|p| p.metric_key == "blood_pressure_diastolic")
        .unwrap();
    assert_eq!(systolic.samples.len(), 1);
    assert_eq!(systolic.samples[0].value, SampleValue::Number(120.0));
    assert_eq!(diastolic.samples.len(), 1);
    assert_eq!(diastolic.samples[0].value, SampleValue::Number(80.0));
}

#[tokio::test]
async fn one_failing_record_type_keeps_the_other_payloads() {
    let now = Utc::now();
    let mut bridge = FakeBridge::granting(
        &[
            "android.permission.health.READ_STEPS",
            "android.permission.health.READ_HEART_RATE",
        ],
        vec![step_record(now - Duration::hours(3), 1500.0)],
    );
    bridge.failing_record_type = Some("HeartRateRecord".into());
    let (provider, _store) = adapter(Some(Arc::new(bridge)));

    let payloads = provider
        .fetch_metrics(
            &["steps".into(), "heart_rate".into()],
            now - Duration::days(1),
            now,
        )
        .await
        .unwrap();

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].metric_key, "steps");
    assert_eq!(payloads[0].samples[0].value, SampleValue::Number(1500.0));
}
