// ABOUTME: Integration tests for the sync orchestrator using scripted fake adapters
// ABOUTME: Gating, window bookkeeping, retry-once semantics and multi-provider sweeps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use healthsync::config::ProviderConfig;
use healthsync::errors::Result;
use healthsync::models::{
    MetricSample, NormalizedMetricPayload, Provider, ProviderConnection,
};
use healthsync::providers::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider, ProviderRegistry,
};
use healthsync::store::CredentialStore;
use healthsync::sync::{RuntimeStateProbe, SyncOrchestrator};
use healthsync::SyncError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn test_config(provider: Provider) -> ProviderConfig {
    ProviderConfig {
        provider,
        client_id: Some("test-client".into()),
        client_secret: Some("test-secret".into()),
        auth_url: "https://auth.invalid/authorize".into(),
        token_url: "https://auth.invalid/token".into(),
        request_token_url: None,
        revoke_url: None,
        api_base_url: "https://api.invalid".into(),
        redirect_uri: "https://localhost:8443/oauth/callback/test".into(),
        scopes: Vec::new(),
    }
}

/// Fake adapter that fails its first `transient_failures` fetches with a
/// network error and records what it was asked to fetch.
struct ScriptedProvider {
    provider: Provider,
    config: ProviderConfig,
    store: Arc<CredentialStore>,
    fetch_calls: AtomicUsize,
    transient_failures: usize,
    last_selected: Mutex<Vec<String>>,
    samples_per_metric: usize,
}

impl ScriptedProvider {
    fn new(provider: Provider, store: Arc<CredentialStore>, transient_failures: usize) -> Self {
        Self {
            provider,
            config: test_config(provider),
            store,
            fetch_calls: AtomicUsize::new(0),
            transient_failures,
            last_selected: Mutex::new(Vec::new()),
            samples_per_metric: 3,
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProvider for ScriptedProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        Availability::available()
    }

    async fn begin_authorization(
        &self,
        _selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        Ok(AuthorizationRequest {
            provider: self.provider,
            url: "https://auth.invalid/authorize".into(),
            state: "state".into(),
        })
    }

    async fn complete_authorization(
        &self,
        _params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let conn = ProviderConnection::connected_now(self.provider, selected_metrics.to_vec());
        self.store.save_provider_connection(&conn).await?;
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        Ok(Some("scripted-token".into()))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.transient_failures {
            return Err(SyncError::TransientNetwork("connection reset".into()));
        }
        *self.last_selected.lock().unwrap() = selected.to_vec();
        Ok(selected
            .iter()
            .map(|key| NormalizedMetricPayload {
                provider: self.provider,
                metric_key: key.clone(),
                display_name: key.clone(),
                unit: None,
                samples: (0..self.samples_per_metric)
                    .map(|i| MetricSample::number(f64::from(i as u8), None, start))
                    .collect(),
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        self.store.purge_provider(self.provider).await;
        Ok(())
    }
}

struct InactiveProbe;

impl RuntimeStateProbe for InactiveProbe {
    fn is_active(&self) -> bool {
        false
    }
}

struct Harness {
    store: Arc<CredentialStore>,
    adapter: Arc<ScriptedProvider>,
    orchestrator: SyncOrchestrator,
}

fn harness(provider: Provider, transient_failures: usize) -> Harness {
    let store = Arc::new(CredentialStore::in_memory());
    let adapter = Arc::new(ScriptedProvider::new(
        provider,
        Arc::clone(&store),
        transient_failures,
    ));
    let registry = Arc::new(
        ProviderRegistry::builder(Arc::clone(&store))
            .with_provider(adapter.clone())
            .build(),
    );
    let orchestrator = SyncOrchestrator::new(registry, Arc::clone(&store));
    Harness {
        store,
        adapter,
        orchestrator,
    }
}

async fn connect(store: &CredentialStore, provider: Provider, metrics: &[&str]) {
    let conn = ProviderConnection::connected_now(
        provider,
        metrics.iter().map(|&m| m.to_owned()).collect(),
    );
    store.save_provider_connection(&conn).await.unwrap();
}

#[tokio::test]
async fn successful_sync_reports_counts_and_bumps_last_sync() {
    let h = harness(Provider::Oura, 0);
    connect(&h.store, Provider::Oura, &["steps", "heart_rate"]).await;

    let before = Utc::now();
    let report = h.orchestrator.sync_health_data(Provider::Oura).await;

    assert!(report.success, "unexpected failure: {:?}", report.error);
    assert_eq!(report.metrics_count, 2);
    assert_eq!(report.samples_count, 6);
    assert_eq!(h.adapter.fetch_count(), 1);

    let last_sync = h
        .orchestrator
        .get_last_sync_timestamp(Provider::Oura)
        .await
        .expect("last sync recorded");
    assert!(last_sync >= before);
}

#[tokio::test]
async fn unconnected_provider_fails_without_touching_the_adapter() {
    let h = harness(Provider::Oura, 0);

    let report = h.orchestrator.sync_health_data(Provider::Oura).await;

    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("not connected"));
    assert_eq!(h.adapter.fetch_count(), 0);
}

#[tokio::test]
async fn backgrounded_host_defers_before_any_io() {
    let h = harness(Provider::Oura, 0);
    connect(&h.store, Provider::Oura, &["steps"]).await;
    let orchestrator = h.orchestrator.with_runtime_probe(Arc::new(InactiveProbe));

    let report = orchestrator.sync_health_data(Provider::Oura).await;

    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("deferred"));
    assert_eq!(h.adapter.fetch_count(), 0);
    // Deferral must not touch the connection record.
    assert!(orchestrator
        .get_last_sync_timestamp(Provider::Oura)
        .await
        .is_none());
}

#[tokio::test]
async fn transient_failure_is_retried_exactly_once() {
    let h = harness(Provider::Whoop, 1);
    connect(&h.store, Provider::Whoop, &["calories_burned"]).await;

    let report = h.orchestrator.sync_health_data(Provider::Whoop).await;

    assert!(report.success);
    assert_eq!(h.adapter.fetch_count(), 2);
}

#[tokio::test]
async fn second_transient_failure_lands_in_the_report() {
    let h = harness(Provider::Whoop, 2);
    connect(&h.store, Provider::Whoop, &["calories_burned"]).await;

    let report = h.orchestrator.sync_health_data(Provider::Whoop).await;

    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("network"));
    // One retry, never more.
    assert_eq!(h.adapter.fetch_count(), 2);
    assert!(h
        .orchestrator
        .get_last_sync_timestamp(Provider::Whoop)
        .await
        .is_none());
}

#[tokio::test]
async fn denied_metrics_are_excluded_from_the_fetch() {
    let h = harness(Provider::Fitbit, 0);
    let mut conn = ProviderConnection::connected_now(
        Provider::Fitbit,
        vec!["steps".into(), "weight".into(), "heart_rate".into()],
    );
    conn.granted_metrics = Some(vec!["steps".into(), "heart_rate".into()]);
    conn.denied_metrics = Some(vec!["weight".into()]);
    h.store.save_provider_connection(&conn).await.unwrap();

    let report = h.orchestrator.sync_health_data(Provider::Fitbit).await;

    assert!(report.success);
    assert_eq!(report.metrics_count, 2);
    assert_eq!(
        *h.adapter.last_selected.lock().unwrap(),
        vec!["steps".to_owned(), "heart_rate".to_owned()]
    );
}

#[tokio::test]
async fn sync_all_produces_one_report_per_connected_provider() {
    let store = Arc::new(CredentialStore::in_memory());
    let healthy = Arc::new(ScriptedProvider::new(
        Provider::Oura,
        Arc::clone(&store),
        0,
    ));
    let dead = Arc::new(ScriptedProvider::new(
        Provider::Whoop,
        Arc::clone(&store),
        usize::MAX,
    ));
    let registry = Arc::new(
        ProviderRegistry::builder(Arc::clone(&store))
            .with_provider(healthy.clone())
            .with_provider(dead.clone())
            .build(),
    );
    let orchestrator = SyncOrchestrator::new(registry, Arc::clone(&store));
    connect(&store, Provider::Oura, &["steps"]).await;
    connect(&store, Provider::Whoop, &["sleep_duration"]).await;

    let reports = orchestrator.sync_all().await;

    assert_eq!(reports.len(), 2);
    let by_provider = |p: Provider| reports.iter().find(|r| r.provider == p).unwrap();
    assert!(by_provider(Provider::Oura).success);
    // One provider failing never stops the sweep.
    assert!(!by_provider(Provider::Whoop).success);
}

#[tokio::test]
async fn disconnect_removes_all_durable_state() {
    let h = harness(Provider::Polar, 0);
    connect(&h.store, Provider::Polar, &["steps"]).await;
    h.store
        .stash_handshake_secret(Provider::Polar, "csrf")
        .await
        .unwrap();

    h.orchestrator
        .disconnect_provider(Provider::Polar)
        .await
        .unwrap();

    assert!(h.store.provider_connection(Provider::Polar).await.is_none());
    assert!(h
        .store
        .token_data(Provider::Polar)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .orchestrator
        .get_all_connected_providers()
        .await
        .is_empty());
}
