// ABOUTME: WHOOP adapter: bearer authorization-code, paginated developer-API collections
// ABOUTME: Dotted score paths with kilojoule and millisecond normalization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::config::ProviderConfig;
use crate::errors::{Result, SyncError};
use crate::models::{MetricSample, NormalizedMetricPayload, Provider, ProviderConnection};
use crate::oauth::{AuthCodeClient, ClientAuthStyle};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{
    self, bearer_get_json, connection_from_grant, ensure_fresh_token, run_limited,
    HandshakeState,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Pagination guard; a month of cycles fits comfortably within this.
const MAX_PAGES: usize = 10;

const KCAL_PER_KILOJOULE: f64 = 1.0 / 4.184;

pub struct WhoopProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl WhoopProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Whoop,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.revoke_url.clone(),
            self.config.redirect_uri.clone(),
            ClientAuthStyle::FormBody,
        )
    }

    /// Collect every record of one collection across pages.
    async fn fetch_records(
        &self,
        access_token: &str,
        endpoint: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.config.api_base_url, endpoint);
        let mut records = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("start".to_owned(), start.to_rfc3339()),
                ("end".to_owned(), end.to_rfc3339()),
                ("limit".to_owned(), "25".to_owned()),
            ];
            if let Some(token) = &next_token {
                query.push(("nextToken".to_owned(), token.clone()));
            }
            let Some(body) = bearer_get_json(Provider::Whoop, access_token, &url, &query).await?
            else {
                break;
            };
            if let Some(page) = body.get("records").and_then(Value::as_array) {
                records.extend(page.iter().cloned());
            }
            next_token = body
                .get("next_token")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(ToOwned::to_owned);
            if next_token.is_none() {
                break;
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl HealthProvider for WhoopProvider {
    fn provider(&self) -> Provider {
        Provider::Whoop
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("WHOOP client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "WHOOP client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::whoop_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }
        // Refresh tokens only arrive when offline access is requested.
        scopes.insert("offline".to_owned());

        let state = Uuid::new_v4().to_string();
        HandshakeState {
            state: state.clone(),
            verifier: None,
            secret: None,
        }
        .stash(&self.store, Provider::Whoop)
        .await?;

        let url = self.auth_client().authorize_url(&scopes, &state, " ", &[]);
        info!(provider = "whoop", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Whoop,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Whoop).await?;
        utils::verify_callback(
            Provider::Whoop,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self.auth_client().exchange_code(code, None).await?;
        let tokens = response.into_token_data(None);
        self.store.save_token_data(Provider::Whoop, &tokens).await?;

        let conn =
            connection_from_grant(Provider::Whoop, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "whoop", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::Whoop).await?.is_none() {
            return Ok(None);
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Whoop, &self.auth_client()).await?;
        Ok(Some(tokens.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Whoop, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Whoop, &self.auth_client()).await?;

        let mut by_endpoint: BTreeMap<&'static str, Vec<&'static HealthMetric>> = BTreeMap::new();
        for metric in &resolved {
            if let Some(mapping) = metric.mapping_for(Provider::Whoop) {
                if let Some(template) = mapping.endpoint_template {
                    by_endpoint.entry(template).or_default().push(*metric);
                }
            }
        }

        let mut futures = Vec::new();
        for (endpoint, metrics) in by_endpoint {
            let access_token = tokens.access_token.clone();
            futures.push(async move {
                let records = self
                    .fetch_records(&access_token, endpoint, start, end)
                    .await?;
                let mut out: Vec<(&'static str, Vec<MetricSample>)> = Vec::new();
                for metric in metrics {
                    if let Some(mapping) = metric.mapping_for(Provider::Whoop) {
                        let samples = parse_records(mapping.wire_id, &records, metric.unit);
                        if !samples.is_empty() {
                            out.push((metric.key, samples));
                        }
                    }
                }
                Ok::<_, SyncError>(out)
            });
        }

        let mut collected: BTreeMap<&'static str, Vec<MetricSample>> = BTreeMap::new();
        for result in run_limited(futures).await {
            for (key, samples) in result? {
                collected.entry(key).or_default().extend(samples);
            }
        }

        Ok(resolved
            .into_iter()
            .filter_map(|metric| {
                collected
                    .remove(metric.key)
                    .map(|samples| utils::payload(Provider::Whoop, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Ok(Some(tokens)) = self.store.token_data(Provider::Whoop).await {
            self.auth_client().revoke(&tokens.access_token).await;
        }
        self.store.purge_provider(Provider::Whoop).await;
        Ok(())
    }
}

fn record_timestamp(record: &Value) -> Option<DateTime<Utc>> {
    record
        .get("start")
        .or_else(|| record.get("created_at"))
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Follow a dotted score path through every record. Kilojoules become
/// kilocalories and millisecond stage durations become minutes, so samples
/// land in catalog units.
fn parse_records(wire_id: &str, records: &[Value], unit: Option<&str>) -> Vec<MetricSample> {
    let pointer = format!("/{}", wire_id.replace('.', "/"));
    records
        .iter()
        .filter_map(|record| {
            let at = record_timestamp(record)?;
            let raw = record.pointer(&pointer).and_then(Value::as_f64)?;
            let value = if wire_id == "score.kilojoule" {
                raw * KCAL_PER_KILOJOULE
            } else if wire_id.ends_with("_milli") && wire_id.contains("time") {
                raw / 60_000.0
            } else {
                raw
            };
            Some(MetricSample::number(value, unit, at))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(score: Value) -> Value {
        json!({"start": "2025-03-10T06:00:00+00:00", "score": score})
    }

    #[test]
    fn recovery_fields_follow_dotted_paths() {
        let records = vec![record(json!({"recovery_score": 67, "hrv_rmssd_milli": 54.2}))];
        let samples = parse_records("score.recovery_score", &records, Some("score"));
        assert_eq!(samples[0].value.as_f64(), Some(67.0));
        let hrv = parse_records("score.hrv_rmssd_milli", &records, Some("ms"));
        assert_eq!(hrv[0].value.as_f64(), Some(54.2));
    }

    #[test]
    fn kilojoules_convert_to_kilocalories() {
        let records = vec![record(json!({"kilojoule": 8368.0}))];
        let samples = parse_records("score.kilojoule", &records, Some("kcal"));
        let kcal = samples[0].value.as_f64().unwrap();
        assert!((kcal - 2000.0).abs() < 0.1);
    }

    #[test]
    fn stage_milliseconds_convert_to_minutes() {
        let records = vec![record(json!({
            "stage_summary": {"total_in_bed_time_milli": 27_000_000}
        }))];
        let samples = parse_records(
            "score.stage_summary.total_in_bed_time_milli",
            &records,
            Some("min"),
        );
        assert_eq!(samples[0].value.as_f64(), Some(450.0));
    }

    #[test]
    fn records_without_the_field_are_skipped() {
        let records = vec![record(json!({"recovery_score": 67})), json!({"start": "bad"})];
        let samples = parse_records("score.respiratory_rate", &records, None);
        assert!(samples.is_empty());
    }
}
