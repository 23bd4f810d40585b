// ABOUTME: Oura adapter: bearer authorization-code, v2 user-collection endpoints
// ABOUTME: One range request per collection; items carry a day or an RFC3339 timestamp
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
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct OuraProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl OuraProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Oura,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.revoke_url.clone(),
            self.config.redirect_uri.clone(),
            ClientAuthStyle::FormBody,
        )
    }
}

#[async_trait]
impl HealthProvider for OuraProvider {
    fn provider(&self) -> Provider {
        Provider::Oura
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Oura client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Oura client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::oura_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }

        let state = Uuid::new_v4().to_string();
        HandshakeState {
            state: state.clone(),
            verifier: None,
            secret: None,
        }
        .stash(&self.store, Provider::Oura)
        .await?;

        let url = self.auth_client().authorize_url(&scopes, &state, " ", &[]);
        info!(provider = "oura", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Oura,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Oura).await?;
        utils::verify_callback(
            Provider::Oura,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self.auth_client().exchange_code(code, None).await?;
        let tokens = response.into_token_data(None);
        self.store.save_token_data(Provider::Oura, &tokens).await?;

        let conn =
            connection_from_grant(Provider::Oura, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "oura", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::Oura).await?.is_none() {
            return Ok(None);
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Oura, &self.auth_client()).await?;
        Ok(Some(tokens.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Oura, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Oura, &self.auth_client()).await?;

        let mut by_endpoint: BTreeMap<&'static str, Vec<&'static HealthMetric>> = BTreeMap::new();
        for metric in &resolved {
            if let Some(mapping) = metric.mapping_for(Provider::Oura) {
                if let Some(template) = mapping.endpoint_template {
                    by_endpoint.entry(template).or_default().push(*metric);
                }
            }
        }

        let mut futures = Vec::new();
        for (endpoint, metrics) in by_endpoint {
            let url = format!("{}{}", self.config.api_base_url, endpoint);
            // The heart-rate collection takes datetime bounds; the daily
            // collections take dates.
            let query = if endpoint.ends_with("/heartrate") {
                vec![
                    ("start_datetime".to_owned(), start.to_rfc3339()),
                    ("end_datetime".to_owned(), end.to_rfc3339()),
                ]
            } else {
                vec![
                    (
                        "start_date".to_owned(),
                        start.date_naive().format("%Y-%m-%d").to_string(),
                    ),
                    (
                        "end_date".to_owned(),
                        end.date_naive().format("%Y-%m-%d").to_string(),
                    ),
                ]
            };
            let access_token = tokens.access_token.clone();
            futures.push(async move {
                let body = bearer_get_json(Provider::Oura, &access_token, &url, &query).await?;
                let mut out: Vec<(&'static str, Vec<MetricSample>)> = Vec::new();
                if let Some(body) = body {
                    for metric in metrics {
                        if let Some(mapping) = metric.mapping_for(Provider::Oura) {
                            let samples = parse_collection(mapping.wire_id, &body, metric.unit);
                            if !samples.is_empty() {
                                out.push((metric.key, samples));
                            }
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
                    .map(|samples| utils::payload(Provider::Oura, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Ok(Some(tokens)) = self.store.token_data(Provider::Oura).await {
            self.auth_client().revoke(&tokens.access_token).await;
        }
        self.store.purge_provider(Provider::Oura).await;
        Ok(())
    }
}

fn item_timestamp(item: &Value) -> Option<DateTime<Utc>> {
    if let Some(day) = item.get("day").and_then(Value::as_str) {
        if let Ok(date) = day.parse::<NaiveDate>() {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    item.get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Pull one field (dotted paths allowed) out of every item under `data`.
/// Second-valued sleep durations and activity times become minutes.
fn parse_collection(wire_id: &str, body: &Value, unit: Option<&str>) -> Vec<MetricSample> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut samples = Vec::new();
    for item in items {
        let Some(at) = item_timestamp(item) else {
            continue;
        };
        let raw = match wire_id {
            // Activity time buckets are split by intensity.
            "active_minutes" => {
                let high = item.get("high_activity_time").and_then(Value::as_f64);
                let medium = item.get("medium_activity_time").and_then(Value::as_f64);
                match (high, medium) {
                    (None, None) => None,
                    (h, m) => Some((h.unwrap_or(0.0) + m.unwrap_or(0.0)) / 60.0),
                }
            }
            dotted if dotted.contains('.') => {
                let pointer = format!("/{}", dotted.replace('.', "/"));
                item.pointer(&pointer).and_then(Value::as_f64)
            }
            plain => item.get(plain).and_then(Value::as_f64),
        };
        let Some(raw) = raw else { continue };

        let value = if wire_id.ends_with("_duration") {
            raw / 60.0
        } else {
            raw
        };
        samples.push(MetricSample::number(value, unit, at));
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn daily_activity_fields_parse_by_day() {
        let body = json!({"data": [
            {"day": "2025-03-10", "steps": 8400, "active_calories": 420},
            {"day": "2025-03-11", "steps": 10100}
        ]});
        let steps = parse_collection("steps", &body, Some("count"));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].value.as_f64(), Some(8400.0));
    }

    #[test]
    fn sleep_durations_convert_to_minutes() {
        let body = json!({"data": [{"day": "2025-03-10", "total_sleep_duration": 25200}]});
        let samples = parse_collection("total_sleep_duration", &body, Some("min"));
        assert_eq!(samples[0].value.as_f64(), Some(420.0));
    }

    #[test]
    fn activity_time_buckets_sum_into_minutes() {
        let body = json!({"data": [{
            "day": "2025-03-10",
            "high_activity_time": 1800,
            "medium_activity_time": 2400
        }]});
        let samples = parse_collection("active_minutes", &body, Some("min"));
        assert_eq!(samples[0].value.as_f64(), Some(70.0));
    }

    #[test]
    fn dotted_wire_id_follows_nested_fields() {
        let body = json!({"data": [{
            "day": "2025-03-10",
            "spo2_percentage": {"average": 97.2}
        }]});
        let samples = parse_collection("spo2_percentage.average", &body, Some("%"));
        assert_eq!(samples[0].value.as_f64(), Some(97.2));
    }

    #[test]
    fn heart_rate_points_use_rfc3339_timestamps() {
        let body = json!({"data": [
            {"bpm": 61, "timestamp": "2025-03-10T04:12:00+00:00"},
            {"bpm": 64, "timestamp": "2025-03-10T04:17:00+00:00"}
        ]});
        let samples = parse_collection("bpm", &body, Some("bpm"));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].value.as_f64(), Some(64.0));
    }

    #[test]
    fn missing_data_array_yields_nothing() {
        assert!(parse_collection("steps", &json!({"detail": "forbidden"}), None).is_empty());
    }
}
