// ABOUTME: Google Fit adapter: bearer authorization-code, one aggregate endpoint for everything
// ABOUTME: Daily-bucketed aggregate requests per data type, parsed into normalized samples
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog;
use crate::config::ProviderConfig;
use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{
    epoch_ms_to_datetime, MetricSample, NormalizedMetricPayload, Provider, ProviderConnection,
};
use crate::oauth::{AuthCodeClient, ClientAuthStyle};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{
    self, connection_from_grant, ensure_fresh_token, run_limited, HandshakeState,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DAY_MILLIS: i64 = 86_400_000;

/// Sleep stage codes that count as asleep (light, deep, REM and the
/// generic "sleep" stage; awake and out-of-bed do not).
const ASLEEP_STAGES: [i64; 4] = [2, 4, 5, 6];

pub struct GoogleFitProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl GoogleFitProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::GoogleFit,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.revoke_url.clone(),
            self.config.redirect_uri.clone(),
            ClientAuthStyle::FormBody,
        )
    }

    /// POST one aggregate request for `data_type` bucketed by calendar day.
    async fn aggregate(
        &self,
        access_token: &str,
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Value>> {
        let url = format!("{}/users/me/dataset:aggregate", self.config.api_base_url);
        let body = json!({
            "aggregateBy": [{"dataTypeName": data_type}],
            "bucketByTime": {"durationMillis": DAY_MILLIS},
            "startTimeMillis": start.timestamp_millis(),
            "endTimeMillis": end.timestamp_millis(),
        });
        let response = shared_client()
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(provider = "google_fit", %data_type, %status, "aggregate rejected, skipping");
            return Ok(None);
        }
        match response.json().await {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(provider = "google_fit", %data_type, error = %err, "unparseable aggregate, skipping");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl HealthProvider for GoogleFitProvider {
    fn provider(&self) -> Provider {
        Provider::GoogleFit
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Google Fit client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Google Fit client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::google_fit_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }

        let state = Uuid::new_v4().to_string();
        HandshakeState {
            state: state.clone(),
            verifier: None,
            secret: None,
        }
        .stash(&self.store, Provider::GoogleFit)
        .await?;

        // offline + consent forces a refresh token on every authorization,
        // not just the first.
        let url = self.auth_client().authorize_url(
            &scopes,
            &state,
            " ",
            &[("access_type", "offline"), ("prompt", "consent")],
        );
        info!(provider = "google_fit", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::GoogleFit,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::GoogleFit).await?;
        utils::verify_callback(
            Provider::GoogleFit,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self.auth_client().exchange_code(code, None).await?;
        let tokens = response.into_token_data(None);
        self.store
            .save_token_data(Provider::GoogleFit, &tokens)
            .await?;

        let conn =
            connection_from_grant(Provider::GoogleFit, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "google_fit", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::GoogleFit).await?.is_none() {
            return Ok(None);
        }
        let tokens =
            ensure_fresh_token(&self.store, Provider::GoogleFit, &self.auth_client()).await?;
        Ok(Some(tokens.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::GoogleFit, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens =
            ensure_fresh_token(&self.store, Provider::GoogleFit, &self.auth_client()).await?;

        let mut futures = Vec::new();
        for metric in resolved {
            let Some(mapping) = metric.mapping_for(Provider::GoogleFit) else {
                continue;
            };
            let access_token = tokens.access_token.clone();
            futures.push(async move {
                let body = self
                    .aggregate(&access_token, mapping.wire_id, start, end)
                    .await?;
                let samples = body
                    .map(|b| parse_aggregate(metric.key, mapping.wire_id, &b, metric.unit))
                    .unwrap_or_default();
                Ok::<_, SyncError>((metric, samples))
            });
        }

        let mut payloads = Vec::new();
        for result in run_limited(futures).await {
            let (metric, samples) = result?;
            if !samples.is_empty() {
                payloads.push(utils::payload(Provider::GoogleFit, metric, samples));
            }
        }
        Ok(payloads)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Ok(Some(tokens)) = self.store.token_data(Provider::GoogleFit).await {
            self.auth_client().revoke(&tokens.access_token).await;
        }
        self.store.purge_provider(Provider::GoogleFit).await;
        Ok(())
    }
}

fn point_value(point: &Value, index: usize) -> Option<f64> {
    let value = point.get("value")?.get(index)?;
    value
        .get("fpVal")
        .and_then(Value::as_f64)
        .or_else(|| value.get("intVal").and_then(Value::as_f64))
}

fn point_duration_millis(point: &Value) -> Option<i64> {
    let start = point
        .get("startTimeNanos")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())?;
    let end = point
        .get("endTimeNanos")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())?;
    Some((end - start) / 1_000_000)
}

/// One sample per daily bucket. Cumulative data types sum their points;
/// instantaneous ones average them; sleep segments sum asleep-stage
/// durations; blood pressure picks the field the metric key asks for.
fn parse_aggregate(
    metric_key: &str,
    wire_id: &str,
    body: &Value,
    unit: Option<&str>,
) -> Vec<MetricSample> {
    let Some(buckets) = body.get("bucket").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut samples = Vec::new();
    for bucket in buckets {
        let Some(at) = bucket
            .get("startTimeMillis")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .map(epoch_ms_to_datetime)
        else {
            continue;
        };
        let points: Vec<&Value> = bucket
            .get("dataset")
            .and_then(Value::as_array)
            .map(|datasets| {
                datasets
                    .iter()
                    .filter_map(|d| d.get("point").and_then(Value::as_array))
                    .flatten()
                    .collect()
            })
            .unwrap_or_default();
        if points.is_empty() {
            continue;
        }

        let value = match wire_id {
            "com.google.sleep.segment" => {
                let minutes: f64 = points
                    .iter()
                    .filter(|p| {
                        point_value(p, 0)
                            .is_some_and(|stage| ASLEEP_STAGES.contains(&(stage as i64)))
                    })
                    .filter_map(|p| point_duration_millis(p))
                    .map(|ms| ms as f64 / 60_000.0)
                    .sum();
                (minutes > 0.0).then_some(minutes)
            }
            "com.google.blood_pressure" => {
                let index = usize::from(metric_key == "blood_pressure_diastolic");
                let values: Vec<f64> =
                    points.iter().filter_map(|p| point_value(p, index)).collect();
                (!values.is_empty())
                    .then(|| values.iter().sum::<f64>() / values.len() as f64)
            }
            "com.google.step_count.delta"
            | "com.google.distance.delta"
            | "com.google.calories.expended"
            | "com.google.active_minutes" => {
                let total: f64 = points.iter().filter_map(|p| point_value(p, 0)).sum();
                (total > 0.0).then_some(total)
            }
            // Hydration aggregates in liters; the catalog unit is mL.
            "com.google.hydration" => {
                let liters: f64 = points.iter().filter_map(|p| point_value(p, 0)).sum();
                (liters > 0.0).then_some(liters * 1000.0)
            }
            _ => {
                let values: Vec<f64> = points.iter().filter_map(|p| point_value(p, 0)).collect();
                (!values.is_empty())
                    .then(|| values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        if let Some(value) = value {
            samples.push(MetricSample::number(value, unit, at));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(points: Value) -> Value {
        json!({
            "bucket": [{
                "startTimeMillis": "1741564800000",
                "dataset": [{"point": points}]
            }]
        })
    }

    #[test]
    fn cumulative_type_sums_points_per_bucket() {
        let body = bucket(json!([
            {"value": [{"intVal": 4200}]},
            {"value": [{"intVal": 5800}]}
        ]));
        let samples =
            parse_aggregate("steps", "com.google.step_count.delta", &body, Some("count"));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value.as_f64(), Some(10000.0));
    }

    #[test]
    fn instantaneous_type_averages_points() {
        let body = bucket(json!([
            {"value": [{"fpVal": 80.0}]},
            {"value": [{"fpVal": 82.0}]}
        ]));
        let samples = parse_aggregate("weight", "com.google.weight", &body, Some("kg"));
        assert_eq!(samples[0].value.as_f64(), Some(81.0));
    }

    #[test]
    fn blood_pressure_field_selection_follows_metric_key() {
        let body = bucket(json!([{"value": [{"fpVal": 121.0}, {"fpVal": 79.0}]}]));
        let sys = parse_aggregate(
            "blood_pressure_systolic",
            "com.google.blood_pressure",
            &body,
            Some("mmHg"),
        );
        let dia = parse_aggregate(
            "blood_pressure_diastolic",
            "com.google.blood_pressure",
            &body,
            Some("mmHg"),
        );
        assert_eq!(sys[0].value.as_f64(), Some(121.0));
        assert_eq!(dia[0].value.as_f64(), Some(79.0));
    }

    #[test]
    fn sleep_segments_count_only_asleep_stages() {
        let hour_nanos = 3_600_000_000_000_i64;
        let body = bucket(json!([
            {
                "value": [{"intVal": 4}],
                "startTimeNanos": "0",
                "endTimeNanos": hour_nanos.to_string()
            },
            {
                "value": [{"intVal": 1}],
                "startTimeNanos": hour_nanos.to_string(),
                "endTimeNanos": (2 * hour_nanos).to_string()
            }
        ]));
        let samples =
            parse_aggregate("sleep_duration", "com.google.sleep.segment", &body, Some("min"));
        assert_eq!(samples[0].value.as_f64(), Some(60.0));
    }

    #[test]
    fn hydration_converts_liters_to_milliliters() {
        let body = bucket(json!([{"value": [{"fpVal": 1.5}]}]));
        let samples = parse_aggregate("water_intake", "com.google.hydration", &body, Some("mL"));
        assert_eq!(samples[0].value.as_f64(), Some(1500.0));
    }

    #[test]
    fn empty_buckets_produce_no_samples() {
        let body = json!({"bucket": [{"startTimeMillis": "0", "dataset": [{"point": []}]}]});
        assert!(parse_aggregate("steps", "com.google.step_count.delta", &body, None).is_empty());
    }
}
