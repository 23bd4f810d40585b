// ABOUTME: Withings adapter: bearer authorization-code with the status/body response envelope
// ABOUTME: Measure-type codes with exponent scaling, activity and sleep-summary endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::config::ProviderConfig;
use crate::constants::limits;
use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{
    epoch_ms_to_datetime, MetricSample, NormalizedMetricPayload, Provider, ProviderConnection,
    TokenData,
};
use crate::oauth::{AuthCodeClient, ClientAuthStyle, TokenEndpointResponse};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{
    self, bearer_get_json, connection_from_grant, run_limited, HandshakeState,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct WithingsProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl WithingsProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    /// Only used for authorize-URL construction; the token endpoint speaks
    /// the action/envelope dialect handled below.
    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Withings,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            None,
            self.config.redirect_uri.clone(),
            ClientAuthStyle::FormBody,
        )
    }

    /// POST `action=requesttoken` and unwrap the `{status, body}` envelope.
    /// A zero status is success; anything else carries an error string.
    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenEndpointResponse> {
        let mut form: Vec<(&str, &str)> = vec![
            ("action", "requesttoken"),
            ("client_id", self.config.client_id.as_deref().unwrap_or("")),
            (
                "client_secret",
                self.config.client_secret.as_deref().unwrap_or(""),
            ),
        ];
        form.extend_from_slice(params);

        let response = shared_client()
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::TokenExchange(format!(
                "withings token endpoint returned {status}: {body}"
            )));
        }

        let envelope: Value = serde_json::from_str(&body)?;
        if envelope.get("status").and_then(Value::as_i64) != Some(0) {
            let error = envelope
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            if error.contains("redirect") {
                return Err(SyncError::RedirectUriMismatch {
                    provider: Provider::Withings,
                    detail: error.to_owned(),
                });
            }
            return Err(SyncError::TokenExchange(format!(
                "withings rejected the token request: {error}"
            )));
        }
        let inner = envelope
            .get("body")
            .cloned()
            .ok_or_else(|| SyncError::Parse("withings envelope without body".into()))?;
        Ok(serde_json::from_value(inner)?)
    }

    async fn ensure_fresh_token(&self) -> Result<TokenData> {
        let guard = self.store.refresh_guard(Provider::Withings);
        let _lock = guard.lock().await;

        let tokens = self
            .store
            .token_data(Provider::Withings)
            .await?
            .ok_or(SyncError::NotConnected(Provider::Withings))?;
        if !tokens.expires_within(Duration::minutes(limits::TOKEN_EXPIRY_BUFFER_MINUTES)) {
            return Ok(tokens);
        }

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            SyncError::TokenRefresh("withings token expired with no refresh token".into())
        })?;
        let refreshed = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
            ])
            .await
            .map_err(|e| SyncError::TokenRefresh(e.to_string()))?
            .into_token_data(Some(refresh_token));
        self.store
            .save_token_data(Provider::Withings, &refreshed)
            .await?;
        info!(provider = "withings", "access token refreshed");
        Ok(refreshed)
    }
}

#[async_trait]
impl HealthProvider for WithingsProvider {
    fn provider(&self) -> Provider {
        Provider::Withings
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Withings client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Withings client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::withings_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }

        let state = Uuid::new_v4().to_string();
        HandshakeState {
            state: state.clone(),
            verifier: None,
            secret: None,
        }
        .stash(&self.store, Provider::Withings)
        .await?;

        // Withings separates scopes with commas, not spaces.
        let url = self.auth_client().authorize_url(&scopes, &state, ",", &[]);
        info!(provider = "withings", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Withings,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Withings).await?;
        utils::verify_callback(
            Provider::Withings,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;
        let tokens = response.into_token_data(None);
        self.store
            .save_token_data(Provider::Withings, &tokens)
            .await?;

        let conn =
            connection_from_grant(Provider::Withings, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "withings", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::Withings).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.ensure_fresh_token().await?.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Withings, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.ensure_fresh_token().await?;

        let mut by_endpoint: BTreeMap<&'static str, Vec<&'static HealthMetric>> = BTreeMap::new();
        for metric in &resolved {
            if let Some(mapping) = metric.mapping_for(Provider::Withings) {
                if let Some(template) = mapping.endpoint_template {
                    by_endpoint.entry(template).or_default().push(*metric);
                }
            }
        }

        let mut futures = Vec::new();
        for (endpoint, metrics) in by_endpoint {
            let url = format!("{}{}", self.config.api_base_url, endpoint);
            let query = if endpoint.starts_with("/measure") {
                // getmeas takes epoch-second bounds and measure-type codes.
                let types: Vec<&str> = metrics
                    .iter()
                    .filter_map(|m| m.mapping_for(Provider::Withings))
                    .map(|m| m.wire_id)
                    .collect();
                vec![
                    ("meastypes".to_owned(), types.join(",")),
                    ("category".to_owned(), "1".to_owned()),
                    ("startdate".to_owned(), start.timestamp().to_string()),
                    ("enddate".to_owned(), end.timestamp().to_string()),
                ]
            } else {
                vec![
                    (
                        "startdateymd".to_owned(),
                        start.date_naive().format("%Y-%m-%d").to_string(),
                    ),
                    (
                        "enddateymd".to_owned(),
                        end.date_naive().format("%Y-%m-%d").to_string(),
                    ),
                ]
            };
            let access_token = tokens.access_token.clone();
            futures.push(async move {
                let body =
                    bearer_get_json(Provider::Withings, &access_token, &url, &query).await?;
                let mut out: Vec<(&'static str, Vec<MetricSample>)> = Vec::new();
                if let Some(body) = body {
                    for metric in metrics {
                        if let Some(mapping) = metric.mapping_for(Provider::Withings) {
                            let samples = parse_envelope(mapping.wire_id, &body, metric.unit);
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
                    .map(|samples| utils::payload(Provider::Withings, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        // No public revocation action; deletion is local.
        self.store.purge_provider(Provider::Withings).await;
        Ok(())
    }
}

fn date_at_midnight(date: &str) -> Option<DateTime<Utc>> {
    date.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Parse one `{status, body}` envelope. Numeric wire ids address measure
/// groups (value times ten to the `unit` exponent); named wire ids address
/// activity rows or sleep summary `data` fields.
fn parse_envelope(wire_id: &str, body: &Value, unit: Option<&str>) -> Vec<MetricSample> {
    if body.get("status").and_then(Value::as_i64) != Some(0) {
        return Vec::new();
    }
    let Some(inner) = body.get("body") else {
        return Vec::new();
    };

    if wire_id.chars().all(|c| c.is_ascii_digit()) {
        return parse_measure_groups(wire_id, inner, unit);
    }

    if let Some(activities) = inner.get("activities").and_then(Value::as_array) {
        return activities
            .iter()
            .filter_map(|row| {
                let at = row
                    .get("date")
                    .and_then(Value::as_str)
                    .and_then(date_at_midnight)?;
                let value = row.get(wire_id).and_then(Value::as_f64)?;
                Some(MetricSample::number(value, unit, at))
            })
            .collect();
    }

    if let Some(series) = inner.get("series").and_then(Value::as_array) {
        return series
            .iter()
            .filter_map(|night| {
                let at = night
                    .get("date")
                    .and_then(Value::as_str)
                    .and_then(date_at_midnight)?;
                let data = night.get("data")?;
                let seconds = match data.get(wire_id).and_then(Value::as_f64) {
                    Some(v) => v,
                    // Older summaries lack the total; the stage sum stands in.
                    None if wire_id == "totalsleepduration" => {
                        let stages =
                            ["lightsleepduration", "deepsleepduration", "remsleepduration"];
                        let total: f64 = stages
                            .iter()
                            .filter_map(|s| data.get(*s).and_then(Value::as_f64))
                            .sum();
                        if total > 0.0 {
                            total
                        } else {
                            return None;
                        }
                    }
                    None => return None,
                };
                Some(MetricSample::number(seconds / 60.0, unit, at))
            })
            .collect();
    }

    Vec::new()
}

fn parse_measure_groups(type_code: &str, inner: &Value, unit: Option<&str>) -> Vec<MetricSample> {
    let Ok(wanted) = type_code.parse::<i64>() else {
        return Vec::new();
    };
    inner
        .get("measuregrps")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|grp| {
                    let at = grp
                        .get("date")
                        .and_then(Value::as_i64)
                        .map(|secs| epoch_ms_to_datetime(secs * 1000))?;
                    let measures = grp.get("measures").and_then(Value::as_array)?;
                    let measure = measures
                        .iter()
                        .find(|m| m.get("type").and_then(Value::as_i64) == Some(wanted))?;
                    let value = measure.get("value").and_then(Value::as_f64)?;
                    let exponent = measure.get("unit").and_then(Value::as_i64).unwrap_or(0);
                    Some(MetricSample::number(
                        value * 10f64.powi(exponent as i32),
                        unit,
                        at,
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn measure_groups_apply_the_unit_exponent() {
        let body = json!({"status": 0, "body": {"measuregrps": [{
            "date": 1741600000,
            "measures": [
                {"type": 1, "value": 80250, "unit": -3},
                {"type": 9, "value": 79, "unit": 0}
            ]
        }]}});
        let weight = parse_envelope("1", &body, Some("kg"));
        assert_eq!(weight[0].value.as_f64(), Some(80.25));
        let diastolic = parse_envelope("9", &body, Some("mmHg"));
        assert_eq!(diastolic[0].value.as_f64(), Some(79.0));
    }

    #[test]
    fn activity_rows_parse_named_fields() {
        let body = json!({"status": 0, "body": {"activities": [
            {"date": "2025-03-10", "steps": 7600, "distance": 5120.0},
            {"date": "2025-03-11", "steps": 9400}
        ]}});
        let steps = parse_envelope("steps", &body, Some("count"));
        assert_eq!(steps.len(), 2);
        let distance = parse_envelope("distance", &body, Some("m"));
        assert_eq!(distance.len(), 1);
    }

    #[test]
    fn sleep_summary_converts_seconds_and_falls_back_to_stage_sum() {
        let body = json!({"status": 0, "body": {"series": [{
            "date": "2025-03-10",
            "data": {
                "lightsleepduration": 12000,
                "deepsleepduration": 5400,
                "remsleepduration": 6000
            }
        }]}});
        let total = parse_envelope("totalsleepduration", &body, Some("min"));
        assert_eq!(total[0].value.as_f64(), Some(390.0));
        let deep = parse_envelope("deepsleepduration", &body, Some("min"));
        assert_eq!(deep[0].value.as_f64(), Some(90.0));
    }

    #[test]
    fn nonzero_status_yields_nothing() {
        let body = json!({"status": 401, "error": "invalid_token"});
        assert!(parse_envelope("steps", &body, None).is_empty());
    }
}
