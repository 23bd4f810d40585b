// ABOUTME: Garmin adapter: two-legged signed authorization, wellness REST endpoints
// ABOUTME: Every API call is HMAC-SHA1 signed; ranges are chunked to the API's 24h limit
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::config::ProviderConfig;
use crate::constants::endpoints;
use crate::errors::{Result, SyncError};
use crate::models::{
    epoch_ms_to_datetime, MetricSample, NormalizedMetricPayload, Provider, ProviderConnection,
};
use crate::oauth::{OAuth1Client, TemporaryCredentials};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{self, run_limited, HandshakeState};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The wellness API rejects range queries wider than 24 hours.
const MAX_RANGE_SECS: i64 = 86_400;

pub struct GarminProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl GarminProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn oauth_client(&self) -> OAuth1Client {
        OAuth1Client::new(
            Provider::Garmin,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config
                .request_token_url
                .clone()
                .unwrap_or_else(|| endpoints::GARMIN_REQUEST_TOKEN_URL.to_owned()),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.redirect_uri.clone(),
        )
    }

    /// Signed GET for one endpoint and one sub-24h window; non-2xx is logged
    /// and absorbed so one dead endpoint costs its metrics, not the fetch.
    async fn fetch_window(
        &self,
        client: &OAuth1Client,
        endpoint: &str,
        token: &str,
        token_secret: &str,
        start_secs: i64,
        end_secs: i64,
    ) -> Result<Option<Value>> {
        let url = format!("{}{}", self.config.api_base_url, endpoint);
        let query = vec![
            ("uploadStartTimeInSeconds".to_owned(), start_secs.to_string()),
            ("uploadEndTimeInSeconds".to_owned(), end_secs.to_string()),
        ];
        let response = client.signed_get(&url, &query, token, token_secret).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(provider = "garmin", %endpoint, %status, "endpoint rejected request, skipping");
            return Ok(None);
        }
        match response.json().await {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(provider = "garmin", %endpoint, error = %err, "unparseable response, skipping");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl HealthProvider for GarminProvider {
    fn provider(&self) -> Provider {
        Provider::Garmin
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Garmin consumer credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        _selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Garmin consumer credentials are not configured".into(),
            ));
        }

        // The grant is all-or-nothing; there is no scope narrowing to do.
        let client = self.oauth_client();
        let temporary = client.request_temporary_credentials().await?;
        HandshakeState {
            state: temporary.token.clone(),
            verifier: None,
            secret: Some(temporary.secret),
        }
        .stash(&self.store, Provider::Garmin)
        .await?;

        let url = client.approval_url(&temporary.token);
        info!(provider = "garmin", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Garmin,
            url,
            state: temporary.token,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Garmin).await?;
        if let Some(error) = params.error.as_deref() {
            return Err(SyncError::AuthorizationFailed(format!(
                "garmin reported '{error}' on callback"
            )));
        }
        if params.oauth_token.as_deref() != Some(handshake.state.as_str()) {
            return Err(SyncError::AuthorizationFailed(
                "temporary token mismatch on garmin callback".into(),
            ));
        }
        let verifier = params.oauth_verifier.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no oauth_verifier".into())
        })?;
        let secret = handshake.secret.ok_or_else(|| {
            SyncError::AuthorizationFailed("stashed handshake lacked the token secret".into())
        })?;

        let temporary = TemporaryCredentials {
            token: handshake.state,
            secret,
        };
        let tokens = self
            .oauth_client()
            .exchange_access_token(&temporary, verifier)
            .await?;
        self.store.save_token_data(Provider::Garmin, &tokens).await?;

        // Garmin tokens cover the whole wellness surface, so everything
        // selected and mapped is granted.
        let conn = utils::connection_from_grant(Provider::Garmin, selected_metrics, None);
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "garmin", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        // Token credentials from the two-legged flow have no expiry and no
        // refresh operation; the stored token stays usable until revoked.
        Ok(self
            .store
            .token_data(Provider::Garmin)
            .await?
            .map(|t| t.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Garmin, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self
            .store
            .token_data(Provider::Garmin)
            .await?
            .ok_or(SyncError::NotConnected(Provider::Garmin))?;
        let token_secret = tokens.token_secret.clone().ok_or_else(|| {
            SyncError::Storage("garmin token record lacks its token secret".into())
        })?;

        let mut by_endpoint: BTreeMap<&'static str, Vec<&'static HealthMetric>> = BTreeMap::new();
        for metric in &resolved {
            if let Some(mapping) = metric.mapping_for(Provider::Garmin) {
                if let Some(template) = mapping.endpoint_template {
                    by_endpoint.entry(template).or_default().push(*metric);
                }
            }
        }

        let client = self.oauth_client();
        let windows = chunk_range(start.timestamp(), end.timestamp());
        let mut futures = Vec::new();
        for (endpoint, metrics) in &by_endpoint {
            for (window_start, window_end) in &windows {
                let access_token = tokens.access_token.clone();
                let token_secret = token_secret.clone();
                let metrics = metrics.clone();
                let client = &client;
                let (window_start, window_end) = (*window_start, *window_end);
                futures.push(async move {
                    let body = self
                        .fetch_window(
                            client,
                            endpoint,
                            &access_token,
                            &token_secret,
                            window_start,
                            window_end,
                        )
                        .await?;
                    let mut out: Vec<(&'static str, Vec<MetricSample>)> = Vec::new();
                    if let Some(body) = body {
                        for metric in metrics {
                            if let Some(mapping) = metric.mapping_for(Provider::Garmin) {
                                let samples = parse_items(mapping.wire_id, &body, metric.unit);
                                if !samples.is_empty() {
                                    out.push((metric.key, samples));
                                }
                            }
                        }
                    }
                    Ok::<_, SyncError>(out)
                });
            }
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
                    .map(|samples| utils::payload(Provider::Garmin, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        // No revocation endpoint in the two-legged flow; deletion is local.
        self.store.purge_provider(Provider::Garmin).await;
        Ok(())
    }
}

/// Split `[start, end]` epoch seconds into windows the API accepts.
fn chunk_range(start: i64, end: i64) -> Vec<(i64, i64)> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let window_end = (cursor + MAX_RANGE_SECS).min(end);
        windows.push((cursor, window_end));
        cursor = window_end;
    }
    windows
}

fn item_timestamp(item: &Value) -> Option<DateTime<Utc>> {
    if let Some(date) = item.get("calendarDate").and_then(Value::as_str) {
        if let Ok(day) = date.parse::<NaiveDate>() {
            return day
                .and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    item.get("startTimeInSeconds")
        .or_else(|| item.get("measurementTimeInSeconds"))
        .and_then(Value::as_f64)
        .map(|secs| epoch_ms_to_datetime((secs * 1000.0) as i64))
}

/// Normalize one wellness field out of every summary item in a response
/// array. Seconds-valued durations become minutes and grams become
/// kilograms so samples land in catalog units.
fn parse_items(wire_id: &str, body: &Value, unit: Option<&str>) -> Vec<MetricSample> {
    let Some(items) = body.as_array() else {
        return Vec::new();
    };

    let mut samples = Vec::new();
    for item in items {
        let Some(at) = item_timestamp(item) else {
            continue;
        };
        let raw = match wire_id {
            // Sleep scores nest under an object on newer payloads.
            "overallSleepScore" => item
                .get("overallSleepScore")
                .and_then(|v| {
                    if v.is_object() {
                        v.get("value").and_then(Value::as_f64)
                    } else {
                        v.as_f64()
                    }
                }),
            other => item.get(other).and_then(Value::as_f64),
        };
        let Some(raw) = raw else { continue };

        let value = match wire_id {
            "activeTimeInSeconds"
            | "durationInSeconds"
            | "deepSleepDurationInSeconds"
            | "remSleepInSeconds"
            | "lightSleepDurationInSeconds" => raw / 60.0,
            "weightInGrams" => raw / 1000.0,
            _ => raw,
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
    fn range_chunking_respects_the_24h_limit() {
        let windows = chunk_range(0, 200_000);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0], (0, 86_400));
        assert_eq!(windows[2], (172_800, 200_000));
        for (s, e) in windows {
            assert!(e - s <= MAX_RANGE_SECS);
        }
    }

    #[test]
    fn dailies_fields_parse_with_calendar_date() {
        let body = json!([
            {"calendarDate": "2025-03-10", "steps": 9200, "activeTimeInSeconds": 3600},
            {"calendarDate": "2025-03-11", "steps": 11020}
        ]);
        let steps = parse_items("steps", &body, Some("count"));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].value.as_f64(), Some(11020.0));

        let active = parse_items("activeTimeInSeconds", &body, Some("min"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].value.as_f64(), Some(60.0));
    }

    #[test]
    fn sleep_durations_convert_seconds_to_minutes() {
        let body = json!([{
            "calendarDate": "2025-03-10",
            "durationInSeconds": 27000,
            "deepSleepDurationInSeconds": 5400
        }]);
        assert_eq!(
            parse_items("durationInSeconds", &body, Some("min"))[0]
                .value
                .as_f64(),
            Some(450.0)
        );
        assert_eq!(
            parse_items("deepSleepDurationInSeconds", &body, Some("min"))[0]
                .value
                .as_f64(),
            Some(90.0)
        );
    }

    #[test]
    fn body_comp_weight_converts_grams_to_kilograms() {
        let body = json!([{"measurementTimeInSeconds": 1741600000, "weightInGrams": 80250}]);
        let samples = parse_items("weightInGrams", &body, Some("kg"));
        assert_eq!(samples[0].value.as_f64(), Some(80.25));
    }

    #[test]
    fn sleep_score_accepts_both_shapes() {
        let nested = json!([{"calendarDate": "2025-03-10", "overallSleepScore": {"value": 82}}]);
        let flat = json!([{"calendarDate": "2025-03-10", "overallSleepScore": 82}]);
        assert_eq!(
            parse_items("overallSleepScore", &nested, None)[0].value.as_f64(),
            Some(82.0)
        );
        assert_eq!(
            parse_items("overallSleepScore", &flat, None)[0].value.as_f64(),
            Some(82.0)
        );
    }

    #[test]
    fn non_array_body_yields_nothing() {
        assert!(parse_items("steps", &json!({"error": "x"}), None).is_empty());
    }
}
