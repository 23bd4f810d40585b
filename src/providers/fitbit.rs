// ABOUTME: Fitbit adapter: authorization-code with PKCE, daily date-bucketed endpoints
// ABOUTME: Parses per-day summary documents into normalized samples
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::config::ProviderConfig;
use crate::errors::{Result, SyncError};
use crate::models::{MetricSample, NormalizedMetricPayload, Provider, ProviderConnection};
use crate::oauth::{pkce, AuthCodeClient, ClientAuthStyle};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{
    self, bearer_get_json, connection_from_grant, days_in_range, ensure_fresh_token,
    run_limited, HandshakeState,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct FitbitProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl FitbitProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Fitbit,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.revoke_url.clone(),
            self.config.redirect_uri.clone(),
            ClientAuthStyle::BasicHeader,
        )
    }

    fn day_url(&self, template: &str, day: NaiveDate) -> String {
        format!(
            "{}{}",
            self.config.api_base_url,
            template.replace("{date}", &day.format("%Y-%m-%d").to_string())
        )
    }
}

#[async_trait]
impl HealthProvider for FitbitProvider {
    fn provider(&self) -> Provider {
        Provider::Fitbit
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Fitbit client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Fitbit client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::fitbit_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }

        let state = Uuid::new_v4().to_string();
        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge(&verifier);
        HandshakeState {
            state: state.clone(),
            verifier: Some(verifier),
            secret: None,
        }
        .stash(&self.store, Provider::Fitbit)
        .await?;

        let url = self.auth_client().authorize_url(
            &scopes,
            &state,
            " ",
            &[
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        );
        info!(provider = "fitbit", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Fitbit,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Fitbit).await?;
        utils::verify_callback(
            Provider::Fitbit,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self
            .auth_client()
            .exchange_code(code, handshake.verifier.as_deref())
            .await?;
        let tokens = response.into_token_data(None);
        self.store.save_token_data(Provider::Fitbit, &tokens).await?;

        let conn =
            connection_from_grant(Provider::Fitbit, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "fitbit", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::Fitbit).await?.is_none() {
            return Ok(None);
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Fitbit, &self.auth_client()).await?;
        Ok(Some(tokens.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Fitbit, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Fitbit, &self.auth_client()).await?;

        // One request per (endpoint, day) serves every metric sharing that
        // daily document.
        let mut by_endpoint: BTreeMap<&'static str, Vec<&'static HealthMetric>> = BTreeMap::new();
        for metric in &resolved {
            if let Some(mapping) = metric.mapping_for(Provider::Fitbit) {
                if let Some(template) = mapping.endpoint_template {
                    by_endpoint.entry(template).or_default().push(*metric);
                }
            }
        }

        let days = days_in_range(start, end);
        let mut futures = Vec::new();
        for (template, metrics) in &by_endpoint {
            for day in &days {
                let url = self.day_url(template, *day);
                let access_token = tokens.access_token.clone();
                let metrics = metrics.clone();
                let day = *day;
                futures.push(async move {
                    let body =
                        bearer_get_json(Provider::Fitbit, &access_token, &url, &[]).await?;
                    let mut out: Vec<(&'static str, Vec<MetricSample>)> = Vec::new();
                    if let Some(body) = body {
                        for metric in metrics {
                            if let Some(mapping) = metric.mapping_for(Provider::Fitbit) {
                                let samples =
                                    parse_day(mapping.wire_id, &body, day, metric.unit);
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
                    .map(|samples| utils::payload(Provider::Fitbit, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Ok(Some(tokens)) = self.store.token_data(Provider::Fitbit).await {
            self.auth_client().revoke(&tokens.access_token).await;
        }
        self.store.purge_provider(Provider::Fitbit).await;
        Ok(())
    }
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn num_at(body: &Value, pointer: &str) -> Option<f64> {
    body.pointer(pointer).and_then(Value::as_f64)
}

/// Extract the samples for one wire id from a daily document.
///
/// Unknown shapes yield nothing; a malformed field costs that metric's
/// sample for that day, never the fetch.
fn parse_day(wire_id: &str, body: &Value, day: NaiveDate, unit: Option<&str>) -> Vec<MetricSample> {
    let at = day_start(day);
    let one = |v: f64| vec![MetricSample::number(v, unit, at)];

    match wire_id {
        "summary.steps" => num_at(body, "/summary/steps").map(one).unwrap_or_default(),
        "summary.caloriesOut" => num_at(body, "/summary/caloriesOut")
            .map(one)
            .unwrap_or_default(),
        "summary.activityCalories" => num_at(body, "/summary/activityCalories")
            .map(one)
            .unwrap_or_default(),
        "summary.floors" => num_at(body, "/summary/floors").map(one).unwrap_or_default(),
        "summary.water" => num_at(body, "/summary/water").map(one).unwrap_or_default(),
        // Distances arrive as a per-activity array in km; "total" is the day.
        "summary.distances" => body
            .pointer("/summary/distances")
            .and_then(Value::as_array)
            .and_then(|entries| {
                entries.iter().find(|e| {
                    e.get("activity").and_then(Value::as_str) == Some("total")
                })
            })
            .and_then(|e| e.get("distance").and_then(Value::as_f64))
            .map(|km| one(km * 1000.0))
            .unwrap_or_default(),
        "summary.activeMinutes" => {
            let fairly = num_at(body, "/summary/fairlyActiveMinutes").unwrap_or(0.0);
            let very = num_at(body, "/summary/veryActiveMinutes").unwrap_or(0.0);
            if fairly + very > 0.0 {
                one(fairly + very)
            } else {
                Vec::new()
            }
        }
        // Daily heart documents carry zone summaries, not a plain average;
        // a minutes-weighted midpoint over the zones approximates one.
        "activities-heart" => body
            .pointer("/activities-heart/0/value/heartRateZones")
            .and_then(Value::as_array)
            .and_then(|zones| {
                let mut weighted = 0.0;
                let mut minutes = 0.0;
                for zone in zones {
                    let min = zone.get("min").and_then(Value::as_f64)?;
                    let max = zone.get("max").and_then(Value::as_f64)?;
                    let mins = zone.get("minutes").and_then(Value::as_f64).unwrap_or(0.0);
                    weighted += (min + max) / 2.0 * mins;
                    minutes += mins;
                }
                (minutes > 0.0).then(|| weighted / minutes)
            })
            .map(one)
            .unwrap_or_default(),
        "activities-heart.restingHeartRate" => {
            num_at(body, "/activities-heart/0/value/restingHeartRate")
                .map(one)
                .unwrap_or_default()
        }
        "hrv.dailyRmssd" => num_at(body, "/hrv/0/value/dailyRmssd")
            .map(one)
            .unwrap_or_default(),
        "spo2.avg" => num_at(body, "/value/avg").map(one).unwrap_or_default(),
        "br.breathingRate" => num_at(body, "/br/0/value/breathingRate")
            .map(one)
            .unwrap_or_default(),
        "tempSkin.nightlyRelative" => num_at(body, "/tempSkin/0/value/nightlyRelative")
            .map(one)
            .unwrap_or_default(),
        // Body logs can carry several entries per day; keep them all.
        "weight" => body
            .pointer("/weight")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("weight").and_then(Value::as_f64))
                    .map(|v| MetricSample::number(v, unit, at))
                    .collect()
            })
            .unwrap_or_default(),
        "fat" => body
            .pointer("/fat")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("fat").and_then(Value::as_f64))
                    .map(|v| MetricSample::number(v, unit, at))
                    .collect()
            })
            .unwrap_or_default(),
        "sleep.minutesAsleep" => body
            .pointer("/sleep")
            .and_then(Value::as_array)
            .map(|sessions| {
                sessions
                    .iter()
                    .filter_map(|s| s.get("minutesAsleep").and_then(Value::as_f64))
                    .sum::<f64>()
            })
            .filter(|total| *total > 0.0)
            .map(one)
            .unwrap_or_default(),
        "sleep.levels.deep" => num_at(body, "/sleep/0/levels/summary/deep/minutes")
            .map(one)
            .unwrap_or_default(),
        "sleep.levels.rem" => num_at(body, "/sleep/0/levels/summary/rem/minutes")
            .map(one)
            .unwrap_or_default(),
        "sleep.levels.light" => num_at(body, "/sleep/0/levels/summary/light/minutes")
            .map(one)
            .unwrap_or_default(),
        // Cardio fitness score is a string range like "42-46"; the lower
        // bound is the conservative reading.
        "cardioScore.vo2Max" => body
            .pointer("/cardioScore/0/value/vo2Max")
            .and_then(Value::as_str)
            .and_then(|range| range.split('-').next())
            .and_then(|low| low.trim().parse::<f64>().ok())
            .map(one)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn activity_summary_parses_steps_and_total_distance() {
        let body = json!({
            "summary": {
                "steps": 10432,
                "caloriesOut": 2541,
                "distances": [
                    {"activity": "tracker", "distance": 7.9},
                    {"activity": "total", "distance": 8.12}
                ],
                "fairlyActiveMinutes": 22,
                "veryActiveMinutes": 38
            }
        });
        assert_eq!(
            parse_day("summary.steps", &body, day(), Some("count"))[0]
                .value
                .as_f64(),
            Some(10432.0)
        );
        let distance = parse_day("summary.distances", &body, day(), Some("m"))[0]
            .value
            .as_f64()
            .unwrap();
        assert!((distance - 8120.0).abs() < 1e-6);
        assert_eq!(
            parse_day("summary.activeMinutes", &body, day(), Some("min"))[0]
                .value
                .as_f64(),
            Some(60.0)
        );
    }

    #[test]
    fn heart_document_yields_resting_and_zone_weighted_average() {
        let body = json!({
            "activities-heart": [{
                "value": {
                    "restingHeartRate": 58,
                    "heartRateZones": [
                        {"min": 30, "max": 100, "minutes": 1200},
                        {"min": 100, "max": 140, "minutes": 60}
                    ]
                }
            }]
        });
        assert_eq!(
            parse_day("activities-heart.restingHeartRate", &body, day(), Some("bpm"))[0]
                .value
                .as_f64(),
            Some(58.0)
        );
        // Midpoints 65 and 120 weighted by 1200 and 60 minutes.
        let avg = parse_day("activities-heart", &body, day(), Some("bpm"))[0]
            .value
            .as_f64()
            .unwrap();
        assert!((avg - 85_200.0 / 1_260.0).abs() < 1e-9);
    }

    #[test]
    fn sleep_document_sums_sessions_and_reads_stage_minutes() {
        let body = json!({
            "sleep": [
                {
                    "minutesAsleep": 380,
                    "levels": {"summary": {
                        "deep": {"minutes": 90},
                        "rem": {"minutes": 85},
                        "light": {"minutes": 205}
                    }}
                },
                {"minutesAsleep": 45}
            ]
        });
        assert_eq!(
            parse_day("sleep.minutesAsleep", &body, day(), Some("min"))[0]
                .value
                .as_f64(),
            Some(425.0)
        );
        assert_eq!(
            parse_day("sleep.levels.deep", &body, day(), Some("min"))[0]
                .value
                .as_f64(),
            Some(90.0)
        );
    }

    #[test]
    fn cardio_score_range_takes_lower_bound() {
        let body = json!({"cardioScore": [{"value": {"vo2Max": "42-46"}}]});
        assert_eq!(
            parse_day("cardioScore.vo2Max", &body, day(), None)[0]
                .value
                .as_f64(),
            Some(42.0)
        );
    }

    #[test]
    fn weight_log_keeps_every_entry() {
        let body = json!({"weight": [{"weight": 80.3}, {"weight": 80.1}]});
        let samples = parse_day("weight", &body, day(), Some("kg"));
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn missing_fields_yield_no_samples() {
        let body = json!({"summary": {}});
        assert!(parse_day("summary.steps", &body, day(), None).is_empty());
        assert!(parse_day("sleep.minutesAsleep", &body, day(), None).is_empty());
    }
}
