// ABOUTME: Polar adapter: bearer authorization-code against AccessLink
// ABOUTME: List endpoints return trailing windows; results are filtered to the requested range
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::config::ProviderConfig;
use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{MetricSample, NormalizedMetricPayload, Provider, ProviderConnection};
use crate::oauth::{AuthCodeClient, ClientAuthStyle};
use crate::providers::core::{
    AuthorizationRequest, Availability, CallbackParams, HealthProvider,
};
use crate::providers::utils::{
    self, bearer_get_json, connection_from_grant, days_in_range, ensure_fresh_token,
    run_limited, HandshakeState,
};
use crate::store::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct PolarProvider {
    config: ProviderConfig,
    store: Arc<CredentialStore>,
}

impl PolarProvider {
    #[must_use]
    pub fn new(config: ProviderConfig, store: Arc<CredentialStore>) -> Self {
        Self { config, store }
    }

    fn auth_client(&self) -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Polar,
            self.config.client_id_or_default(),
            self.config.client_secret_or_default(),
            self.config.auth_url.clone(),
            self.config.token_url.clone(),
            self.config.revoke_url.clone(),
            self.config.redirect_uri.clone(),
            ClientAuthStyle::BasicHeader,
        )
    }

    /// AccessLink requires registering the authorized user before any data
    /// endpoint answers. Conflict (already registered) is fine.
    async fn register_user(&self, access_token: &str, user_id: &str) {
        let url = format!("{}/users", self.config.api_base_url);
        let result = shared_client()
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "member-id": user_id }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() || response.status().as_u16() == 409 => {
                info!(provider = "polar", "user registration confirmed");
            }
            Ok(response) => {
                warn!(provider = "polar", status = %response.status(), "user registration rejected");
            }
            Err(err) => {
                warn!(provider = "polar", error = %err, "user registration failed");
            }
        }
    }
}

#[async_trait]
impl HealthProvider for PolarProvider {
    fn provider(&self) -> Provider {
        Provider::Polar
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn is_available(&self) -> Availability {
        if self.config.is_configured() {
            Availability::available()
        } else {
            Availability::unavailable("Polar client credentials are not configured")
        }
    }

    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest> {
        if !self.config.is_configured() {
            return Err(SyncError::Configuration(
                "Polar client credentials are not configured".into(),
            ));
        }

        let mut scopes = catalog::polar_scopes_for_metrics(selected_metrics);
        if scopes.is_empty() {
            scopes = self.config.scopes.iter().cloned().collect();
        }

        let state = Uuid::new_v4().to_string();
        HandshakeState {
            state: state.clone(),
            verifier: None,
            secret: None,
        }
        .stash(&self.store, Provider::Polar)
        .await?;

        let url = self.auth_client().authorize_url(&scopes, &state, " ", &[]);
        info!(provider = "polar", "authorization started");
        Ok(AuthorizationRequest {
            provider: Provider::Polar,
            url,
            state,
        })
    }

    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection> {
        let handshake = HandshakeState::take(&self.store, Provider::Polar).await?;
        utils::verify_callback(
            Provider::Polar,
            &handshake.state,
            params.state.as_deref(),
            params.error.as_deref(),
        )?;
        let code = params.code.as_deref().ok_or_else(|| {
            SyncError::AuthorizationFailed("callback carried no authorization code".into())
        })?;

        let response = self.auth_client().exchange_code(code, None).await?;
        let tokens = response.into_token_data(None);
        self.store.save_token_data(Provider::Polar, &tokens).await?;

        if let Some(user_id) = tokens.user_id.as_deref() {
            self.register_user(&tokens.access_token, user_id).await;
        }

        let conn =
            connection_from_grant(Provider::Polar, selected_metrics, tokens.scope.as_deref());
        self.store.save_provider_connection(&conn).await?;
        info!(provider = "polar", "connected");
        Ok(conn)
    }

    async fn refresh_token_if_needed(&self) -> Result<Option<String>> {
        if self.store.token_data(Provider::Polar).await?.is_none() {
            return Ok(None);
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Polar, &self.auth_client()).await?;
        Ok(Some(tokens.access_token))
    }

    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>> {
        let resolved = catalog::resolve_available(Provider::Polar, selected);
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = ensure_fresh_token(&self.store, Provider::Polar, &self.auth_client()).await?;
        let user_id = tokens.user_id.clone().unwrap_or_default();

        let calls = fetch_plan(&self.config.api_base_url, &user_id, &resolved, start, end);
        let futures: Vec<_> = calls
            .into_iter()
            .map(|call| {
                let access_token = tokens.access_token.clone();
                async move {
                    let body =
                        bearer_get_json(Provider::Polar, &access_token, &call.url, &[]).await?;
                    let samples = body
                        .map(|b| parse_body(call.wire_id, &b, call.metric.unit, end))
                        .unwrap_or_default();
                    Ok::<_, SyncError>((call.metric, samples))
                }
            })
            .collect();

        let mut collected: std::collections::BTreeMap<&'static str, Vec<MetricSample>> =
            std::collections::BTreeMap::new();
        for result in run_limited(futures).await {
            let (metric, samples) = result?;
            // List endpoints cover a fixed trailing window; trim to the
            // requested range here.
            let in_range: Vec<MetricSample> = samples
                .into_iter()
                .filter(|s| s.start_date >= start && s.start_date <= end)
                .collect();
            if !in_range.is_empty() {
                collected.entry(metric.key).or_default().extend(in_range);
            }
        }

        Ok(resolved
            .into_iter()
            .filter_map(|metric| {
                collected
                    .remove(metric.key)
                    .map(|samples| utils::payload(Provider::Polar, metric, samples))
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Ok(Some(tokens)) = self.store.token_data(Provider::Polar).await {
            self.auth_client().revoke(&tokens.access_token).await;
        }
        self.store.purge_provider(Provider::Polar).await;
        Ok(())
    }
}

/// One AccessLink request: the metric it serves and the resolved URL.
struct FetchCall {
    metric: &'static HealthMetric,
    wire_id: &'static str,
    url: String,
}

/// Expand resolved metrics into concrete requests. Templates carrying
/// `{date}` fan out to one call per day in the range; the rest resolve to a
/// single call with `{userId}` substituted.
fn fetch_plan(
    api_base_url: &str,
    user_id: &str,
    resolved: &[&'static HealthMetric],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<FetchCall> {
    let mut calls = Vec::new();
    for &metric in resolved {
        let Some(mapping) = metric.mapping_for(Provider::Polar) else {
            continue;
        };
        let Some(template) = mapping.endpoint_template else {
            continue;
        };
        if template.contains("{date}") {
            for day in days_in_range(start, end) {
                calls.push(FetchCall {
                    metric,
                    wire_id: mapping.wire_id,
                    url: format!(
                        "{api_base_url}{}",
                        template.replace("{date}", &day.format("%Y-%m-%d").to_string())
                    ),
                });
            }
        } else {
            calls.push(FetchCall {
                metric,
                wire_id: mapping.wire_id,
                url: format!("{api_base_url}{}", template.replace("{userId}", user_id)),
            });
        }
    }
    calls
}

fn date_at_midnight(date: &str) -> Option<DateTime<Utc>> {
    date.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Parse one AccessLink document. Sleep lives under `nights`, recovery under
/// `recoveries`, continuous heart rate under `heart_rates` with in-day sample
/// times, and physical information is a single flat object stamped with
/// `snapshot_at`.
fn parse_body(
    wire_id: &str,
    body: &Value,
    unit: Option<&str>,
    snapshot_at: DateTime<Utc>,
) -> Vec<MetricSample> {
    match wire_id {
        "heart_rate_samples" => {
            let Some(date) = body.get("date").and_then(Value::as_str) else {
                return Vec::new();
            };
            let Some(day) = date.parse::<NaiveDate>().ok() else {
                return Vec::new();
            };
            body.get("heart_rates")
                .and_then(Value::as_array)
                .map(|points| {
                    points
                        .iter()
                        .filter_map(|p| {
                            let bpm = p.get("heart_rate").and_then(Value::as_f64)?;
                            let time = p
                                .get("sample_time")
                                .and_then(Value::as_str)
                                .and_then(|t| t.parse::<NaiveTime>().ok())
                                .unwrap_or_default();
                            Some(MetricSample::number(
                                bpm,
                                unit,
                                Utc.from_utc_datetime(&day.and_time(time)),
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default()
        }
        "sleep_duration" | "deep_sleep" | "rem_sleep" | "light_sleep" => {
            parse_dated_list(body, "nights", unit, |night| match wire_id {
                // Total is not always present; the stage sum stands in.
                "sleep_duration" => {
                    let stages = ["light_sleep", "deep_sleep", "rem_sleep"];
                    let total: f64 = stages
                        .iter()
                        .filter_map(|s| night.get(*s).and_then(Value::as_f64))
                        .sum();
                    (total > 0.0).then_some(total / 60.0)
                }
                stage => night.get(stage).and_then(Value::as_f64).map(|s| s / 60.0),
            })
        }
        "heart_rate_avg" | "heart_rate_variability_avg" | "ans_charge" => {
            parse_dated_list(body, "recoveries", unit, |item| {
                item.get(wire_id).and_then(Value::as_f64)
            })
        }
        // Physical information: flat object, hyphenated field names,
        // height in centimeters.
        "weight" | "height" | "vo2-max" => {
            let raw = body.get(wire_id).and_then(Value::as_f64);
            let value = match (wire_id, raw) {
                ("height", Some(cm)) => Some(cm / 100.0),
                (_, v) => v,
            };
            value
                .map(|v| vec![MetricSample::number(v, unit, snapshot_at)])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn parse_dated_list(
    body: &Value,
    list_key: &str,
    unit: Option<&str>,
    extract: impl Fn(&Value) -> Option<f64>,
) -> Vec<MetricSample> {
    body.get(list_key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let at = item
                        .get("date")
                        .and_then(Value::as_str)
                        .and_then(date_at_midnight)?;
                    let value = extract(item)?;
                    Some(MetricSample::number(value, unit, at))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn fetch_plan_mixes_per_day_and_single_call_endpoints() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0).unwrap();
        let resolved =
            catalog::resolve_available(Provider::Polar, &["heart_rate".into(), "weight".into()]);

        let plan = fetch_plan("https://api.example", "user-1", &resolved, start, end);

        let per_day: Vec<_> = plan
            .iter()
            .filter(|c| c.wire_id == "heart_rate_samples")
            .collect();
        assert_eq!(per_day.len(), 3);
        assert!(per_day[0].url.contains("2025-03-10"));
        assert!(per_day[2].url.contains("2025-03-12"));

        let physical: Vec<_> = plan.iter().filter(|c| c.wire_id == "weight").collect();
        assert_eq!(physical.len(), 1);
        assert!(physical[0].url.contains("/users/user-1/physical-information"));
    }

    #[test]
    fn nightly_recovery_fields_parse_by_date() {
        let body = json!({"recoveries": [
            {"date": "2025-03-10", "heart_rate_avg": 52, "ans_charge": 7.5},
            {"date": "2025-03-11", "heart_rate_avg": 55}
        ]});
        let hr = parse_body("heart_rate_avg", &body, Some("bpm"), now());
        assert_eq!(hr.len(), 2);
        let ans = parse_body("ans_charge", &body, Some("score"), now());
        assert_eq!(ans.len(), 1);
        assert_eq!(ans[0].value.as_f64(), Some(7.5));
    }

    #[test]
    fn sleep_total_falls_back_to_stage_sum() {
        let body = json!({"nights": [{
            "date": "2025-03-10",
            "light_sleep": 12000,
            "deep_sleep": 5400,
            "rem_sleep": 6000
        }]});
        let total = parse_body("sleep_duration", &body, Some("min"), now());
        assert_eq!(total[0].value.as_f64(), Some(390.0));
        let deep = parse_body("deep_sleep", &body, Some("min"), now());
        assert_eq!(deep[0].value.as_f64(), Some(90.0));
    }

    #[test]
    fn continuous_heart_rate_samples_carry_in_day_times() {
        let body = json!({
            "date": "2025-03-10",
            "heart_rates": [
                {"heart_rate": 58, "sample_time": "06:15:00"},
                {"heart_rate": 91, "sample_time": "14:30:00"}
            ]
        });
        let samples = parse_body("heart_rate_samples", &body, Some("bpm"), now());
        assert_eq!(samples.len(), 2);
        assert!(samples[1].start_date > samples[0].start_date);
    }

    #[test]
    fn physical_information_converts_height_to_meters() {
        let at = now();
        let body = json!({"weight": 78.5, "height": 183.0, "vo2-max": 49});
        let height = parse_body("height", &body, Some("m"), at);
        assert_eq!(height[0].value.as_f64(), Some(1.83));
        assert_eq!(height[0].start_date, at);
        assert_eq!(
            parse_body("vo2-max", &body, None, at)[0].value.as_f64(),
            Some(49.0)
        );
    }
}
