// ABOUTME: Helpers shared by the provider adapters
// ABOUTME: Token freshness, bearer HTTP, handshake state, date ranges and grant partitioning
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::catalog::{self, HealthMetric};
use crate::constants::limits;
use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{
    MetricSample, NormalizedMetricPayload, Provider, ProviderConnection, TokenData,
};
use crate::oauth::AuthCodeClient;
use crate::store::CredentialStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Durable handshake state stashed between `begin_authorization` and
/// `complete_authorization`. One shape serves all three grant strategies;
/// unused fields stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeState {
    /// CSRF state (OAuth2) or temporary token (OAuth1).
    pub state: String,
    /// PKCE code verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    /// OAuth1 temporary token secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl HandshakeState {
    /// Stash under the provider's handshake key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] when the secure tier write fails.
    pub async fn stash(&self, store: &CredentialStore, provider: Provider) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        store.stash_handshake_secret(provider, &raw).await
    }

    /// Take (and delete) the stashed state. Returns an authorization failure
    /// when none exists: completion without a matching begin is either a
    /// replay or a lost handshake, and both restart from the top.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AuthorizationFailed`] when no handshake is pending.
    pub async fn take(store: &CredentialStore, provider: Provider) -> Result<Self> {
        let raw = store.take_handshake_secret(provider).await.ok_or_else(|| {
            SyncError::AuthorizationFailed(format!("no pending authorization for {provider}"))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Reject callbacks carrying a provider-reported error or a state value that
/// does not match the stashed one.
///
/// # Errors
///
/// Returns [`SyncError::AuthorizationFailed`] in either case.
pub fn verify_callback(
    provider: Provider,
    expected_state: &str,
    callback_state: Option<&str>,
    callback_error: Option<&str>,
) -> Result<()> {
    if let Some(error) = callback_error {
        return Err(SyncError::AuthorizationFailed(format!(
            "{provider} reported '{error}' on callback"
        )));
    }
    // Constant-time comparison; the state doubles as a CSRF token.
    let state_ok = callback_state
        .is_some_and(|s| bool::from(s.as_bytes().ct_eq(expected_state.as_bytes())));
    if !state_ok {
        return Err(SyncError::AuthorizationFailed(format!(
            "state mismatch on {provider} callback"
        )));
    }
    Ok(())
}

/// Load stored tokens and refresh them when they expire within the safety
/// buffer, serialized per provider so concurrent calls cannot race the same
/// refresh token. Returns the usable token material.
///
/// # Errors
///
/// [`SyncError::NotConnected`] without stored tokens,
/// [`SyncError::TokenRefresh`] when the refresh is rejected or no refresh
/// token exists for an expiring access token.
pub async fn ensure_fresh_token(
    store: &CredentialStore,
    provider: Provider,
    client: &AuthCodeClient,
) -> Result<TokenData> {
    let guard = store.refresh_guard(provider);
    let _lock = guard.lock().await;

    let tokens = store
        .token_data(provider)
        .await?
        .ok_or(SyncError::NotConnected(provider))?;

    if !tokens.expires_within(Duration::minutes(limits::TOKEN_EXPIRY_BUFFER_MINUTES)) {
        return Ok(tokens);
    }

    let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
        SyncError::TokenRefresh(format!("{provider} token expired with no refresh token"))
    })?;
    debug!(provider = %provider, "access token expiring, refreshing");
    let refreshed = client
        .refresh(&refresh_token)
        .await?
        .into_token_data(Some(refresh_token));
    store.save_token_data(provider, &refreshed).await?;
    Ok(refreshed)
}

/// Bearer GET returning the parsed JSON body, or `None` when the endpoint
/// answered non-2xx. A failed endpoint costs one metric's samples, not the
/// whole fetch, so HTTP-level rejections are logged and absorbed here.
/// Network-level failures still propagate: they indicate the whole fetch is
/// dead and are the retryable class.
///
/// # Errors
///
/// [`SyncError::TransientNetwork`] on connect/timeout failures.
pub async fn bearer_get_json(
    provider: Provider,
    access_token: &str,
    url: &str,
    query: &[(String, String)],
) -> Result<Option<serde_json::Value>> {
    let response = shared_client()
        .get(url)
        .bearer_auth(access_token)
        .query(query)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        warn!(provider = %provider, %url, %status, "endpoint rejected request, skipping");
        return Ok(None);
    }
    match response.json().await {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(provider = %provider, %url, error = %err, "unparseable response body, skipping");
            Ok(None)
        }
    }
}

/// Calendar days covered by `[start, end)`, inclusive of the day containing
/// `end` so partial trailing days are fetched.
#[must_use]
pub fn days_in_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start.date_naive();
    let last = end.date_naive();
    while day <= last {
        days.push(day);
        if let Some(next) = day.succ_opt() {
            day = next;
        } else {
            break;
        }
    }
    days
}

/// Run `futures` with at most [`limits::FETCH_CONCURRENCY`] in flight,
/// collecting every output.
pub async fn run_limited<F, T>(futures: Vec<F>) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(futures)
        .buffer_unordered(limits::FETCH_CONCURRENCY)
        .collect()
        .await
}

/// Wrap samples into a payload carrying the catalog's display metadata.
#[must_use]
pub fn payload(
    provider: Provider,
    metric: &'static HealthMetric,
    samples: Vec<MetricSample>,
) -> NormalizedMetricPayload {
    NormalizedMetricPayload {
        provider,
        metric_key: metric.key.to_owned(),
        display_name: metric.display_name.to_owned(),
        unit: metric.unit.map(ToOwned::to_owned),
        samples,
    }
}

/// Split a combined `"120/80"` blood pressure reading into
/// (systolic, diastolic).
#[must_use]
pub fn split_blood_pressure(raw: &str) -> Option<(f64, f64)> {
    let (sys, dia) = raw.split_once('/')?;
    Some((sys.trim().parse().ok()?, dia.trim().parse().ok()?))
}

/// Build the connection record after a successful token exchange, splitting
/// `selected_metrics` into granted and denied against the scope string the
/// provider actually returned. A missing scope string means the provider
/// does not echo scopes and everything requested is assumed granted.
#[must_use]
pub fn connection_from_grant(
    provider: Provider,
    selected_metrics: &[String],
    granted_scope: Option<&str>,
) -> ProviderConnection {
    let mut conn = ProviderConnection::connected_now(provider, selected_metrics.to_vec());
    let Some(scope_str) = granted_scope else {
        return conn;
    };

    let granted_set: BTreeSet<&str> = scope_str.split([' ', ',']).filter(|s| !s.is_empty()).collect();
    let mut granted = Vec::new();
    let mut denied = Vec::new();
    for key in selected_metrics {
        match catalog::mapping_for(key, provider) {
            Some(mapping) => match mapping.scope {
                Some(required) if !granted_set.contains(required) => denied.push(key.clone()),
                _ => granted.push(key.clone()),
            },
            // Unavailable metrics are dropped silently, not reported denied.
            None => {}
        }
    }
    conn.granted_metrics = Some(granted);
    conn.denied_metrics = Some(denied);
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_range_is_inclusive_of_partial_trailing_day() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 22, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 3, 2, 0, 0).unwrap();
        let days = days_in_range(start, end);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].to_string(), "2025-03-01");
        assert_eq!(days[2].to_string(), "2025-03-03");
    }

    #[test]
    fn blood_pressure_splitting() {
        assert_eq!(split_blood_pressure("120/80"), Some((120.0, 80.0)));
        assert_eq!(split_blood_pressure("118.5 / 76"), Some((118.5, 76.0)));
        assert_eq!(split_blood_pressure("120"), None);
        assert_eq!(split_blood_pressure("sys/dia"), None);
    }

    #[test]
    fn grant_partition_reports_denied_scopes() {
        let selected = vec![
            "steps".to_owned(),
            "heart_rate".to_owned(),
            "blood_glucose".to_owned(), // unavailable on Fitbit
        ];
        let conn = connection_from_grant(Provider::Fitbit, &selected, Some("activity"));
        assert_eq!(conn.granted_metrics.as_deref(), Some(&["steps".to_owned()][..]));
        assert_eq!(
            conn.denied_metrics.as_deref(),
            Some(&["heart_rate".to_owned()][..])
        );
    }

    #[test]
    fn missing_scope_echo_assumes_full_grant() {
        let selected = vec!["steps".to_owned()];
        let conn = connection_from_grant(Provider::Fitbit, &selected, None);
        assert!(conn.granted_metrics.is_none());
        assert!(conn.denied_metrics.is_none());
        assert!(conn.connected);
    }

    #[tokio::test]
    async fn handshake_state_is_single_use() {
        let store = CredentialStore::in_memory();
        let state = HandshakeState {
            state: "abc".into(),
            verifier: Some("v".into()),
            secret: None,
        };
        state.stash(&store, Provider::Fitbit).await.unwrap();

        let taken = HandshakeState::take(&store, Provider::Fitbit).await.unwrap();
        assert_eq!(taken.state, "abc");
        assert_eq!(taken.verifier.as_deref(), Some("v"));

        // Second take fails: the stash is deleted on first read.
        assert!(matches!(
            HandshakeState::take(&store, Provider::Fitbit).await,
            Err(SyncError::AuthorizationFailed(_))
        ));
    }

    #[test]
    fn callback_verification() {
        assert!(verify_callback(Provider::Oura, "s1", Some("s1"), None).is_ok());
        assert!(matches!(
            verify_callback(Provider::Oura, "s1", Some("s2"), None),
            Err(SyncError::AuthorizationFailed(_))
        ));
        assert!(matches!(
            verify_callback(Provider::Oura, "s1", Some("s1"), Some("access_denied")),
            Err(SyncError::AuthorizationFailed(_))
        ));
    }
}
