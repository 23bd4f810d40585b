// ABOUTME: Bearer authorization-code OAuth2 client: authorize URL, exchange, refresh, revoke
// ABOUTME: Also carries the PKCE code_verifier when the provider requires it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{Provider, TokenData};
use chrono::Utc;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthStyle {
    /// `client_id`/`client_secret` as form fields (Strava-style).
    FormBody,
    /// `Authorization: Basic base64(id:secret)` (Fitbit/Polar-style).
    BasicHeader,
}

/// Token endpoint response shared across bearer providers.
///
/// Field aliases absorb the per-provider variation: Fitbit returns
/// `user_id`, Polar returns `x_user_id`, Withings nests everything under
/// `body` (handled by the Withings adapter before deserialization).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, alias = "x_user_id", alias = "userid")]
    pub user_id: Option<serde_json::Value>,
}

impl TokenEndpointResponse {
    /// Convert into durable token material. `previous_refresh` is kept when
    /// the provider omits a new refresh token on refresh responses.
    #[must_use]
    pub fn into_token_data(self, previous_refresh: Option<String>) -> TokenData {
        let expires_at = self
            .expires_in
            .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).timestamp_millis());
        TokenData {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
            user_id: self.user_id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            scope: self.scope,
            token_secret: None,
        }
    }
}

/// Authorization-code client for one provider's fixed endpoints.
pub struct AuthCodeClient {
    provider: Provider,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    revoke_url: Option<String>,
    redirect_uri: String,
    auth_style: ClientAuthStyle,
    http: Client,
}

impl AuthCodeClient {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Provider,
        client_id: String,
        client_secret: String,
        auth_url: String,
        token_url: String,
        revoke_url: Option<String>,
        redirect_uri: String,
        auth_style: ClientAuthStyle,
    ) -> Self {
        Self {
            provider,
            client_id,
            client_secret,
            auth_url,
            token_url,
            revoke_url,
            redirect_uri,
            auth_style,
            http: shared_client().clone(),
        }
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the interactive authorize URL.
    ///
    /// `scope_separator` is provider-specific (space for most, comma for
    /// Withings). `extra` carries per-provider additions such as the PKCE
    /// `code_challenge` pair or Google's `access_type=offline`.
    #[must_use]
    pub fn authorize_url(
        &self,
        scopes: &BTreeSet<String>,
        state: &str,
        scope_separator: &str,
        extra: &[(&str, &str)],
    ) -> String {
        let scope = scopes.iter().cloned().collect::<Vec<_>>().join(scope_separator);
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        );
        for (key, value) in extra {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value).into_owned());
        }
        url
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// [`SyncError::RedirectUriMismatch`] when the provider rejects the
    /// callback URL, [`SyncError::TokenExchange`] for other non-2xx
    /// responses (carrying the provider's error payload), and
    /// [`SyncError::TransientNetwork`] for network failures.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenEndpointResponse> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let request = self.apply_client_auth(self.http.post(&self.token_url), &mut params);
        let response = request.form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(self.classify_exchange_failure(status.as_u16(), &body));
        }

        debug!(provider = %self.provider, "authorization code exchanged");
        serde_json::from_str(&body)
            .map_err(|e| SyncError::TokenExchange(format!("unparseable token response: {e}")))
    }

    /// Refresh an access token.
    ///
    /// # Errors
    ///
    /// [`SyncError::TokenRefresh`] for a non-2xx response — the caller must
    /// treat the provider as requiring re-authorization — and
    /// [`SyncError::TransientNetwork`] for network failures.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenEndpointResponse> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let request = self.apply_client_auth(self.http.post(&self.token_url), &mut params);
        let response = request.form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::TokenRefresh(format!(
                "{} token endpoint returned {status}: {body}",
                self.provider
            )));
        }

        info!(provider = %self.provider, "access token refreshed");
        serde_json::from_str(&body)
            .map_err(|e| SyncError::TokenRefresh(format!("unparseable refresh response: {e}")))
    }

    /// Best-effort remote revocation. Failures are logged, never returned:
    /// disconnect must proceed to local deletion regardless.
    pub async fn revoke(&self, token: &str) {
        let Some(revoke_url) = &self.revoke_url else {
            return;
        };
        let mut params: Vec<(&str, &str)> = vec![("token", token)];
        let request = self.apply_client_auth(self.http.post(revoke_url), &mut params);
        match request.form(&params).send().await {
            Ok(response) if response.status().is_success() => {
                info!(provider = %self.provider, "remote token revoked");
            }
            Ok(response) => {
                warn!(provider = %self.provider, status = %response.status(),
                    "remote revocation rejected, continuing with local cleanup");
            }
            Err(err) => {
                warn!(provider = %self.provider, error = %err,
                    "remote revocation failed, continuing with local cleanup");
            }
        }
    }

    fn apply_client_auth<'a>(
        &'a self,
        request: reqwest::RequestBuilder,
        params: &mut Vec<(&'static str, &'a str)>,
    ) -> reqwest::RequestBuilder {
        match self.auth_style {
            ClientAuthStyle::FormBody => {
                params.push(("client_id", &self.client_id));
                params.push(("client_secret", &self.client_secret));
                request
            }
            ClientAuthStyle::BasicHeader => {
                let header =
                    BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
                params.push(("client_id", &self.client_id));
                request.header("Authorization", format!("Basic {header}"))
            }
        }
    }

    fn classify_exchange_failure(&self, status: u16, body: &str) -> SyncError {
        let lowered = body.to_lowercase();
        if lowered.contains("redirect_uri") || lowered.contains("redirect uri") {
            SyncError::RedirectUriMismatch {
                provider: self.provider,
                detail: format!("token endpoint returned {status}: {body}"),
            }
        } else {
            SyncError::TokenExchange(format!(
                "{} token endpoint returned {status}: {body}",
                self.provider
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AuthCodeClient {
        AuthCodeClient::new(
            Provider::Fitbit,
            "cid".into(),
            "secret".into(),
            "https://auth.example.com/authorize".into(),
            "https://auth.example.com/token".into(),
            None,
            "https://app.example.com/callback/fitbit".into(),
            ClientAuthStyle::BasicHeader,
        )
    }

    #[test]
    fn authorize_url_carries_scopes_state_and_extras() {
        let scopes: BTreeSet<String> =
            ["activity".to_owned(), "heartrate".to_owned()].into();
        let url = client().authorize_url(&scopes, "st4te", " ", &[("code_challenge", "abc")]);
        assert!(url.starts_with("https://auth.example.com/authorize?response_type=code"));
        assert!(url.contains("scope=activity%20heartrate"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("code_challenge=abc"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback%2Ffitbit"));
    }

    #[test]
    fn redirect_uri_rejection_is_classified_distinctly() {
        let err = client().classify_exchange_failure(
            400,
            r#"{"errors":[{"errorType":"invalid_request","message":"Invalid redirect_uri parameter value"}]}"#,
        );
        assert!(matches!(err, SyncError::RedirectUriMismatch { .. }));

        let err = client().classify_exchange_failure(400, r#"{"error":"invalid_grant"}"#);
        assert!(matches!(err, SyncError::TokenExchange(_)));
    }

    #[test]
    fn token_response_preserves_previous_refresh_token() {
        let response = TokenEndpointResponse {
            access_token: "fresh".into(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: Some("activity".into()),
            user_id: Some(serde_json::Value::from(42)),
        };
        let tokens = response.into_token_data(Some("keepme".into()));
        assert_eq!(tokens.refresh_token.as_deref(), Some("keepme"));
        assert_eq!(tokens.user_id.as_deref(), Some("42"));
        assert!(tokens.expires_at.is_some());
    }
}
