// ABOUTME: Environment-variable loader for per-provider OAuth configuration
// ABOUTME: HEALTHSYNC_<PROVIDER>_* overrides on top of compiled-in endpoint defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::constants::placeholders;
use crate::models::Provider;
use std::env;
use tracing::debug;

/// Resolved configuration for one provider adapter.
///
/// Endpoint fields default to the compiled-in production URLs and can be
/// overridden per provider, which is how tests point adapters at a mock
/// server without touching adapter code.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// OAuth1 only: the request-token endpoint for the first handshake leg.
    pub request_token_url: Option<String>,
    pub revoke_url: Option<String>,
    pub api_base_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Whether usable client credentials are present. Placeholder values
    /// count as unconfigured so a templated env file does not look live.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        let id_ok = self
            .client_id
            .as_deref()
            .is_some_and(|id| !placeholders::CLIENT_ID_PLACEHOLDERS.contains(&id));
        let secret_ok = self
            .client_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty());
        id_ok && secret_ok
    }

    /// Client id, or empty string when unconfigured. Callers gate on
    /// [`Self::is_configured`] first.
    #[must_use]
    pub fn client_id_or_default(&self) -> String {
        self.client_id.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn client_secret_or_default(&self) -> String {
        self.client_secret.clone().unwrap_or_default()
    }
}

fn env_for(provider_upper: &str, suffix: &str) -> Option<String> {
    env::var(format!("HEALTHSYNC_{provider_upper}_{suffix}")).ok()
}

/// Load one provider's configuration from `HEALTHSYNC_<PROVIDER>_*`
/// environment variables, falling back to the supplied endpoint defaults.
///
/// Recognized suffixes: `CLIENT_ID`, `CLIENT_SECRET`, `AUTH_URL`,
/// `TOKEN_URL`, `REQUEST_TOKEN_URL`, `REVOKE_URL`, `API_BASE_URL`,
/// `REDIRECT_URI`, `SCOPES` (comma-separated). The redirect URI defaults to
/// `HEALTHSYNC_REDIRECT_BASE` (or `https://localhost:8443`) plus
/// `/oauth/callback/<provider>`; whatever value results must exactly match
/// the URL registered with the provider.
#[must_use]
pub fn load_provider_env_config(
    provider: Provider,
    default_auth_url: &str,
    default_token_url: &str,
    default_request_token_url: Option<&str>,
    default_revoke_url: Option<&str>,
    default_api_base_url: &str,
    default_scopes: &str,
) -> ProviderConfig {
    let upper = provider.as_str().to_uppercase();

    let client_id = env_for(&upper, "CLIENT_ID");
    let client_secret = env_for(&upper, "CLIENT_SECRET");

    let auth_url = env_for(&upper, "AUTH_URL").unwrap_or_else(|| default_auth_url.to_owned());
    let token_url = env_for(&upper, "TOKEN_URL").unwrap_or_else(|| default_token_url.to_owned());
    let request_token_url = env_for(&upper, "REQUEST_TOKEN_URL")
        .or_else(|| default_request_token_url.map(ToOwned::to_owned));
    let revoke_url =
        env_for(&upper, "REVOKE_URL").or_else(|| default_revoke_url.map(ToOwned::to_owned));
    let api_base_url =
        env_for(&upper, "API_BASE_URL").unwrap_or_else(|| default_api_base_url.to_owned());

    let redirect_uri = env_for(&upper, "REDIRECT_URI").unwrap_or_else(|| {
        let base = env::var("HEALTHSYNC_REDIRECT_BASE")
            .unwrap_or_else(|_| "https://localhost:8443".to_owned());
        format!("{}/oauth/callback/{}", base, provider.as_str())
    });

    let scopes = env_for(&upper, "SCOPES").map_or_else(
        || {
            default_scopes
                .split([' ', ','])
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        },
        |raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        },
    );

    debug!(
        provider = %provider,
        configured = client_id.is_some(),
        "loaded provider configuration"
    );

    ProviderConfig {
        provider,
        client_id,
        client_secret,
        auth_url,
        token_url,
        request_token_url,
        revoke_url,
        api_base_url,
        redirect_uri,
        scopes,
    }
}
