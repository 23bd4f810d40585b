// ABOUTME: The HealthProvider trait every adapter implements, plus shared request/response types
// ABOUTME: Authorization handshake types and the availability probe
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::config::ProviderConfig;
use crate::errors::Result;
use crate::models::{NormalizedMetricPayload, Provider, ProviderConnection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of the availability probe. `reason` is a human-readable
/// explanation when `available` is false (missing credentials, device store
/// absent on this host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    #[must_use]
    pub const fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// What the host must do to continue an interactive authorization: open
/// `url` in a user agent and deliver the callback parameters back through
/// [`HealthProvider::complete_authorization`].
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub provider: Provider,
    pub url: String,
    /// CSRF state (OAuth2) or the temporary token (OAuth1); echoed back on
    /// the callback and verified there.
    pub state: String,
}

/// Query parameters delivered to the registered redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Provider-reported failure (`access_denied` on user cancellation).
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    /// OAuth1 callback parameters.
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub oauth_verifier: Option<String>,
}

impl CallbackParams {
    /// OAuth2 callback carrying a code and the echoed state.
    #[must_use]
    pub fn with_code(code: &str, state: &str) -> Self {
        Self {
            code: Some(code.to_owned()),
            state: Some(state.to_owned()),
            ..Self::default()
        }
    }

    /// Provider-reported denial.
    #[must_use]
    pub fn denied(error: &str) -> Self {
        Self {
            error: Some(error.to_owned()),
            ..Self::default()
        }
    }
}

/// One health data platform adapter.
///
/// Adapters own their provider's wire formats end to end: authorization
/// grant strategy, endpoint layout, response parsing and normalization into
/// catalog units. Everything above this trait is provider-agnostic.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn config(&self) -> &ProviderConfig;

    /// Whether this adapter can be used on this host right now. Never errors;
    /// misconfiguration is reported as an unavailable probe result so hosts
    /// can render it instead of handling exceptions.
    async fn is_available(&self) -> Availability;

    /// Start the interactive authorization for `selected_metrics`. Scope
    /// requests are narrowed through the catalog to exactly what those
    /// metrics need. Any handshake secret (PKCE verifier, temporary token
    /// secret) is stashed durably before the URL is returned, so the
    /// completion call can run in a fresh process.
    ///
    /// # Errors
    ///
    /// [`crate::errors::SyncError::Configuration`] when client credentials
    /// are missing, [`crate::errors::SyncError::TransientNetwork`] when a
    /// pre-flight call fails (OAuth1 request-token leg).
    async fn begin_authorization(
        &self,
        selected_metrics: &[String],
    ) -> Result<AuthorizationRequest>;

    /// Finish the authorization from the callback parameters, persist tokens
    /// and the connection record, and return the new connection.
    ///
    /// The stashed handshake secret is consumed on entry and deleted whether
    /// or not the exchange succeeds.
    ///
    /// # Errors
    ///
    /// [`crate::errors::SyncError::AuthorizationFailed`] on user cancellation
    /// or state mismatch, [`crate::errors::SyncError::TokenExchange`] /
    /// [`crate::errors::SyncError::RedirectUriMismatch`] when the provider
    /// rejects the exchange.
    async fn complete_authorization(
        &self,
        params: CallbackParams,
        selected_metrics: &[String],
    ) -> Result<ProviderConnection>;

    /// Ensure a usable access token, refreshing when it expires within the
    /// safety buffer. Returns the access token, or `None` when no token is
    /// stored. Adapters whose grant never expires return the stored token
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`crate::errors::SyncError::TokenRefresh`] when the refresh is
    /// rejected; the provider then requires re-authorization.
    async fn refresh_token_if_needed(&self) -> Result<Option<String>>;

    /// Fetch and normalize all available `selected` metrics over
    /// `[start, end)`. Metrics the catalog does not map for this provider
    /// are skipped; a metric whose endpoint fails or whose payload does not
    /// parse contributes no samples rather than failing the fetch.
    ///
    /// # Errors
    ///
    /// [`crate::errors::SyncError::NotConnected`] without stored tokens,
    /// [`crate::errors::SyncError::TransientNetwork`] when the whole fetch
    /// is network-dead, [`crate::errors::SyncError::TokenRefresh`] when the
    /// token could not be made usable.
    async fn fetch_metrics(
        &self,
        selected: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedMetricPayload>>;

    /// Disconnect: best-effort remote revocation, then unconditional local
    /// deletion of tokens, connection record and handshake state. Local
    /// deletion happens even when revocation fails.
    async fn disconnect(&self) -> Result<()>;
}
