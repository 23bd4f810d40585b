// ABOUTME: Unified error taxonomy for the health data integration layer
// ABOUTME: Distinguishes user-actionable auth failures from silently-recovered transient ones
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::models::Provider;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Errors produced by the integration layer.
///
/// Propagation policy: `Configuration`, `AuthorizationFailed`, `RedirectUriMismatch`,
/// `TokenExchange` and `TokenRefresh` are user-visible and drive re-authorization
/// prompts. `TransientNetwork` is eligible for exactly one automatic retry at the
/// sync-orchestrator level. `Parse` is always recovered locally by dropping the
/// offending sample and is only visible through reduced counts in the sync report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or placeholder OAuth client credentials. Surfaced through
    /// `is_available()` as a human-readable reason, never thrown mid-sync.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// User cancelled the interactive authorization or the provider returned
    /// an `error` query parameter on the callback.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The redirect URI sent to the provider does not exactly match the one
    /// registered with it. Called out separately because it is the most common
    /// integration misconfiguration.
    #[error(
        "redirect URI mismatch for {provider}: {detail}. The redirect URI must be a fixed \
         HTTPS URL and must exactly match the callback registered in the provider's \
         developer console (scheme, host, path and trailing slash included)"
    )]
    RedirectUriMismatch { provider: Provider, detail: String },

    /// Non-2xx from the token endpoint; carries the provider's error payload
    /// when one was present.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Refresh call failed. Callers must treat the provider as requiring
    /// re-authorization rather than retrying indefinitely.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// Network-level failure (connect, timeout, DNS). The one retryable class.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// A payload did not match the expected shape. Recovered locally.
    #[error("failed to parse provider payload: {0}")]
    Parse(String),

    /// A provider string that the catalog does not recognize.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// No durable connection record exists, or it is marked disconnected.
    #[error("provider {0} is not connected")]
    NotConnected(Provider),

    /// The host runtime is backgrounded; no network or storage I/O performed.
    #[error("sync deferred: app not in active state")]
    SyncDeferred,

    /// Durable key-value storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A capability the provider does not expose (e.g. token refresh on a
    /// two-legged-signed provider).
    #[error("{provider} does not support {feature}")]
    Unsupported { provider: Provider, feature: String },
}

impl SyncError {
    /// Whether the sync orchestrator may retry the whole procedure once.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Whether this error means the user must go through authorization again.
    #[must_use]
    pub const fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            Self::TokenRefresh(_) | Self::AuthorizationFailed(_) | Self::NotConnected(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            // Connect failures, timeouts and request-build errors are all
            // network-classified so a hung remote cannot block the orchestrator.
            Self::TransientNetwork(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
