// ABOUTME: Delivery targets for synced data: local vitals persistence and the backend POST
// ABOUTME: Both are best-effort; a dead sink never fails a sync that fetched data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::errors::Result;
use crate::http_client::shared_client;
use crate::models::{NormalizedMetricPayload, SyncPayload};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Local persistence for normalized samples (the host's vitals database).
#[async_trait]
pub trait VitalsSink: Send + Sync {
    /// Persist one sync's payloads.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the orchestrator logs and continues.
    async fn persist(&self, payloads: &[NormalizedMetricPayload]) -> Result<()>;
}

/// POSTs each sync's payload to a backend collection endpoint.
///
/// Strictly fire-and-forget: failures are logged and swallowed so an
/// unreachable backend never turns a successful fetch into a failed sync.
pub struct BackendSink {
    endpoint_url: String,
    auth_token: Option<String>,
}

impl BackendSink {
    #[must_use]
    pub fn new(endpoint_url: String, auth_token: Option<String>) -> Self {
        Self {
            endpoint_url,
            auth_token,
        }
    }

    pub async fn submit(&self, payload: &SyncPayload) {
        let mut request = shared_client().post(&self.endpoint_url).json(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(provider = %payload.provider, "sync payload delivered to backend");
            }
            Ok(response) => {
                warn!(
                    provider = %payload.provider,
                    status = %response.status(),
                    "backend rejected sync payload, continuing"
                );
            }
            Err(err) => {
                warn!(
                    provider = %payload.provider,
                    error = %err,
                    "backend delivery failed, continuing"
                );
            }
        }
    }
}
