// ABOUTME: Shared HTTP client with connection pooling for provider API calls
// ABOUTME: Singleton with finite request and connect timeouts on every call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::constants::limits;
use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get the shared HTTP client for provider API calls.
///
/// The client uses connection pooling and applies a finite timeout to every
/// request so a hung remote endpoint cannot block a sync indefinitely; a
/// timeout surfaces as a network-classified error eligible for the single
/// orchestrator-level retry.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(limits::HTTP_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(limits::HTTP_CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}
