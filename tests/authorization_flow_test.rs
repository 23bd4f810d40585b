// ABOUTME: Integration tests for the interactive authorization handshake
// ABOUTME: URL construction, CSRF verification, denial handling and handshake consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

#![cfg(feature = "provider-fitbit")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use healthsync::config::ProviderConfig;
use healthsync::models::Provider;
use healthsync::providers::fitbit::FitbitProvider;
use healthsync::providers::{CallbackParams, HealthProvider};
use healthsync::store::CredentialStore;
use healthsync::SyncError;
use std::sync::Arc;

fn configured() -> ProviderConfig {
    ProviderConfig {
        provider: Provider::Fitbit,
        client_id: Some("23ABCD".into()),
        client_secret: Some("shhh".into()),
        auth_url: "https://www.fitbit.com/oauth2/authorize".into(),
        token_url: "https://api.fitbit.com/oauth2/token".into(),
        request_token_url: None,
        revoke_url: None,
        api_base_url: "https://api.fitbit.com".into(),
        redirect_uri: "https://localhost:8443/oauth/callback/fitbit".into(),
        scopes: vec!["activity".into(), "heartrate".into()],
    }
}

fn unconfigured() -> ProviderConfig {
    let mut config = configured();
    config.client_id = None;
    config.client_secret = None;
    config
}

fn adapter(config: ProviderConfig) -> (FitbitProvider, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::in_memory());
    (FitbitProvider::new(config, Arc::clone(&store)), store)
}

#[tokio::test]
async fn authorization_url_carries_pkce_and_narrowed_scopes() {
    let (provider, store) = adapter(configured());

    let request = provider
        .begin_authorization(&["steps".into(), "heart_rate".into()])
        .await
        .unwrap();

    assert!(request.url.starts_with("https://www.fitbit.com/oauth2/authorize?"));
    assert!(request.url.contains("response_type=code"));
    assert!(request.url.contains("client_id=23ABCD"));
    assert!(request.url.contains("code_challenge="));
    assert!(request.url.contains("code_challenge_method=S256"));
    assert!(request.url.contains(&format!("state={}", request.state)));
    // Scopes narrowed to what the selected metrics need.
    assert!(request.url.contains("activity"));
    assert!(request.url.contains("heartrate"));
    assert!(!request.url.contains("nutrition"));

    // The verifier is stashed durably before the URL is handed out, and the
    // stash must never contain the challenge that went on the wire.
    let stashed = store
        .take_handshake_secret(Provider::Fitbit)
        .await
        .expect("handshake stashed");
    assert!(stashed.contains(&request.state));
}

#[tokio::test]
async fn unconfigured_credentials_block_authorization() {
    let (provider, _store) = adapter(unconfigured());

    let availability = provider.is_available().await;
    assert!(!availability.available);

    assert!(matches!(
        provider.begin_authorization(&["steps".into()]).await,
        Err(SyncError::Configuration(_))
    ));
}

#[tokio::test]
async fn user_denial_fails_and_consumes_the_handshake() {
    let (provider, store) = adapter(configured());
    provider.begin_authorization(&["steps".into()]).await.unwrap();

    let result = provider
        .complete_authorization(CallbackParams::denied("access_denied"), &["steps".into()])
        .await;
    assert!(matches!(result, Err(SyncError::AuthorizationFailed(_))));

    // Handshake state is single-use on the failure path too.
    assert!(store.take_handshake_secret(Provider::Fitbit).await.is_none());
    assert!(store.provider_connection(Provider::Fitbit).await.is_none());
}

#[tokio::test]
async fn mismatched_state_is_rejected() {
    let (provider, _store) = adapter(configured());
    provider.begin_authorization(&["steps".into()]).await.unwrap();

    let result = provider
        .complete_authorization(
            CallbackParams::with_code("a-code", "forged-state"),
            &["steps".into()],
        )
        .await;
    assert!(matches!(result, Err(SyncError::AuthorizationFailed(_))));
}

#[tokio::test]
async fn callback_without_a_prior_handshake_is_rejected() {
    let (provider, _store) = adapter(configured());

    let result = provider
        .complete_authorization(
            CallbackParams::with_code("a-code", "some-state"),
            &["steps".into()],
        )
        .await;
    assert!(matches!(result, Err(SyncError::AuthorizationFailed(_))));
}
