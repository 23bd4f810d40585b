// ABOUTME: Integration tests for the two-tier credential store
// ABOUTME: Durability across reopen, encryption at rest, handshake secrets and purge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{Duration, Utc};
use healthsync::models::{Provider, ProviderConnection, TokenData};
use healthsync::oauth::{AuthCodeClient, ClientAuthStyle};
use healthsync::providers::utils::ensure_fresh_token;
use healthsync::store::{CredentialStore, MemoryTier};
use healthsync::SyncError;
use std::sync::Arc;

const TEST_KEY: [u8; 32] = [7u8; 32];

fn sample_tokens() -> TokenData {
    TokenData {
        access_token: "access-token-plain-12345".into(),
        refresh_token: Some("refresh-token-plain-67890".into()),
        expires_at: Some(1_900_000_000_000),
        user_id: Some("user-42".into()),
        scope: Some("activity sleep".into()),
        token_secret: None,
    }
}

#[tokio::test]
async fn connections_and_tokens_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = CredentialStore::open(dir.path(), TEST_KEY).unwrap();
        let conn = ProviderConnection::connected_now(
            Provider::Fitbit,
            vec!["steps".into(), "heart_rate".into()],
        );
        store.save_provider_connection(&conn).await.unwrap();
        store
            .save_token_data(Provider::Fitbit, &sample_tokens())
            .await
            .unwrap();
    }

    let reopened = CredentialStore::open(dir.path(), TEST_KEY).unwrap();
    let conn = reopened
        .provider_connection(Provider::Fitbit)
        .await
        .expect("connection persisted");
    assert!(conn.connected);
    assert_eq!(conn.selected_metrics, vec!["steps", "heart_rate"]);

    let tokens = reopened
        .token_data(Provider::Fitbit)
        .await
        .unwrap()
        .expect("tokens persisted");
    assert_eq!(tokens, sample_tokens());
}

#[tokio::test]
async fn tokens_never_land_on_disk_in_the_clear() {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path(), TEST_KEY).unwrap();
    store
        .save_token_data(Provider::Oura, &sample_tokens())
        .await
        .unwrap();
    store
        .stash_handshake_secret(Provider::Fitbit, "pkce-verifier-secret")
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join("credentials.enc")).unwrap();
    assert!(!raw.contains("access-token-plain-12345"));
    assert!(!raw.contains("refresh-token-plain-67890"));
    assert!(!raw.contains("pkce-verifier-secret"));
}

#[tokio::test]
async fn wrong_key_fails_decryption_instead_of_returning_garbage() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = CredentialStore::open(dir.path(), TEST_KEY).unwrap();
        store
            .save_token_data(Provider::Whoop, &sample_tokens())
            .await
            .unwrap();
    }

    let wrong = CredentialStore::open(dir.path(), [9u8; 32]).unwrap();
    assert!(matches!(
        wrong.token_data(Provider::Whoop).await,
        Err(SyncError::Storage(_))
    ));
}

#[tokio::test]
async fn handshake_secret_is_single_use() {
    let store = CredentialStore::in_memory();
    store
        .stash_handshake_secret(Provider::Garmin, "temporary-token-secret")
        .await
        .unwrap();

    assert_eq!(
        store.take_handshake_secret(Provider::Garmin).await.as_deref(),
        Some("temporary-token-secret")
    );
    // Consumed on the first take; a replayed callback finds nothing.
    assert!(store.take_handshake_secret(Provider::Garmin).await.is_none());
}

#[tokio::test]
async fn storage_keys_are_stable_per_provider() {
    assert_eq!(
        CredentialStore::connection_storage_key("fitbit").unwrap(),
        "healthsync.connection.fitbit"
    );
    assert_eq!(
        CredentialStore::token_storage_key("google_fit").unwrap(),
        "healthsync.tokens.google_fit"
    );
    assert!(matches!(
        CredentialStore::token_storage_key("jawbone"),
        Err(SyncError::UnknownProvider(_))
    ));
}

#[tokio::test]
async fn damaged_general_tier_degrades_to_not_connected() {
    let general = Arc::new(MemoryTier::new());
    let store = CredentialStore::new(general.clone(), Arc::new(MemoryTier::new()));

    let conn = ProviderConnection::connected_now(Provider::Polar, vec!["steps".into()]);
    store.save_provider_connection(&conn).await.unwrap();
    assert!(store.provider_connection(Provider::Polar).await.is_some());

    general.poison();
    assert!(store.provider_connection(Provider::Polar).await.is_none());
    assert!(store.all_connected().await.is_empty());
}

#[tokio::test]
async fn purge_removes_every_trace_of_a_provider() {
    let store = CredentialStore::in_memory();
    let conn = ProviderConnection::connected_now(Provider::Withings, vec!["weight".into()]);
    store.save_provider_connection(&conn).await.unwrap();
    store
        .save_token_data(Provider::Withings, &sample_tokens())
        .await
        .unwrap();
    store
        .stash_handshake_secret(Provider::Withings, "csrf-state")
        .await
        .unwrap();

    store.purge_provider(Provider::Withings).await;

    assert!(store.provider_connection(Provider::Withings).await.is_none());
    assert!(store.token_data(Provider::Withings).await.unwrap().is_none());
    assert!(store
        .take_handshake_secret(Provider::Withings)
        .await
        .is_none());
}

#[tokio::test]
async fn connections_are_isolated_per_provider() {
    let store = CredentialStore::in_memory();
    for provider in [Provider::Fitbit, Provider::Oura] {
        let conn = ProviderConnection::connected_now(provider, vec!["steps".into()]);
        store.save_provider_connection(&conn).await.unwrap();
    }

    store.purge_provider(Provider::Fitbit).await;

    let connected = store.all_connected().await;
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].provider, Provider::Oura);
}

#[tokio::test]
async fn unexpired_token_skips_the_refresh_round_trip() {
    let store = CredentialStore::in_memory();
    let tokens = TokenData {
        access_token: "live-access".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some((Utc::now() + Duration::hours(2)).timestamp_millis()),
        user_id: None,
        scope: None,
        token_secret: None,
    };
    store
        .save_token_data(Provider::Oura, &tokens)
        .await
        .unwrap();

    // The token endpoint is unroutable, so any refresh attempt would fail
    // the call instead of returning the stored material.
    let client = AuthCodeClient::new(
        Provider::Oura,
        "client-id".into(),
        "client-secret".into(),
        "https://auth.invalid/authorize".into(),
        "http://127.0.0.1:1/token".into(),
        None,
        "https://localhost:8443/oauth/callback/oura".into(),
        ClientAuthStyle::FormBody,
    );

    for _ in 0..2 {
        let fresh = ensure_fresh_token(&store, Provider::Oura, &client)
            .await
            .unwrap();
        assert_eq!(fresh.access_token, "live-access");
        assert_eq!(fresh.refresh_token.as_deref(), Some("refresh-1"));
    }
}
