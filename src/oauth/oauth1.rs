// ABOUTME: Two-legged OAuth1 client: request token, user approval redirect, access token
// ABOUTME: Every call is HMAC-SHA1 signed with nonce and timestamp via the signing component
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use super::signing;
use crate::errors::{Result, SyncError};
use crate::http_client::shared_client;
use crate::models::{Provider, TokenData};
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, info};

/// Temporary token/secret pair from the first handshake leg. The secret is
/// stashed in the secure credential tier between legs and deleted on
/// completion — success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    pub token: String,
    pub secret: String,
}

/// OAuth1 client for one provider's fixed endpoints.
pub struct OAuth1Client {
    provider: Provider,
    consumer_key: String,
    consumer_secret: String,
    request_token_url: String,
    authorize_url: String,
    access_token_url: String,
    callback_url: String,
    http: Client,
}

impl OAuth1Client {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Provider,
        consumer_key: String,
        consumer_secret: String,
        request_token_url: String,
        authorize_url: String,
        access_token_url: String,
        callback_url: String,
    ) -> Self {
        Self {
            provider,
            consumer_key,
            consumer_secret,
            request_token_url,
            authorize_url,
            access_token_url,
            callback_url,
            http: shared_client().clone(),
        }
    }

    fn base_protocol_params(&self) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), signing::timestamp()),
            ("oauth_nonce".into(), signing::nonce()),
            ("oauth_version".into(), "1.0".into()),
        ]
    }

    /// Leg 1: obtain a temporary token/secret pair via a signed POST with an
    /// empty token.
    ///
    /// # Errors
    ///
    /// [`SyncError::TokenExchange`] for non-2xx or unparseable responses,
    /// [`SyncError::TransientNetwork`] for network failures.
    pub async fn request_temporary_credentials(&self) -> Result<TemporaryCredentials> {
        let mut params = self.base_protocol_params();
        params.push(("oauth_callback".into(), self.callback_url.clone()));

        let body = self
            .signed_post(&self.request_token_url, params, None)
            .await?;
        let fields = parse_form_body(&body);
        let token = fields.get("oauth_token").cloned().ok_or_else(|| {
            SyncError::TokenExchange(format!(
                "{} request-token response missing oauth_token: {body}",
                self.provider
            ))
        })?;
        let secret = fields.get("oauth_token_secret").cloned().ok_or_else(|| {
            SyncError::TokenExchange(format!(
                "{} request-token response missing oauth_token_secret",
                self.provider
            ))
        })?;
        debug!(provider = %self.provider, "temporary credentials obtained");
        Ok(TemporaryCredentials { token, secret })
    }

    /// Leg 2: URL the user approves the temporary token at.
    #[must_use]
    pub fn approval_url(&self, temporary_token: &str) -> String {
        format!(
            "{}?oauth_token={}&oauth_callback={}",
            self.authorize_url,
            urlencoding::encode(temporary_token),
            urlencoding::encode(&self.callback_url),
        )
    }

    /// Leg 3: exchange the approved temporary credentials plus verifier for
    /// long-lived token credentials.
    ///
    /// Tokens from this strategy carry no natural expiry; refresh is
    /// unsupported by the protocol and modeled as a no-op by the adapter.
    ///
    /// # Errors
    ///
    /// [`SyncError::TokenExchange`] for non-2xx or unparseable responses,
    /// [`SyncError::TransientNetwork`] for network failures.
    pub async fn exchange_access_token(
        &self,
        temporary: &TemporaryCredentials,
        verifier: &str,
    ) -> Result<TokenData> {
        let mut params = self.base_protocol_params();
        params.push(("oauth_token".into(), temporary.token.clone()));
        params.push(("oauth_verifier".into(), verifier.to_owned()));

        let body = self
            .signed_post(&self.access_token_url, params, Some(&temporary.secret))
            .await?;
        let fields = parse_form_body(&body);
        let access_token = fields.get("oauth_token").cloned().ok_or_else(|| {
            SyncError::TokenExchange(format!(
                "{} access-token response missing oauth_token",
                self.provider
            ))
        })?;
        let token_secret = fields.get("oauth_token_secret").cloned().ok_or_else(|| {
            SyncError::TokenExchange(format!(
                "{} access-token response missing oauth_token_secret",
                self.provider
            ))
        })?;

        info!(provider = %self.provider, "two-legged authorization complete");
        Ok(TokenData {
            access_token,
            refresh_token: None,
            expires_at: None,
            user_id: fields.get("encoded_user_id").cloned(),
            scope: None,
            token_secret: Some(token_secret),
        })
    }

    /// Signed GET against an API endpoint using long-lived token credentials.
    /// Query parameters participate in the signature base string.
    ///
    /// # Errors
    ///
    /// [`SyncError::TransientNetwork`] for network failures; non-2xx is left
    /// to the caller, which may skip the endpoint.
    pub async fn signed_get(
        &self,
        url: &str,
        query: &[(String, String)],
        token: &str,
        token_secret: &str,
    ) -> Result<reqwest::Response> {
        let mut params = self.base_protocol_params();
        params.push(("oauth_token".into(), token.to_owned()));

        let mut signable = params.clone();
        signable.extend_from_slice(query);
        let signature = signing::sign(
            "GET",
            url,
            &signable,
            &self.consumer_secret,
            Some(token_secret),
        );
        params.push(("oauth_signature".into(), signature));

        let response = self
            .http
            .get(url)
            .query(query)
            .header("Authorization", signing::authorization_header(&params))
            .send()
            .await?;
        Ok(response)
    }

    async fn signed_post(
        &self,
        url: &str,
        mut params: Vec<(String, String)>,
        token_secret: Option<&str>,
    ) -> Result<String> {
        let signature = signing::sign("POST", url, &params, &self.consumer_secret, token_secret);
        params.push(("oauth_signature".into(), signature));

        let response = self
            .http
            .post(url)
            .header("Authorization", signing::authorization_header(&params))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::TokenExchange(format!(
                "{} OAuth1 endpoint returned {status}: {body}",
                self.provider
            )));
        }
        Ok(body)
    }
}

fn parse_form_body(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
