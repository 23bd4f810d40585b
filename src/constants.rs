// ABOUTME: Centralized constants for endpoints, storage keys, scopes and limits
// ABOUTME: Single place where provider wire addresses and tuning knobs live
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

/// Fixed OAuth and API endpoints per provider.
///
/// Redirect URIs must be fixed HTTPS URLs that exactly match the value
/// registered with each provider; several providers reject non-HTTPS
/// callbacks outright.
pub mod endpoints {
    pub const FITBIT_AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";
    pub const FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
    pub const FITBIT_REVOKE_URL: &str = "https://api.fitbit.com/oauth2/revoke";
    pub const FITBIT_API_BASE: &str = "https://api.fitbit.com/1";

    pub const GOOGLE_FIT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const GOOGLE_FIT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
    pub const GOOGLE_FIT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
    pub const GOOGLE_FIT_API_BASE: &str = "https://www.googleapis.com/fitness/v1";

    pub const GARMIN_REQUEST_TOKEN_URL: &str =
        "https://connectapi.garmin.com/oauth-service/oauth/request_token";
    pub const GARMIN_AUTH_URL: &str = "https://connect.garmin.com/oauthConfirm";
    pub const GARMIN_ACCESS_TOKEN_URL: &str =
        "https://connectapi.garmin.com/oauth-service/oauth/access_token";
    pub const GARMIN_API_BASE: &str = "https://apis.garmin.com/wellness-api/rest";

    pub const OURA_AUTH_URL: &str = "https://cloud.ouraring.com/oauth/authorize";
    pub const OURA_TOKEN_URL: &str = "https://api.ouraring.com/oauth/token";
    pub const OURA_REVOKE_URL: &str = "https://api.ouraring.com/oauth/revoke";
    pub const OURA_API_BASE: &str = "https://api.ouraring.com/v2";

    pub const POLAR_AUTH_URL: &str = "https://flow.polar.com/oauth2/authorization";
    pub const POLAR_TOKEN_URL: &str = "https://polarremote.com/v2/oauth2/token";
    pub const POLAR_API_BASE: &str = "https://www.polaraccesslink.com/v3";

    pub const WITHINGS_AUTH_URL: &str = "https://account.withings.com/oauth2_user/authorize2";
    pub const WITHINGS_TOKEN_URL: &str = "https://wbsapi.withings.net/v2/oauth2";
    pub const WITHINGS_API_BASE: &str = "https://wbsapi.withings.net";

    pub const WHOOP_AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
    pub const WHOOP_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
    pub const WHOOP_REVOKE_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/revoke";
    pub const WHOOP_API_BASE: &str = "https://api.prod.whoop.com/developer/v1";
}

/// Durable storage keys, one secure-tier key per provider for tokens and one
/// general-tier key per provider for connection state. Stable strings, never
/// derived at runtime from user input.
pub mod storage_keys {
    /// General tier: connection state.
    pub const CONNECTION_PREFIX: &str = "healthsync.connection.";
    /// Secure tier: OAuth tokens.
    pub const TOKENS_PREFIX: &str = "healthsync.tokens.";
    /// Secure tier: short-lived handshake secrets (PKCE verifier, OAuth1
    /// temporary token secret). Single-use, deleted on completion.
    pub const HANDSHAKE_PREFIX: &str = "healthsync.handshake.";
}

/// Timing and sizing knobs for the sync orchestrator and token handling.
pub mod limits {
    /// Safety buffer applied before every authorized call; a token expiring
    /// within this window is refreshed first, never used stale.
    pub const TOKEN_EXPIRY_BUFFER_MINUTES: i64 = 5;

    /// Fetch window for a provider that has never synced.
    pub const INITIAL_SYNC_WINDOW_DAYS: i64 = 30;

    /// Trailing window always re-fetched even on frequent syncs, to absorb
    /// late-arriving provider data.
    pub const MIN_RESYNC_WINDOW_HOURS: i64 = 24;

    /// Upper bound on concurrently in-flight per-day/per-endpoint calls
    /// inside one `fetch_metrics` fan-out.
    pub const FETCH_CONCURRENCY: usize = 6;

    /// HTTP request timeout. Every network call gets a finite timeout so a
    /// hung remote endpoint cannot block the orchestrator.
    pub const HTTP_TIMEOUT_SECS: u64 = 30;

    /// HTTP connect timeout.
    pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
}

/// Default OAuth scope sets requested when the caller does not narrow them
/// through the catalog.
pub mod default_scopes {
    pub const FITBIT: &str =
        "activity heartrate oxygen_saturation respiratory_rate temperature sleep weight";
    pub const GOOGLE_FIT: &str = "https://www.googleapis.com/auth/fitness.activity.read \
         https://www.googleapis.com/auth/fitness.heart_rate.read \
         https://www.googleapis.com/auth/fitness.body.read \
         https://www.googleapis.com/auth/fitness.sleep.read";
    pub const GARMIN: &str = "wellness";
    pub const OURA: &str = "daily heartrate personal";
    pub const POLAR: &str = "accesslink.read_all";
    pub const WITHINGS: &str = "user.metrics,user.activity";
    pub const WHOOP: &str = "read:recovery read:cycles read:sleep read:body_measurement";
}

/// Placeholder values that indicate unconfigured client credentials.
pub mod placeholders {
    pub const CLIENT_ID_PLACEHOLDERS: [&str; 3] =
        ["", "YOUR_CLIENT_ID", "changeme"];
}
