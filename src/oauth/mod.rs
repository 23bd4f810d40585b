// ABOUTME: Authorization strategies shared by the provider adapters
// ABOUTME: Bearer authorization-code, authorization-code+PKCE, and two-legged signed flows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

//! # Authorization Strategies
//!
//! Three grant strategies cover all nine providers:
//!
//! 1. [`authcode`] — bearer authorization-code exchange (most cloud providers)
//! 2. [`pkce`] — authorization-code with a SHA-256 challenge/verifier pair
//! 3. [`oauth1`] — two-legged request/access token exchange with per-request
//!    HMAC-SHA1 signing, built on the pure [`signing`] component
//!
//! Shared state machine: `unauthenticated → pending-redirect → exchanging-code
//! → authorized → (refreshing) → authorized | revoked`. User cancellation and
//! provider `error` callback parameters produce an explicit
//! authorization-failed result on every strategy, and partially-completed
//! handshake state (PKCE verifier, temporary token secret) is cleared on both
//! the success and failure paths.

pub mod authcode;
pub mod oauth1;
pub mod pkce;
pub mod signing;

pub use authcode::{AuthCodeClient, ClientAuthStyle, TokenEndpointResponse};
pub use oauth1::{OAuth1Client, TemporaryCredentials};
