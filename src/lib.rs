// ABOUTME: Main library entry point for the healthsync integration layer
// ABOUTME: Catalog, OAuth clients, credential store, provider adapters and sync orchestration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

#![deny(unsafe_code)]

//! # Healthsync
//!
//! A multi-provider health data integration layer: one normalized pipeline
//! over nine wearable and health platforms.
//!
//! ## Features
//!
//! - **Metric catalog**: canonical metric keys with per-provider wire
//!   mappings, scopes and endpoint templates
//! - **Three grant strategies**: bearer authorization-code, PKCE, and
//!   two-legged HMAC-SHA1 signed
//! - **Durable credential store**: connection state in a plain tier,
//!   tokens encrypted at rest
//! - **Sync orchestration**: window calculation, token freshness,
//!   retry-once and per-sync reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthsync::models::Provider;
//! use healthsync::providers::ProviderRegistry;
//! use healthsync::store::CredentialStore;
//! use healthsync::sync::SyncOrchestrator;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(CredentialStore::in_memory());
//!     let registry = Arc::new(ProviderRegistry::builder(Arc::clone(&store)).build());
//!     let orchestrator = SyncOrchestrator::new(registry, store);
//!
//!     let report = orchestrator.sync_health_data(Provider::Fitbit).await;
//!     println!("synced {} samples", report.samples_count);
//! }
//! ```
//!
//! ## Architecture
//!
//! - **catalog**: the static capability registry, pure lookups only
//! - **oauth**: grant strategy clients shared by the adapters
//! - **store**: two-tier provider-keyed credential persistence
//! - **providers**: one adapter per platform behind the `HealthProvider` trait
//! - **sync**: the orchestrator producing one report per invocation

pub mod catalog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod http_client;
pub mod logging;
pub mod models;
pub mod oauth;
pub mod providers;
pub mod store;
pub mod sync;

pub use errors::{Result, SyncError};
pub use models::Provider;
