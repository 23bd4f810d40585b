// ABOUTME: Provider adapters: one module per platform plus the shared trait and registry
// ABOUTME: Cloud adapters are feature-gated; device stores go through the injected bridge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

//! # Provider Adapters
//!
//! Each adapter owns one platform's wire formats end to end: grant strategy,
//! endpoint layout, response parsing and normalization into catalog units.
//! All of them implement [`HealthProvider`] and share one
//! [`crate::store::CredentialStore`]; the [`registry`] assembles whichever
//! set of adapters the build enables.

pub mod core;
pub mod device;
pub mod registry;
pub mod utils;

#[cfg(feature = "provider-apple-health")]
pub mod apple_health;
#[cfg(feature = "provider-fitbit")]
pub mod fitbit;
#[cfg(feature = "provider-garmin")]
pub mod garmin;
#[cfg(feature = "provider-google-fit")]
pub mod google_fit;
#[cfg(feature = "provider-health-connect")]
pub mod health_connect;
#[cfg(feature = "provider-oura")]
pub mod oura;
#[cfg(feature = "provider-polar")]
pub mod polar;
#[cfg(feature = "provider-whoop")]
pub mod whoop;
#[cfg(feature = "provider-withings")]
pub mod withings;

pub use core::{AuthorizationRequest, Availability, CallbackParams, HealthProvider};
pub use device::{DeviceHealthBridge, DeviceRecord};
pub use registry::{default_config, ProviderRegistry, ProviderRegistryBuilder};
