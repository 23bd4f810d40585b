// ABOUTME: Runtime configuration for provider credentials and endpoints
// ABOUTME: Environment-driven, with compiled-in endpoint defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

pub mod environment;

pub use environment::{load_provider_env_config, ProviderConfig};
