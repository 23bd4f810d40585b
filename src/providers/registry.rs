// ABOUTME: Adapter registry: builds the enabled providers over one credential store
// ABOUTME: Environment-configured defaults with config and adapter override seams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use crate::config::{load_provider_env_config, ProviderConfig};
use crate::constants::{default_scopes, endpoints};
use crate::models::Provider;
use crate::providers::core::HealthProvider;
use crate::providers::device::DeviceHealthBridge;
use crate::store::CredentialStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Environment-backed configuration for one provider, with the compiled-in
/// production endpoints as defaults.
#[must_use]
pub fn default_config(provider: Provider) -> ProviderConfig {
    match provider {
        Provider::Fitbit => load_provider_env_config(
            provider,
            endpoints::FITBIT_AUTH_URL,
            endpoints::FITBIT_TOKEN_URL,
            None,
            Some(endpoints::FITBIT_REVOKE_URL),
            endpoints::FITBIT_API_BASE,
            default_scopes::FITBIT,
        ),
        Provider::GoogleFit => load_provider_env_config(
            provider,
            endpoints::GOOGLE_FIT_AUTH_URL,
            endpoints::GOOGLE_FIT_TOKEN_URL,
            None,
            Some(endpoints::GOOGLE_FIT_REVOKE_URL),
            endpoints::GOOGLE_FIT_API_BASE,
            default_scopes::GOOGLE_FIT,
        ),
        Provider::Garmin => load_provider_env_config(
            provider,
            endpoints::GARMIN_AUTH_URL,
            endpoints::GARMIN_ACCESS_TOKEN_URL,
            Some(endpoints::GARMIN_REQUEST_TOKEN_URL),
            None,
            endpoints::GARMIN_API_BASE,
            default_scopes::GARMIN,
        ),
        Provider::Oura => load_provider_env_config(
            provider,
            endpoints::OURA_AUTH_URL,
            endpoints::OURA_TOKEN_URL,
            None,
            Some(endpoints::OURA_REVOKE_URL),
            endpoints::OURA_API_BASE,
            default_scopes::OURA,
        ),
        Provider::Polar => load_provider_env_config(
            provider,
            endpoints::POLAR_AUTH_URL,
            endpoints::POLAR_TOKEN_URL,
            None,
            None,
            endpoints::POLAR_API_BASE,
            default_scopes::POLAR,
        ),
        Provider::Withings => load_provider_env_config(
            provider,
            endpoints::WITHINGS_AUTH_URL,
            endpoints::WITHINGS_TOKEN_URL,
            None,
            None,
            endpoints::WITHINGS_API_BASE,
            default_scopes::WITHINGS,
        ),
        Provider::Whoop => load_provider_env_config(
            provider,
            endpoints::WHOOP_AUTH_URL,
            endpoints::WHOOP_TOKEN_URL,
            None,
            Some(endpoints::WHOOP_REVOKE_URL),
            endpoints::WHOOP_API_BASE,
            default_scopes::WHOOP,
        ),
        // Device stores have no remote endpoints to configure.
        Provider::HealthConnect | Provider::AppleHealth => {
            load_provider_env_config(provider, "", "", None, None, "", "")
        }
    }
}

/// The set of adapters enabled at build time, all sharing one credential
/// store.
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn HealthProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn builder(store: Arc<CredentialStore>) -> ProviderRegistryBuilder {
        ProviderRegistryBuilder {
            store,
            device_bridge: None,
            configs: HashMap::new(),
            overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn HealthProvider>> {
        self.providers.get(&provider).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn HealthProvider>> {
        self.providers.values()
    }

    #[must_use]
    pub fn registered(&self) -> Vec<Provider> {
        let mut out: Vec<Provider> = self.providers.keys().copied().collect();
        out.sort();
        out
    }
}

/// Builder over a shared store. Custom adapters registered through
/// [`Self::with_provider`] replace the built-in one for that provider,
/// which is also the seam tests use to inject fakes.
pub struct ProviderRegistryBuilder {
    store: Arc<CredentialStore>,
    device_bridge: Option<Arc<dyn DeviceHealthBridge>>,
    configs: HashMap<Provider, ProviderConfig>,
    overrides: Vec<Arc<dyn HealthProvider>>,
}

impl ProviderRegistryBuilder {
    /// Bridge to the on-device health stores. Without one the device-store
    /// adapters report unavailable instead of being omitted.
    #[must_use]
    pub fn with_device_bridge(mut self, bridge: Arc<dyn DeviceHealthBridge>) -> Self {
        self.device_bridge = Some(bridge);
        self
    }

    /// Replace the environment-derived configuration for one provider.
    #[must_use]
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.configs.insert(config.provider, config);
        self
    }

    /// Register a custom adapter, replacing the built-in one.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn HealthProvider>) -> Self {
        self.overrides.push(provider);
        self
    }

    #[must_use]
    pub fn build(mut self) -> ProviderRegistry {
        let mut providers: HashMap<Provider, Arc<dyn HealthProvider>> = HashMap::new();
        let mut config_for = |provider: Provider| {
            self.configs
                .remove(&provider)
                .unwrap_or_else(|| default_config(provider))
        };

        #[cfg(feature = "provider-fitbit")]
        providers.insert(
            Provider::Fitbit,
            Arc::new(crate::providers::fitbit::FitbitProvider::new(
                config_for(Provider::Fitbit),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-google-fit")]
        providers.insert(
            Provider::GoogleFit,
            Arc::new(crate::providers::google_fit::GoogleFitProvider::new(
                config_for(Provider::GoogleFit),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-garmin")]
        providers.insert(
            Provider::Garmin,
            Arc::new(crate::providers::garmin::GarminProvider::new(
                config_for(Provider::Garmin),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-oura")]
        providers.insert(
            Provider::Oura,
            Arc::new(crate::providers::oura::OuraProvider::new(
                config_for(Provider::Oura),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-polar")]
        providers.insert(
            Provider::Polar,
            Arc::new(crate::providers::polar::PolarProvider::new(
                config_for(Provider::Polar),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-withings")]
        providers.insert(
            Provider::Withings,
            Arc::new(crate::providers::withings::WithingsProvider::new(
                config_for(Provider::Withings),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-whoop")]
        providers.insert(
            Provider::Whoop,
            Arc::new(crate::providers::whoop::WhoopProvider::new(
                config_for(Provider::Whoop),
                Arc::clone(&self.store),
            )),
        );
        #[cfg(feature = "provider-health-connect")]
        providers.insert(
            Provider::HealthConnect,
            Arc::new(crate::providers::health_connect::HealthConnectProvider::new(
                config_for(Provider::HealthConnect),
                Arc::clone(&self.store),
                self.device_bridge.clone(),
            )),
        );
        #[cfg(feature = "provider-apple-health")]
        providers.insert(
            Provider::AppleHealth,
            Arc::new(crate::providers::apple_health::AppleHealthProvider::new(
                config_for(Provider::AppleHealth),
                Arc::clone(&self.store),
                self.device_bridge.clone(),
            )),
        );

        for custom in self.overrides {
            providers.insert(custom.provider(), custom);
        }

        debug!(count = providers.len(), "provider registry built");
        ProviderRegistry { providers }
    }
}
