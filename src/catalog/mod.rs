// ABOUTME: Metric capability catalog: canonical metric keys and per-provider availability
// ABOUTME: Pure lookups over a static table; the single source of truth for what exists
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

//! # Metric Catalog
//!
//! Static registry mapping each canonical metric key to display metadata and
//! per-provider wire identifiers (record type / scope / endpoint template).
//! Loaded once at process start; every lookup is a pure function with no side
//! effects and no error paths — an absent key yields `None` or an empty
//! collection, never a panic.

mod table;

use crate::models::{MetricGroup, Provider};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

pub use table::METRICS;

/// How one provider exposes one canonical metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMetricMapping {
    pub provider: Provider,
    /// Provider-native identifier: a response field path, an aggregate data
    /// type name, a measure type code, or a device-store record type.
    pub wire_id: &'static str,
    /// OAuth scope (cloud providers) or runtime permission string (device
    /// stores) required to read this metric. `None` for providers whose
    /// grant covers everything (e.g. the two-legged-signed provider).
    pub scope: Option<&'static str>,
    /// Remote endpoint template; `{date}` is substituted per calendar day for
    /// date-bucketed APIs. `None` for device-store reads.
    pub endpoint_template: Option<&'static str>,
}

/// One canonical metric and everywhere it can come from.
#[derive(Debug, Clone, Copy)]
pub struct HealthMetric {
    /// Canonical, globally unique key (e.g. `heart_rate`).
    pub key: &'static str,
    pub display_name: &'static str,
    pub group: MetricGroup,
    /// Canonical unit all providers are normalized into.
    pub unit: Option<&'static str>,
    pub mappings: &'static [ProviderMetricMapping],
}

impl HealthMetric {
    /// The mapping for `provider`, if this metric is available there.
    #[must_use]
    pub fn mapping_for(&self, provider: Provider) -> Option<&'static ProviderMetricMapping> {
        self.mappings.iter().find(|m| m.provider == provider)
    }

    #[must_use]
    pub fn is_available_for(&self, provider: Provider) -> bool {
        self.mapping_for(provider).is_some()
    }
}

fn key_index() -> &'static HashMap<&'static str, &'static HealthMetric> {
    static INDEX: OnceLock<HashMap<&'static str, &'static HealthMetric>> = OnceLock::new();
    INDEX.get_or_init(|| METRICS.iter().map(|m| (m.key, m)).collect())
}

/// Look up one metric by canonical key.
#[must_use]
pub fn metric_by_key(key: &str) -> Option<&'static HealthMetric> {
    key_index().get(key).copied()
}

/// All metrics in one physiological category, in table order.
#[must_use]
pub fn metrics_by_group(group: MetricGroup) -> Vec<&'static HealthMetric> {
    METRICS.iter().filter(|m| m.group == group).collect()
}

/// All metrics a given provider can supply, in table order.
#[must_use]
pub fn available_metrics_for_provider(provider: Provider) -> Vec<&'static HealthMetric> {
    METRICS
        .iter()
        .filter(|m| m.is_available_for(provider))
        .collect()
}

/// The mapping for (metric key, provider), if available.
#[must_use]
pub fn mapping_for(key: &str, provider: Provider) -> Option<&'static ProviderMetricMapping> {
    metric_by_key(key).and_then(|m| m.mapping_for(provider))
}

/// Aggregate the OAuth scopes needed to read `keys` from `provider`.
///
/// De-duplicated set; unknown keys and keys unavailable for the provider
/// contribute nothing — the result is empty, never an error, for all-unknown
/// input.
#[must_use]
pub fn scopes_for_metrics(provider: Provider, keys: &[String]) -> BTreeSet<String> {
    keys.iter()
        .filter_map(|key| mapping_for(key, provider))
        .filter_map(|mapping| mapping.scope)
        .map(ToOwned::to_owned)
        .collect()
}

/// Health Connect runtime permission strings for `keys`, de-duplicated.
#[must_use]
pub fn health_connect_permissions_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::HealthConnect, keys)
}

/// Per-provider scope aggregation entry points.
#[must_use]
pub fn fitbit_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::Fitbit, keys)
}

#[must_use]
pub fn google_fit_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::GoogleFit, keys)
}

#[must_use]
pub fn oura_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::Oura, keys)
}

#[must_use]
pub fn polar_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::Polar, keys)
}

#[must_use]
pub fn withings_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::Withings, keys)
}

#[must_use]
pub fn whoop_scopes_for_metrics(keys: &[String]) -> BTreeSet<String> {
    scopes_for_metrics(Provider::Whoop, keys)
}

/// Resolve the subset of `selected` that the catalog marks available for
/// `provider`, preserving input order and dropping duplicates. Metrics with
/// no mapping are silently skipped per the availability invariant.
#[must_use]
pub fn resolve_available(provider: Provider, selected: &[String]) -> Vec<&'static HealthMetric> {
    let mut seen = BTreeSet::new();
    selected
        .iter()
        .filter_map(|key| metric_by_key(key))
        .filter(|m| m.is_available_for(provider))
        .filter(|m| seen.insert(m.key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_are_unique() {
        let mut seen = BTreeSet::new();
        for metric in METRICS {
            assert!(seen.insert(metric.key), "duplicate key {}", metric.key);
        }
    }

    #[test]
    fn every_group_has_at_least_one_metric() {
        for group in [
            MetricGroup::Activity,
            MetricGroup::Heart,
            MetricGroup::Body,
            MetricGroup::Sleep,
            MetricGroup::Respiratory,
            MetricGroup::Metabolic,
            MetricGroup::Nutrition,
            MetricGroup::Wellness,
        ] {
            assert!(!metrics_by_group(group).is_empty(), "empty group {group:?}");
        }
    }

    #[test]
    fn unknown_key_yields_none_and_empty_scopes() {
        assert!(metric_by_key("flux_capacitance").is_none());
        let scopes =
            scopes_for_metrics(Provider::Fitbit, &["flux_capacitance".to_owned()]);
        assert!(scopes.is_empty());
    }

    #[test]
    fn scope_aggregation_is_a_set() {
        let a = fitbit_scopes_for_metrics(&[
            "steps".to_owned(),
            "steps".to_owned(),
            "heart_rate".to_owned(),
        ]);
        let b = fitbit_scopes_for_metrics(&["heart_rate".to_owned(), "steps".to_owned()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn blood_pressure_pair_is_present_for_device_stores() {
        for key in ["blood_pressure_systolic", "blood_pressure_diastolic"] {
            let metric = metric_by_key(key).unwrap();
            assert!(metric.is_available_for(Provider::HealthConnect));
            assert_eq!(metric.unit, Some("mmHg"));
        }
    }

    #[test]
    fn resolve_available_drops_unavailable_and_duplicates() {
        let selected = vec![
            "steps".to_owned(),
            "steps".to_owned(),
            "blood_glucose".to_owned(), // not a Fitbit metric
            "heart_rate".to_owned(),
        ];
        let resolved = resolve_available(Provider::Fitbit, &selected);
        let keys: Vec<_> = resolved.iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["steps", "heart_rate"]);
    }
}
