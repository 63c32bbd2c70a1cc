// Copyright 2019 Palantir Technologies, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! A process-wide default [`MetricRegistry`] and a free-function facade over
//! it, for callers who don't want to thread a registry handle through their
//! own code.
use crate::reservoir::ReservoirSpec;
use crate::{Counter, Gauge, Histogram, Meter, MetricRegistry, MetricsError};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

static DEFAULT_REGISTRY: Lazy<Mutex<Arc<MetricRegistry>>> =
    Lazy::new(|| Mutex::new(Arc::new(MetricRegistry::new())));

/// Returns a handle to the process-wide default registry.
pub fn default_registry() -> Arc<MetricRegistry> {
    DEFAULT_REGISTRY.lock().clone()
}

/// Discards the process-wide default registry and replaces it with a fresh,
/// empty one. Existing `Arc<MetricRegistry>` handles obtained from
/// [`default_registry`] before the reset keep working against the old
/// instance; only subsequent calls observe the replacement.
pub fn reset_default_registry() {
    *DEFAULT_REGISTRY.lock() = Arc::new(MetricRegistry::new());
}

/// Creates (or returns the existing) counter named `name` on the default registry.
pub fn new_counter(name: &str) -> Result<Arc<Counter>, MetricsError> {
    default_registry().new_counter(name)
}

/// Creates (or returns the existing) gauge named `name` on the default registry.
pub fn new_gauge(name: &str) -> Result<Arc<Gauge>, MetricsError> {
    default_registry().new_gauge(name)
}

/// Creates (or returns the existing) histogram named `name` on the default registry.
pub fn new_histogram(name: &str, spec: ReservoirSpec) -> Result<Arc<Histogram>, MetricsError> {
    default_registry().new_histogram(name, spec)
}

/// Creates (or returns the existing) meter named `name` on the default registry.
pub fn new_meter(name: &str) -> Result<Arc<Meter>, MetricsError> {
    default_registry().new_meter(name)
}

/// Returns the computed summary of the metric named `name` on the default registry.
pub fn metric(name: &str) -> Result<Map<String, serde_json::Value>, MetricsError> {
    default_registry().metric(name)
}

/// Removes the metric named `name` from the default registry.
pub fn delete(name: &str) -> bool {
    default_registry().delete(name)
}

/// Returns a sorted list of every metric name on the default registry.
pub fn names() -> Vec<String> {
    default_registry().list()
}

/// Adds `name` to `tag`'s group on the default registry.
pub fn tag(name: &str, tag: &str) -> Result<(), MetricsError> {
    default_registry().tag(name, tag)
}

/// Removes `name` from `tag`'s group on the default registry.
pub fn untag(name: &str, tag: &str) -> bool {
    default_registry().untag(name, tag)
}

/// Returns a snapshot of every tag and the metric names grouped under it on
/// the default registry.
pub fn tags() -> HashMap<String, HashSet<String>> {
    default_registry().tags()
}

/// Returns `{name: summary}` for every metric grouped under `tag` on the
/// default registry.
pub fn by_tag(tag: &str) -> HashMap<String, Map<String, serde_json::Value>> {
    default_registry().by_tag(tag)
}

#[cfg(test)]
mod test {
    use super::*;

    // Default-registry tests share process-global state, so they run
    // serially and reset it on entry rather than relying on Rust's
    // (unordered) test execution to avoid collisions with each other.
    #[test]
    fn facade_round_trips_through_default_registry() {
        reset_default_registry();

        let counter = new_counter("requests").unwrap();
        counter.inc();
        assert_eq!(metric("requests").unwrap()["value"], 1);

        tag("requests", "http").unwrap();
        assert_eq!(by_tag("http").len(), 1);

        assert!(delete("requests"));
        assert!(metric("requests").is_err());
        assert!(names().is_empty());
    }

    #[test]
    fn reset_discards_old_metrics_from_new_handles() {
        reset_default_registry();
        new_counter("leftover").unwrap();
        reset_default_registry();
        assert!(names().is_empty());
    }
}
