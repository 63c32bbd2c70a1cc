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
use crate::reservoir::ReservoirSpec;
use crate::{Clock, Counter, Gauge, Histogram, Meter, MetricsError};
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// The enumeration of metric kinds this registry can hold.
///
/// This is the enumeration of supported metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A [`Counter`].
    Counter,
    /// A [`Gauge`].
    Gauge,
    /// A [`Histogram`].
    Histogram,
    /// A [`Meter`].
    Meter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Meter => "meter",
        };
        f.write_str(s)
    }
}

/// An instrument and the descriptor used to distinguish an idempotent
/// re-creation from a conflicting redefinition.
#[derive(Clone)]
enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>, ReservoirSpec),
    Meter(Arc<Meter>),
}

impl Metric {
    fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(..) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
        }
    }

    /// A human-readable description of this metric's kind/config, used in
    /// [`MetricsError::DuplicateMetric`] messages.
    fn descriptor(&self) -> String {
        match self {
            Metric::Histogram(_, spec) => format!("histogram({})", spec.kind_name()),
            other => other.kind().to_string(),
        }
    }

    fn matches(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(_), Metric::Counter(_)) => true,
            (Metric::Gauge(_), Metric::Gauge(_)) => true,
            (Metric::Meter(_), Metric::Meter(_)) => true,
            (Metric::Histogram(_, a), Metric::Histogram(_, b)) => a == b,
            _ => false,
        }
    }

    fn get(&self) -> Map<String, serde_json::Value> {
        match self {
            Metric::Counter(c) => c.get(),
            Metric::Gauge(g) => g.get(),
            Metric::Histogram(h, _) => h.get(),
            Metric::Meter(m) => m.get(),
        }
    }
}

/// A named, tagged store of metric instruments.
///
/// Instrument identity is a flat `String` name: two instruments with the
/// same name are the same instrument. A separate many-to-many `tag -> names`
/// index groups existing instruments after the fact via [`tag`](Self::tag);
/// tags carry no identity of their own.
///
/// One coarse lock guards the name/tag tables and instrument
/// creation/removal; it is held only for that bookkeeping, never while a
/// `get()` runs a statistics kernel or while a reader is notified.
pub struct MetricRegistry {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

struct Inner {
    metrics: HashMap<String, Metric>,
    tags: HashMap<String, HashSet<String>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        MetricRegistry::new()
    }
}

impl MetricRegistry {
    /// Creates a new, empty registry using the [`SystemClock`](crate::SystemClock).
    pub fn new() -> MetricRegistry {
        MetricRegistry::new_with(crate::SYSTEM_CLOCK.clone())
    }

    /// Creates a new, empty registry using the provided [`Clock`] as the
    /// time source for every histogram/meter it creates.
    pub fn new_with(clock: Arc<dyn Clock>) -> MetricRegistry {
        MetricRegistry {
            inner: Mutex::new(Inner {
                metrics: HashMap::new(),
                tags: HashMap::new(),
            }),
            clock,
        }
    }

    fn new_metric(
        &self,
        name: &str,
        build: impl FnOnce() -> Metric,
    ) -> Result<Metric, MetricsError> {
        let mut inner = self.inner.lock();
        let candidate = build();
        match inner.metrics.get(name) {
            Some(existing) if existing.matches(&candidate) => {
                tracing::trace!(name, "idempotent metric lookup");
                Ok(existing.clone())
            }
            Some(existing) => Err(MetricsError::DuplicateMetric {
                name: name.to_string(),
                existing: existing.descriptor(),
                requested: candidate.descriptor(),
            }),
            None => {
                inner.metrics.insert(name.to_string(), candidate.clone());
                Ok(candidate)
            }
        }
    }

    /// Creates (or returns the existing) counter named `name`.
    ///
    /// Idempotent: a second call with the same name returns the same
    /// instrument. Fails with [`MetricsError::DuplicateMetric`] if `name`
    /// already refers to a metric of a different kind.
    pub fn new_counter(&self, name: &str) -> Result<Arc<Counter>, MetricsError> {
        match self.new_metric(name, || Metric::Counter(Arc::new(Counter::new())))? {
            Metric::Counter(c) => Ok(c),
            _ => unreachable!("new_metric only returns metrics matching the requested kind"),
        }
    }

    /// Creates (or returns the existing) gauge named `name`.
    pub fn new_gauge(&self, name: &str) -> Result<Arc<Gauge>, MetricsError> {
        match self.new_metric(name, || Metric::Gauge(Arc::new(Gauge::new())))? {
            Metric::Gauge(g) => Ok(g),
            _ => unreachable!("new_metric only returns metrics matching the requested kind"),
        }
    }

    /// Creates (or returns the existing) histogram named `name`, backed by
    /// the reservoir described by `spec`.
    ///
    /// Idempotency requires both the same name *and* the same `spec`; a
    /// histogram re-requested with different reservoir parameters is a
    /// [`MetricsError::DuplicateMetric`], not a silent reuse.
    pub fn new_histogram(&self, name: &str, spec: ReservoirSpec) -> Result<Arc<Histogram>, MetricsError> {
        spec.validate()?;
        let clock = self.clock.clone();
        match self.new_metric(name, move || {
            Metric::Histogram(Arc::new(Histogram::with_spec(spec, clock)), spec)
        })? {
            Metric::Histogram(h, _) => Ok(h),
            _ => unreachable!("new_metric only returns metrics matching the requested kind"),
        }
    }

    /// Creates (or returns the existing) meter named `name`.
    pub fn new_meter(&self, name: &str) -> Result<Arc<Meter>, MetricsError> {
        let clock = self.clock.clone();
        match self.new_metric(name, move || Metric::Meter(Arc::new(Meter::new_with(clock))))? {
            Metric::Meter(m) => Ok(m),
            _ => unreachable!("new_metric only returns metrics matching the requested kind"),
        }
    }

    /// Returns the kind of the metric named `name`, or
    /// [`MetricsError::InvalidMetric`] if it doesn't exist.
    pub fn kind(&self, name: &str) -> Result<MetricKind, MetricsError> {
        self.inner
            .lock()
            .metrics
            .get(name)
            .map(Metric::kind)
            .ok_or_else(|| MetricsError::InvalidMetric { name: name.to_string() })
    }

    /// Returns the computed summary of the metric named `name`, or
    /// [`MetricsError::InvalidMetric`] if it doesn't exist.
    ///
    /// The instrument's own lock (not the registry lock) guards this call.
    pub fn metric(&self, name: &str) -> Result<Map<String, serde_json::Value>, MetricsError> {
        let metric = {
            let inner = self.inner.lock();
            inner
                .metrics
                .get(name)
                .cloned()
                .ok_or_else(|| MetricsError::InvalidMetric { name: name.to_string() })?
        };
        Ok(metric.get())
    }

    /// Removes the metric named `name`, detaching it from every tag. Tags
    /// that become empty are removed. Returns whether a metric was removed.
    pub fn delete(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.metrics.remove(name).is_some();
        if removed {
            inner.tags.retain(|tag, names| {
                names.remove(name);
                if names.is_empty() {
                    tracing::debug!(tag, "tag emptied by metric deletion");
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Adds `name` to `tag`'s group. Requires `name` to already exist.
    pub fn tag(&self, name: &str, tag: &str) -> Result<(), MetricsError> {
        let mut inner = self.inner.lock();
        if !inner.metrics.contains_key(name) {
            return Err(MetricsError::InvalidMetric { name: name.to_string() });
        }
        inner.tags.entry(tag.to_string()).or_default().insert(name.to_string());
        Ok(())
    }

    /// Removes `name` from `tag`'s group, dropping the tag entirely if it
    /// becomes empty. Returns whether the removal actually happened.
    pub fn untag(&self, name: &str, tag: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(names) = inner.tags.get_mut(tag) else {
            return false;
        };
        let removed = names.remove(name);
        if names.is_empty() {
            inner.tags.remove(tag);
        }
        removed
    }

    /// Returns a snapshot of every tag and the metric names currently
    /// grouped under it.
    pub fn tags(&self) -> HashMap<String, HashSet<String>> {
        self.inner.lock().tags.clone()
    }

    /// Returns `{name: summary}` for every metric currently grouped under
    /// `tag`. Returns an empty map if `tag` is absent.
    ///
    /// The registry lock is held only long enough to copy the set of names;
    /// each instrument's `get()` then runs outside it, under the
    /// instrument's own lock, so readers never block each other and a
    /// composition may observe writes interleaved per-instrument.
    pub fn by_tag(&self, tag: &str) -> HashMap<String, Map<String, serde_json::Value>> {
        let (names, metrics): (Vec<String>, Vec<Option<Metric>>) = {
            let inner = self.inner.lock();
            match inner.tags.get(tag) {
                Some(names) => {
                    let names: Vec<String> = names.iter().cloned().collect();
                    let metrics = names.iter().map(|n| inner.metrics.get(n).cloned()).collect();
                    (names, metrics)
                }
                None => return HashMap::new(),
            }
        };

        names
            .into_iter()
            .zip(metrics)
            .filter_map(|(name, metric)| metric.map(|m| (name, m.get())))
            .collect()
    }

    /// Returns a sorted list of every registered metric name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().metrics.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::MetricValue;

    #[test]
    fn first_metric_wins() {
        let registry = MetricRegistry::new();

        let a = registry.new_counter("c").unwrap();
        let b = registry.new_counter("c").unwrap();
        a.add(1);
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn duplicate_with_different_kind_errors() {
        let registry = MetricRegistry::new();
        registry.new_counter("x").unwrap();
        let err = registry.new_gauge("x").unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateMetric { .. }));
    }

    #[test]
    fn duplicate_histogram_with_different_reservoir_errors() {
        let registry = MetricRegistry::new();
        registry
            .new_histogram("h", ReservoirSpec::Uniform { size: 100 })
            .unwrap();
        let err = registry
            .new_histogram("h", ReservoirSpec::Uniform { size: 200 })
            .unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateMetric { .. }));

        // same spec is idempotent
        registry
            .new_histogram("h", ReservoirSpec::Uniform { size: 100 })
            .unwrap();
    }

    #[test]
    fn metric_missing_errors() {
        let registry = MetricRegistry::new();
        let err = registry.metric("nope").unwrap_err();
        assert!(matches!(err, MetricsError::InvalidMetric { .. }));
    }

    #[test]
    fn delete_detaches_from_every_tag() {
        let registry = MetricRegistry::new();
        registry.new_histogram("h", ReservoirSpec::default()).unwrap();
        registry.tag("h", "g").unwrap();
        assert!(registry.delete("h"));
        assert!(registry.tags().is_empty());
        assert!(registry.metric("h").is_err());
    }

    #[test]
    fn tag_requires_existing_metric() {
        let registry = MetricRegistry::new();
        let err = registry.tag("nope", "g").unwrap_err();
        assert!(matches!(err, MetricsError::InvalidMetric { .. }));
    }

    #[test]
    fn untag_reports_whether_removed_and_drops_empty_tags() {
        let registry = MetricRegistry::new();
        registry.new_counter("c").unwrap();
        registry.tag("c", "g").unwrap();

        assert!(registry.untag("c", "g"));
        assert!(!registry.untag("c", "g"));
        assert!(registry.tags().is_empty());
    }

    #[test]
    fn by_tag_collects_summaries() {
        let registry = MetricRegistry::new();
        let c = registry.new_counter("c").unwrap();
        c.add(5);
        registry.tag("c", "g").unwrap();

        let summaries = registry.by_tag("g");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries["c"]["value"], 5);
    }

    #[test]
    fn by_tag_missing_tag_is_empty() {
        let registry = MetricRegistry::new();
        assert!(registry.by_tag("nope").is_empty());
    }

    #[test]
    fn list_is_sorted() {
        let registry = MetricRegistry::new();
        registry.new_counter("b").unwrap();
        registry.new_counter("a").unwrap();
        registry.new_counter("c").unwrap();
        assert_eq!(registry.list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn gauge_notify_round_trips_through_get() {
        let registry = MetricRegistry::new();
        let g = registry.new_gauge("g").unwrap();
        g.notify(MetricValue::from(42i64));
        let summary = registry.metric("g").unwrap();
        assert_eq!(summary["kind"], "gauge");
        assert_eq!(summary["value"], 42);
    }
}
