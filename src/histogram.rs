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
use crate::stats::{self, Summary};
use crate::value::MetricValue;
use crate::{Clock, MetricsError, Reservoir};
use serde_json::Map;
use std::sync::Arc;

/// A metric tracking a statistical distribution of values.
///
/// A histogram wraps a [`Reservoir`] chosen at construction time (the four
/// disciplines named in [`ReservoirSpec`]); `notify` feeds observations into
/// it, and `get` runs the [statistics kernel](crate::stats) over its current
/// snapshot.
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
}

impl Histogram {
    /// Creates a new histogram backed by the default (uniform) reservoir.
    pub fn new() -> Histogram {
        Histogram::with_spec(ReservoirSpec::default(), crate::SYSTEM_CLOCK.clone())
    }

    /// Creates a new histogram backed by the reservoir described by `spec`.
    pub fn with_spec(spec: ReservoirSpec, clock: Arc<dyn Clock>) -> Histogram {
        Histogram {
            reservoir: spec.build(clock),
        }
    }

    /// Ingests a dynamically-typed observation, coercing it to `f64`.
    ///
    /// Returns [`MetricsError::InputType`] without mutating the reservoir if
    /// `value` cannot be coerced.
    pub fn notify(&self, name: &str, value: &MetricValue) -> Result<(), MetricsError> {
        let v = value.as_f64(name)?;
        self.reservoir.add(v);
        Ok(())
    }

    /// Returns the number of values ever added to the histogram.
    pub fn count(&self) -> u64 {
        self.reservoir.count()
    }

    /// Computes the statistical summary of the reservoir's current sample.
    pub fn summary(&self) -> Summary {
        stats::summarize(&self.reservoir.snapshot())
    }

    /// Returns the computed summary document (`kind: "histogram"` plus every
    /// field from [`Summary`]).
    pub fn get(&self) -> Map<String, serde_json::Value> {
        self.summary().to_summary_map()
    }

    /// Returns the bare values currently retained in the reservoir (weights
    /// discarded).
    pub fn raw(&self) -> Vec<f64> {
        self.reservoir.snapshot().into_iter().map(|(v, _)| v).collect()
    }
}

impl Default for Histogram {
    fn default() -> Histogram {
        Histogram::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reservoir::UniformReservoir;

    #[test]
    fn notify_and_count() {
        let histogram = Histogram::new();
        assert_eq!(histogram.count(), 0);
        histogram.notify("h", &MetricValue::from(15i64)).unwrap();
        assert_eq!(histogram.count(), 1);
        histogram.notify("h", &MetricValue::from(10.0)).unwrap();
        assert_eq!(histogram.count(), 2);
    }

    #[test]
    fn rejects_non_numeric_without_mutating() {
        let histogram = Histogram::new();
        histogram.notify("h", &MetricValue::from(1.0)).unwrap();
        let err = histogram.notify("h", &MetricValue::from("x")).unwrap_err();
        assert!(matches!(err, MetricsError::InputType { .. }));
        assert_eq!(histogram.count(), 1);
    }

    #[test]
    fn uniform_reservoir_bounds_sample_size() {
        let histogram = Histogram::with_spec(
            ReservoirSpec::Uniform { size: 4 },
            crate::SYSTEM_CLOCK.clone(),
        );
        for i in 1..=8 {
            histogram.notify("h", &MetricValue::from(i as f64)).unwrap();
        }
        let summary = histogram.summary();
        assert_eq!(summary.n, 4);
        assert!(summary.min >= 1.0);
        assert!(summary.max <= 8.0);
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        let a = Histogram {
            reservoir: Box::new(UniformReservoir::with_seed(4, 7)),
        };
        let b = Histogram {
            reservoir: Box::new(UniformReservoir::with_seed(4, 7)),
        };
        for i in 1..=8 {
            a.notify("h", &MetricValue::from(i as f64)).unwrap();
            b.notify("h", &MetricValue::from(i as f64)).unwrap();
        }
        assert_eq!(a.raw(), b.raw());
    }

    #[test]
    fn get_reports_histogram_kind() {
        let histogram = Histogram::new();
        histogram.notify("h", &MetricValue::from(1.0)).unwrap();
        assert_eq!(histogram.get()["kind"], "histogram");
    }
}
