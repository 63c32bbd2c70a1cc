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
use crate::value::MetricValue;
use crate::MetricsError;
use serde_json::Map;
use std::sync::atomic::{AtomicI64, Ordering};

/// A metric which accumulates a signed integer value.
///
/// `notify` coerces its argument to `i64`, failing with
/// [`MetricsError::InputType`] (and leaving the counter unchanged) if the
/// value cannot be coerced. Negative increments are supported.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    /// Creates a new counter initialized to 0.
    #[inline]
    pub fn new() -> Counter {
        Counter::default()
    }

    /// Resets the counter to 0.
    #[inline]
    pub fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Adds 1 to the counter.
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Subtracts 1 from the counter.
    #[inline]
    pub fn dec(&self) {
        self.add(-1);
    }

    /// Adds a number to the counter. May be negative.
    #[inline]
    pub fn add(&self, n: i64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the current value of the counter.
    #[inline]
    pub fn count(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Ingests a dynamically-typed observation, coercing it to `i64`.
    ///
    /// Returns [`MetricsError::InputType`] without mutating the counter if
    /// `value` cannot be coerced.
    pub fn notify(&self, name: &str, value: &MetricValue) -> Result<(), MetricsError> {
        let n = value.as_i64(name)?;
        self.add(n);
        Ok(())
    }

    /// Returns the computed summary: `{kind: "counter", value}`.
    pub fn get(&self) -> Map<String, serde_json::Value> {
        let mut map = Map::new();
        map.insert("kind".to_string(), MetricValue::from("counter").to_json());
        map.insert("value".to_string(), serde_json::Value::from(self.count()));
        map
    }

    /// Returns the raw underlying count.
    pub fn raw(&self) -> i64 {
        self.count()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        let counter = Counter::new();
        assert_eq!(counter.count(), 0);
        counter.inc();
        counter.add(9);
        counter.dec();
        assert_eq!(counter.count(), 9);
    }

    #[test]
    fn notify_supports_negative_values() {
        let counter = Counter::new();
        counter.notify("c", &MetricValue::from(10i64)).unwrap();
        counter.notify("c", &MetricValue::from(-3i64)).unwrap();
        assert_eq!(counter.count(), 7);
        assert_eq!(counter.get()["kind"], "counter");
        assert_eq!(counter.get()["value"], 7);
    }

    #[test]
    fn notify_rejects_non_numeric_without_mutating() {
        let counter = Counter::new();
        counter.add(5);
        let err = counter.notify("c", &MetricValue::from("nope")).unwrap_err();
        assert!(matches!(err, MetricsError::InputType { .. }));
        assert_eq!(counter.count(), 5);
    }
}
