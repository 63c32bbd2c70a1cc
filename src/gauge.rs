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
use parking_lot::Mutex;
use serde_json::Map;

/// A metric holding a single, arbitrarily-typed value set by the caller.
///
/// Unlike a [`Counter`](crate::Counter), a gauge is last-writer-wins:
/// `notify` simply replaces the stored value rather than accumulating it.
#[derive(Debug)]
pub struct Gauge(Mutex<MetricValue>);

impl Default for Gauge {
    fn default() -> Self {
        Gauge::new()
    }
}

impl Gauge {
    /// Creates a new gauge holding [`MetricValue::Null`].
    pub fn new() -> Gauge {
        Gauge(Mutex::new(MetricValue::Null))
    }

    /// Replaces the gauge's value.
    pub fn notify(&self, value: MetricValue) {
        *self.0.lock() = value;
    }

    /// Returns a copy of the gauge's current value.
    pub fn raw(&self) -> MetricValue {
        self.0.lock().clone()
    }

    /// Returns the computed summary: `{kind: "gauge", value}`.
    pub fn get(&self) -> Map<String, serde_json::Value> {
        let mut map = Map::new();
        map.insert("kind".to_string(), MetricValue::from("gauge").to_json());
        map.insert("value".to_string(), self.raw().to_json());
        map
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn last_writer_wins() {
        let gauge = Gauge::new();
        gauge.notify(MetricValue::from(1i64));
        gauge.notify(MetricValue::from("hello"));
        assert_eq!(gauge.raw(), MetricValue::from("hello"));
        assert_eq!(gauge.get()["kind"], "gauge");
        assert_eq!(gauge.get()["value"], "hello");
    }

    #[test]
    fn starts_null() {
        let gauge = Gauge::new();
        assert_eq!(gauge.raw(), MetricValue::Null);
    }
}
