// Copyright 2024 Palantir Technologies, Inc.
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
use crate::MetricsError;
use serde_json::Value as Json;
use std::fmt;

/// A dynamically-typed value accepted by [`Gauge::notify`](crate::Gauge::notify)
/// and coerced from by [`Counter::notify`](crate::Counter::notify) and
/// [`Histogram::notify`](crate::Histogram::notify).
///
/// Gauges hold one of these directly; counters and histograms require the
/// value to coerce to an integer or float respectively, failing with
/// [`MetricsError::InputType`] otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// A 64-bit signed integer.
    Int64(i64),
    /// A double-precision float.
    Double(f64),
    /// A UTF-8 string.
    String(String),
    /// A boolean.
    Bool(bool),
    /// The absence of a value.
    Null,
}

impl MetricValue {
    /// Coerces this value to `f64`, as required by histograms.
    pub fn as_f64(&self, name: &str) -> Result<f64, MetricsError> {
        match *self {
            MetricValue::Int64(n) => Ok(n as f64),
            MetricValue::Double(n) => Ok(n),
            ref other => Err(MetricsError::InputType {
                name: name.to_string(),
                value: other.to_string(),
                expected: "f64",
            }),
        }
    }

    /// Coerces this value to `i64`, as required by counters and meters.
    ///
    /// Floats coerce only when they represent an exact integer.
    pub fn as_i64(&self, name: &str) -> Result<i64, MetricsError> {
        match *self {
            MetricValue::Int64(n) => Ok(n),
            MetricValue::Double(n) if n.fract() == 0.0 && n.is_finite() => Ok(n as i64),
            ref other => Err(MetricsError::InputType {
                name: name.to_string(),
                value: other.to_string(),
                expected: "i64",
            }),
        }
    }

    /// Converts this value to a JSON-safe representation for a summary
    /// document.
    pub fn to_json(&self) -> Json {
        match *self {
            MetricValue::Int64(n) => Json::from(n),
            MetricValue::Double(n) => serde_json::Number::from_f64(n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            MetricValue::String(ref s) => Json::String(s.clone()),
            MetricValue::Bool(b) => Json::Bool(b),
            MetricValue::Null => Json::Null,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Int64(n) => write!(f, "{n}"),
            MetricValue::Double(n) => write!(f, "{n}"),
            MetricValue::String(ref s) => write!(f, "{s:?}"),
            MetricValue::Bool(b) => write!(f, "{b}"),
            MetricValue::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int64(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int64(v as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Double(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Double(v as f64)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::String(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::String(v.to_string())
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(MetricValue::from(5i64).as_f64("m").unwrap(), 5.0);
        assert_eq!(MetricValue::from(5.0f64).as_i64("m").unwrap(), 5);
        assert!(MetricValue::from(5.5f64).as_i64("m").is_err());
        assert!(MetricValue::from("nope").as_f64("m").is_err());
    }

    #[test]
    fn json_round_trip() {
        assert_eq!(MetricValue::from(true).to_json(), Json::Bool(true));
        assert_eq!(MetricValue::Null.to_json(), Json::Null);
    }
}
