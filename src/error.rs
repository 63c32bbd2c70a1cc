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
use thiserror::Error;

/// Errors produced by this crate's public API.
///
/// All of these are synchronous, caller-visible failures; nothing in this
/// crate swallows an error internally. An HTTP collaborator exposing these
/// metrics over a wire protocol maps `InvalidMetricError` to 404 and
/// `DuplicateMetricError`/`InputTypeError` to 400.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A `notify` argument could not be coerced to the instrument's expected
    /// numeric type.
    #[error("value {value} could not be coerced to {expected} for metric {name:?}")]
    InputType {
        /// The name of the metric being updated.
        name: String,
        /// A description of the value that failed to coerce.
        value: String,
        /// The type the value needed to coerce to.
        expected: &'static str,
    },

    /// An operation referenced an unknown metric name.
    #[error("no metric registered with name {name:?}")]
    InvalidMetric {
        /// The unknown metric name.
        name: String,
    },

    /// An operation named an unknown reservoir or metric kind.
    #[error("unknown {kind} kind {value:?}")]
    InvalidKind {
        /// Which enumeration was being parsed (`"metric"` or `"reservoir"`).
        kind: &'static str,
        /// The unrecognized value.
        value: String,
    },

    /// `new_*` was called for a name that already exists with a different
    /// kind or different reservoir parameters.
    #[error("metric {name:?} is already registered as {existing} and cannot be redefined as {requested}")]
    DuplicateMetric {
        /// The metric name that collided.
        name: String,
        /// A description of the metric already registered under that name.
        existing: String,
        /// A description of the metric that was requested.
        requested: String,
    },

    /// A reservoir was configured with invalid parameters.
    #[error("invalid reservoir configuration: {reason}")]
    InvalidConfig {
        /// A human-readable explanation of what was invalid.
        reason: String,
    },
}
