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
//! An in-process, thread-safe application metrics library.
//!
//! The design of the crate is based fairly closely off of the [Dropwizard Metrics] library from the Java ecosystem.
//!
//! Four instrument kinds are provided: [`Counter`], [`Gauge`], [`Histogram`],
//! and [`Meter`]. A [`MetricRegistry`] stores them under flat string names
//! and groups them with an orthogonal tag index; a process-wide
//! [`default_registry`] and free-function facade are available in
//! [`default_registry`](mod@default_registry) for callers who don't want to
//! thread a handle through their own code.
//!
//! # Examples
//!
//! ```
//! use appmetrics::MetricRegistry;
//!
//! // A `MetricRegistry` stores metrics under flat string names.
//! let registry = MetricRegistry::new();
//!
//! let yaks_shaved = registry.new_counter("yaks.shaved").unwrap();
//! let request_durations = registry.new_histogram("server.requests", Default::default()).unwrap();
//!
//! // do some work and record some values.
//! for yak in find_some_yaks() {
//!     shave_yak(yak);
//!     yaks_shaved.inc();
//! }
//!
//! // Group related metrics with a tag, then read every metric under it at once.
//! registry.tag("yaks.shaved", "yaks").unwrap();
//! for (name, summary) in registry.by_tag("yaks") {
//!     println!("{} = {:?}", name, summary);
//! }
//!
//! println!("request duration percentiles: {:?}", request_durations.summary().percentile);
//!
//! # fn find_some_yaks() -> &'static [()] { &[] }
//! # fn shave_yak(_: &()) {}
//! ```
//!
//! [Dropwizard Metrics]: https://github.com/dropwizard/metrics
#![warn(missing_docs)]

pub use crate::clock::*;
pub use crate::counter::*;
pub use crate::default_registry::{
    by_tag, default_registry, delete, metric, names, new_counter, new_gauge, new_histogram, new_meter,
    reset_default_registry, tag, tags, untag,
};
pub use crate::error::*;
pub use crate::gauge::*;
pub use crate::histogram::*;
pub use crate::meter::*;
pub use crate::registry::*;
pub use crate::reservoir::*;
pub use crate::value::*;

pub mod decorator;
mod clock;
mod counter;
mod default_registry;
mod error;
mod gauge;
mod histogram;
mod meter;
mod registry;
mod reservoir;
pub mod stats;
mod value;
