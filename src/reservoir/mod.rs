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
use crate::MetricsError;
use std::sync::Arc;

pub mod exp_decaying;
pub mod sliding_count;
pub mod sliding_time;
pub mod uniform;

pub use crate::reservoir::exp_decaying::ExpDecayingReservoir;
pub use crate::reservoir::sliding_count::SlidingCountReservoir;
pub use crate::reservoir::sliding_time::SlidingTimeReservoir;
pub use crate::reservoir::uniform::UniformReservoir;

/// The default capacity used by reservoirs which bound a sample by count.
pub const DEFAULT_SIZE: usize = 1028;

/// The default decay rate of an [`ExpDecayingReservoir`].
pub const DEFAULT_ALPHA: f64 = 0.015;

/// The default rescale interval, in seconds, of an [`ExpDecayingReservoir`].
pub const DEFAULT_RESCALE_SECS: u64 = 3600;

/// The default window, in seconds, of a [`SlidingTimeReservoir`].
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// A bounded, statistically representative sample of a numeric stream.
///
/// Every reservoir variant guards its own mutable state behind an internal
/// lock (per-reservoir lock granularity), so `add` and `snapshot` may be
/// called concurrently from any number of threads without external
/// synchronization.
pub trait Reservoir: 'static + Sync + Send {
    /// Adds a (possibly weighted) observation to the reservoir.
    fn add(&self, value: f64);

    /// Returns the total number of `add` calls made so far, independent of
    /// how many are currently retained in the sample.
    fn count(&self) -> u64;

    /// Returns the number of observations currently retained in the sample.
    fn size(&self) -> usize;

    /// Returns a read-only copy of the current sample, as `(value, weight)`
    /// pairs. Weight is `1.0` for every reservoir except
    /// [`ExpDecayingReservoir`], whose weights are the stored priorities.
    fn snapshot(&self) -> Vec<(f64, f64)>;
}

/// The reservoir discipline and parameters used to back a new histogram.
///
/// Rather than four separate constructors, [`crate::MetricRegistry::new_histogram`]
/// takes one of these to pick and configure the underlying reservoir.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReservoirSpec {
    /// Algorithm R uniform sampling over the full stream.
    Uniform {
        /// Maximum number of retained samples.
        size: usize,
    },
    /// A FIFO ring buffer of the most recent `size` observations.
    SlidingCount {
        /// Maximum number of retained samples.
        size: usize,
    },
    /// A time-windowed buffer of observations within the last `window_secs` seconds.
    SlidingTime {
        /// Window width, in seconds.
        window_secs: u64,
    },
    /// Forward-decay priority sampling (Cormode et al.).
    ExpDecaying {
        /// Maximum number of retained samples.
        size: usize,
        /// Decay rate; larger values favor more recent observations more strongly.
        alpha: f64,
        /// How often (in seconds) the decay landmark is rebased.
        rescale_secs: u64,
    },
}

impl Default for ReservoirSpec {
    fn default() -> Self {
        ReservoirSpec::Uniform { size: DEFAULT_SIZE }
    }
}

impl ReservoirSpec {
    /// The name of this reservoir kind, as used by [`ReservoirSpec::parse`]
    /// and the registry's kind-mismatch diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ReservoirSpec::Uniform { .. } => "uniform",
            ReservoirSpec::SlidingCount { .. } => "sliding_window",
            ReservoirSpec::SlidingTime { .. } => "sliding_time",
            ReservoirSpec::ExpDecaying { .. } => "exp_decaying",
        }
    }

    /// Parses a reservoir-type name, paired with its defaulted parameters.
    pub fn parse(name: &str) -> Result<ReservoirSpec, MetricsError> {
        match name {
            "uniform" => Ok(ReservoirSpec::Uniform { size: DEFAULT_SIZE }),
            "sliding_window" => Ok(ReservoirSpec::SlidingCount { size: DEFAULT_SIZE }),
            "sliding_time" => Ok(ReservoirSpec::SlidingTime {
                window_secs: DEFAULT_WINDOW_SECS,
            }),
            "exp_decaying" => Ok(ReservoirSpec::ExpDecaying {
                size: DEFAULT_SIZE,
                alpha: DEFAULT_ALPHA,
                rescale_secs: DEFAULT_RESCALE_SECS,
            }),
            other => Err(MetricsError::InvalidKind {
                kind: "reservoir",
                value: other.to_string(),
            }),
        }
    }

    /// Validates this spec's parameters (reservoir size must be positive,
    /// window must be positive, `alpha` must be positive).
    pub fn validate(&self) -> Result<(), MetricsError> {
        match *self {
            ReservoirSpec::Uniform { size } | ReservoirSpec::SlidingCount { size } if size == 0 => {
                Err(MetricsError::InvalidConfig {
                    reason: "reservoir size must be greater than 0".to_string(),
                })
            }
            ReservoirSpec::SlidingTime { window_secs } if window_secs == 0 => {
                Err(MetricsError::InvalidConfig {
                    reason: "window must be greater than 0".to_string(),
                })
            }
            ReservoirSpec::ExpDecaying { size, alpha, .. } if size == 0 || alpha <= 0.0 => {
                Err(MetricsError::InvalidConfig {
                    reason: "exp_decaying reservoir requires size > 0 and alpha > 0".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Builds the boxed reservoir this spec describes, using `clock` as its
    /// time source.
    pub fn build(&self, clock: Arc<dyn crate::Clock>) -> Box<dyn Reservoir> {
        match *self {
            ReservoirSpec::Uniform { size } => Box::new(UniformReservoir::new(size)),
            ReservoirSpec::SlidingCount { size } => Box::new(SlidingCountReservoir::new(size)),
            ReservoirSpec::SlidingTime { window_secs } => {
                Box::new(SlidingTimeReservoir::new_with(window_secs, clock))
            }
            ReservoirSpec::ExpDecaying {
                size,
                alpha,
                rescale_secs,
            } => Box::new(ExpDecayingReservoir::new_with(
                size,
                alpha,
                rescale_secs,
                clock,
            )),
        }
    }
}
