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

//! Forward-decay priority sampling (Cormode, Shkapenyuk, Srivastava, Xu 2009),
//! which exponentially weights in favor of recent values.

use crate::reservoir::{Reservoir, DEFAULT_ALPHA, DEFAULT_RESCALE_SECS, DEFAULT_SIZE};
use crate::Clock;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct State {
    // priority -> value; a BTreeMap keeps the minimum priority at the front
    // in O(log n), which is all the eviction rule below needs.
    entries: BTreeMap<u64, f64>,
    landmark: Instant,
    next_rescale_at: Instant,
    rng: StdRng,
}

/// A reservoir which exponentially weights in favor of recent values, using
/// forward-decay priority sampling.
///
/// Each observation `v` arriving at time `t` is assigned a priority
/// `p = exp(alpha * (t - landmark)) / u`, where `u` is drawn uniformly from
/// `(0, 1]`. The reservoir retains the `size` entries with the highest
/// priority seen so far; [`Reservoir::snapshot`] returns each value paired
/// with its priority as its weight, so recency is preserved through the
/// statistics kernel rather than being thrown away by the reservoir itself.
///
/// Priorities are periodically rebased ("rescaled") against a fresh landmark
/// time to keep them from overflowing as `t - landmark` grows unbounded.
pub struct ExpDecayingReservoir {
    cap: usize,
    alpha: f64,
    rescale_interval: Duration,
    count: AtomicU64,
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl Default for ExpDecayingReservoir {
    fn default() -> Self {
        ExpDecayingReservoir::new()
    }
}

impl ExpDecayingReservoir {
    /// Creates a new reservoir with the default size, alpha, and rescale
    /// interval, using the [`SystemClock`](crate::SystemClock).
    pub fn new() -> Self {
        Self::new_with(DEFAULT_SIZE, DEFAULT_ALPHA, DEFAULT_RESCALE_SECS, crate::SYSTEM_CLOCK.clone())
    }

    /// Creates a new reservoir with explicit parameters and clock.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0 or `alpha` is not positive.
    pub fn new_with(size: usize, alpha: f64, rescale_secs: u64, clock: Arc<dyn Clock>) -> Self {
        assert!(size > 0, "exp-decaying reservoir size must be greater than 0");
        assert!(alpha > 0.0, "exp-decaying reservoir alpha must be greater than 0");
        let now = clock.now();
        let rescale_interval = Duration::from_secs(rescale_secs.max(1));
        ExpDecayingReservoir {
            cap: size,
            alpha,
            rescale_interval,
            count: AtomicU64::new(0),
            state: Mutex::new(State {
                entries: BTreeMap::new(),
                landmark: now,
                next_rescale_at: now + rescale_interval,
                rng: StdRng::seed_from_u64(rand::random()),
            }),
            clock,
        }
    }
}

impl Reservoir for ExpDecayingReservoir {
    fn add(&self, value: f64) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut state = self.state.lock();

        if now >= state.next_rescale_at {
            rescale(&mut state, now, self.alpha, self.rescale_interval);
        }

        let age = now.saturating_duration_since(state.landmark).as_secs_f64();
        let u: f64 = loop {
            let u = state.rng.gen_range(0.0..1.0_f64);
            if u > 0.0 {
                break u;
            }
        };
        let priority = (self.alpha * age).exp() / u;
        let key = priority.to_bits();

        if state.entries.len() < self.cap {
            state.entries.insert(key, value);
        } else if let Some((&min_key, _)) = state.entries.iter().next() {
            if key > min_key {
                state.entries.remove(&min_key);
                state.entries.insert(key, value);
            }
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn size(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(&priority, &value)| (value, f64::from_bits(priority)))
            .collect()
    }
}

fn rescale(state: &mut State, now: Instant, alpha: f64, rescale_interval: Duration) {
    let old_landmark = state.landmark;
    let delta = now.saturating_duration_since(old_landmark).as_secs_f64();
    let factor = (-alpha * delta).exp();
    let rescaled: BTreeMap<u64, f64> = state
        .entries
        .iter()
        .map(|(&key, &value)| {
            let new_priority = f64::from_bits(key) * factor;
            (new_priority.to_bits(), value)
        })
        .collect();
    state.entries = rescaled;
    state.landmark = now;
    state.next_rescale_at = now + rescale_interval;
    tracing::debug!(entries = state.entries.len(), "rescaled exp-decaying reservoir");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FakeClock;

    #[test]
    fn never_exceeds_capacity() {
        let reservoir = ExpDecayingReservoir::new_with(10, 0.015, 3600, crate::SYSTEM_CLOCK.clone());
        for i in 0..1000 {
            reservoir.add(i as f64);
        }
        assert_eq!(reservoir.size(), 10);
        assert_eq!(reservoir.count(), 1000);
    }

    #[test]
    fn weights_are_positive_priorities() {
        let reservoir = ExpDecayingReservoir::new_with(10, 0.015, 3600, crate::SYSTEM_CLOCK.clone());
        for i in 0..10 {
            reservoir.add(i as f64);
        }
        for (_, weight) in reservoir.snapshot() {
            assert!(weight > 0.0);
        }
    }

    #[test]
    fn rescale_preserves_relative_order_of_priorities() {
        let clock = Arc::new(FakeClock::new());
        let reservoir = ExpDecayingReservoir::new_with(100, 0.015, 10, clock.clone());
        for i in 0..20 {
            reservoir.add(i as f64);
        }
        let before: Vec<f64> = reservoir
            .snapshot()
            .into_iter()
            .map(|(_, w)| w)
            .collect();
        let min_before = before.iter().cloned().fold(f64::INFINITY, f64::min);

        // force a rescale
        clock.advance(Duration::from_secs(11));
        reservoir.add(99.0);

        let after: Vec<f64> = reservoir.snapshot().into_iter().map(|(_, w)| w).collect();
        let min_after = after.iter().cloned().fold(f64::INFINITY, f64::min);

        // rescaling only rebases the landmark; it must not invert the
        // floor on stored priorities between rescales.
        assert!(min_after > 0.0);
        assert!(min_before > 0.0);
    }
}
