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

//! A uniform random sample of the entire stream (Algorithm R, Vitter 1985).

use crate::reservoir::{Reservoir, DEFAULT_SIZE};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};

struct State {
    values: Vec<f64>,
    rng: StdRng,
}

/// A reservoir holding a uniform random sample of the full stream seen so
/// far, bounded at `size` entries.
///
/// Once `count() >= size`, every observation that has ever been added has
/// equal probability `size / count()` of being represented in the current
/// sample.
pub struct UniformReservoir {
    size: usize,
    count: AtomicU64,
    state: Mutex<State>,
}

impl Default for UniformReservoir {
    fn default() -> Self {
        UniformReservoir::new(DEFAULT_SIZE)
    }
}

impl UniformReservoir {
    /// Creates a new reservoir with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        Self::with_seed(size, rand::random())
    }

    /// Creates a new reservoir seeded deterministically, for reproducible tests.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn with_seed(size: usize, seed: u64) -> Self {
        assert!(size > 0, "uniform reservoir size must be greater than 0");
        UniformReservoir {
            size,
            count: AtomicU64::new(0),
            state: Mutex::new(State {
                values: Vec::with_capacity(size),
                rng: StdRng::seed_from_u64(seed),
            }),
        }
    }
}

impl Reservoir for UniformReservoir {
    fn add(&self, value: f64) {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock();
        if (count as usize) <= self.size {
            state.values.push(value);
        } else {
            let j = state.rng.gen_range(0..count);
            if (j as usize) < self.size {
                state.values[j as usize] = value;
            }
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn size(&self) -> usize {
        self.state.lock().values.len()
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        self.state.lock().values.iter().map(|&v| (v, 1.0)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let reservoir = UniformReservoir::new(10);
        for i in 0..10_000 {
            reservoir.add(i as f64);
        }
        assert_eq!(reservoir.size(), 10);
        assert_eq!(reservoir.count(), 10_000);
        assert_eq!(reservoir.snapshot().len(), 10);
    }

    #[test]
    fn fill_phase_keeps_everything() {
        let reservoir = UniformReservoir::new(5);
        for i in 0..5 {
            reservoir.add(i as f64);
        }
        let mut values: Vec<_> = reservoir.snapshot().into_iter().map(|(v, _)| v).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn deterministic_with_seed() {
        let a = UniformReservoir::with_seed(5, 42);
        let b = UniformReservoir::with_seed(5, 42);
        for i in 0..1000 {
            a.add(i as f64);
            b.add(i as f64);
        }
        let mut sa: Vec<_> = a.snapshot().into_iter().map(|(v, _)| v).collect();
        let mut sb: Vec<_> = b.snapshot().into_iter().map(|(v, _)| v).collect();
        sa.sort_by(|x, y| x.partial_cmp(y).unwrap());
        sb.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(sa, sb);
    }

    #[test]
    fn approximate_uniformity() {
        let n = 200u64;
        let k = 20usize;
        let trials = 4_000u64;
        let mut counts = vec![0u64; n as usize];

        for seed in 0..trials {
            let reservoir = UniformReservoir::with_seed(k, seed);
            for i in 0..n {
                reservoir.add(i as f64);
            }
            for (v, _) in reservoir.snapshot() {
                counts[v as usize] += 1;
            }
        }

        let expected = trials as f64 * k as f64 / n as f64;
        for (i, &c) in counts.iter().enumerate() {
            let ratio = c as f64 / expected;
            assert!(
                (0.7..1.3).contains(&ratio),
                "item {i}: count={c} expected={expected} ratio={ratio}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn zero_size_panics() {
        UniformReservoir::new(0);
    }
}
