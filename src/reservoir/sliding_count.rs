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

//! A fixed-size FIFO window of the most recent observations.

use crate::reservoir::{Reservoir, DEFAULT_SIZE};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// A reservoir retaining exactly the last `size` observations, dropping the
/// oldest entry on overflow.
pub struct SlidingCountReservoir {
    size: usize,
    count: AtomicU64,
    values: Mutex<VecDeque<f64>>,
}

impl Default for SlidingCountReservoir {
    fn default() -> Self {
        SlidingCountReservoir::new(DEFAULT_SIZE)
    }
}

impl SlidingCountReservoir {
    /// Creates a new reservoir with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "sliding-count reservoir size must be greater than 0");
        SlidingCountReservoir {
            size,
            count: AtomicU64::new(0),
            values: Mutex::new(VecDeque::with_capacity(size)),
        }
    }
}

impl Reservoir for SlidingCountReservoir {
    fn add(&self, value: f64) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let mut values = self.values.lock();
        if values.len() == self.size {
            values.pop_front();
        }
        values.push_back(value);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn size(&self) -> usize {
        self.values.lock().len()
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        self.values.lock().iter().map(|&v| (v, 1.0)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keeps_most_recent() {
        let reservoir = SlidingCountReservoir::new(3);
        for i in 1..=5 {
            reservoir.add(i as f64);
        }
        assert_eq!(reservoir.count(), 5);
        assert_eq!(reservoir.size(), 3);
        let values: Vec<_> = reservoir.snapshot().into_iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let reservoir = SlidingCountReservoir::new(10);
        for i in 0..10_000 {
            reservoir.add(i as f64);
        }
        assert_eq!(reservoir.size(), 10);
        assert_eq!(reservoir.count(), 10_000);
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn zero_size_panics() {
        SlidingCountReservoir::new(0);
    }
}
