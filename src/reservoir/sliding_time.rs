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

//! A reservoir retaining every observation made within a trailing time window.

use crate::reservoir::{Reservoir, DEFAULT_WINDOW_SECS};
use crate::Clock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A reservoir retaining every observation whose timestamp is within
/// `window_secs` of the most recent `add`.
///
/// Unlike the other reservoirs, this one is unbounded in count: its size is
/// bounded only by the rate of observations times the window width.
pub struct SlidingTimeReservoir {
    window: Duration,
    count: AtomicU64,
    entries: Mutex<VecDeque<(Instant, f64)>>,
    clock: Arc<dyn Clock>,
}

impl Default for SlidingTimeReservoir {
    fn default() -> Self {
        SlidingTimeReservoir::new(DEFAULT_WINDOW_SECS)
    }
}

impl SlidingTimeReservoir {
    /// Creates a new reservoir with the given window, using the
    /// [`SystemClock`](crate::SystemClock) as its time source.
    ///
    /// # Panics
    ///
    /// Panics if `window_secs` is 0.
    pub fn new(window_secs: u64) -> Self {
        Self::new_with(window_secs, crate::SYSTEM_CLOCK.clone())
    }

    /// Creates a new reservoir using the provided [`Clock`] as its time source.
    ///
    /// # Panics
    ///
    /// Panics if `window_secs` is 0.
    pub fn new_with(window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        assert!(window_secs > 0, "sliding-time window must be greater than 0");
        SlidingTimeReservoir {
            window: Duration::from_secs(window_secs),
            count: AtomicU64::new(0),
            entries: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    fn prune(&self, entries: &mut VecDeque<(Instant, f64)>, now: Instant) {
        while let Some(&(ts, _)) = entries.front() {
            if now.saturating_duration_since(ts) > self.window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Reservoir for SlidingTimeReservoir {
    fn add(&self, value: f64) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.prune(&mut entries, now);
        entries.push_back((now, value));
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn size(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.prune(&mut entries, now);
        entries.len()
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.prune(&mut entries, now);
        entries.iter().map(|&(_, v)| (v, 1.0)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FakeClock;

    #[test]
    fn drops_entries_outside_window() {
        let clock = Arc::new(FakeClock::new());
        let reservoir = SlidingTimeReservoir::new_with(60, clock.clone());

        reservoir.add(1.0);
        clock.advance(Duration::from_secs(30));
        reservoir.add(2.0);
        clock.advance(Duration::from_secs(40));
        reservoir.add(3.0);

        let values: Vec<_> = reservoir.snapshot().into_iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec![2.0, 3.0]);
        assert_eq!(reservoir.count(), 3);
    }

    #[test]
    fn all_entries_present_initially() {
        let clock = Arc::new(FakeClock::new());
        let reservoir = SlidingTimeReservoir::new_with(10, clock.clone());
        for i in 0..5 {
            reservoir.add(i as f64);
        }
        assert_eq!(reservoir.size(), 5);
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn zero_window_panics() {
        SlidingTimeReservoir::new(0);
    }
}
