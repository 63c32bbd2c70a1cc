// Copyright 2020 Palantir Technologies, Inc.
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
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) static SYSTEM_CLOCK: Lazy<Arc<SystemClock>> = Lazy::new(|| Arc::new(SystemClock));

/// A source of monotonic time.
///
/// Reservoirs, EWMAs, and meters all take a `Clock` by reference rather than
/// calling `Instant::now()` directly, so their time-driven behavior can be
/// exercised deterministically in tests via [`FakeClock`].
pub trait Clock: 'static + Sync + Send {
    /// Returns the current time.
    fn now(&self) -> Instant;
}

/// A `Clock` implementation which uses the system monotonic clock.
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A `Clock` implementation fully controlled by the caller.
///
/// `FakeClock` never advances on its own; callers step it forward explicitly
/// with [`FakeClock::advance`]. This is the only way to exercise the
/// time-dependent behavior of reservoirs, EWMAs, and meters deterministically.
#[derive(Default)]
pub struct FakeClock {
    now: Mutex<Option<Instant>>,
}

impl FakeClock {
    /// Creates a new fake clock initialized to the current system time.
    pub fn new() -> FakeClock {
        FakeClock {
            now: Mutex::new(Some(Instant::now())),
        }
    }

    /// Advances the clock forward by the given duration.
    pub fn advance(&self, dur: Duration) {
        let mut now = self.now.lock();
        let base = now.get_or_insert_with(Instant::now);
        *base += dur;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().get_or_insert_with(Instant::now)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        let t1 = clock.now();
        assert_eq!(t1 - t0, Duration::from_secs(5));
    }
}
