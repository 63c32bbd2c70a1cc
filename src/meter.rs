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
use crate::{Clock, MetricsError};
use parking_lot::Mutex;
use serde_json::Map;
use std::convert::TryFrom;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const INTERVAL_SECS: u64 = 5;

/// The EWMA windows, in seconds, tracked by every [`Meter`]: one, five, and
/// fifteen minutes, plus a full day.
const WINDOWS_SECS: [u64; 4] = [60, 300, 900, 86_400];

struct State {
    count: i64,
    rates: [Ewma; 4],
}

/// A metric tracking the rate of occurrence of an event at four time
/// horizons (one/five/fifteen minutes and one day), plus the lifetime mean
/// rate.
///
/// The meter batches ticks: a 5-second tick interval drives each EWMA, and a
/// long idle gap is caught up with `⌊elapsed / T⌋` decay-only ticks rather
/// than being charged entirely to the next observation. `get()` also
/// triggers a catch-up tick before reading, so a snapshot taken after a long
/// idle period reflects the decay rather than a stale rate.
pub struct Meter {
    uncounted: AtomicI64,
    last_tick: AtomicU64,
    start_time: Instant,
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl Meter {
    /// Creates a new meter using the [`SystemClock`](crate::SystemClock).
    pub fn new() -> Meter {
        Meter::new_with(crate::SYSTEM_CLOCK.clone())
    }

    /// Creates a new meter using the provided [`Clock`] as its time source.
    pub fn new_with(clock: Arc<dyn Clock>) -> Meter {
        let start_time = clock.now();
        Meter {
            uncounted: AtomicI64::new(0),
            last_tick: AtomicU64::new(0),
            start_time,
            state: Mutex::new(State {
                count: 0,
                rates: WINDOWS_SECS.map(Ewma::new),
            }),
            clock,
        }
    }

    /// Ingests a dynamically-typed observation, coercing it to `i64`.
    pub fn notify(&self, name: &str, value: &MetricValue) -> Result<(), MetricsError> {
        let n = value.as_i64(name)?;
        self.mark_at(self.clock.now(), n);
        Ok(())
    }

    /// Marks the occurrence of `n` event(s) at the current time.
    pub fn mark(&self, n: i64) {
        self.mark_at(self.clock.now(), n);
    }

    fn mark_at(&self, time: Instant, n: i64) {
        self.tick_if_necessary(time);
        self.uncounted.fetch_add(n, Ordering::SeqCst);
    }

    /// Returns the number of events registered by the meter.
    pub fn count(&self) -> i64 {
        self.state.lock().count + self.uncounted.load(Ordering::SeqCst)
    }

    /// Returns the one-minute rolling average rate, in events per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary(self.clock.now());
        self.state.lock().rates[0].get()
    }

    /// Returns the five-minute rolling average rate, in events per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary(self.clock.now());
        self.state.lock().rates[1].get()
    }

    /// Returns the fifteen-minute rolling average rate, in events per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary(self.clock.now());
        self.state.lock().rates[2].get()
    }

    /// Returns the one-day rolling average rate, in events per second.
    pub fn day_rate(&self) -> f64 {
        self.tick_if_necessary(self.clock.now());
        self.state.lock().rates[3].get()
    }

    /// Returns the lifetime mean rate of events, in events per second.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count() as f64;
        if count == 0.0 {
            0.0
        } else {
            let elapsed = (self.clock.now() - self.start_time).as_secs_f64();
            if elapsed <= 0.0 {
                0.0
            } else {
                count / elapsed
            }
        }
    }

    /// Returns the computed summary: `{kind: "meter", count, mean, one, five,
    /// fifteen, day}`, after triggering a catch-up tick.
    pub fn get(&self) -> Map<String, serde_json::Value> {
        self.tick_if_necessary(self.clock.now());
        let mut map = Map::new();
        map.insert("kind".to_string(), MetricValue::from("meter").to_json());
        map.insert("count".to_string(), serde_json::Value::from(self.count()));
        map.insert("mean".to_string(), MetricValue::from(self.mean_rate()).to_json());
        let state = self.state.lock();
        map.insert("one".to_string(), MetricValue::from(state.rates[0].get()).to_json());
        map.insert("five".to_string(), MetricValue::from(state.rates[1].get()).to_json());
        map.insert(
            "fifteen".to_string(),
            MetricValue::from(state.rates[2].get()).to_json(),
        );
        map.insert("day".to_string(), MetricValue::from(state.rates[3].get()).to_json());
        map
    }

    /// Returns the raw lifetime count.
    pub fn raw(&self) -> i64 {
        self.count()
    }

    fn tick_if_necessary(&self, time: Instant) {
        let old_tick = self.last_tick.load(Ordering::SeqCst);
        let new_tick = (time - self.start_time).as_secs();
        let age = new_tick.saturating_sub(old_tick);

        if age < INTERVAL_SECS {
            return;
        }

        let new_interval_start_tick = new_tick - age % INTERVAL_SECS;
        if self
            .last_tick
            .compare_exchange(old_tick, new_interval_start_tick, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // another thread has already ticked for us
            return;
        }

        let required_ticks = age / INTERVAL_SECS;
        let mut state = self.state.lock();

        let uncounted = self.uncounted.swap(0, Ordering::SeqCst);
        state.count += uncounted;

        for rate in &mut state.rates {
            rate.tick(uncounted);
            rate.decay(required_ticks - 1);
        }
    }
}

impl Default for Meter {
    fn default() -> Meter {
        Meter::new()
    }
}

/// Exponentially-weighted moving average, clocked at a fixed `T = 5s` tick
/// interval.
struct Ewma {
    rate: f64,
    alpha: f64,
    initialized: bool,
}

impl Ewma {
    fn new(window_secs: u64) -> Ewma {
        Ewma {
            rate: 0.,
            alpha: 1. - (-(INTERVAL_SECS as f64) / window_secs as f64).exp(),
            initialized: false,
        }
    }

    /// Advances one tick with `count` pending (uncounted) events.
    fn tick(&mut self, count: i64) {
        let instant_rate = count as f64 / INTERVAL_SECS as f64;
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// Equivalent to calling `tick(0)` `ticks` times, but isn't linear in `ticks`.
    ///
    /// x1 = x0 + alpha * (0 - x0) = x0 * (1 - alpha)
    /// x2 = x1 * (1 - alpha) = x0 * (1 - alpha)^2
    fn decay(&mut self, ticks: u64) {
        match i32::try_from(ticks) {
            Ok(ticks) => self.rate *= (1. - self.alpha).powi(ticks),
            Err(_) => self.rate = 0.,
        }
    }

    fn get(&self) -> f64 {
        self.rate
    }
}
