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
//! Thin convenience wrappers around a [`Histogram`] or [`Meter`] for timing
//! or counting calls, built on the same RAII drop-guard idiom used by a
//! standalone timer instrument.
use crate::{Histogram, Meter};
use std::time::Instant;

/// Runs `f`, recording its wall-clock duration (in nanoseconds) into
/// `histogram`, and returns `f`'s result.
///
/// Timing is guarded by a drop guard, so the duration is still recorded if
/// `f` unwinds.
pub fn time_histogram<T>(histogram: &Histogram, f: impl FnOnce() -> T) -> T {
    let _guard = TimeGuard {
        histogram,
        start: Instant::now(),
    };
    f()
}

/// Marks one occurrence on `meter` for every call to `f`, then runs `f` and
/// returns its result.
pub fn count_calls<T>(meter: &Meter, f: impl FnOnce() -> T) -> T {
    meter.mark(1);
    f()
}

struct TimeGuard<'a> {
    histogram: &'a Histogram,
    start: Instant,
}

impl Drop for TimeGuard<'_> {
    fn drop(&mut self) {
        let nanos = self.start.elapsed().as_nanos() as f64;
        let _ = self.histogram.notify("elapsed_nanos", &crate::value::MetricValue::from(nanos));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reservoir::ReservoirSpec;

    #[test]
    fn time_histogram_records_a_duration_and_returns_closure_value() {
        let histogram = Histogram::with_spec(ReservoirSpec::default(), crate::SYSTEM_CLOCK.clone());
        let result = time_histogram(&histogram, || 2 + 2);
        assert_eq!(result, 4);
        assert_eq!(histogram.count(), 1);
        assert!(histogram.raw()[0] >= 0.0);
    }

    #[test]
    fn time_histogram_records_even_on_unwind() {
        let histogram = Histogram::with_spec(ReservoirSpec::default(), crate::SYSTEM_CLOCK.clone());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            time_histogram(&histogram, || -> i32 { panic!("boom") })
        }));
        assert!(result.is_err());
        assert_eq!(histogram.count(), 1);
    }

    #[test]
    fn count_calls_marks_the_meter_once_per_call() {
        let meter = Meter::new();
        count_calls(&meter, || {});
        count_calls(&meter, || {});
        assert_eq!(meter.count(), 2);
    }
}
