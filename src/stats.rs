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

//! Numerically stable moments, percentiles, and auto-binned histograms over a
//! (possibly weighted) sample.
//!
//! This is the statistics kernel that powers [`crate::Histogram::get`]. It is
//! deliberately reservoir-agnostic: every [`crate::Reservoir`] hands it the
//! same `(value, weight)` pairs, and weight is what lets the
//! [`crate::ExpDecayingReservoir`]'s decay survive into the summary rather
//! than being silently discarded.

use crate::value::MetricValue;
use serde_json::Map;
use std::collections::BTreeMap;

/// The percentiles reported in every histogram summary, in ascending order.
pub const PERCENTILES: [f64; 6] = [50.0, 75.0, 90.0, 95.0, 99.0, 99.9];

/// A computed statistical summary of a (possibly weighted) sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Number of samples.
    pub n: u64,
    /// Minimum observed value.
    pub min: f64,
    /// Maximum observed value.
    pub max: f64,
    /// Weighted arithmetic mean.
    pub arithmetic_mean: f64,
    /// Bessel-corrected weighted sample variance.
    pub variance: f64,
    /// Square root of `variance`.
    pub standard_deviation: f64,
    /// Weighted geometric mean; 0 if any value is non-positive.
    pub geometric_mean: f64,
    /// Weighted harmonic mean; 0 if any value is non-positive.
    pub harmonic_mean: f64,
    /// The 50th percentile.
    pub median: f64,
    /// `(percentile, value)` pairs for [`PERCENTILES`].
    pub percentile: Vec<(f64, f64)>,
    /// Weighted third standardized moment; 0 if variance is 0.
    pub skewness: f64,
    /// Weighted fourth standardized moment minus 3 (excess kurtosis); 0 if variance is 0.
    pub kurtosis: f64,
    /// `(bin_upper_bound, count)` pairs from automatic binning.
    pub histogram: Vec<(f64, u64)>,
}

impl Summary {
    /// Computes a summary from an empty sample: all fields zero.
    pub fn empty() -> Summary {
        Summary {
            n: 0,
            min: 0.0,
            max: 0.0,
            arithmetic_mean: 0.0,
            variance: 0.0,
            standard_deviation: 0.0,
            geometric_mean: 0.0,
            harmonic_mean: 0.0,
            median: 0.0,
            percentile: PERCENTILES.iter().map(|&p| (p, 0.0)).collect(),
            skewness: 0.0,
            kurtosis: 0.0,
            histogram: vec![(0.0, 0)],
        }
    }

    /// Renders this summary as a JSON-safe mapping with `kind: "histogram"`.
    pub fn to_summary_map(&self) -> Map<String, serde_json::Value> {
        let mut map = Map::new();
        map.insert("kind".to_string(), MetricValue::from("histogram").to_json());
        map.insert("n".to_string(), serde_json::Value::from(self.n));
        map.insert("min".to_string(), MetricValue::from(self.min).to_json());
        map.insert("max".to_string(), MetricValue::from(self.max).to_json());
        map.insert(
            "arithmetic_mean".to_string(),
            MetricValue::from(self.arithmetic_mean).to_json(),
        );
        map.insert("variance".to_string(), MetricValue::from(self.variance).to_json());
        map.insert(
            "standard_deviation".to_string(),
            MetricValue::from(self.standard_deviation).to_json(),
        );
        map.insert(
            "geometric_mean".to_string(),
            MetricValue::from(self.geometric_mean).to_json(),
        );
        map.insert(
            "harmonic_mean".to_string(),
            MetricValue::from(self.harmonic_mean).to_json(),
        );
        map.insert("median".to_string(), MetricValue::from(self.median).to_json());
        map.insert(
            "percentile".to_string(),
            serde_json::Value::Array(
                self.percentile
                    .iter()
                    .map(|&(p, v)| serde_json::json!({"p": p, "value": v}))
                    .collect(),
            ),
        );
        map.insert("skewness".to_string(), MetricValue::from(self.skewness).to_json());
        map.insert("kurtosis".to_string(), MetricValue::from(self.kurtosis).to_json());
        map.insert(
            "histogram".to_string(),
            serde_json::Value::Array(
                self.histogram
                    .iter()
                    .map(|&(bound, count)| serde_json::json!({"upper_bound": bound, "count": count}))
                    .collect(),
            ),
        );
        map
    }
}

/// Computes the statistical summary of a weighted sample.
///
/// `sample` is `(value, weight)` pairs as returned by [`crate::Reservoir::snapshot`].
/// Returns [`Summary::empty`] if `sample` is empty.
pub fn summarize(sample: &[(f64, f64)]) -> Summary {
    if sample.is_empty() {
        return Summary::empty();
    }

    let n = sample.len() as u64;
    let total_weight = compensated_sum(sample.iter().map(|&(_, w)| w));
    let min = sample.iter().map(|&(v, _)| v).fold(f64::INFINITY, f64::min);
    let max = sample.iter().map(|&(v, _)| v).fold(f64::NEG_INFINITY, f64::max);

    let mean = compensated_sum(sample.iter().map(|&(v, w)| v * w)) / total_weight;

    // Two-pass variance: first pass computes the mean (above), second pass
    // accumulates squared deviations from it with compensated summation.
    let variance = if n < 2 {
        0.0
    } else {
        let sum_sq_dev = compensated_sum(sample.iter().map(|&(v, w)| w * (v - mean).powi(2)));
        let sum_sq_weight = compensated_sum(sample.iter().map(|&(_, w)| w * w));
        // Reliability-weighted Bessel correction: reduces to the familiar
        // `total_weight - 1` when every weight is 1, but doesn't collapse
        // unequal weights (e.g. ExpDecayingReservoir priorities) to that case.
        sum_sq_dev / (total_weight - sum_sq_weight / total_weight)
    };
    let variance = if variance.is_finite() { variance.max(0.0) } else { 0.0 };
    let standard_deviation = variance.sqrt();

    let all_positive = sample.iter().all(|&(v, _)| v > 0.0);
    let geometric_mean = if all_positive {
        (sample.iter().map(|&(v, w)| w * v.ln()).sum::<f64>() / total_weight).exp()
    } else {
        0.0
    };
    let harmonic_mean = if all_positive {
        total_weight / sample.iter().map(|&(v, w)| w / v).sum::<f64>()
    } else {
        0.0
    };

    let (skewness, kurtosis) = if variance == 0.0 {
        (0.0, 0.0)
    } else {
        // Compensated summation of (v - mean)^k, never raw power sums, per
        // the stability requirement above.
        let m3 = compensated_sum(sample.iter().map(|&(v, w)| w * (v - mean).powi(3))) / total_weight;
        let m4 = compensated_sum(sample.iter().map(|&(v, w)| w * (v - mean).powi(4))) / total_weight;
        let sigma3 = standard_deviation.powi(3);
        let sigma4 = standard_deviation.powi(4);
        let skew = if sigma3 == 0.0 { 0.0 } else { m3 / sigma3 };
        let kurt = if sigma4 == 0.0 { 0.0 } else { m4 / sigma4 - 3.0 };
        (skew, kurt)
    };

    let cdf = weighted_cdf(sample, total_weight);
    let median = percentile_value(&cdf, 50.0);
    let percentile = PERCENTILES.iter().map(|&p| (p, percentile_value(&cdf, p))).collect();

    let histogram = auto_bin(sample, min, max, n);

    Summary {
        n,
        min,
        max,
        arithmetic_mean: mean,
        variance,
        standard_deviation,
        geometric_mean,
        harmonic_mean,
        median,
        percentile,
        skewness,
        kurtosis,
        histogram,
    }
}

/// Builds a cumulative distribution: values sorted ascending, each paired
/// with its plotting position — the fraction of total weight accumulated at
/// its *midpoint* rather than its trailing edge. For unweighted samples this
/// is the Hazen convention `(i - 0.5) / n`, which is what makes
/// `median([1, 2, 3]) == 2` and `p50([1, 2, 3, 4]) == 2.5` fall out of
/// ordinary linear interpolation between order statistics.
fn weighted_cdf(sample: &[(f64, f64)], total_weight: f64) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = sample.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut cumulative = 0.0;
    sorted
        .into_iter()
        .map(|(v, w)| {
            let midpoint = cumulative + w / 2.0;
            cumulative += w;
            (v, midpoint / total_weight)
        })
        .collect()
}

/// Returns the value at the given percentile (0-100) of a weighted CDF built
/// by [`weighted_cdf`], via linear interpolation between the two surrounding
/// order statistics.
fn percentile_value(cdf: &[(f64, f64)], p: f64) -> f64 {
    if cdf.is_empty() {
        return 0.0;
    }
    if cdf.len() == 1 {
        return cdf[0].0;
    }

    let target = p / 100.0;
    if target <= cdf[0].1 {
        return cdf[0].0;
    }
    if target >= cdf[cdf.len() - 1].1 {
        return cdf[cdf.len() - 1].0;
    }

    for window in cdf.windows(2) {
        let (lo_v, lo_c) = window[0];
        let (hi_v, hi_c) = window[1];
        if target <= hi_c {
            if hi_c == lo_c {
                return hi_v;
            }
            let frac = (target - lo_c) / (hi_c - lo_c);
            return lo_v + frac * (hi_v - lo_v);
        }
    }
    cdf[cdf.len() - 1].0
}

/// Automatically bins the (unweighted) values into a histogram: bin width
/// 1.0 if the range is less than 1, else
/// `(max - min) / ceil(sqrt(n))` rounded to one significant digit. The final
/// bin is closed on the right; all others are half-open `[lower, upper)`.
fn auto_bin(sample: &[(f64, f64)], min: f64, max: f64, n: u64) -> Vec<(f64, u64)> {
    let range = max - min;
    let h = if range < 1.0 {
        1.0
    } else {
        round_to_one_sig_fig(range / (n as f64).sqrt().ceil())
    };
    let h = if h <= 0.0 { 1.0 } else { h };

    let mut bounds = Vec::new();
    let mut upper = min + h;
    while upper < max {
        bounds.push(upper);
        upper += h;
    }
    bounds.push(max.max(min + h));

    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    for (idx, _) in bounds.iter().enumerate() {
        counts.insert(idx as u64, 0);
    }

    for &(v, _) in sample {
        let mut idx = bounds.partition_point(|&b| v >= b);
        if idx >= bounds.len() {
            idx = bounds.len() - 1;
        }
        *counts.get_mut(&(idx as u64)).unwrap() += 1;
    }

    bounds
        .into_iter()
        .enumerate()
        .map(|(idx, bound)| (bound, counts[&(idx as u64)]))
        .collect()
}

fn round_to_one_sig_fig(x: f64) -> f64 {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let magnitude = 10f64.powi(x.abs().log10().floor() as i32);
    (x / magnitude).round() * magnitude
}

/// Sums `terms` with Neumaier (improved Kahan) compensated summation, so the
/// third/fourth central moments don't lose precision to the catastrophic
/// cancellation that a plain `.sum()` suffers when the running total and the
/// next term are close in magnitude but opposite in sign.
fn compensated_sum(terms: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut c = 0.0;
    for t in terms {
        let new_sum = sum + t;
        if sum.abs() >= t.abs() {
            c += (sum - new_sum) + t;
        } else {
            c += (t - new_sum) + sum;
        }
        sum = new_sum;
    }
    sum + c
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn unweighted(values: &[f64]) -> Vec<(f64, f64)> {
        values.iter().map(|&v| (v, 1.0)).collect()
    }

    #[test]
    fn empty_sample() {
        let summary = summarize(&[]);
        assert_eq!(summary.n, 0);
        assert_eq!(summary.histogram, vec![(0.0, 0)]);
        assert!(summary.percentile.iter().all(|&(_, v)| v == 0.0));
    }

    #[test]
    fn constant_sample_round_trips() {
        let sample = unweighted(&[5.0; 20]);
        let summary = summarize(&sample);
        assert_eq!(summary.n, 20);
        assert_eq!(summary.min, 5.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.arithmetic_mean, 5.0);
        assert_eq!(summary.variance, 0.0);
        assert_eq!(summary.median, 5.0);
        for &(_, v) in &summary.percentile {
            assert_eq!(v, 5.0);
        }
    }

    #[test]
    fn three_point_sample_matches_known_moments() {
        let sample = unweighted(&[1.0, 2.0, 3.0]);
        let summary = summarize(&sample);
        assert_eq!(summary.n, 3);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 3.0);
        assert_approx_eq!(summary.arithmetic_mean, 2.0, 1e-9);
        assert_approx_eq!(summary.median, 2.0, 1e-9);
        assert_approx_eq!(summary.variance, 1.0, 1e-9);
        assert_approx_eq!(summary.standard_deviation, 1.0, 1e-9);
        assert_approx_eq!(summary.skewness, 0.0, 1e-9);
        assert_approx_eq!(summary.kurtosis, -2.3333333, 1e-6);
        assert_approx_eq!(summary.harmonic_mean, 1.6363636, 1e-5);
        assert_approx_eq!(summary.geometric_mean, 1.8171206, 1e-5);
    }

    #[test]
    fn weighted_sample_shifts_mean_toward_heavier_weight() {
        let sample = vec![(1.0, 10.0), (100.0, 1.0)];
        let summary = summarize(&sample);
        assert!(summary.arithmetic_mean < 50.0);
    }

    #[test]
    fn percentiles_interpolate() {
        let sample = unweighted(&[1.0, 2.0, 3.0, 4.0]);
        let summary = summarize(&sample);
        let p50 = summary.percentile.iter().find(|&&(p, _)| p == 50.0).unwrap().1;
        assert_approx_eq!(p50, 2.5, 1e-9);
    }

    #[test]
    fn histogram_bins_cover_every_sample_exactly_once() {
        let sample = unweighted(&[1.0, 2.0, 3.0]);
        let summary = summarize(&sample);
        let total: u64 = summary.histogram.iter().map(|&(_, c)| c).sum();
        assert_eq!(total, 3);
        // bins ascending, last bin closed on the right so max is counted.
        let bounds: Vec<f64> = summary.histogram.iter().map(|&(b, _)| b).collect();
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*bounds.last().unwrap(), 3.0);
    }

    #[test]
    fn negative_values_zero_geometric_and_harmonic_mean() {
        let sample = unweighted(&[-1.0, 2.0, 3.0]);
        let summary = summarize(&sample);
        assert_eq!(summary.geometric_mean, 0.0);
        assert_eq!(summary.harmonic_mean, 0.0);
    }
}
