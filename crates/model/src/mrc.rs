// SPDX-License-Identifier: Apache-2.0

//! Piecewise-linear miss-ratio curves over ghost-cache ticks.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// A non-increasing mapping from cache size to expected miss ratio.
///
/// Measured ghost counters are noisy and need not be monotone; the
/// constructor coerces the raw ratios to their monotone envelope by taking
/// the cumulative minimum from right to left. Lookups clamp below the first
/// tick and above the last and interpolate linearly in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissRatioCurve {
    ticks: Vec<u64>,
    ratios: Vec<f64>,
}

impl MissRatioCurve {
    /// Build a curve from parallel tick/ratio arrays.
    ///
    /// Ratios are clamped into `[0, 1]` before the envelope is applied.
    pub fn new(ticks: Vec<u64>, ratios: Vec<f64>) -> Result<Self, Error> {
        if ticks.is_empty() {
            return Err(Error::InvalidCurve {
                reason: "no ticks".to_string(),
            });
        }
        if ticks.len() != ratios.len() {
            return Err(Error::InvalidCurve {
                reason: format!(
                    "{} ticks but {} ratios",
                    ticks.len(),
                    ratios.len()
                ),
            });
        }
        if ticks.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidCurve {
                reason: "ticks are not non-decreasing".to_string(),
            });
        }
        let mut ratios: Vec<f64> = ratios.iter().map(|r| r.clamp(0.0, 1.0)).collect();
        // Monotone envelope: cumulative minimum from the right.
        for i in (0..ratios.len().saturating_sub(1)).rev() {
            if ratios[i] < ratios[i + 1] {
                ratios[i] = ratios[i + 1];
            }
        }
        debug_assert!(ratios.windows(2).all(|w| w[0] >= w[1]));
        Ok(Self { ticks, ratios })
    }

    /// The sampling points, in bytes or keys depending on the ghost unit.
    #[must_use]
    pub fn ticks(&self) -> &[u64] {
        &self.ticks
    }

    /// The enveloped miss ratios, parallel to [`Self::ticks`].
    #[must_use]
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Expected miss ratio at the given cache size.
    #[must_use]
    pub fn get_miss_ratio(&self, cache_size: u64) -> f64 {
        let (first, last) = (self.ticks[0], self.ticks[self.ticks.len() - 1]);
        if cache_size <= first {
            return self.ratios[0];
        }
        if cache_size >= last {
            return self.ratios[self.ratios.len() - 1];
        }
        // partition_point returns the first tick > cache_size; the segment
        // starts one before it.
        let hi = self.ticks.partition_point(|t| *t <= cache_size);
        let lo = hi - 1;
        self.interpolate(lo, hi, cache_size)
    }

    /// Smallest cache size whose expected miss ratio is at most `target`.
    ///
    /// Returns `None` when even the largest tick cannot reach `target`.
    /// The search walks the piecewise segments and interpolates inside the
    /// crossing one.
    #[must_use]
    pub fn min_cache_for(&self, target: f64) -> Option<u64> {
        if self.ratios[0] <= target {
            return Some(0);
        }
        let n = self.ticks.len();
        if self.ratios[n - 1] > target {
            return None;
        }
        for i in 1..n {
            if self.ratios[i] <= target {
                let (x0, x1) = (self.ticks[i - 1] as f64, self.ticks[i] as f64);
                let (y0, y1) = (self.ratios[i - 1], self.ratios[i]);
                if (y0 - y1).abs() < f64::EPSILON || x1 <= x0 {
                    return Some(self.ticks[i]);
                }
                let frac = (y0 - target) / (y0 - y1);
                return Some((x0 + (x1 - x0) * frac).ceil() as u64);
            }
        }
        None
    }

    /// Local slope `d(miss ratio) / d(cache)` at the given cache size.
    ///
    /// Always non-positive; zero outside the tick range.
    #[must_use]
    pub fn slope_at(&self, cache_size: u64) -> f64 {
        let n = self.ticks.len();
        if n < 2 || cache_size <= self.ticks[0] || cache_size >= self.ticks[n - 1] {
            return 0.0;
        }
        let hi = self.ticks.partition_point(|t| *t <= cache_size);
        let lo = hi - 1;
        let dx = self.ticks[hi] as f64 - self.ticks[lo] as f64;
        if dx <= 0.0 {
            return 0.0;
        }
        (self.ratios[hi] - self.ratios[lo]) / dx
    }

    fn interpolate(&self, lo: usize, hi: usize, cache_size: u64) -> f64 {
        let (x0, x1) = (self.ticks[lo] as f64, self.ticks[hi] as f64);
        let (y0, y1) = (self.ratios[lo], self.ratios[hi]);
        if x1 <= x0 {
            return y1;
        }
        let frac = (cache_size as f64 - x0) / (x1 - x0);
        y0 + (y1 - y0) * frac
    }
}
