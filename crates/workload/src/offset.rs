// SPDX-License-Identifier: Apache-2.0

//! Restartable offset generators for the supported distributions.
//!
//! The Zipfian sampler is the classic DBx1000 construction (precomputed
//! zeta/eta/alpha, two special-cased head ranks), shifted to produce
//! offsets in `[0, n)`. Scan generators locate their start offset through
//! the Zipfian and then walk a hash-shuffled permutation of the working
//! set, so scanned keys are not adjacent in the Zipfian hot region.

use crate::distrib::Distrib;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use xxhash_rust::xxh32::xxh32;

/// One draw from an offset generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offset {
    /// A single key offset.
    One(u64),
    /// A run of key offsets (scans).
    Many(Vec<u64>),
}

/// A restartable source of key offsets.
///
/// Implementations must tolerate `set_working_set` at any point, including
/// after offsets have been drawn.
pub trait OffsetGen {
    /// Draw the next offset (or offset run).
    fn next_offset(&mut self, rng: &mut dyn RngCore) -> Offset;

    /// Resize the working set; offsets stay within `[0, n)` afterwards.
    fn set_working_set(&mut self, n: u64);
}

/// Build the generator matching a distribution descriptor.
#[must_use]
pub fn build(distrib: &Distrib, num_keys: u64) -> Box<dyn OffsetGen + Send> {
    match *distrib {
        Distrib::Seq => Box::new(SeqOffsets::new(num_keys)),
        Distrib::Unif => Box::new(UnifOffsets::new(num_keys)),
        Distrib::Zipf { theta } => Box::new(ZipfOffsets::new(num_keys, theta)),
        Distrib::Scan { theta, max_range } => {
            Box::new(ScanOffsets::new(num_keys, theta, max_range))
        }
    }
}

/// Monotone counter modulo the working set.
#[derive(Debug)]
pub struct SeqOffsets {
    ws_size: u64,
    next: u64,
}

impl SeqOffsets {
    /// Create a sequential generator over `[0, ws_size)`.
    #[must_use]
    pub const fn new(ws_size: u64) -> Self {
        Self { ws_size, next: 0 }
    }
}

impl OffsetGen for SeqOffsets {
    fn next_offset(&mut self, _rng: &mut dyn RngCore) -> Offset {
        let offset = self.next % self.ws_size;
        self.next += 1;
        Offset::One(offset)
    }

    fn set_working_set(&mut self, n: u64) {
        self.ws_size = n;
    }
}

/// Uniform draw over the working set.
#[derive(Debug)]
pub struct UnifOffsets {
    ws_size: u64,
}

impl UnifOffsets {
    /// Create a uniform generator over `[0, ws_size)`.
    #[must_use]
    pub const fn new(ws_size: u64) -> Self {
        Self { ws_size }
    }
}

impl OffsetGen for UnifOffsets {
    fn next_offset(&mut self, rng: &mut dyn RngCore) -> Offset {
        Offset::One(uniform_u64(rng, self.ws_size))
    }

    fn set_working_set(&mut self, n: u64) {
        self.ws_size = n;
    }
}

/// DBx1000-style Zipfian generator over `[0, n)`.
#[derive(Debug)]
pub struct ZipfOffsets {
    n: u64,
    theta: f64,
    denom: f64,
    eta: f64,
    alpha: f64,
}

impl ZipfOffsets {
    /// Create a Zipfian generator; precomputes the zeta constants.
    #[must_use]
    pub fn new(n: u64, theta: f64) -> Self {
        let mut z = Self {
            n,
            theta,
            denom: 0.0,
            eta: 0.0,
            alpha: 0.0,
        };
        z.recompute();
        z
    }

    /// Change the skew; constants are recomputed.
    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.denom = zeta(self.n, self.theta);
        self.eta = (1.0 - (2.0 / self.n as f64).powf(1.0 - self.theta))
            / (1.0 - zeta(2, self.theta) / self.denom);
        self.alpha = 1.0 / (1.0 - self.theta);
    }

    fn zipf(&self, rng: &mut dyn RngCore) -> u64 {
        let u = uniform_f64(rng);
        let uz = u * self.denom;
        if uz < 1.0 {
            return 0;
        }
        if uz < 1.0 + 0.5f64.powf(self.theta) {
            return 1;
        }
        let raw = (self.n as f64 * (self.eta * u - self.eta + 1.0).powf(self.alpha)) as u64;
        raw.min(self.n - 1)
    }
}

impl OffsetGen for ZipfOffsets {
    fn next_offset(&mut self, rng: &mut dyn RngCore) -> Offset {
        Offset::One(self.zipf(rng))
    }

    fn set_working_set(&mut self, n: u64) {
        self.n = n;
        self.recompute();
    }
}

fn zeta(n: u64, theta: f64) -> f64 {
    (1..=n).map(|i| (1.0 / i as f64).powf(theta)).sum()
}

/// Zipf-located scans over a hash-shuffled permutation of the working set.
pub struct ScanOffsets {
    zipf: ZipfOffsets,
    max_range: u64,
    perm: Arc<Vec<u64>>,
}

impl ScanOffsets {
    /// Create a scan generator; the permutation is fetched from (or
    /// inserted into) the process-wide cache for this working-set size.
    #[must_use]
    pub fn new(ws_size: u64, theta: f64, max_range: u64) -> Self {
        Self {
            zipf: ZipfOffsets::new(ws_size, theta),
            max_range,
            perm: shuffled_permutation(ws_size),
        }
    }

    fn scan(&self, begin_offset: u64, size: usize) -> Vec<u64> {
        let h = offset_hash(begin_offset);
        let mut idx = self.perm.partition_point(|&o| offset_hash(o) < h);
        // hash collisions put several offsets at the same rank; walk to ours
        while idx < self.perm.len()
            && self.perm[idx] != begin_offset
            && offset_hash(self.perm[idx]) == h
        {
            idx += 1;
        }
        (0..size)
            .map(|i| self.perm[(idx + i) % self.perm.len()])
            .collect()
    }
}

impl OffsetGen for ScanOffsets {
    fn next_offset(&mut self, rng: &mut dyn RngCore) -> Offset {
        let size = 1 + uniform_u64(rng, self.max_range);
        let begin = match self.zipf.next_offset(rng) {
            Offset::One(o) => o,
            Offset::Many(_) => unreachable!("zipf draws are scalar"),
        };
        Offset::Many(self.scan(begin, size as usize))
    }

    fn set_working_set(&mut self, n: u64) {
        self.zipf.set_working_set(n);
        self.perm = shuffled_permutation(n);
    }
}

fn offset_hash(offset: u64) -> u32 {
    xxh32(&offset.to_be_bytes(), 0)
}

/// Permutation of `[0, n)` ordered by a 32-bit hash of each offset, shared
/// process-wide so concurrent scan generators with the same working set do
/// not each pay the sort (and its memory).
fn shuffled_permutation(n: u64) -> Arc<Vec<u64>> {
    static CACHE: OnceLock<Mutex<HashMap<u64, Arc<Vec<u64>>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = match cache.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    Arc::clone(guard.entry(n).or_insert_with(|| {
        let mut perm: Vec<u64> = (0..n).collect();
        perm.sort_by_key(|&o| (offset_hash(o), o));
        Arc::new(perm)
    }))
}

/// Uniform draw from `[0, n)`; avoids modulo bias the same way
/// `rand`'s range sampling does, which is overkill here but free.
fn uniform_u64(rng: &mut dyn RngCore, n: u64) -> u64 {
    use rand::Rng as _;
    rng.gen_range(0..n)
}

fn uniform_f64(rng: &mut dyn RngCore) -> f64 {
    use rand::Rng as _;
    rng.gen::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn seq_covers_every_offset_then_wraps() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut g = SeqOffsets::new(5);
        let first: Vec<u64> = (0..5)
            .map(|_| match g.next_offset(&mut rng) {
                Offset::One(o) => o,
                Offset::Many(_) => panic!("seq is scalar"),
            })
            .collect();
        assert_eq!(first, vec![0, 1, 2, 3, 4]);
        assert_eq!(g.next_offset(&mut rng), Offset::One(0));
    }

    #[test]
    fn unif_stays_in_range() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut g = UnifOffsets::new(100);
        for _ in 0..10_000 {
            match g.next_offset(&mut rng) {
                Offset::One(o) => assert!(o < 100),
                Offset::Many(_) => panic!("unif is scalar"),
            }
        }
    }

    #[test]
    fn zipf_stays_in_range_after_resize() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut g = ZipfOffsets::new(1000, 0.99);
        g.set_working_set(10);
        for _ in 0..10_000 {
            match g.next_offset(&mut rng) {
                Offset::One(o) => assert!(o < 10),
                Offset::Many(_) => panic!("zipf is scalar"),
            }
        }
    }

    #[test]
    fn zipf_head_frequency_matches_theory() {
        // empirical frequency of rank 0 must converge to 1/zeta(n, theta)
        let n = 1000u64;
        for theta in [0.5, 0.9, 0.99] {
            let mut rng = SmallRng::seed_from_u64(42);
            let mut g = ZipfOffsets::new(n, theta);
            let samples = 1_000_000;
            let mut zeros = 0u64;
            for _ in 0..samples {
                if g.next_offset(&mut rng) == Offset::One(0) {
                    zeros += 1;
                }
            }
            let expected = 1.0 / zeta(n, theta);
            let actual = zeros as f64 / samples as f64;
            let rel_err = (actual - expected).abs() / expected;
            assert!(
                rel_err < 0.05,
                "theta={theta}: expected {expected:.5}, got {actual:.5}"
            );
        }
    }

    #[test]
    fn scan_run_lengths_bounded_and_in_range() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut g = ScanOffsets::new(500, 0.9, 16);
        for _ in 0..1000 {
            match g.next_offset(&mut rng) {
                Offset::Many(run) => {
                    assert!(!run.is_empty() && run.len() <= 16);
                    assert!(run.iter().all(|&o| o < 500));
                }
                Offset::One(_) => panic!("scan yields runs"),
            }
        }
    }

    #[test]
    fn scan_permutation_is_shared_for_equal_working_sets() {
        let a = ScanOffsets::new(256, 0.9, 4);
        let b = ScanOffsets::new(256, 0.9, 8);
        assert!(Arc::ptr_eq(&a.perm, &b.perm));
    }

    #[test]
    fn scan_run_starts_at_the_drawn_offset() {
        let g = ScanOffsets::new(64, 0.9, 4);
        for begin in [0u64, 13, 63] {
            let run = g.scan(begin, 3);
            assert_eq!(run[0], begin);
            assert_eq!(run.len(), 3);
        }
    }
}
