// SPDX-License-Identifier: Apache-2.0

//! Per-interval counter snapshots reported by a cache endpoint.
//!
//! An [`EpochStat`] is either a raw snapshot (cumulative counters plus a
//! timestamp) or the difference of two snapshots (an interval). Ghost
//! counter vectors only ever grow as the endpoint widens its sampling
//! range, so two snapshots may disagree on length; alignment right-pads the
//! shorter vector by repeating its last element.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Counters accumulated by a cache endpoint over some interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochStat {
    /// Monotonic capture time in seconds; `None` for derived intervals.
    pub timestamp: Option<f64>,
    /// Interval length in seconds; `None` for raw snapshots.
    pub duration: Option<f64>,
    /// Hypothetical hit counts, one per ghost tick.
    pub ghost_hit_cnt: Vec<u64>,
    /// Hypothetical miss counts, one per ghost tick.
    pub ghost_miss_cnt: Vec<u64>,
    /// Total requests (reads and writes).
    pub req_cnt: u64,
    /// Read hits.
    pub hit_cnt: u64,
    /// Read misses. `hit_cnt + miss_cnt <= req_cnt`; the gap is writes.
    pub miss_cnt: u64,
    /// Read units that were consumed on the miss path.
    pub db_rcu_consump_if_miss: u64,
    /// Network bytes that were consumed on the miss path.
    pub net_bw_consump_if_miss: u64,
    /// Network bytes that were consumed on the hit path.
    pub net_bw_consump_if_hit: u64,
    /// Total read units consumed.
    pub db_rcu_consump: f64,
    /// Total write units consumed.
    pub db_wcu_consump: f64,
    /// Total network bytes consumed.
    pub net_bw_consump: f64,
}

/// Right-pad the shorter of two counter vectors by repeating its last
/// element, then return the aligned pair. The ghost range only grows, so
/// the repeated tail stands in for ticks the older snapshot never sampled.
fn zip_pad(lhs: &[u64], rhs: &[u64]) -> Result<(Vec<u64>, Vec<u64>), Error> {
    if lhs.is_empty() || rhs.is_empty() {
        return Err(Error::EmptyGhostVector);
    }
    let max_len = lhs.len().max(rhs.len());
    let pad = |v: &[u64]| -> Vec<u64> {
        let mut out = v.to_vec();
        let last = *out.last().unwrap_or(&0);
        out.resize(max_len, last);
        out
    };
    Ok((pad(lhs), pad(rhs)))
}

impl EpochStat {
    /// Interval between two snapshots: `self` is the later one.
    ///
    /// The result's `duration` is the timestamp gap. Fails only if either
    /// side has no ghost counters at all.
    pub fn delta_since(&self, earlier: &EpochStat) -> Result<EpochStat, Error> {
        let (hit_l, hit_r) = zip_pad(&self.ghost_hit_cnt, &earlier.ghost_hit_cnt)?;
        let (miss_l, miss_r) = zip_pad(&self.ghost_miss_cnt, &earlier.ghost_miss_cnt)?;
        Ok(EpochStat {
            timestamp: None,
            duration: match (self.timestamp, earlier.timestamp) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            },
            ghost_hit_cnt: hit_l
                .iter()
                .zip(&hit_r)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
            ghost_miss_cnt: miss_l
                .iter()
                .zip(&miss_r)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
            req_cnt: self.req_cnt.saturating_sub(earlier.req_cnt),
            hit_cnt: self.hit_cnt.saturating_sub(earlier.hit_cnt),
            miss_cnt: self.miss_cnt.saturating_sub(earlier.miss_cnt),
            db_rcu_consump_if_miss: self
                .db_rcu_consump_if_miss
                .saturating_sub(earlier.db_rcu_consump_if_miss),
            net_bw_consump_if_miss: self
                .net_bw_consump_if_miss
                .saturating_sub(earlier.net_bw_consump_if_miss),
            net_bw_consump_if_hit: self
                .net_bw_consump_if_hit
                .saturating_sub(earlier.net_bw_consump_if_hit),
            db_rcu_consump: self.db_rcu_consump - earlier.db_rcu_consump,
            db_wcu_consump: self.db_wcu_consump - earlier.db_wcu_consump,
            net_bw_consump: self.net_bw_consump - earlier.net_bw_consump,
        })
    }

    /// Aggregate two intervals (used by the smoothing window).
    pub fn merge(&self, other: &EpochStat) -> Result<EpochStat, Error> {
        let (hit_l, hit_r) = zip_pad(&self.ghost_hit_cnt, &other.ghost_hit_cnt)?;
        let (miss_l, miss_r) = zip_pad(&self.ghost_miss_cnt, &other.ghost_miss_cnt)?;
        Ok(EpochStat {
            timestamp: None,
            duration: match (self.duration, other.duration) {
                (Some(a), Some(b)) => Some(a + b),
                _ => None,
            },
            ghost_hit_cnt: hit_l.iter().zip(&hit_r).map(|(a, b)| a + b).collect(),
            ghost_miss_cnt: miss_l.iter().zip(&miss_r).map(|(a, b)| a + b).collect(),
            req_cnt: self.req_cnt + other.req_cnt,
            hit_cnt: self.hit_cnt + other.hit_cnt,
            miss_cnt: self.miss_cnt + other.miss_cnt,
            db_rcu_consump_if_miss: self.db_rcu_consump_if_miss + other.db_rcu_consump_if_miss,
            net_bw_consump_if_miss: self.net_bw_consump_if_miss + other.net_bw_consump_if_miss,
            net_bw_consump_if_hit: self.net_bw_consump_if_hit + other.net_bw_consump_if_hit,
            db_rcu_consump: self.db_rcu_consump + other.db_rcu_consump,
            db_wcu_consump: self.db_wcu_consump + other.db_wcu_consump,
            net_bw_consump: self.net_bw_consump + other.net_bw_consump,
        })
    }

    /// Whether the interval observed any reads at the smallest ghost tick.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match (self.ghost_hit_cnt.first(), self.ghost_miss_cnt.first()) {
            (Some(h), Some(m)) => h + m > 0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ts: f64, hits: &[u64], misses: &[u64], req: u64) -> EpochStat {
        EpochStat {
            timestamp: Some(ts),
            ghost_hit_cnt: hits.to_vec(),
            ghost_miss_cnt: misses.to_vec(),
            req_cnt: req,
            hit_cnt: req / 2,
            miss_cnt: req / 4,
            db_rcu_consump_if_miss: req,
            net_bw_consump_if_miss: req * 100,
            net_bw_consump_if_hit: req * 10,
            db_rcu_consump: req as f64,
            db_wcu_consump: req as f64 / 10.0,
            net_bw_consump: req as f64 * 110.0,
            ..EpochStat::default()
        }
    }

    #[test]
    fn delta_uses_timestamp_gap_as_duration() {
        let a = snapshot(10.0, &[10, 20], &[5, 2], 100);
        let b = snapshot(25.0, &[30, 45], &[9, 4], 260);
        let d = b.delta_since(&a).unwrap();
        assert_eq!(d.duration, Some(15.0));
        assert_eq!(d.ghost_hit_cnt, vec![20, 25]);
        assert_eq!(d.ghost_miss_cnt, vec![4, 2]);
        assert_eq!(d.req_cnt, 160);
    }

    #[test]
    fn shorter_vector_is_right_padded() {
        let a = snapshot(0.0, &[10, 20], &[8, 6], 50);
        let b = snapshot(5.0, &[30, 45, 50], &[10, 8, 8], 120);
        let d = b.delta_since(&a).unwrap();
        // the older snapshot's trailing tick repeats its last element (20 and 6)
        assert_eq!(d.ghost_hit_cnt, vec![20, 25, 30]);
        assert_eq!(d.ghost_miss_cnt, vec![2, 2, 2]);
    }

    #[test]
    fn empty_ghost_vector_is_an_error() {
        let a = EpochStat::default();
        let b = snapshot(1.0, &[1], &[1], 10);
        assert!(matches!(
            b.delta_since(&a),
            Err(Error::EmptyGhostVector)
        ));
    }

    #[test]
    fn merge_sums_durations_and_counters() {
        let a = snapshot(0.0, &[10], &[5], 100);
        let b = snapshot(0.0, &[4], &[1], 60);
        let mut ia = a;
        ia.duration = Some(5.0);
        let mut ib = b;
        ib.duration = Some(10.0);
        let m = ia.merge(&ib).unwrap();
        assert_eq!(m.duration, Some(15.0));
        assert_eq!(m.ghost_hit_cnt, vec![14]);
        assert_eq!(m.req_cnt, 160);
    }

    #[test]
    fn validity_needs_reads_at_first_tick() {
        let mut s = snapshot(0.0, &[0], &[0], 10);
        assert!(!s.is_valid());
        s.ghost_miss_cnt[0] = 1;
        assert!(s.is_valid());
        assert!(!EpochStat::default().is_valid());
    }
}
