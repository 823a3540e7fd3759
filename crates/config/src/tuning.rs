// SPDX-License-Identifier: Apache-2.0

//! Tuning knobs for the allocation engine and the apply phase.

use serde::{Deserialize, Serialize};
use shardpool_model::ResourceVector;
use std::time::Duration;

/// How an allocation decision is pushed onto the tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Apply the target vector immediately.
    #[default]
    Direct,
    /// Over-provision side resources until the cache warms, then settle.
    Boost,
    /// Step cache changes toward the target over several rounds.
    Gradual,
}

/// A named allocation policy, mapped by the engine onto its
/// harvest/conserving/memshare flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Dominant-resource fairness; no harvesting, no cache pooling.
    Drf,
    /// Fairness plus harvesting of idle resources.
    Hare,
    /// Fairness with the cache treated as a single soft pool.
    Memshare,
}

impl PolicyKind {
    /// Stable lowercase name used in `alloc.csv` rows.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PolicyKind::Drf => "drf",
            PolicyKind::Hare => "hare",
            PolicyKind::Memshare => "memshare",
        }
    }
}

/// Engine and apply-phase knobs, fixed before the first allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocTuning {
    /// Minimum cache step the engine distinguishes; candidate allocations
    /// closer than this are considered equal.
    pub cache_delta: u64,
    /// Bisection stops once the fairness-metric interval is narrower than
    /// this.
    pub bisect_tolerance: f64,
    /// When set, network bandwidth is pooled across tenants like the other
    /// resources; otherwise each tenant keeps its own baseline bandwidth.
    pub alloc_total_net_bw: bool,
    /// Skip applying a decision whose improvement over the current
    /// allocation is below this margin; zero disables the gate.
    pub alloc_apply_threshold: f64,
    /// How often the boost path polls tenants for cache warmth.
    pub boost_poll_freq: Duration,
    /// How often the gradual path polls tenants for cache warmth.
    pub gradual_poll_freq: Duration,
    /// Largest cache delta moved in one gradual round.
    pub max_cache_reloc_per_round: u64,
}

impl AllocTuning {
    /// Derive tuning from a tenant baseline: cache granularity of 1/64 of
    /// the baseline cache, 16 MiB gradual rounds, 1 s / 0.5 s poll cadence.
    #[must_use]
    pub fn from_base(base: &ResourceVector) -> Self {
        Self {
            cache_delta: (base.cache_size / 64).max(1),
            ..Self::default()
        }
    }
}

impl Default for AllocTuning {
    fn default() -> Self {
        Self {
            cache_delta: 16 * 1024 * 1024,
            bisect_tolerance: 1e-3,
            alloc_total_net_bw: true,
            alloc_apply_threshold: 0.0,
            boost_poll_freq: Duration::from_secs(1),
            gradual_poll_freq: Duration::from_millis(500),
            max_cache_reloc_per_round: 16 * 1024 * 1024,
        }
    }
}
