// SPDX-License-Identifier: Apache-2.0

//! Derivation of the ghost-cache sampling range from workload hints.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use shardpool_model::ResourceVector;

/// Ghost-cache sampling range, in keys, pushed to an endpoint via
/// `set_ghost_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostRangeConfig {
    /// Tick width in keys.
    pub tick: u64,
    /// Smallest sampled tick.
    pub min_tick: u64,
    /// Largest sampled tick.
    pub max_tick: u64,
}

impl GhostRangeConfig {
    /// Default number of ticks covering the ghost range.
    pub const DEFAULT_NUM_TICKS: u64 = 64;
    /// Default cap on how far beyond one baseline cache the range extends.
    pub const DEFAULT_MAX_CACHE_SCALE: u64 = 4;

    /// Derive a sampling range from a workload hint.
    ///
    /// The ghost range covers up to `min(max_cache_scale, num_tenants)`
    /// baseline caches, split into `num_ticks` ticks of
    /// `range / num_ticks / req_size` keys each; `max_tick` leaves one
    /// extra tick of headroom.
    pub fn from_workload_hint(
        base: &ResourceVector,
        req_size: u64,
        num_tenants: usize,
        num_ticks: u64,
        max_cache_scale: u64,
    ) -> Result<Self, Error> {
        if req_size == 0 {
            return Err(Error::InvalidGhostRange {
                reason: "request size hint is zero".to_string(),
            });
        }
        if num_ticks == 0 {
            return Err(Error::InvalidGhostRange {
                reason: "tick count is zero".to_string(),
            });
        }
        let scale = max_cache_scale.min(num_tenants as u64).max(1);
        let max_ghost_cache = base.cache_size * scale;
        let tick = max_ghost_cache / num_ticks / req_size;
        if tick == 0 {
            return Err(Error::InvalidGhostRange {
                reason: format!(
                    "tick width underflows: cache={} ticks={num_ticks} req_size={req_size}",
                    base.cache_size
                ),
            });
        }
        Ok(Self {
            tick,
            min_tick: tick,
            max_tick: tick * (num_ticks + 1),
        })
    }
}
