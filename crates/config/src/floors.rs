// SPDX-License-Identifier: Apache-2.0

//! Process-wide per-resource allocation minima.

use serde::{Deserialize, Serialize};
use shardpool_model::ResourceVector;

/// Lower bounds enforced whenever an allocation is applied to a tenant.
///
/// Built once at startup and shared read-only (typically behind an `Arc`);
/// the allocator and every tenant consult the same instance. There is no
/// global state: whoever owns the experiment passes the floors down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceFloors {
    min_cache_size: u64,
    min_db_rcu: f64,
    min_db_wcu: f64,
    min_net_bw: f64,
}

impl ResourceFloors {
    /// Floor every resource at explicit values.
    #[must_use]
    pub const fn new(min_cache_size: u64, min_db_rcu: f64, min_db_wcu: f64, min_net_bw: f64) -> Self {
        Self {
            min_cache_size,
            min_db_rcu,
            min_db_wcu,
            min_net_bw,
        }
    }

    /// Derive floors from a tenant's baseline: 10 MiB of cache and one
    /// percent of the baseline rate for each of RCU, WCU, and network.
    #[must_use]
    pub fn from_base(base: &ResourceVector) -> Self {
        Self {
            min_cache_size: 10 * 1024 * 1024,
            min_db_rcu: base.db_rcu / 100.0,
            min_db_wcu: base.db_wcu / 100.0,
            min_net_bw: base.net_bw / 100.0,
        }
    }

    /// Minimum cache size in bytes.
    #[must_use]
    pub const fn min_cache_size(&self) -> u64 {
        self.min_cache_size
    }

    /// Minimum read units per second.
    #[must_use]
    pub const fn min_db_rcu(&self) -> f64 {
        self.min_db_rcu
    }

    /// Minimum write units per second.
    #[must_use]
    pub const fn min_db_wcu(&self) -> f64 {
        self.min_db_wcu
    }

    /// Minimum network bandwidth in bytes per second.
    #[must_use]
    pub const fn min_net_bw(&self) -> f64 {
        self.min_net_bw
    }

    /// Clamp a vector to the floors, reporting which fields were raised.
    ///
    /// The returned list holds the names of the raised fields so callers
    /// can log them the way the apply path expects.
    #[must_use]
    pub fn clamp(&self, r: &ResourceVector) -> (ResourceVector, Vec<&'static str>) {
        let mut raised = Vec::new();
        let mut out = *r;
        if out.cache_size < self.min_cache_size {
            out.cache_size = self.min_cache_size;
            raised.push("cache_size");
        }
        if out.db_rcu < self.min_db_rcu {
            out.db_rcu = self.min_db_rcu;
            raised.push("db_rcu");
        }
        if out.db_wcu < self.min_db_wcu {
            out.db_wcu = self.min_db_wcu;
            raised.push("db_wcu");
        }
        if out.net_bw < self.min_net_bw {
            out.net_bw = self.min_net_bw;
            raised.push("net_bw");
        }
        (out, raised)
    }
}
