// SPDX-License-Identifier: Apache-2.0

//! The four-resource allocation vector and per-request demand vector.

use crate::error::Error;
use crate::human::{self, UnitScale};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// An allocation of the four fungible resources a tenant can hold: cache
/// memory, backing-store read units, backing-store write units, and network
/// bandwidth.
///
/// The vector itself carries no policy; lower bounds are enforced when a
/// vector is applied to an endpoint, not at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceVector {
    /// Cache memory in bytes.
    pub cache_size: u64,
    /// Backing-store read units per second.
    pub db_rcu: f64,
    /// Backing-store write units per second.
    pub db_wcu: f64,
    /// Network bandwidth in bytes per second.
    pub net_bw: f64,
}

impl ResourceVector {
    /// Build a vector from its four components.
    #[must_use]
    pub const fn new(cache_size: u64, db_rcu: f64, db_wcu: f64, net_bw: f64) -> Self {
        Self {
            cache_size,
            db_rcu,
            db_wcu,
            net_bw,
        }
    }

    /// Marshal into the allocator's internal float representation.
    #[must_use]
    pub fn to_vec(&self) -> [f64; 4] {
        [
            self.cache_size as f64,
            self.db_rcu,
            self.db_wcu,
            self.net_bw,
        ]
    }

    /// Rebuild a vector from the allocator's float representation.
    ///
    /// The cache component is truncated back to whole bytes.
    #[must_use]
    pub fn from_vec(v: [f64; 4]) -> Self {
        Self {
            cache_size: v[0].max(0.0) as u64,
            db_rcu: v[1],
            db_wcu: v[2],
            net_bw: v[3],
        }
    }

    /// Componentwise linear interpolation from `self` toward `target`.
    ///
    /// `frac == 0` yields `self`, `frac == 1` yields `target`. Used by the
    /// gradual apply path, where intermediate cache deltas may be negative
    /// and therefore cannot be expressed with `Sub`/`Add` on unsigned cache.
    #[must_use]
    pub fn lerp(&self, target: &ResourceVector, frac: f64) -> Self {
        let cache = self.cache_size as f64 + (target.cache_size as f64 - self.cache_size as f64) * frac;
        Self {
            cache_size: cache.round().max(0.0) as u64,
            db_rcu: self.db_rcu + (target.db_rcu - self.db_rcu) * frac,
            db_wcu: self.db_wcu + (target.db_wcu - self.db_wcu) * frac,
            net_bw: self.net_bw + (target.net_bw - self.net_bw) * frac,
        }
    }
}

impl Add for ResourceVector {
    type Output = ResourceVector;

    fn add(self, rhs: ResourceVector) -> ResourceVector {
        ResourceVector {
            cache_size: self.cache_size + rhs.cache_size,
            db_rcu: self.db_rcu + rhs.db_rcu,
            db_wcu: self.db_wcu + rhs.db_wcu,
            net_bw: self.net_bw + rhs.net_bw,
        }
    }
}

impl Sub for ResourceVector {
    type Output = ResourceVector;

    fn sub(self, rhs: ResourceVector) -> ResourceVector {
        ResourceVector {
            cache_size: self.cache_size.saturating_sub(rhs.cache_size),
            db_rcu: self.db_rcu - rhs.db_rcu,
            db_wcu: self.db_wcu - rhs.db_wcu,
            net_bw: self.net_bw - rhs.net_bw,
        }
    }
}

impl Mul<f64> for ResourceVector {
    type Output = ResourceVector;

    fn mul(self, factor: f64) -> ResourceVector {
        ResourceVector {
            cache_size: (self.cache_size as f64 * factor) as u64,
            db_rcu: self.db_rcu * factor,
            db_wcu: self.db_wcu * factor,
            net_bw: self.net_bw * factor,
        }
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ cache_size={}B, db_rcu={:.2}, db_wcu={:.2}, net_bw={}B/s }}",
            human::to_human_approx(self.cache_size as f64),
            self.db_rcu,
            self.db_wcu,
            human::to_human_approx(self.net_bw),
        )
    }
}

impl FromStr for ResourceVector {
    type Err = Error;

    /// Parse `<cache>,<rcu>,<wcu>,<net>`, each scalar with an optional
    /// `K/M/G/Ki/Mi/Gi` suffix. Cache size is binary-scaled; the other
    /// three fields are decimal-scaled.
    fn from_str(s: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = s.split(',').collect();
        if fields.len() != 4 {
            return Err(Error::InvalidResourceArity {
                input: s.to_string(),
                found: fields.len(),
            });
        }
        Ok(ResourceVector {
            cache_size: human::parse_human_u64(fields[0], UnitScale::Binary)?,
            db_rcu: human::parse_human(fields[1], UnitScale::Decimal)?,
            db_wcu: human::parse_human(fields[2], UnitScale::Decimal)?,
            net_bw: human::parse_human(fields[3], UnitScale::Decimal)?,
        })
    }
}

/// Per-request resource cost attributed to the miss path.
///
/// Network cost on a hit is `(1 - alpha) * net_bw_per_req`, with `alpha`
/// tracked separately per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandIfMiss {
    /// Read units consumed per request when the request misses.
    pub db_rcu_per_req: f64,
    /// Write units consumed per request (independent of hit/miss).
    pub db_wcu_per_req: f64,
    /// Network bytes consumed per request when the request misses.
    pub net_bw_per_req: f64,
}

impl DemandIfMiss {
    /// Build a demand vector from its three components.
    #[must_use]
    pub const fn new(db_rcu_per_req: f64, db_wcu_per_req: f64, net_bw_per_req: f64) -> Self {
        Self {
            db_rcu_per_req,
            db_wcu_per_req,
            net_bw_per_req,
        }
    }

    /// The three components as a tuple.
    #[must_use]
    pub const fn to_tuple(&self) -> (f64, f64, f64) {
        (self.db_rcu_per_req, self.db_wcu_per_req, self.net_bw_per_req)
    }
}
