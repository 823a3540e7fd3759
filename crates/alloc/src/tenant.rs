// SPDX-License-Identifier: Apache-2.0

//! Per-shard tenant state: snapshots, derived model, and allocation
//! application.

use crate::engine::estimate_tput;
use crate::error::Error;
use serde_json::json;
use shardpool_config::ResourceFloors;
use shardpool_endpoint::{CacheEndpoint, EndpointError};
use shardpool_model::{DemandIfMiss, EpochStat, MissRatioCurve, ResourceVector};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Fraction of the cache allocation that must be populated before a cache
/// counts as warm.
const WARM_POPULATED_THRESHOLD: f64 = 0.97;

/// Miss ratio below which a partially populated cache already fits its
/// working set.
const WARM_MISS_RATIO: f64 = 0.01;

/// One tenant: the owner of a cache shard's endpoint handle, statistics,
/// and allocation state.
///
/// The polling cycle is `poll_prev_snapshot` → (workload runs) →
/// `poll_post_snapshot`; the post poll replaces the previous snapshot, so
/// consecutive post polls compose into adjacent intervals. Deriving the
/// model aggregates the last `smooth_window` intervals.
pub struct Tenant {
    tid: usize,
    endpoint: Arc<dyn CacheEndpoint + Send + Sync>,
    base_resrc: ResourceVector,
    curr_alloc_resrc: ResourceVector,
    prev_snapshot: EpochStat,
    stat_window: VecDeque<EpochStat>,
    ghost_ticks: Vec<u64>,
    ghost_miss_ratios: Vec<f64>,
    mrc: Option<MissRatioCurve>,
    demand_if_miss: Option<DemandIfMiss>,
    net_bw_alpha: f64,
    pending_queue: VecDeque<ResourceVector>,
    mrc_salt: f64,
    smooth_window: usize,
    floors: Arc<ResourceFloors>,
    clock: Instant,
}

impl Tenant {
    /// Bind a tenant to its endpoint with a baseline and an initial
    /// allocation.
    pub fn new(
        tid: usize,
        endpoint: Arc<dyn CacheEndpoint + Send + Sync>,
        base_resrc: ResourceVector,
        init_resrc: ResourceVector,
        mrc_salt: f64,
        smooth_window: usize,
        floors: Arc<ResourceFloors>,
    ) -> Self {
        Self {
            tid,
            endpoint,
            base_resrc,
            curr_alloc_resrc: init_resrc,
            prev_snapshot: EpochStat::default(),
            stat_window: VecDeque::new(),
            ghost_ticks: Vec::new(),
            ghost_miss_ratios: Vec::new(),
            mrc: None,
            demand_if_miss: None,
            net_bw_alpha: 0.0,
            pending_queue: VecDeque::new(),
            mrc_salt,
            smooth_window: smooth_window.max(1),
            floors,
            clock: Instant::now(),
        }
    }

    /// The tenant's identifier.
    #[must_use]
    pub const fn tid(&self) -> usize {
        self.tid
    }

    /// The tenant's baseline allocation.
    #[must_use]
    pub const fn base_resrc(&self) -> &ResourceVector {
        &self.base_resrc
    }

    /// The allocation currently applied to the endpoint.
    #[must_use]
    pub const fn curr_alloc_resrc(&self) -> &ResourceVector {
        &self.curr_alloc_resrc
    }

    /// The derived miss-ratio curve, once a post poll has succeeded.
    #[must_use]
    pub fn mrc(&self) -> Option<&MissRatioCurve> {
        self.mrc.as_ref()
    }

    /// The derived per-request miss-path demand.
    #[must_use]
    pub fn demand_if_miss(&self) -> Option<&DemandIfMiss> {
        self.demand_if_miss.as_ref()
    }

    /// Fraction of per-request network cost avoided by a hit.
    #[must_use]
    pub const fn net_bw_alpha(&self) -> f64 {
        self.net_bw_alpha
    }

    /// Whether a boost or gradual apply still has queued vectors.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending_queue.is_empty()
    }

    fn poll(&self) -> Result<(Vec<u64>, EpochStat), Error> {
        let snapshot = self.endpoint.stats().map_err(|e| self.endpoint_err(e))?;
        let mut stat = snapshot.stat;
        stat.timestamp = Some(self.clock.elapsed().as_secs_f64());
        Ok((snapshot.ghost_ticks, stat))
    }

    fn endpoint_err(&self, source: EndpointError) -> Error {
        Error::Endpoint {
            tid: self.tid,
            source,
        }
    }

    /// Record the interval-start snapshot.
    pub fn poll_prev_snapshot(&mut self) -> Result<(), Error> {
        let (ticks, stat) = self.poll()?;
        self.ghost_ticks = ticks;
        self.prev_snapshot = stat;
        Ok(())
    }

    /// Record the interval-end snapshot and refresh the derived model.
    ///
    /// Replaces the previous snapshot, so repeated post polls measure
    /// adjacent intervals. Fails with [`Error::NoProgress`] when the
    /// aggregated window saw no reads at the first ghost tick.
    pub fn poll_post_snapshot(&mut self) -> Result<(), Error> {
        let (ticks, curr) = self.poll()?;
        let epoch_stat = curr.delta_since(&self.prev_snapshot)?;
        self.ghost_ticks = ticks;
        self.prev_snapshot = curr;

        if self.stat_window.len() >= self.smooth_window {
            let _ = self.stat_window.pop_front();
        }
        self.stat_window.push_back(epoch_stat);
        let mut sum = self.stat_window[0].clone();
        for stat in self.stat_window.iter().skip(1) {
            sum = sum.merge(stat)?;
        }

        if !sum.is_valid() {
            return Err(Error::NoProgress { tid: self.tid });
        }

        let mut ratios = Vec::with_capacity(sum.ghost_hit_cnt.len());
        let mut last_ratio = 1.0;
        for (&hc, &mc) in sum.ghost_hit_cnt.iter().zip(&sum.ghost_miss_cnt) {
            let total = hc + mc;
            // an unsampled tick inherits its left neighbor's ratio
            if total > 0 {
                last_ratio = (mc as f64 / total as f64 + self.mrc_salt).min(1.0);
            }
            ratios.push(last_ratio);
        }
        self.ghost_miss_ratios = ratios.clone();
        // the ghost range only grows, and it grows together with the
        // counters; a length mismatch here means a torn snapshot
        self.mrc = Some(MissRatioCurve::new(self.ghost_ticks.clone(), ratios)?);

        let req = sum.req_cnt.max(1) as f64;
        self.demand_if_miss = Some(DemandIfMiss::new(
            sum.db_rcu_consump_if_miss as f64 / req,
            sum.db_wcu_consump / req,
            sum.net_bw_consump_if_miss as f64 / req,
        ));
        self.net_bw_alpha = if sum.net_bw_consump_if_miss > 0 {
            (1.0 - sum.net_bw_consump_if_hit as f64 / sum.net_bw_consump_if_miss as f64)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(())
    }

    /// Estimated throughput under an arbitrary allocation.
    pub fn estimate_tput(&self, resrc: &ResourceVector) -> Result<f64, Error> {
        let (mrc, demand) = self.model()?;
        Ok(estimate_tput(resrc, mrc, demand, self.net_bw_alpha))
    }

    /// Estimated improvement of the current allocation over the baseline.
    pub fn estimate_improve_ratio(&self) -> Result<f64, Error> {
        let base = self.estimate_tput(&self.base_resrc)?;
        let curr = self.estimate_tput(&self.curr_alloc_resrc)?;
        if !base.is_finite() {
            return Ok(0.0);
        }
        Ok(curr / base - 1.0)
    }

    fn model(&self) -> Result<(&MissRatioCurve, &DemandIfMiss), Error> {
        match (&self.mrc, &self.demand_if_miss) {
            (Some(mrc), Some(demand)) => Ok((mrc, demand)),
            _ => Err(Error::NotPolled { tid: self.tid }),
        }
    }

    /// Apply an allocation: floor-clamp it, push it to the endpoint, and
    /// record it as current.
    pub fn apply_resrc(&mut self, resrc: &ResourceVector) -> Result<(), Error> {
        let clamped = self.enforce_min(resrc);
        self.endpoint
            .set_resrc(&clamped.into())
            .map_err(|e| self.endpoint_err(e))?;
        self.curr_alloc_resrc = clamped;
        Ok(())
    }

    /// Apply `target` directly when it shrinks the cache, or boost: queue
    /// it as pending and immediately apply an over-provisioned variant
    /// that keeps baseline read units and bandwidth while the cache warms.
    ///
    /// Returns `true` when the target was applied directly (nothing
    /// pending).
    pub fn try_apply_with_boost(&mut self, target: &ResourceVector) -> Result<bool, Error> {
        if !self.pending_queue.is_empty() {
            return Err(Error::PendingNotEmpty { tid: self.tid });
        }
        let target = self.enforce_min(target);
        if target.cache_size <= self.curr_alloc_resrc.cache_size {
            self.apply_resrc(&target)?;
            return Ok(true);
        }
        self.pending_queue.push_back(target);
        let boosted = ResourceVector::new(
            target.cache_size,
            target.db_rcu.max(self.base_resrc.db_rcu),
            target.db_wcu, // write units are never boosted
            target.net_bw.max(self.base_resrc.net_bw),
        );
        self.apply_resrc(&boosted)?;
        info!(
            "tenant {}: boost allocation {}, pending [{}]",
            self.tid,
            self.curr_alloc_resrc,
            self.pending_queue
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        );
        Ok(false)
    }

    /// Queue a floor-clamped allocation for a later round.
    pub fn add_pending_resrc(&mut self, resrc: &ResourceVector) {
        let clamped = self.enforce_min(resrc);
        self.pending_queue.push_back(clamped);
    }

    /// Apply the oldest pending allocation.
    pub fn apply_next_pending(&mut self) -> Result<(), Error> {
        let next = self
            .pending_queue
            .pop_front()
            .ok_or(Error::NoPending { tid: self.tid })?;
        self.apply_resrc(&next)?;
        info!("tenant {}: apply pending allocation {next}", self.tid);
        Ok(())
    }

    /// Apply the newest pending allocation and drop the rest.
    pub fn apply_last_pending_and_clear(&mut self) -> Result<(), Error> {
        let last = self
            .pending_queue
            .pop_back()
            .ok_or(Error::NoPending { tid: self.tid })?;
        self.apply_resrc(&last)?;
        info!("tenant {}: apply last pending allocation {last}", self.tid);
        self.pending_queue.clear();
        Ok(())
    }

    /// Drop all pending allocations.
    pub fn clear_pending(&mut self) {
        self.pending_queue.clear();
    }

    /// Whether the cache is populated up to its allocation, or already
    /// fits its working set.
    pub fn is_cache_warm(&self) -> Result<bool, Error> {
        let memory = self
            .endpoint
            .memory_stats()
            .map_err(|e| self.endpoint_err(e))?;
        let populated = memory.total_allocated as f64
            >= self.curr_alloc_resrc.cache_size as f64 * WARM_POPULATED_THRESHOLD;
        if populated {
            return Ok(true);
        }
        let (mrc, _) = self.model()?;
        Ok(mrc.get_miss_ratio(memory.total_allocated) < WARM_MISS_RATIO)
    }

    /// JSON view of the tenant for `alloc_view@<t>.json` snapshots.
    pub fn dump(&self) -> Result<serde_json::Value, Error> {
        let window_sum = match self.stat_window.len() {
            0 => None,
            _ => {
                let mut sum = self.stat_window[0].clone();
                for stat in self.stat_window.iter().skip(1) {
                    sum = sum.merge(stat)?;
                }
                Some(sum)
            }
        };
        Ok(json!({
            "tid": self.tid,
            "base_resrc": self.base_resrc,
            "prev_snapshot": self.prev_snapshot,
            "epoch_stat": window_sum,
            "ghost_ticks": self.ghost_ticks,
            "ghost_miss_ratios": self.ghost_miss_ratios,
            "demand_if_miss": self.demand_if_miss,
            "net_bw_alpha": self.net_bw_alpha,
            "curr_alloc_resrc": self.curr_alloc_resrc,
            "pending_resrc_queue": self.pending_queue.iter().collect::<Vec<_>>(),
        }))
    }

    fn enforce_min(&self, resrc: &ResourceVector) -> ResourceVector {
        let (clamped, raised) = self.floors.clamp(resrc);
        for field in raised {
            debug!(
                "tenant {}: <{field}> allocation below the process-wide minimum; raising",
                self.tid
            );
        }
        clamped
    }
}
