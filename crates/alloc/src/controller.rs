// SPDX-License-Identifier: Apache-2.0

//! The timed poll / allocate / apply cycle.
//!
//! Every allocation involves three timestamps: `stat_ts` (start of the
//! statistics window), `alloc_ts` (run the engine), and `ddl_ts` (the
//! next allocation; boost and gradual relocation must settle by then).
//! The controller runs on its own thread and sleeps between phases; only
//! the client tier is cooperative.

use crate::engine::{AllocationDecision, Allocator, TenantInput};
use crate::error::Error;
use crate::tenant::Tenant;
use shardpool_config::{AllocTuning, ApplyMode, PolicyKind, ResourceFloors};
use shardpool_model::ResourceVector;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Header of the experiment-wide `alloc.csv`.
pub const ALLOC_CSV_HEADER: &str = "policy,elapsed,sid,cache_size,db_rcu,db_wcu,net_bw";

/// Where the controller reports decisions and tenant views.
pub struct ReportSinks {
    /// Receives `alloc.csv` rows.
    pub alloc_csv: Box<dyn Write + Send>,
    /// Per-cycle tenant view snapshots (`alloc_view@<t>.json`), keyed by
    /// elapsed seconds.
    pub view_writer: Option<Box<dyn FnMut(u64, &serde_json::Value) -> std::io::Result<()> + Send>>,
    /// Per-cycle raw endpoint stats dumps (`alloc_stats@<t>.json`),
    /// keyed by elapsed seconds; wired by the driver, which owns the
    /// endpoint handles.
    pub stats_writer: Option<Box<dyn FnMut(u64) -> std::io::Result<()> + Send>>,
}

impl ReportSinks {
    /// Sinks that drop everything; used when reporting is disabled.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            alloc_csv: Box::new(std::io::sink()),
            view_writer: None,
            stats_writer: None,
        }
    }
}

/// Settings for one controller run.
pub struct ControllerConfig {
    /// Allocation instants as offsets from the experiment start.
    pub alloc_sched: Vec<Duration>,
    /// Length of the statistics window before each allocation.
    pub stat_window: Duration,
    /// Total experiment duration (the last relocation deadline).
    pub duration: Duration,
    /// Policies evaluated per cycle; only the last one is applied.
    pub policies: Vec<PolicyKind>,
    /// How decisions are pushed to tenants.
    pub apply_mode: ApplyMode,
    /// Only collect statistics; never run the engine.
    pub skip_alloc: bool,
    /// Run the engine but never apply its decision.
    pub skip_apply: bool,
}

/// Owns the tenants and drives the allocation schedule.
pub struct Controller {
    tenants: Vec<Tenant>,
    floors: ResourceFloors,
    tuning: AllocTuning,
    sinks: ReportSinks,
}

impl Controller {
    /// Create a controller over its tenants.
    pub fn new(
        tenants: Vec<Tenant>,
        floors: ResourceFloors,
        tuning: AllocTuning,
        sinks: ReportSinks,
    ) -> Self {
        Self {
            tenants,
            floors,
            tuning,
            sinks,
        }
    }

    /// Access the tenants (for preload wiring and tests).
    #[must_use]
    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    /// Mutable access to the tenants.
    pub fn tenants_mut(&mut self) -> &mut [Tenant] {
        &mut self.tenants
    }

    /// Record the baseline allocations as the `t=0` rows of `alloc.csv`.
    pub fn write_baseline_rows(&mut self, label: &str) -> Result<(), Error> {
        for tenant in &self.tenants {
            let r = tenant.curr_alloc_resrc();
            writeln!(
                self.sinks.alloc_csv,
                "{label},0,{},{},{:.2},{:.2},{:.0}",
                tenant.tid(),
                r.cache_size,
                r.db_rcu,
                r.db_wcu,
                r.net_bw
            )?;
        }
        Ok(())
    }

    /// Start-of-window polls. Endpoint failures are logged and tolerated;
    /// the affected tenant will surface `NoProgress` at the post poll and
    /// downgrade the cycle.
    pub fn poll_prev_snapshots(&mut self) {
        for tenant in &mut self.tenants {
            if let Err(e) = tenant.poll_prev_snapshot() {
                warn!("pre-poll failed: {e}");
            }
        }
    }

    /// End-of-window polls plus the tenant view snapshot. Returns whether
    /// every tenant produced a usable model.
    pub fn pre_alloc_poll(&mut self, elapsed: u64) -> Result<bool, Error> {
        let mut is_ready = true;
        for tenant in &mut self.tenants {
            if let Err(e) = tenant.poll_post_snapshot() {
                warn!("post-poll failed: {e}");
                is_ready = false;
            }
        }
        if !is_ready {
            warn!("terminate allocation: at least one tenant made no progress");
        }
        if let Some(write_view) = self.sinks.view_writer.as_mut() {
            let views: Vec<serde_json::Value> = self
                .tenants
                .iter()
                .map(Tenant::dump)
                .collect::<Result<_, _>>()?;
            write_view(elapsed, &serde_json::Value::Array(views))?;
        }
        Ok(is_ready)
    }

    /// Emit the `NA` rows for a cycle whose statistics were unusable.
    pub fn write_na_rows(&mut self, elapsed: u64) -> Result<(), Error> {
        for tenant in &self.tenants {
            writeln!(
                self.sinks.alloc_csv,
                "NA,{elapsed},{},NA,NA,NA,NA",
                tenant.tid()
            )?;
        }
        Ok(())
    }

    /// Run each configured policy over the current tenant snapshot,
    /// logging every decision; the last policy's decision is returned.
    pub fn run_policies(
        &mut self,
        policies: &[PolicyKind],
        elapsed: u64,
    ) -> Result<Option<AllocationDecision>, Error> {
        let mut last = None;
        for &policy in policies {
            let mut allocator =
                Allocator::new(policy.into(), self.floors, self.tuning.clone());
            for tenant in &self.tenants {
                let (Some(mrc), Some(demand)) = (tenant.mrc(), tenant.demand_if_miss()) else {
                    return Err(Error::NotPolled { tid: tenant.tid() });
                };
                allocator.add_tenant(TenantInput {
                    base: *tenant.base_resrc(),
                    mrc: mrc.clone(),
                    demand: *demand,
                    alpha: tenant.net_bw_alpha(),
                });
            }
            let decision = allocator.do_alloc()?;
            for (tenant, r) in self.tenants.iter().zip(&decision.allocations) {
                writeln!(
                    self.sinks.alloc_csv,
                    "{},{elapsed},{},{},{:.2},{:.2},{:.0}",
                    policy.name(),
                    tenant.tid(),
                    r.cache_size,
                    r.db_rcu,
                    r.db_wcu,
                    r.net_bw
                )?;
            }
            last = Some(decision);
        }
        Ok(last)
    }

    /// The threshold gate: skip an apply whose gain over the current
    /// allocation is below the configured margin.
    pub fn passes_apply_threshold(&self, decision: &AllocationDecision) -> Result<bool, Error> {
        if self.tuning.alloc_apply_threshold <= 0.0 {
            return Ok(true);
        }
        let mut curr_improve = f64::INFINITY;
        for tenant in &self.tenants {
            curr_improve = curr_improve.min(tenant.estimate_improve_ratio()?);
        }
        if decision.improve_ratio < curr_improve + self.tuning.alloc_apply_threshold {
            info!(
                "skip applying allocation: insufficient gain {:.1}% -> {:.1}%",
                curr_improve * 100.0,
                decision.improve_ratio * 100.0
            );
            return Ok(false);
        }
        info!(
            "apply allocation with significant gain {:.1}% -> {:.1}%",
            curr_improve * 100.0,
            decision.improve_ratio * 100.0
        );
        Ok(true)
    }

    /// Apply a decision in the configured mode. Returns whether the next
    /// window's start snapshot was polled opportunistically while waiting
    /// for caches to warm.
    pub fn apply(
        &mut self,
        targets: &[ResourceVector],
        mode: ApplyMode,
        stat_ts: Option<Instant>,
        ddl_ts: Instant,
    ) -> Result<bool, Error> {
        match mode {
            ApplyMode::Direct => {
                self.direct_apply(targets)?;
                Ok(false)
            }
            ApplyMode::Boost => self.boost_apply(targets, stat_ts, ddl_ts),
            ApplyMode::Gradual => self.gradual_apply(targets, stat_ts, ddl_ts),
        }
    }

    fn direct_apply(&mut self, targets: &[ResourceVector]) -> Result<(), Error> {
        for (tenant, target) in self.tenants.iter_mut().zip(targets) {
            info!("tenant {}: {target}", tenant.tid());
            tenant.apply_resrc(target)?;
        }
        Ok(())
    }

    /// Boost: apply shrinking targets directly; growing targets get side
    /// resources held at baseline until the cache warms, with the real
    /// target queued. Poll warmth until done or the deadline forces the
    /// last pending vector in.
    fn boost_apply(
        &mut self,
        targets: &[ResourceVector],
        stat_ts: Option<Instant>,
        ddl_ts: Instant,
    ) -> Result<bool, Error> {
        let poll_freq = self.tuning.boost_poll_freq;
        let mut stat_done = false;
        let mut pending: Vec<usize> = Vec::new();
        for (idx, (tenant, target)) in self.tenants.iter_mut().zip(targets).enumerate() {
            info!("tenant {}: {target}", tenant.tid());
            if !tenant.try_apply_with_boost(target)? {
                pending.push(idx);
            }
        }
        if pending.is_empty() {
            return Ok(stat_done);
        }

        let begin = Instant::now();
        while !pending.is_empty() {
            let now = Instant::now();
            if now + poll_freq > ddl_ts {
                info!(
                    "boosting incomplete due to timeout after {:.1?}",
                    now - begin
                );
                for &idx in &pending {
                    self.tenants[idx].apply_last_pending_and_clear()?;
                }
                return Ok(stat_done);
            }
            if !stat_done && stat_ts.is_some_and(|ts| now > ts) {
                self.poll_prev_snapshots();
                stat_done = true;
            }
            std::thread::sleep(poll_freq);
            let mut still_pending = Vec::new();
            for idx in pending {
                if self.tenants[idx].is_cache_warm()? {
                    self.tenants[idx].apply_next_pending()?;
                } else {
                    still_pending.push(idx);
                }
            }
            pending = still_pending;
        }
        info!("boosting complete after {:.1?}", begin.elapsed());
        Ok(stat_done)
    }

    /// Gradual: stage each tenant's move as equally spaced intermediate
    /// vectors and advance one round at a time, waiting for every cache
    /// to warm between rounds.
    fn gradual_apply(
        &mut self,
        targets: &[ResourceVector],
        stat_ts: Option<Instant>,
        ddl_ts: Instant,
    ) -> Result<bool, Error> {
        let poll_freq = self.tuning.gradual_poll_freq;
        let mut stat_done = false;

        let max_cache_delta = self
            .tenants
            .iter()
            .zip(targets)
            .map(|(t, r)| r.cache_size.abs_diff(t.curr_alloc_resrc().cache_size))
            .max()
            .unwrap_or(0);
        let num_rounds =
            (max_cache_delta / self.tuning.max_cache_reloc_per_round.max(1)) as usize + 1;

        for (tenant, target) in self.tenants.iter_mut().zip(targets) {
            let curr = *tenant.curr_alloc_resrc();
            for round in 1..num_rounds {
                tenant.add_pending_resrc(&curr.lerp(target, round as f64 / num_rounds as f64));
            }
            tenant.add_pending_resrc(target);
        }

        // the first round needs no warm cache
        for tenant in &mut self.tenants {
            tenant.apply_next_pending()?;
        }
        if num_rounds == 1 {
            return Ok(stat_done);
        }

        let begin = Instant::now();
        for _ in 0..num_rounds - 1 {
            loop {
                let mut all_warm = true;
                for tenant in &self.tenants {
                    if !tenant.is_cache_warm()? {
                        all_warm = false;
                        break;
                    }
                }
                if all_warm {
                    break;
                }
                let now = Instant::now();
                if now + poll_freq > ddl_ts {
                    info!(
                        "gradual relocation incomplete due to timeout after {:.1?}",
                        now - begin
                    );
                    for tenant in &mut self.tenants {
                        if tenant.has_pending() {
                            tenant.apply_last_pending_and_clear()?;
                        }
                    }
                    return Ok(stat_done);
                }
                if !stat_done && stat_ts.is_some_and(|ts| now > ts) {
                    self.poll_prev_snapshots();
                    stat_done = true;
                }
                std::thread::sleep(poll_freq);
            }
            for tenant in &mut self.tenants {
                tenant.apply_next_pending()?;
            }
        }
        info!("gradual relocation complete after {:.1?}", begin.elapsed());
        Ok(stat_done)
    }

    /// Run the whole allocation schedule against wall-clock time.
    ///
    /// `t0` is the experiment start. Per-cycle failures downgrade to `NA`
    /// rows; only reporting failures abort.
    pub fn run_schedule(&mut self, t0: Instant, config: &ControllerConfig) -> Result<(), Error> {
        let alloc_ts: Vec<Instant> = config
            .alloc_sched
            .iter()
            .filter(|&&off| off < config.duration)
            .map(|&off| t0 + off)
            .collect();
        if alloc_ts.is_empty() {
            return Ok(());
        }
        self.poll_prev_snapshots();

        let end = t0 + config.duration;
        let stat_ts: Vec<Instant> = alloc_ts.iter().map(|&ts| ts - config.stat_window).collect();
        let next_stat_ts: Vec<Instant> = stat_ts.iter().skip(1).copied().chain([end]).collect();
        let ddl_ts: Vec<Instant> = alloc_ts.iter().skip(1).copied().chain([end]).collect();

        let mut stat_done = false;
        for i in 0..alloc_ts.len() {
            if stat_done {
                stat_done = false;
            } else {
                let now = Instant::now();
                if let Some(wait) = stat_ts[i].checked_duration_since(now) {
                    std::thread::sleep(wait);
                } else if now.duration_since(stat_ts[i]) > Duration::from_secs(1) {
                    warn!(
                        "insufficient statistics collection time before allocation {}",
                        i
                    );
                }
                self.poll_prev_snapshots();
            }

            let now = Instant::now();
            match alloc_ts[i].checked_duration_since(now) {
                Some(wait) => std::thread::sleep(wait),
                None => {
                    error!("missed allocation timestamp {i}");
                    continue;
                }
            }
            let elapsed = alloc_ts[i].duration_since(t0).as_secs();

            if let Some(write_stats) = self.sinks.stats_writer.as_mut() {
                write_stats(elapsed).map_err(Error::from)?;
            }
            let is_ready = self.pre_alloc_poll(elapsed)?;
            if config.skip_alloc {
                continue;
            }
            if !is_ready {
                self.write_na_rows(elapsed)?;
                continue;
            }
            let decision = match self.run_policies(&config.policies, elapsed) {
                Ok(Some(decision)) => decision,
                Ok(None) => continue,
                Err(e @ (Error::Report { .. } | Error::View { .. })) => return Err(e),
                Err(e) => {
                    warn!("allocation failed: {e}");
                    self.write_na_rows(elapsed)?;
                    continue;
                }
            };
            if config.skip_apply || !self.passes_apply_threshold(&decision)? {
                continue;
            }

            let need_next_stat = next_stat_ts[i] > alloc_ts[i];
            let stat_arg = need_next_stat.then_some(next_stat_ts[i]);
            match self.apply(
                &decision.allocations,
                config.apply_mode,
                stat_arg,
                ddl_ts[i],
            ) {
                Ok(polled) => stat_done = polled || !need_next_stat,
                Err(e) => {
                    warn!("apply failed: {e}");
                    stat_done = false;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardpool_endpoint::testing::MockEndpoint;
    use shardpool_endpoint::EndpointStats;
    use shardpool_model::EpochStat;
    use std::sync::{Arc, Mutex};

    const GIB: u64 = 1 << 30;

    fn base() -> ResourceVector {
        ResourceVector::new(GIB, 1000.0, 100.0, 10e6)
    }

    fn stats(hits: &[u64], misses: &[u64], req: u64) -> EndpointStats {
        EndpointStats {
            ghost_ticks: vec![256 * 1024 * 1024, 2 * GIB],
            stat: EpochStat {
                ghost_hit_cnt: hits.to_vec(),
                ghost_miss_cnt: misses.to_vec(),
                req_cnt: req,
                hit_cnt: req / 2,
                miss_cnt: req / 4,
                db_rcu_consump_if_miss: req,
                net_bw_consump_if_miss: req * 100,
                net_bw_consump_if_hit: req * 50,
                db_rcu_consump: req as f64,
                db_wcu_consump: req as f64 / 100.0,
                net_bw_consump: req as f64 * 100.0,
                ..EpochStat::default()
            },
        }
    }

    /// Shared byte sink for inspecting alloc.csv output.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("sink lock").extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedSink {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().expect("sink lock").clone())
                .expect("utf8")
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn controller_with(
        endpoints: &[Arc<MockEndpoint>],
        tuning: AllocTuning,
    ) -> (Controller, SharedSink) {
        let floors = ResourceFloors::from_base(&base());
        let tenants = endpoints
            .iter()
            .enumerate()
            .map(|(tid, ep)| {
                Tenant::new(
                    tid,
                    Arc::clone(ep) as Arc<dyn shardpool_endpoint::CacheEndpoint + Send + Sync>,
                    base(),
                    base(),
                    0.0,
                    1,
                    Arc::new(floors),
                )
            })
            .collect();
        let sink = SharedSink::default();
        let controller = Controller::new(
            tenants,
            floors,
            tuning,
            ReportSinks {
                alloc_csv: Box::new(sink.clone()),
                view_writer: None,
                stats_writer: None,
            },
        );
        (controller, sink)
    }

    fn fast_tuning() -> AllocTuning {
        AllocTuning {
            boost_poll_freq: Duration::from_millis(5),
            gradual_poll_freq: Duration::from_millis(5),
            ..AllocTuning::from_base(&base())
        }
    }

    fn poll_cycle(controller: &mut Controller, endpoints: &[Arc<MockEndpoint>]) {
        for ep in endpoints {
            ep.set_stats(stats(&[0, 0], &[0, 0], 0));
        }
        controller.poll_prev_snapshots();
        for ep in endpoints {
            ep.set_stats(stats(&[600, 900], &[400, 100], 2000));
        }
        assert!(controller.pre_alloc_poll(0).expect("poll"));
    }

    #[test]
    fn no_progress_emits_na_rows() {
        let endpoints = vec![Arc::new(MockEndpoint::new()), Arc::new(MockEndpoint::new())];
        let (mut controller, sink) = controller_with(&endpoints, fast_tuning());
        for ep in &endpoints {
            ep.set_stats(stats(&[5, 5], &[5, 5], 10));
        }
        controller.poll_prev_snapshots();
        // second tenant makes no progress
        endpoints[0].set_stats(stats(&[50, 60], &[20, 10], 100));
        endpoints[1].set_stats(stats(&[5, 5], &[5, 5], 10));
        let is_ready = controller.pre_alloc_poll(30).expect("poll");
        assert!(!is_ready);
        controller.write_na_rows(30).expect("na rows");
        let lines = sink.lines();
        assert_eq!(lines, vec!["NA,30,0,NA,NA,NA,NA", "NA,30,1,NA,NA,NA,NA"]);
    }

    #[test]
    fn policies_write_rows_and_last_decision_wins() {
        let endpoints = vec![Arc::new(MockEndpoint::new()), Arc::new(MockEndpoint::new())];
        let (mut controller, sink) = controller_with(&endpoints, fast_tuning());
        poll_cycle(&mut controller, &endpoints);
        let decision = controller
            .run_policies(&[PolicyKind::Drf, PolicyKind::Hare], 60)
            .expect("policies")
            .expect("decision");
        assert_eq!(decision.allocations.len(), 2);
        let lines = sink.lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("drf,60,0,"));
        assert!(lines[1].starts_with("drf,60,1,"));
        assert!(lines[2].starts_with("hare,60,0,"));
        assert!(lines[3].starts_with("hare,60,1,"));
    }

    #[test]
    fn boost_apply_settles_once_cache_warms() {
        let endpoints = vec![Arc::new(MockEndpoint::new())];
        let (mut controller, _sink) = controller_with(&endpoints, fast_tuning());
        poll_cycle(&mut controller, &endpoints);
        endpoints[0].set_total_allocated(0);

        let target = ResourceVector::new(2 * GIB, 2000.0, 100.0, 20e6);
        // warm the cache from another thread shortly after boost starts
        let ep = Arc::clone(&endpoints[0]);
        let warmer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            ep.set_total_allocated(2 * GIB);
        });
        let ddl = Instant::now() + Duration::from_secs(10);
        let stat_done = controller
            .apply(&[target], ApplyMode::Boost, None, ddl)
            .expect("boost apply");
        warmer.join().expect("warmer thread");
        assert!(!stat_done);
        let tenant = &controller.tenants()[0];
        assert!(!tenant.has_pending());
        assert_eq!(tenant.curr_alloc_resrc(), &target);
    }

    #[test]
    fn boost_deadline_flushes_last_pending() {
        let endpoints = vec![Arc::new(MockEndpoint::new())];
        let (mut controller, _sink) = controller_with(&endpoints, fast_tuning());
        poll_cycle(&mut controller, &endpoints);
        // never warms
        endpoints[0].set_total_allocated(0);

        let target = ResourceVector::new(2 * GIB, 2000.0, 100.0, 20e6);
        let ddl = Instant::now() + Duration::from_millis(40);
        let stat_done = controller
            .apply(&[target], ApplyMode::Boost, None, ddl)
            .expect("boost apply");
        assert!(!stat_done);
        let tenant = &controller.tenants()[0];
        assert!(!tenant.has_pending());
        // the deadline path applied the real target, dropping the boost
        assert_eq!(tenant.curr_alloc_resrc(), &target);
    }

    #[test]
    fn gradual_apply_steps_through_rounds() {
        let endpoints = vec![Arc::new(MockEndpoint::new())];
        let mut tuning = fast_tuning();
        tuning.max_cache_reloc_per_round = 512 * 1024 * 1024;
        let (mut controller, _sink) = controller_with(&endpoints, tuning);
        poll_cycle(&mut controller, &endpoints);
        // always warm: every round advances immediately
        endpoints[0].set_total_allocated(64 * GIB);

        let target = ResourceVector::new(2 * GIB, 2000.0, 100.0, 20e6);
        let ddl = Instant::now() + Duration::from_secs(10);
        controller
            .apply(&[target], ApplyMode::Gradual, None, ddl)
            .expect("gradual apply");
        let tenant = &controller.tenants()[0];
        assert_eq!(tenant.curr_alloc_resrc(), &target);
        assert!(!tenant.has_pending());
        // 1 GiB of delta in 512 MiB rounds = 3 equally spaced vectors
        let applied = endpoints[0].applied_resrcs();
        assert_eq!(applied.len(), 3);
        let caches: Vec<u64> = applied
            .iter()
            .map(|u| u.cache_size.expect("cache update"))
            .collect();
        assert!(caches[0] > GIB && caches[0] < caches[1] && caches[1] < caches[2]);
        assert_eq!(caches[2], 2 * GIB);
    }

    #[test]
    fn direct_apply_pushes_targets_immediately() {
        let endpoints = vec![Arc::new(MockEndpoint::new()), Arc::new(MockEndpoint::new())];
        let (mut controller, _sink) = controller_with(&endpoints, fast_tuning());
        let targets = [
            ResourceVector::new(GIB / 2, 500.0, 50.0, 5e6),
            ResourceVector::new(GIB, 1500.0, 150.0, 15e6),
        ];
        let ddl = Instant::now() + Duration::from_secs(1);
        controller
            .apply(&targets, ApplyMode::Direct, None, ddl)
            .expect("direct apply");
        assert_eq!(controller.tenants()[0].curr_alloc_resrc(), &targets[0]);
        assert_eq!(controller.tenants()[1].curr_alloc_resrc(), &targets[1]);
    }

    #[test]
    fn threshold_gate_skips_marginal_decisions() {
        let endpoints = vec![Arc::new(MockEndpoint::new())];
        let mut tuning = fast_tuning();
        tuning.alloc_apply_threshold = 0.5;
        let (mut controller, _sink) = controller_with(&endpoints, tuning);
        poll_cycle(&mut controller, &endpoints);
        // a single tenant cannot improve over its own base
        let decision = controller
            .run_policies(&[PolicyKind::Drf], 0)
            .expect("policies")
            .expect("decision");
        assert!(!controller.passes_apply_threshold(&decision).expect("gate"));
    }

    #[test]
    fn baseline_rows_record_initial_allocations() {
        let endpoints = vec![Arc::new(MockEndpoint::new())];
        let (mut controller, sink) = controller_with(&endpoints, fast_tuning());
        controller.write_baseline_rows("base").expect("baseline");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(&format!("base,0,0,{GIB},1000.00,100.00,10000000")));
    }
}
