// SPDX-License-Identifier: Apache-2.0

//! Wires workloads, clients, tenants, and the controller into one run.

use crate::ckpt;
use crate::client::{Client, ClientConfig, ClientEpochManager};
use crate::error::DriverError;
use crate::router::ShardRouter;
use shardpool_alloc::controller::{
    Controller, ControllerConfig, ReportSinks, ALLOC_CSV_HEADER,
};
use shardpool_alloc::Tenant;
use shardpool_config::{
    AllocTuning, ExperimentConfig, GhostRangeConfig, ResourceFloors,
};
use shardpool_endpoint::CacheEndpoint;
use shardpool_replay::{trace::TraceLimits, ImageLoadSource, TraceReplaySource};
use shardpool_telemetry::{
    LatencyHistogramRing, DATA_CSV_HEADER, LAT_HIST_CSV_HEADER,
};
use shardpool_workload::{RequestSource, SyntheticSource, WorkloadSpec};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default ghost-range request-size hint when the workload does not
/// declare one (trace replay, image load).
const DEFAULT_REQ_SIZE_HINT: u64 = 200;

/// Histograms kept in each client's ring.
const MAX_NUM_HIST: u64 = 60;

/// One in-process experiment: a set of cache endpoints (one per tenant),
/// a workload per tenant, and the allocation schedule over them.
pub struct Experiment {
    config: ExperimentConfig,
    endpoints: Vec<Arc<dyn CacheEndpoint + Send + Sync>>,
    data_dir: PathBuf,
}

impl Experiment {
    /// Validate the configuration against the endpoints and prepare the
    /// data directory.
    pub fn new(
        config: ExperimentConfig,
        endpoints: Vec<Arc<dyn CacheEndpoint + Send + Sync>>,
        data_dir: PathBuf,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        if endpoints.len() != config.workloads.len() {
            return Err(DriverError::Config(
                shardpool_config::Error::InvalidExperiment {
                    reason: format!(
                        "{} endpoints for {} workloads",
                        endpoints.len(),
                        config.workloads.len()
                    ),
                },
            ));
        }
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            config,
            endpoints,
            data_dir,
        })
    }

    /// Validate checkpoints against the configured workloads before
    /// anything is loaded.
    pub fn check_load_ckpts(&self, ckpt_dirs: &[Option<PathBuf>]) -> Result<(), DriverError> {
        let init_resrcs = self.config.init_resources()?;
        for ((dir, workload_str), init) in ckpt_dirs
            .iter()
            .zip(&self.config.workloads)
            .zip(&init_resrcs)
        {
            let Some(dir) = dir else { continue };
            let spec: WorkloadSpec = workload_str.parse()?;
            let WorkloadSpec::Dynamic(workload) = spec else {
                return Err(DriverError::CheckpointMismatch {
                    path: dir.clone(),
                    reason: "checkpoints only apply to synthetic workloads".to_string(),
                });
            };
            ckpt::check_load_ckpt(dir, &workload, Some(init))?;
        }
        Ok(())
    }

    /// Run the whole experiment; returns once every client has finished
    /// and the allocation schedule has been drained.
    pub fn run(self) -> Result<(), DriverError> {
        let base = self.config.base_resource()?;
        let init_resrcs = self.config.init_resources()?;
        let floors = ResourceFloors::from_base(&base);
        let tuning = AllocTuning {
            alloc_apply_threshold: self.config.alloc_apply_threshold,
            ..AllocTuning::from_base(&base)
        };

        // reproduce the run from its data directory alone
        let config_file = File::create(self.data_dir.join("config.json"))?;
        serde_json::to_writer_pretty(BufWriter::new(config_file), &self.config)?;

        let specs: Vec<WorkloadSpec> = self
            .config
            .workloads
            .iter()
            .map(|s| s.parse())
            .collect::<Result<_, _>>()?;

        for (endpoint, spec) in self.endpoints.iter().zip(&specs) {
            endpoint.wait_ready();
            let req_size = match spec {
                WorkloadSpec::Dynamic(wl) => wl.first().req_size() as u64,
                _ => DEFAULT_REQ_SIZE_HINT,
            };
            let ghost = GhostRangeConfig::from_workload_hint(
                &base,
                req_size,
                self.endpoints.len(),
                GhostRangeConfig::DEFAULT_NUM_TICKS,
                GhostRangeConfig::DEFAULT_MAX_CACHE_SCALE,
            )?;
            endpoint.set_ghost_range(ghost.tick, ghost.min_tick, ghost.max_tick)?;
        }
        if let Some(preload) = &self.config.preload {
            // bulk writes run under the cache cap only; the full limits
            // land right after preload
            for (endpoint, init) in self.endpoints.iter().zip(&init_resrcs) {
                endpoint.set_resrc(&shardpool_endpoint::ResourceUpdate::cache_only(
                    init.cache_size,
                ))?;
            }
            info!("start preload");
            self.run_preload(preload, &specs)?;
            info!("preload completed");
        }
        for (endpoint, init) in self.endpoints.iter().zip(&init_resrcs) {
            endpoint.set_resrc(&(*init).into())?;
        }

        self.dump_stats("pre_stats")?;

        // clients run on their own threads against their own endpoint
        let mut client_handles = Vec::new();
        for (sid, (endpoint, spec)) in self.endpoints.iter().zip(&specs).enumerate() {
            let endpoint = Arc::clone(endpoint);
            let spec = spec.clone();
            let client_dir = self.data_dir.join(format!("s{sid}"));
            let config = self.config.clone();
            client_handles.push(
                thread::Builder::new()
                    .name(format!("client-s{sid}"))
                    .spawn(move || run_client(sid, endpoint, &spec, &config, &client_dir))?,
            );
        }

        // rendezvous: all clients must reach the barrier before the
        // measured run starts; a client dying first is fatal
        for (sid, endpoint) in self.endpoints.iter().enumerate() {
            loop {
                if client_handles.iter().any(|h| h.is_finished()) {
                    // collect the failure below; release nobody
                    return self.abort_on_client_failure(client_handles);
                }
                if endpoint.barrier_count()? >= 1 {
                    break;
                }
                info!("waiting for clients of s{sid} to be ready");
                thread::sleep(Duration::from_millis(100));
            }
        }
        for endpoint in &self.endpoints {
            endpoint.barrier_signal()?;
        }
        if self.config.preheat_duration > 0 {
            thread::sleep(Duration::from_secs(self.config.preheat_duration));
            self.dump_stats("preheat_stats")?;
        }

        let t0 = Instant::now();
        let tenants: Vec<Tenant> = self
            .endpoints
            .iter()
            .zip(&init_resrcs)
            .enumerate()
            .map(|(tid, (endpoint, init))| {
                Tenant::new(
                    tid,
                    Arc::clone(endpoint),
                    base,
                    *init,
                    self.config.mrc_salt,
                    self.config.smooth_window,
                    Arc::new(floors),
                )
            })
            .collect();

        let mut alloc_csv = BufWriter::new(File::create(self.data_dir.join("alloc.csv"))?);
        writeln!(alloc_csv, "{ALLOC_CSV_HEADER}")?;
        let view_dir = self.data_dir.clone();
        let stats_dir = self.data_dir.clone();
        let stats_endpoints = self.endpoints.clone();
        let sinks = ReportSinks {
            alloc_csv: Box::new(alloc_csv),
            view_writer: Some(Box::new(move |elapsed, views| {
                let path = view_dir.join(format!("alloc_view@{elapsed}.json"));
                let file = File::create(path)?;
                serde_json::to_writer_pretty(BufWriter::new(file), views)
                    .map_err(std::io::Error::other)
            })),
            stats_writer: Some(Box::new(move |elapsed| {
                let snapshots: Vec<shardpool_endpoint::EndpointStats> = stats_endpoints
                    .iter()
                    .map(|e| e.stats())
                    .collect::<Result<_, _>>()
                    .map_err(std::io::Error::other)?;
                let path = stats_dir.join(format!("alloc_stats@{elapsed}.json"));
                let file = File::create(path)?;
                serde_json::to_writer_pretty(BufWriter::new(file), &snapshots)
                    .map_err(std::io::Error::other)
            })),
        };
        let mut controller = Controller::new(tenants, floors, tuning, sinks);
        let baseline_label = if self.config.init_resrcs.is_none() {
            "base".to_string()
        } else {
            // pre-configured allocations count toward the effective policy
            self.config
                .policies
                .last()
                .map_or("base".to_string(), |p| p.name().to_string())
        };
        controller.write_baseline_rows(&baseline_label)?;

        let controller_config = ControllerConfig {
            alloc_sched: self
                .config
                .alloc_sched
                .iter()
                .map(|&s| Duration::from_secs(s))
                .collect(),
            stat_window: Duration::from_secs(self.config.alloc_stat_window),
            duration: Duration::from_secs(self.config.duration),
            policies: self.config.policies.clone(),
            apply_mode: self.config.apply_mode,
            skip_alloc: self.config.skip_alloc,
            skip_apply: self.config.skip_apply,
        };
        controller.run_schedule(t0, &controller_config)?;

        let mut first_failure = None;
        for handle in client_handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("client failed: {e}");
                    first_failure.get_or_insert(e);
                }
                Err(panic) => {
                    first_failure.get_or_insert(DriverError::ClientFailed {
                        name: "unknown".to_string(),
                        reason: format!("panicked: {panic:?}"),
                    });
                }
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        self.dump_stats("post_stats")?;
        Ok(())
    }

    fn abort_on_client_failure(
        &self,
        handles: Vec<thread::JoinHandle<Result<(), DriverError>>>,
    ) -> Result<(), DriverError> {
        for handle in handles {
            if handle.is_finished() {
                let name = handle.thread().name().unwrap_or("client").to_string();
                return match handle.join() {
                    Ok(Err(e)) => Err(e),
                    Ok(Ok(())) => Err(DriverError::ClientFailed {
                        name,
                        reason: "exited before reaching the start barrier".to_string(),
                    }),
                    Err(panic) => Err(DriverError::ClientFailed {
                        name,
                        reason: format!("panicked before the start barrier: {panic:?}"),
                    }),
                };
            }
        }
        Err(DriverError::ClientFailed {
            name: "unknown".to_string(),
            reason: "client exited before reaching the start barrier".to_string(),
        })
    }

    /// Run the configured preload against every endpoint, one worker set
    /// per tenant. Any worker failure aborts the experiment.
    fn run_preload(
        &self,
        preload: &shardpool_config::PreloadConfig,
        specs: &[WorkloadSpec],
    ) -> Result<(), DriverError> {
        use shardpool_config::PreloadMode;

        let num_workers = preload.num_workers;
        let batch_size = preload.batch_size;
        let mut handles: Vec<thread::JoinHandle<Result<(), DriverError>>> = Vec::new();
        for (sid, (endpoint, spec)) in self.endpoints.iter().zip(specs).enumerate() {
            match &preload.mode {
                PreloadMode::Fill | PreloadMode::Warmup => {
                    let WorkloadSpec::Dynamic(workload) = spec else {
                        return Err(DriverError::Config(
                            shardpool_config::Error::InvalidExperiment {
                                reason: format!(
                                    "preload fill/warmup needs a synthetic workload (tenant {sid})"
                                ),
                            },
                        ));
                    };
                    let warmup_for = Duration::from_secs(self.config.preheat_duration.max(1));
                    let is_fill = matches!(preload.mode, PreloadMode::Fill);
                    for worker in 0..num_workers {
                        let endpoint = Arc::clone(endpoint);
                        let first = workload.first().clone();
                        handles.push(
                            thread::Builder::new()
                                .name(format!("preload-s{sid}w{worker}"))
                                .spawn(move || {
                                    if is_fill {
                                        crate::preload::fill(
                                            &endpoint,
                                            &first,
                                            num_workers as u64,
                                            worker as u64,
                                            batch_size,
                                            true,
                                        )
                                    } else {
                                        crate::preload::warmup(
                                            &endpoint,
                                            &first,
                                            warmup_for,
                                            batch_size,
                                            None,
                                        )
                                    }
                                })?,
                        );
                    }
                }
                PreloadMode::Load { image_paths } => {
                    let image_path = PathBuf::from(&image_paths[sid]);
                    for worker in 0..num_workers {
                        let endpoint = Arc::clone(endpoint);
                        let image_path = image_path.clone();
                        handles.push(
                            thread::Builder::new()
                                .name(format!("preload-s{sid}w{worker}"))
                                .spawn(move || {
                                    let image = ImageLoadSource::new(
                                        &image_path,
                                        worker as u32,
                                        num_workers as u32,
                                    )?;
                                    crate::preload::load(&endpoint, image, batch_size)
                                })?,
                        );
                    }
                }
            }
        }
        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(panic) => {
                    return Err(DriverError::ClientFailed {
                        name: "preload".to_string(),
                        reason: format!("panicked: {panic:?}"),
                    })
                }
            }
        }
        Ok(())
    }

    /// Snapshot every endpoint's stats dictionary into `<tag>.json`.
    fn dump_stats(&self, tag: &str) -> Result<(), DriverError> {
        let snapshots: Vec<shardpool_endpoint::EndpointStats> = self
            .endpoints
            .iter()
            .map(|e| e.stats())
            .collect::<Result<_, _>>()?;
        let file = File::create(self.data_dir.join(format!("{tag}.json")))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &snapshots)?;
        Ok(())
    }
}

/// Build and run one client against its endpoint.
fn run_client(
    sid: usize,
    endpoint: Arc<dyn CacheEndpoint + Send + Sync>,
    spec: &WorkloadSpec,
    config: &ExperimentConfig,
    client_dir: &Path,
) -> Result<(), DriverError> {
    fs::create_dir_all(client_dir)?;
    let mut data_csv = BufWriter::new(File::create(client_dir.join("data.csv"))?);
    writeln!(data_csv, "{DATA_CSV_HEADER}")?;
    let mut hist_csv = BufWriter::new(File::create(client_dir.join("lat_hist.csv"))?);
    writeln!(hist_csv, "{LAT_HIST_CSV_HEADER}")?;

    let num_hist = if config.duration > 0 {
        MAX_NUM_HIST.min(config.duration.div_ceil(config.epoch_duration))
    } else {
        MAX_NUM_HIST
    };
    let ring = LatencyHistogramRing::new(
        num_hist.max(1) as usize,
        Box::new(hist_csv) as Box<dyn Write + Send>,
        config.epoch_duration,
    )?;
    let epoch_mgr = ClientEpochManager::new(
        ring,
        Box::new(data_csv) as Box<dyn Write + Send>,
        config.epoch_duration,
        config.count,
        config.duration,
    );

    let sources: Vec<Box<dyn RequestSource>> = match spec {
        WorkloadSpec::Dynamic(workload) => SyntheticSource::from_dynamic(workload)?
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn RequestSource>)
            .collect(),
        WorkloadSpec::Trace { mode, path } => {
            let limits = TraceLimits {
                max_timestamp: config.trace_max_timestamp,
                max_line: config.trace_max_line,
                queue_size: config.trace_queue_size,
            };
            vec![Box::new(TraceReplaySource::new(path, *mode, 0, 1, limits)?)]
        }
        WorkloadSpec::Image { path } => {
            vec![Box::new(ImageLoadSource::new(path, 0, 1)?)]
        }
    };

    let router = ShardRouter::new(vec![endpoint], config.batch_size, sid);
    let client = Client::new(
        router,
        epoch_mgr,
        ClientConfig {
            preheat: Duration::from_secs(config.preheat_duration),
            queue_depth: config.async_queue_depth,
            check: config.check,
            name: format!("s{sid}c0"),
            seed: None,
        },
    );
    client.run(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardpool_endpoint::testing::MockEndpoint;
    use shardpool_endpoint::EndpointStats;
    use shardpool_model::EpochStat;

    fn mock_with_traffic() -> Arc<MockEndpoint> {
        let ep = Arc::new(MockEndpoint::new());
        ep.set_barrier_count(1);
        ep.set_stats(EndpointStats {
            ghost_ticks: vec![1 << 20, 1 << 30],
            stat: EpochStat {
                ghost_hit_cnt: vec![100, 150],
                ghost_miss_cnt: vec![100, 50],
                req_cnt: 400,
                hit_cnt: 200,
                miss_cnt: 100,
                db_rcu_consump_if_miss: 100,
                net_bw_consump_if_miss: 10_000,
                net_bw_consump_if_hit: 1_000,
                db_rcu_consump: 100.0,
                db_wcu_consump: 10.0,
                net_bw_consump: 11_000.0,
                ..EpochStat::default()
            },
        });
        ep
    }

    fn short_config() -> ExperimentConfig {
        serde_json::from_value(serde_json::json!({
            "workloads": ["k=16,v=64,n=1000,w=0.5,d=zipf:0.9"],
            "base_resrc": "1G,1000,100,10M",
            "duration": 1,
            "epoch_duration": 1,
        }))
        .expect("config")
    }

    #[test]
    fn experiment_runs_and_writes_reports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ep = mock_with_traffic();
        let experiment = Experiment::new(
            short_config(),
            vec![Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>],
            dir.path().to_path_buf(),
        )
        .expect("experiment");
        experiment.run().expect("run");

        assert!(dir.path().join("config.json").is_file());
        assert!(dir.path().join("alloc.csv").is_file());
        assert!(dir.path().join("pre_stats.json").is_file());
        assert!(dir.path().join("post_stats.json").is_file());
        let data = fs::read_to_string(dir.path().join("s0/data.csv")).expect("data.csv");
        assert!(data.starts_with(DATA_CSV_HEADER));
        let alloc = fs::read_to_string(dir.path().join("alloc.csv")).expect("alloc.csv");
        let mut lines = alloc.lines();
        assert_eq!(lines.next(), Some(ALLOC_CSV_HEADER));
        let baseline = lines.next().expect("baseline row");
        assert!(baseline.starts_with("base,0,0,"));
        // the ghost range was configured from the workload hint
        assert_eq!(ep.ghost_ranges().len(), 1);
        // the initial allocation was applied before the run
        assert!(!ep.applied_resrcs().is_empty());
    }

    #[test]
    fn endpoint_workload_arity_is_checked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Experiment::new(short_config(), vec![], dir.path().to_path_buf());
        assert!(result.is_err());
    }

    #[test]
    fn preload_fill_populates_the_cache_before_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = short_config();
        config.preload = Some(shardpool_config::PreloadConfig {
            num_workers: 2,
            mode: shardpool_config::PreloadMode::Fill,
            batch_size: 0,
        });
        let ep = mock_with_traffic();
        let experiment = Experiment::new(
            config,
            vec![Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>],
            dir.path().to_path_buf(),
        )
        .expect("experiment");
        experiment.run().expect("run");
        // the full working set (n=1000) was written through the
        // cache-only path before the measured run
        assert!(ep.num_keys() >= 1000);
        // preload capped the cache first, then the full init landed
        let applied = ep.applied_resrcs();
        assert!(applied.len() >= 2);
        assert!(applied[0].db_rcu.is_none(), "first update is cache-only");
    }

    #[test]
    fn async_mode_runs_to_completion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = short_config();
        config.async_queue_depth = 4;
        let ep = mock_with_traffic();
        let experiment = Experiment::new(
            config,
            vec![Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>],
            dir.path().to_path_buf(),
        )
        .expect("experiment");
        experiment.run().expect("run");
        assert!(ep.num_keys() > 0, "the workload wrote through the endpoint");
    }
}
