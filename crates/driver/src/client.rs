// SPDX-License-Identifier: Apache-2.0

//! One client's request loop, synchronous or cooperative.
//!
//! In cooperative mode the client runs `queue_depth` tasks on a
//! single-threaded Tokio runtime with a `LocalSet`; only endpoint I/O
//! suspends. Every task holds clones of the shared `epoch_done` and
//! `req_gen_done` cancellation tokens; task 0 is the only one that ever
//! cancels them, so rotation and termination decisions are made exactly
//! once per pass.

use crate::error::DriverError;
use crate::router::{OpOutcome, ShardRouter};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use shardpool_telemetry::EpochManager;
use shardpool_workload::kv_format::{check_quick, KvFormat};
use shardpool_workload::RequestSource;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Epoch manager specialization used by clients (boxed sinks).
pub type ClientEpochManager = EpochManager<Box<dyn Write + Send>, Box<dyn Write + Send>>;

/// Per-client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Preheat duration before the measured run; not recorded.
    pub preheat: Duration,
    /// Cooperative queue depth; 0 selects the synchronous loop.
    pub queue_depth: usize,
    /// Verify read results against the codec (failures are fatal).
    pub check: bool,
    /// Name shown in log lines.
    pub name: String,
    /// Deterministic seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

/// One request-generating client.
pub struct Client {
    router: ShardRouter,
    epoch_mgr: ClientEpochManager,
    config: ClientConfig,
}

fn verify_value(
    format: Option<&KvFormat>,
    key: &str,
    offset: u64,
    actual: &str,
) -> Result<(), DriverError> {
    let Some(format) = format else {
        return Ok(());
    };
    let expected = format.make_val(offset);
    if check_quick(&expected, actual, false) {
        return Ok(());
    }
    Err(DriverError::DataIntegrity {
        key: key.to_string(),
        expected_prefix: expected.chars().take(16).collect(),
        actual_prefix: actual.chars().take(16).collect(),
    })
}

impl Client {
    /// Bind a client to its router and telemetry.
    #[must_use]
    pub fn new(router: ShardRouter, epoch_mgr: ClientEpochManager, config: ClientConfig) -> Self {
        Self {
            router,
            epoch_mgr,
            config,
        }
    }

    /// Wait for the start barrier, preheat, then drive every source until
    /// its deadline or the epoch manager terminates the run.
    pub fn run(self, sources: Vec<Box<dyn RequestSource>>) -> Result<(), DriverError> {
        info!("{}: wait for the signal to start", self.config.name);
        self.router.wait_for_signal()?;
        info!("{}: start to run workload", self.config.name);
        if self.config.queue_depth == 0 {
            self.run_sync(sources)
        } else {
            self.run_async(sources)
        }
    }

    fn rng(&self) -> SmallRng {
        match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }

    fn run_sync(mut self, mut sources: Vec<Box<dyn RequestSource>>) -> Result<(), DriverError> {
        let mut rng = self.rng();
        if !self.config.preheat.is_zero() {
            info!("{}: start to preheat", self.config.name);
            let preheat_begin = Instant::now();
            let source = &mut sources[0];
            while preheat_begin.elapsed() < self.config.preheat {
                let Some(req) = source.make_req(&mut rng) else {
                    break;
                };
                for op in req.ops() {
                    let outcome = self.router.do_op(op.key, op.val, op.offset)?;
                    if self.config.check {
                        if let OpOutcome::Done {
                            value: Some(actual),
                            ..
                        } = &outcome
                        {
                            verify_value(source.format(), op.key, op.offset, actual)?;
                        }
                    }
                }
            }
            info!("{}: preheat completed", self.config.name);
        }

        let begin = Instant::now();
        let mut elapsed = 0.0;
        'sources: for source in &mut sources {
            source.reset_begin_ts(begin);
            loop {
                let Some(req) = source.make_req(&mut rng) else {
                    break;
                };
                for op in req.ops() {
                    match self.router.do_op(op.key, op.val, op.offset)? {
                        OpOutcome::Done { value, latency_us } => {
                            self.epoch_mgr.record_latency(latency_us);
                            if self.config.check {
                                if let Some(actual) = &value {
                                    verify_value(source.format(), op.key, op.offset, actual)?;
                                }
                            }
                        }
                        OpOutcome::Flushed { latency_us } => {
                            self.epoch_mgr.record_latency(latency_us);
                        }
                        OpOutcome::Batched => {}
                    }
                    self.epoch_mgr.add_ops(1);
                }
                elapsed = begin.elapsed().as_secs_f64();
                if self.epoch_mgr.refresh(elapsed)? {
                    break 'sources;
                }
                if source.is_done(elapsed) {
                    break;
                }
            }
        }
        info!(
            "{}: tput={:.0} req/s",
            self.config.name,
            self.epoch_mgr.report_tput(elapsed.max(f64::MIN_POSITIVE))
        );
        self.router.flush_remaining()?;
        self.epoch_mgr.flush_histograms()?;
        Ok(())
    }

    fn run_async(self, sources: Vec<Box<dyn RequestSource>>) -> Result<(), DriverError> {
        let queue_depth = self.config.queue_depth;
        let check = self.config.check;
        let name = self.config.name.clone();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let local = LocalSet::new();

        let rng = Rc::new(RefCell::new(self.rng()));
        let router = Rc::new(self.router);
        let epoch_mgr = Rc::new(RefCell::new(self.epoch_mgr));
        let sources: Vec<Rc<RefCell<Box<dyn RequestSource>>>> = sources
            .into_iter()
            .map(|s| Rc::new(RefCell::new(s)))
            .collect();
        if sources.is_empty() {
            return Ok(());
        }

        // preheat drives the first source with the same task set, without
        // recording anything
        if !self.config.preheat.is_zero() {
            info!("{name}: start to preheat");
            let preheat = self.config.preheat;
            let first = Rc::clone(&sources[0]);
            rt.block_on(local.run_until(async {
                let mut handles = Vec::new();
                for _ in 0..queue_depth {
                    let source = Rc::clone(&first);
                    let router = Rc::clone(&router);
                    let rng = Rc::clone(&rng);
                    handles.push(tokio::task::spawn_local(async move {
                        let begin = Instant::now();
                        while begin.elapsed() < preheat {
                            let req = {
                                let mut s = source.borrow_mut();
                                let mut r = rng.borrow_mut();
                                s.make_req(&mut *r)
                            };
                            let Some(req) = req else { break };
                            for op in req.ops() {
                                let (value, _) =
                                    router.do_op_async(op.key, op.val, op.offset).await?;
                                if check {
                                    if let Some(actual) = &value {
                                        verify_value(
                                            source.borrow().format(),
                                            op.key,
                                            op.offset,
                                            actual,
                                        )?;
                                    }
                                }
                            }
                        }
                        Ok::<(), DriverError>(())
                    }));
                }
                for handle in handles {
                    handle
                        .await
                        .map_err(|e| DriverError::ClientFailed {
                            name: name.clone(),
                            reason: format!("preheat task panicked: {e}"),
                        })??;
                }
                Ok::<(), DriverError>(())
            }))?;
            info!("{name}: preheat completed");
        }

        Self::run_async_measured(
            rt, local, router, epoch_mgr, rng, sources, queue_depth, check, name,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_async_measured(
        rt: tokio::runtime::Runtime,
        local: LocalSet,
        router: Rc<ShardRouter>,
        epoch_mgr: Rc<RefCell<ClientEpochManager>>,
        rng: Rc<RefCell<SmallRng>>,
        sources: Vec<Rc<RefCell<Box<dyn RequestSource>>>>,
        queue_depth: usize,
        check: bool,
        name: String,
    ) -> Result<(), DriverError> {
        let begin = Instant::now();
        let mut last_elapsed = 0.0f64;
        for source in sources {
            source.borrow_mut().reset_begin_ts(begin);
            // cancelled exactly once, by task 0
            let epoch_done = CancellationToken::new();
            let req_gen_done = CancellationToken::new();

            let result: Result<(), DriverError> = rt.block_on(local.run_until(async {
                let mut handles = Vec::new();
                for task_id in 0..queue_depth {
                    let source = Rc::clone(&source);
                    let router = Rc::clone(&router);
                    let rng = Rc::clone(&rng);
                    let epoch_mgr = Rc::clone(&epoch_mgr);
                    let epoch_done = epoch_done.clone();
                    let req_gen_done = req_gen_done.clone();
                    handles.push(tokio::task::spawn_local(async move {
                        while !epoch_done.is_cancelled() && !req_gen_done.is_cancelled() {
                            let req = {
                                let mut s = source.borrow_mut();
                                let mut r = rng.borrow_mut();
                                s.make_req(&mut *r)
                            };
                            let Some(req) = req else { break };
                            for op in req.ops() {
                                let (value, latency_us) =
                                    router.do_op_async(op.key, op.val, op.offset).await?;
                                {
                                    let mut mgr = epoch_mgr.borrow_mut();
                                    mgr.record_latency(latency_us);
                                    mgr.add_ops(1);
                                }
                                if check {
                                    if let Some(actual) = &value {
                                        verify_value(
                                            source.borrow().format(),
                                            op.key,
                                            op.offset,
                                            actual,
                                        )?;
                                    }
                                }
                            }
                            if task_id == 0 {
                                let elapsed = begin.elapsed().as_secs_f64();
                                if epoch_mgr.borrow_mut().refresh(elapsed)? {
                                    epoch_done.cancel();
                                }
                                if source.borrow().is_done(elapsed) {
                                    req_gen_done.cancel();
                                }
                            }
                        }
                        Ok::<(), DriverError>(())
                    }));
                }
                for handle in handles {
                    handle
                        .await
                        .map_err(|e| DriverError::ClientFailed {
                            name: name.clone(),
                            reason: format!("task panicked: {e}"),
                        })??;
                }
                Ok(())
            }));
            result?;
            last_elapsed = begin.elapsed().as_secs_f64();
            if epoch_done.is_cancelled() {
                break;
            }
        }
        info!(
            "{name}: tput={:.0} req/s",
            epoch_mgr
                .borrow_mut()
                .report_tput(last_elapsed.max(f64::MIN_POSITIVE))
        );
        epoch_mgr.borrow_mut().flush_histograms()?;
        Ok(())
    }
}
