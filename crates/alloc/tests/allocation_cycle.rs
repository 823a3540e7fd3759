// SPDX-License-Identifier: Apache-2.0

//! Full poll / allocate / apply cycles against scripted endpoints.

use shardpool_alloc::controller::{Controller, ControllerConfig, ReportSinks};
use shardpool_alloc::Tenant;
use shardpool_config::{AllocTuning, ApplyMode, PolicyKind, ResourceFloors};
use shardpool_endpoint::testing::MockEndpoint;
use shardpool_endpoint::{CacheEndpoint, EndpointStats};
use shardpool_model::{EpochStat, ResourceVector};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const GIB: u64 = 1 << 30;
const MIB: u64 = 1 << 20;

fn base() -> ResourceVector {
    ResourceVector::new(GIB, 1000.0, 100.0, 10e6)
}

fn snapshot(scale: u64, flat: bool) -> EndpointStats {
    // `scale` grows all counters so consecutive polls show progress; the
    // flat/steep flag shapes the ghost curve
    let (hits, misses) = if flat {
        (vec![100 * scale, 110 * scale], [900 * scale, 890 * scale])
    } else {
        (vec![100 * scale, 900 * scale], [900 * scale, 100 * scale])
    };
    let req = 1000 * scale;
    EndpointStats {
        ghost_ticks: vec![256 * MIB, 2 * GIB],
        stat: EpochStat {
            ghost_hit_cnt: hits,
            ghost_miss_cnt: misses.to_vec(),
            req_cnt: req,
            hit_cnt: req / 10,
            miss_cnt: req * 8 / 10,
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

fn build_controller(
    endpoints: &[Arc<MockEndpoint>],
) -> (Controller, SharedSink) {
    let floors = ResourceFloors::from_base(&base());
    let tuning = AllocTuning {
        boost_poll_freq: Duration::from_millis(10),
        gradual_poll_freq: Duration::from_millis(10),
        ..AllocTuning::from_base(&base())
    };
    let tenants = endpoints
        .iter()
        .enumerate()
        .map(|(tid, ep)| {
            Tenant::new(
                tid,
                Arc::clone(ep) as Arc<dyn CacheEndpoint + Send + Sync>,
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

fn schedule() -> ControllerConfig {
    ControllerConfig {
        alloc_sched: vec![Duration::from_millis(300)],
        stat_window: Duration::from_millis(150),
        duration: Duration::from_millis(600),
        policies: vec![PolicyKind::Hare],
        apply_mode: ApplyMode::Direct,
        skip_alloc: false,
        skip_apply: false,
    }
}

#[test]
fn unchanged_counters_downgrade_the_cycle_to_na_rows() {
    let endpoints = vec![Arc::new(MockEndpoint::new()), Arc::new(MockEndpoint::new())];
    for ep in &endpoints {
        ep.set_stats(snapshot(1, true));
    }
    let (mut controller, sink) = build_controller(&endpoints);
    controller
        .run_schedule(Instant::now(), &schedule())
        .expect("schedule");
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("NA,0,0,"), "got {}", lines[0]);
    assert!(lines[1].starts_with("NA,0,1,"), "got {}", lines[1]);
    // the previous allocation survives an NA cycle
    for (ep, tenant) in endpoints.iter().zip(controller.tenants()) {
        assert!(ep.applied_resrcs().is_empty());
        assert_eq!(tenant.curr_alloc_resrc(), &base());
    }
}

#[test]
fn progressing_counters_produce_a_decision_and_apply_it() {
    let endpoints = vec![Arc::new(MockEndpoint::new()), Arc::new(MockEndpoint::new())];
    endpoints[0].set_stats(snapshot(1, true));
    endpoints[1].set_stats(snapshot(1, false));

    // bump the counters mid-schedule so the post poll sees an interval
    // with traffic; tenant 0 stays flat, tenant 1 is steep
    let bumpers: Vec<_> = endpoints
        .iter()
        .enumerate()
        .map(|(i, ep)| {
            let ep = Arc::clone(ep);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                ep.set_stats(snapshot(3, i == 0));
            })
        })
        .collect();

    let (mut controller, sink) = build_controller(&endpoints);
    controller
        .run_schedule(Instant::now(), &schedule())
        .expect("schedule");
    for bumper in bumpers {
        bumper.join().expect("bumper thread");
    }

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("hare,0,0,"), "got {}", lines[0]);
    assert!(lines[1].starts_with("hare,0,1,"), "got {}", lines[1]);
    // direct apply pushed the decision to both endpoints
    for ep in &endpoints {
        assert!(!ep.applied_resrcs().is_empty());
    }
    // the steep tenant ends up with more cache than the flat one
    let flat = controller.tenants()[0].curr_alloc_resrc();
    let steep = controller.tenants()[1].curr_alloc_resrc();
    assert!(
        steep.cache_size > flat.cache_size,
        "flat={flat} steep={steep}"
    );
}
