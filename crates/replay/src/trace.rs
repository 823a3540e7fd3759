// SPDX-License-Identifier: Apache-2.0

//! Trace replay: a bounded producer/consumer pipeline over a request CSV.

use crate::error::Error;
use crate::shard::key_shard_hash;
use rand::RngCore;
use shardpool_workload::{ReplayMode, Request, RequestSource};
use std::fmt;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One accepted trace row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Millisecond-scale timestamp from the trace.
    pub timestamp: u64,
    /// Whether the row is a `set`.
    pub is_write: bool,
    /// The opaque trace key.
    pub key: String,
    /// Value size for writes.
    pub val_size: u32,
}

/// Queue message; `None` is the end-of-trace sentinel.
type QueueItem = Option<TraceRecord>;

/// Limits controlling where the reader stops.
#[derive(Debug, Clone, Copy)]
pub struct TraceLimits {
    /// Stop once a row's timestamp exceeds this (milliseconds).
    pub max_timestamp: u64,
    /// Stop once this many data rows have been consumed from the file.
    pub max_line: u64,
    /// Bounded queue capacity.
    pub queue_size: usize,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            max_timestamp: u64::MAX,
            max_line: u64::MAX,
            queue_size: 1_000_000,
        }
    }
}

/// Replays a `timestamp,op,key,val_size` CSV through a bounded queue fed
/// by a dedicated reader thread.
///
/// Construction *front-loads*: it blocks until the queue is full or the
/// reader is done, so the first measured request never waits on file I/O.
/// In timestamp mode each request is released no earlier than
/// `begin + record.timestamp`.
pub struct TraceReplaySource {
    rx: flume::Receiver<QueueItem>,
    reader: Option<thread::JoinHandle<()>>,
    mode: ReplayMode,
    begin: Instant,
    line_count: u64,
    last_timestamp: u64,
    exhausted: bool,
}

impl TraceReplaySource {
    /// Spawn the reader for one shard of the trace and wait for the queue
    /// to warm up.
    pub fn new(
        path: &Path,
        mode: ReplayMode,
        shard_idx: u32,
        num_shards: u32,
        limits: TraceLimits,
    ) -> Result<Self, Error> {
        if shard_idx >= num_shards {
            return Err(Error::ShardOutOfRange {
                shard_idx,
                num_shards,
            });
        }
        // fail construction early if the file is unreadable; the reader
        // thread re-opens it for the actual streaming pass
        let probe = std::fs::File::open(path).map_err(|e| Error::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        drop(probe);

        let (tx, rx) = flume::bounded::<QueueItem>(limits.queue_size);
        let reader_path = path.to_path_buf();
        let reader = thread::Builder::new()
            .name("trace-reader".to_string())
            .spawn(move || {
                if let Err(e) = read_trace(&reader_path, shard_idx, num_shards, limits, &tx) {
                    // a broken trace invalidates the whole experiment
                    tracing::error!("trace reader failed: {e}; aborting");
                    std::process::exit(1);
                }
            })?;

        let source = Self {
            rx,
            reader: Some(reader),
            mode,
            begin: Instant::now(),
            line_count: 0,
            last_timestamp: 0,
            exhausted: false,
        };
        source.wait_front_loaded(limits.queue_size);
        Ok(source)
    }

    fn wait_front_loaded(&self, queue_size: usize) {
        let mut last_report = Instant::now();
        loop {
            let reader_alive = self.reader.as_ref().is_some_and(|h| !h.is_finished());
            let queued = self.rx.len();
            if !reader_alive || queued >= queue_size {
                return;
            }
            if last_report.elapsed() >= Duration::from_secs(5) {
                info!(
                    "waiting for trace queue to fill: {queued} / {queue_size} = {:.1}%",
                    queued as f64 * 100.0 / queue_size as f64
                );
                last_report = Instant::now();
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    fn reader_finished(&self) -> bool {
        self.reader.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl RequestSource for TraceReplaySource {
    fn make_req(&mut self, _rng: &mut dyn RngCore) -> Option<Request> {
        if self.exhausted {
            return None;
        }
        if self.rx.is_empty() && !self.reader_finished() {
            warn!("trace queue is empty; trace I/O may be the bottleneck");
        }
        let record = match self.rx.recv() {
            Ok(Some(record)) => record,
            // sentinel or a disconnected reader both end the stream
            Ok(None) | Err(_) => {
                self.exhausted = true;
                return None;
            }
        };

        self.last_timestamp = record.timestamp;
        if self.mode == ReplayMode::Timestamp {
            let target = self.begin + Duration::from_millis(record.timestamp);
            let now = Instant::now();
            if now < target {
                thread::sleep(target - now);
            }
        }

        let offset = u64::from(key_shard_hash(&record.key));
        self.line_count += 1;
        Some(if record.is_write {
            Request::Write {
                key: record.key,
                val: "v".repeat(record.val_size as usize),
                offset,
            }
        } else {
            Request::Read {
                key: record.key,
                offset,
            }
        })
    }

    fn is_done(&self, _elapsed: f64) -> bool {
        self.reader_finished() && self.rx.is_empty()
    }

    /// Re-anchor timestamp pacing when the measured run begins.
    fn reset_begin_ts(&mut self, begin: Instant) {
        self.begin = begin;
    }
}

impl fmt::Display for TraceReplaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TraceReplay[progress={}, timestamp={}]",
            self.line_count, self.last_timestamp
        )
    }
}

/// Stream one shard of the trace into the queue. Returns `Err` only for
/// conditions that invalidate the replay (unreadable file, malformed
/// structure); per-row noise is skipped with a warning.
fn read_trace(
    path: &Path,
    shard_idx: u32,
    num_shards: u32,
    limits: TraceLimits,
    tx: &flume::Sender<QueueItem>,
) -> Result<(), csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    for (line_num, row) in reader.records().enumerate() {
        if line_num as u64 >= limits.max_line {
            break;
        }
        let row = row?;
        if row.len() != 4 {
            // structural damage, not row noise
            tracing::error!("malformed trace row (want 4 fields, got {}): {row:?}", row.len());
            std::process::exit(1);
        }
        let timestamp: u64 = match row[0].parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("skipping trace row with bad timestamp: {row:?}");
                continue;
            }
        };
        if timestamp > limits.max_timestamp {
            break;
        }
        let op = &row[1];
        if op != "get" && op != "set" {
            warn!("skipping unsupported op '{op}' in trace row {line_num}");
            continue;
        }
        let key = row[2].to_string();
        let val_size: u32 = match row[3].parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("skipping trace row with bad val_size: {row:?}");
                continue;
            }
        };
        if key_shard_hash(&key) % num_shards != shard_idx {
            continue;
        }
        if tx
            .send(Some(TraceRecord {
                timestamp,
                is_write: op == "set",
                key,
                val_size,
            }))
            .is_err()
        {
            // consumer dropped; nothing left to do
            return Ok(());
        }
    }
    let _ = tx.send(None);
    Ok(())
}
