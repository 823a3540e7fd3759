// SPDX-License-Identifier: Apache-2.0

//! Bulk image loading: stream a `key,val_size` CSV as write requests.

use crate::error::Error;
use rand::RngCore;
use shardpool_workload::{Request, RequestSource};
use std::fmt;
use std::path::Path;
use std::thread;
use tracing::error;

/// Queue message; `None` is the end-of-image sentinel.
type QueueItem = Option<(String, u32)>;

const IMAGE_QUEUE_SIZE: usize = 10_000_000;

/// Streams an image CSV as writes, sharded round-robin by line number.
///
/// Unlike trace replay there is no pacing and no front-loading: preload
/// throughput is bounded by the endpoint, not by file I/O. Any malformed
/// row is fatal, because a partially loaded image corrupts every
/// subsequent measurement.
pub struct ImageLoadSource {
    rx: flume::Receiver<QueueItem>,
    reader: Option<thread::JoinHandle<()>>,
    line_count: u64,
    exhausted: bool,
}

impl ImageLoadSource {
    /// Spawn the reader for one shard of the image.
    pub fn new(path: &Path, shard_idx: u32, num_shards: u32) -> Result<Self, Error> {
        if shard_idx >= num_shards {
            return Err(Error::ShardOutOfRange {
                shard_idx,
                num_shards,
            });
        }
        let probe = std::fs::File::open(path).map_err(|e| Error::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        drop(probe);

        let (tx, rx) = flume::bounded::<QueueItem>(IMAGE_QUEUE_SIZE);
        let reader_path = path.to_path_buf();
        let reader = thread::Builder::new()
            .name("image-reader".to_string())
            .spawn(move || {
                if let Err(e) = read_image(&reader_path, shard_idx, num_shards, &tx) {
                    error!("image reader failed: {e}; aborting");
                    std::process::exit(1);
                }
            })?;

        Ok(Self {
            rx,
            reader: Some(reader),
            line_count: 0,
            exhausted: false,
        })
    }

    fn reader_finished(&self) -> bool {
        self.reader.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl RequestSource for ImageLoadSource {
    fn make_req(&mut self, _rng: &mut dyn RngCore) -> Option<Request> {
        if self.exhausted {
            return None;
        }
        let (key, val_size) = match self.rx.recv() {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(_) => {
                self.exhausted = true;
                return None;
            }
        };
        let offset = u64::from(crate::shard::key_shard_hash(&key));
        self.line_count += 1;
        Some(Request::Write {
            val: "v".repeat(val_size as usize),
            key,
            offset,
        })
    }

    fn is_done(&self, _elapsed: f64) -> bool {
        self.reader_finished() && self.rx.is_empty()
    }
}

impl fmt::Display for ImageLoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageLoad[progress={}]", self.line_count)
    }
}

fn read_image(
    path: &Path,
    shard_idx: u32,
    num_shards: u32,
    tx: &flume::Sender<QueueItem>,
) -> Result<(), csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    for (line_number, row) in reader.records().enumerate() {
        if line_number as u32 % num_shards != shard_idx {
            continue;
        }
        let row = row?;
        if row.len() != 2 {
            error!("malformed image row (want 2 fields, got {}): {row:?}", row.len());
            std::process::exit(1);
        }
        let val_size: u32 = match row[1].parse() {
            Ok(v) => v,
            Err(e) => {
                error!("malformed image row val_size '{}': {e}", &row[1]);
                std::process::exit(1);
            }
        };
        if tx.send(Some((row[0].to_string(), val_size))).is_err() {
            return Ok(());
        }
    }
    let _ = tx.send(None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::io::Write as _;

    fn write_image(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(f, "key,val_size").expect("header");
        for row in rows {
            writeln!(f, "{row}").expect("row");
        }
        f.flush().expect("flush");
        f
    }

    fn drain_keys(src: &mut ImageLoadSource) -> Vec<String> {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut out = Vec::new();
        while let Some(req) = src.make_req(&mut rng) {
            match req {
                Request::Write { key, .. } => out.push(key),
                other => panic!("image load only writes, got {other:?}"),
            }
        }
        out
    }

    #[test]
    fn image_rows_become_writes() {
        let f = write_image(&["a,3", "b,0", "c,5"]);
        let mut src = ImageLoadSource::new(f.path(), 0, 1).expect("source");
        assert_eq!(drain_keys(&mut src), vec!["a", "b", "c"]);
        assert!(src.is_done(0.0));
    }

    #[test]
    fn round_robin_sharding_partitions_by_line() {
        let f = write_image(&["a,1", "b,1", "c,1", "d,1"]);
        let mut even = ImageLoadSource::new(f.path(), 0, 2).expect("source");
        let mut odd = ImageLoadSource::new(f.path(), 1, 2).expect("source");
        assert_eq!(drain_keys(&mut even), vec!["a", "c"]);
        assert_eq!(drain_keys(&mut odd), vec!["b", "d"]);
    }
}
