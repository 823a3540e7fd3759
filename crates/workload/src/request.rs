// SPDX-License-Identifier: Apache-2.0

//! Requests and the offset-to-request builder.

use crate::kv_format::KvFormat;
use crate::offset::Offset;
use crate::spec::StaticWorkload;
use rand::Rng;
use rand::RngCore;

/// A single operation against a cache endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Op<'a> {
    /// The encoded key.
    pub key: &'a str,
    /// The encoded value; `None` for reads.
    pub val: Option<&'a str>,
    /// The key offset, used for shard routing.
    pub offset: u64,
}

/// One generated request: a point read, a point write, or a scan read.
///
/// Scans are read-only; a write drawn on a scan distribution degrades to a
/// point write at the run's first offset.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Point read.
    Read {
        /// Encoded key.
        key: String,
        /// Key offset.
        offset: u64,
    },
    /// Point write.
    Write {
        /// Encoded key.
        key: String,
        /// Encoded value.
        val: String,
        /// Key offset.
        offset: u64,
    },
    /// Multi-key scan read.
    ScanRead {
        /// Encoded keys, in scan order.
        keys: Vec<String>,
        /// Offsets parallel to `keys`.
        offsets: Vec<u64>,
    },
}

impl Request {
    /// Whether this request mutates the store.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Request::Write { .. })
    }

    /// Flatten into per-key operations, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<Op<'_>> {
        match self {
            Request::Read { key, offset } => vec![Op {
                key,
                val: None,
                offset: *offset,
            }],
            Request::Write { key, val, offset } => vec![Op {
                key,
                val: Some(val),
                offset: *offset,
            }],
            Request::ScanRead { keys, offsets } => keys
                .iter()
                .zip(offsets)
                .map(|(k, o)| Op {
                    key: k,
                    val: None,
                    offset: *o,
                })
                .collect(),
        }
    }
}

/// Turns drawn offsets into requests according to a static workload's
/// write ratio and codec.
#[derive(Debug)]
pub struct RequestBuilder {
    format: KvFormat,
    write_ratio: f64,
}

impl RequestBuilder {
    /// Build from a static workload description.
    pub fn new(workload: &StaticWorkload) -> Result<Self, crate::error::Error> {
        Ok(Self {
            format: KvFormat::new(workload.key_size, workload.val_size)?,
            write_ratio: workload.write_ratio.unwrap_or(0.0),
        })
    }

    /// The codec in use (exposed for integrity checking).
    #[must_use]
    pub const fn format(&self) -> &KvFormat {
        &self.format
    }

    /// Build the next request for a drawn offset.
    #[must_use]
    pub fn make_req(&self, offset: Offset, rng: &mut dyn RngCore) -> Request {
        let is_write = rng.gen::<f64>() < self.write_ratio;
        match offset {
            Offset::One(o) => {
                if is_write {
                    Request::Write {
                        key: self.format.make_key(o),
                        val: self.format.make_val(o),
                        offset: o,
                    }
                } else {
                    Request::Read {
                        key: self.format.make_key(o),
                        offset: o,
                    }
                }
            }
            Offset::Many(run) => {
                if is_write {
                    // scans only read; a write targets the run's first key
                    let o = run[0];
                    Request::Write {
                        key: self.format.make_key(o),
                        val: self.format.make_val(o),
                        offset: o,
                    }
                } else {
                    Request::ScanRead {
                        keys: run.iter().map(|&o| self.format.make_key(o)).collect(),
                        offsets: run,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::str::FromStr;

    fn builder(write_ratio: f64) -> RequestBuilder {
        let wl = StaticWorkload::from_str(&format!("k=16,v=40,n=1000,w={write_ratio},d=unif"))
            .unwrap();
        RequestBuilder::new(&wl).unwrap()
    }

    #[test]
    fn write_ratio_one_always_writes() {
        let b = builder(1.0);
        let mut rng = SmallRng::seed_from_u64(1);
        for o in 0..100 {
            assert!(b.make_req(Offset::One(o), &mut rng).is_write());
        }
    }

    #[test]
    fn write_ratio_zero_never_writes() {
        let b = builder(0.0);
        let mut rng = SmallRng::seed_from_u64(2);
        for o in 0..100 {
            assert!(!b.make_req(Offset::One(o), &mut rng).is_write());
        }
    }

    #[test]
    fn scan_write_degrades_to_first_key_point_write() {
        let b = builder(1.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let req = b.make_req(Offset::Many(vec![7, 8, 9]), &mut rng);
        match req {
            Request::Write { offset, ref key, ref val } => {
                assert_eq!(offset, 7);
                assert_eq!(key, &b.format.make_key(7));
                assert_eq!(val, &b.format.make_val(7));
            }
            other => panic!("expected a point write, got {other:?}"),
        }
    }

    #[test]
    fn scan_read_keeps_run_order() {
        let b = builder(0.0);
        let mut rng = SmallRng::seed_from_u64(4);
        let req = b.make_req(Offset::Many(vec![3, 1, 2]), &mut rng);
        match req {
            Request::ScanRead { keys, offsets } => {
                assert_eq!(offsets, vec![3, 1, 2]);
                assert_eq!(keys.len(), 3);
                let ops_offsets: Vec<u64> =
                    Request::ScanRead { keys, offsets }.ops().iter().map(|op| op.offset).collect();
                assert_eq!(ops_offsets, vec![3, 1, 2]);
            }
            other => panic!("expected a scan read, got {other:?}"),
        }
    }
}
