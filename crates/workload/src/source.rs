// SPDX-License-Identifier: Apache-2.0

//! The request-source contract and the synthetic implementation.

use crate::error::Error;
use crate::offset::{self, OffsetGen};
use crate::request::{Request, RequestBuilder};
use crate::spec::{DynamicWorkload, StaticWorkload};
use rand::RngCore;
use std::fmt;
use std::time::Instant;

/// A stream of requests with a completion condition.
///
/// `make_req` returns `None` once the source is exhausted (trace sources
/// only; synthetic sources never exhaust). `is_done` is the time-based
/// condition checked by the run loop.
pub trait RequestSource {
    /// Produce the next request, or `None` when exhausted.
    fn make_req(&mut self, rng: &mut dyn RngCore) -> Option<Request>;

    /// Whether the source's deadline has passed.
    fn is_done(&self, elapsed: f64) -> bool;

    /// The codec in use, when the source encodes its own keys.
    ///
    /// Trace-driven sources carry opaque keys and return `None`; integrity
    /// checking is only possible when a codec is available.
    fn format(&self) -> Option<&crate::kv_format::KvFormat> {
        None
    }

    /// Re-anchor time-based pacing at the start of the measured run.
    ///
    /// Only timestamp-paced sources care; the default does nothing.
    fn reset_begin_ts(&mut self, _begin: Instant) {}
}

/// Offset-driven request source for one static workload phase.
pub struct SyntheticSource {
    builder: RequestBuilder,
    offsets: Box<dyn OffsetGen + Send>,
    until_elapsed: u64,
    describe: String,
}

impl SyntheticSource {
    /// Build a source for a phase; the workload must name a distribution.
    pub fn new(workload: &StaticWorkload, until_elapsed: u64) -> Result<Self, Error> {
        let distrib = workload.distrib.as_ref().ok_or_else(|| Error::MissingField {
            field: "distrib".to_string(),
            input: workload.to_string(),
        })?;
        Ok(Self {
            builder: RequestBuilder::new(workload)?,
            offsets: offset::build(distrib, workload.num_keys),
            until_elapsed,
            describe: workload.to_string(),
        })
    }

    /// Build one source per phase of a dynamic workload.
    pub fn from_dynamic(workload: &DynamicWorkload) -> Result<Vec<Self>, Error> {
        workload
            .phases
            .iter()
            .map(|p| Self::new(&p.workload, p.until_secs))
            .collect()
    }
}

impl RequestSource for SyntheticSource {
    fn make_req(&mut self, rng: &mut dyn RngCore) -> Option<Request> {
        let offset = self.offsets.next_offset(rng);
        Some(self.builder.make_req(offset, rng))
    }

    fn is_done(&self, elapsed: f64) -> bool {
        self.until_elapsed > 0 && elapsed >= self.until_elapsed as f64
    }

    fn format(&self) -> Option<&crate::kv_format::KvFormat> {
        Some(self.builder.format())
    }
}

impl fmt::Display for SyntheticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe)
    }
}
