// SPDX-License-Identifier: Apache-2.0

//! Routes operations from one client across its endpoints.

use shardpool_endpoint::{CacheEndpoint, EndpointError};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a routed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// The operation completed in its own round trip.
    Done {
        /// Read result; `None` for writes and missing keys.
        value: Option<String>,
        /// Round-trip latency in microseconds.
        latency_us: u64,
    },
    /// The operation was queued into a pipeline batch.
    Batched,
    /// The operation's batch was flushed by this call.
    Flushed {
        /// Flush round-trip latency in microseconds.
        latency_us: u64,
    },
}

/// Fans one client's operations out over its endpoints.
///
/// With a single endpoint (the usual per-tenant setup) every operation
/// lands there; with several (the pooled-cache setup) the key offset plus
/// a per-client shift selects the shard. Batching counts per endpoint and
/// flushes every `batch_size` queued operations.
pub struct ShardRouter {
    endpoints: Vec<Arc<dyn CacheEndpoint + Send + Sync>>,
    batch_size: usize,
    batch_cnts: Vec<Cell<usize>>,
    shard_shift: usize,
}

impl ShardRouter {
    /// Create a router; `batch_size` of zero disables batching.
    #[must_use]
    pub fn new(
        endpoints: Vec<Arc<dyn CacheEndpoint + Send + Sync>>,
        batch_size: usize,
        shard_shift: usize,
    ) -> Self {
        let batch_cnts = endpoints.iter().map(|_| Cell::new(0)).collect();
        Self {
            endpoints,
            batch_size,
            batch_cnts,
            shard_shift,
        }
    }

    fn index(&self, offset: u64) -> usize {
        (offset as usize).wrapping_add(self.shard_shift) % self.endpoints.len()
    }

    /// Block until the controller releases the start barrier. The first
    /// endpoint always hosts the barrier.
    pub fn wait_for_signal(&self) -> Result<(), EndpointError> {
        self.endpoints[0].barrier_wait()
    }

    /// Execute (or batch) one operation. `val` of `None` is a read.
    pub fn do_op(
        &self,
        key: &str,
        val: Option<&str>,
        offset: u64,
    ) -> Result<OpOutcome, EndpointError> {
        let idx = self.index(offset);
        let endpoint = &self.endpoints[idx];
        if self.batch_size > 0 {
            match val {
                None => endpoint.batch_add_get(key)?,
                Some(v) => endpoint.batch_add_set(key, v)?,
            }
            let cnt = self.batch_cnts[idx].get() + 1;
            self.batch_cnts[idx].set(cnt);
            if cnt % self.batch_size == 0 {
                let begin = Instant::now();
                let _ = endpoint.batch_flush()?;
                return Ok(OpOutcome::Flushed {
                    latency_us: begin.elapsed().as_micros() as u64,
                });
            }
            return Ok(OpOutcome::Batched);
        }
        let begin = Instant::now();
        let value = match val {
            None => endpoint.get(key)?,
            Some(v) => {
                endpoint.set(key, v)?;
                None
            }
        };
        Ok(OpOutcome::Done {
            value,
            latency_us: begin.elapsed().as_micros() as u64,
        })
    }

    /// Cooperative variant of [`Self::do_op`]; batching is not supported
    /// on this path.
    pub async fn do_op_async(
        &self,
        key: &str,
        val: Option<&str>,
        offset: u64,
    ) -> Result<(Option<String>, u64), EndpointError> {
        let endpoint = &self.endpoints[self.index(offset)];
        let begin = Instant::now();
        let value = match val {
            None => endpoint.get_async(key).await?,
            Some(v) => {
                endpoint.set_async(key, v).await?;
                None
            }
        };
        Ok((value, begin.elapsed().as_micros() as u64))
    }

    /// Flush any partially filled batches (end of run).
    pub fn flush_remaining(&self) -> Result<(), EndpointError> {
        if self.batch_size == 0 {
            return Ok(());
        }
        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            if self.batch_cnts[idx].get() % self.batch_size != 0 {
                let _ = endpoint.batch_flush()?;
            }
        }
        Ok(())
    }

    /// The endpoints this router fans out over.
    #[must_use]
    pub fn endpoints(&self) -> &[Arc<dyn CacheEndpoint + Send + Sync>] {
        &self.endpoints
    }
}
