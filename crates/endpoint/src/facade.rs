// SPDX-License-Identifier: Apache-2.0

//! The `CacheEndpoint` capability trait.

use crate::error::EndpointError;
use crate::stats::EndpointStats;
use async_trait::async_trait;
use shardpool_model::ResourceVector;
use std::path::Path;

/// Process memory view of an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total bytes currently allocated by the cache process.
    pub total_allocated: u64,
}

/// A resource assignment where `None` leaves the field unchanged (the
/// wire protocol's `-1`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUpdate {
    /// New cache size in bytes.
    pub cache_size: Option<u64>,
    /// New read-unit budget.
    pub db_rcu: Option<f64>,
    /// New write-unit budget.
    pub db_wcu: Option<f64>,
    /// New network bandwidth.
    pub net_bw: Option<f64>,
}

impl ResourceUpdate {
    /// Update only the cache size.
    #[must_use]
    pub const fn cache_only(cache_size: u64) -> Self {
        Self {
            cache_size: Some(cache_size),
            db_rcu: None,
            db_wcu: None,
            net_bw: None,
        }
    }
}

impl From<ResourceVector> for ResourceUpdate {
    fn from(r: ResourceVector) -> Self {
        Self {
            cache_size: Some(r.cache_size),
            db_rcu: Some(r.db_rcu),
            db_wcu: Some(r.db_wcu),
            net_bw: Some(r.net_bw),
        }
    }
}

/// Capability set a tenant holds onto its cache shard.
///
/// Implementations are external (a modified cache server speaking its own
/// protocol); everything in-tree programs against this trait. Methods take
/// `&self`: an implementation serializes calls on its connection
/// internally, and the async KV variants are cooperative (`!Send`
/// futures, resolved on the client's single-threaded reactor).
#[async_trait(?Send)]
pub trait CacheEndpoint {
    /// Block until the endpoint accepts commands.
    fn wait_ready(&self);

    /// Blocking point read; `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, EndpointError>;

    /// Blocking point write.
    fn set(&self, key: &str, val: &str) -> Result<(), EndpointError>;

    /// Blocking cache-only write (preload path; bypasses the backing
    /// store).
    fn set_cache_only(&self, key: &str, val: &str) -> Result<(), EndpointError>;

    /// Cooperative point read.
    async fn get_async(&self, key: &str) -> Result<Option<String>, EndpointError>;

    /// Cooperative point write.
    async fn set_async(&self, key: &str, val: &str) -> Result<(), EndpointError>;

    /// Queue a read into the pipeline batch.
    fn batch_add_get(&self, key: &str) -> Result<(), EndpointError>;

    /// Queue a write into the pipeline batch.
    fn batch_add_set(&self, key: &str, val: &str) -> Result<(), EndpointError>;

    /// Queue a cache-only write into the pipeline batch.
    fn batch_add_set_cache_only(&self, key: &str, val: &str) -> Result<(), EndpointError>;

    /// Flush the pipeline batch in a single round trip, returning the
    /// read results in queue order (`None` for writes and missing keys).
    fn batch_flush(&self) -> Result<Vec<Option<String>>, EndpointError>;

    /// Atomic counters snapshot.
    fn stats(&self) -> Result<EndpointStats, EndpointError>;

    /// Process memory view.
    fn memory_stats(&self) -> Result<MemoryStats, EndpointError>;

    /// Currently applied resource allocation.
    fn get_resrc(&self) -> Result<ResourceVector, EndpointError>;

    /// Apply a (possibly partial) resource allocation.
    fn set_resrc(&self, update: &ResourceUpdate) -> Result<(), EndpointError>;

    /// Configure the ghost-cache sampling range, in keys.
    fn set_ghost_range(&self, tick: u64, min_tick: u64, max_tick: u64)
        -> Result<(), EndpointError>;

    /// Opaque key-value configuration surface.
    fn set_config(&self, field: &str, args: &[&str]) -> Result<(), EndpointError>;

    /// Block on the client/controller rendezvous barrier.
    fn barrier_wait(&self) -> Result<(), EndpointError>;

    /// Release the rendezvous barrier.
    fn barrier_signal(&self) -> Result<(), EndpointError>;

    /// Number of clients currently waiting on the barrier.
    fn barrier_count(&self) -> Result<u64, EndpointError>;

    /// Bulk-load a `key,val_size` CSV image from the endpoint's side.
    fn load(&self, image_path: &Path) -> Result<(), EndpointError>;
}
