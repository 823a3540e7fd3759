// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory endpoint for allocator, controller, and driver
//! tests.

use crate::error::EndpointError;
use crate::facade::{CacheEndpoint, MemoryStats, ResourceUpdate};
use crate::stats::EndpointStats;
use async_trait::async_trait;
use shardpool_model::ResourceVector;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum BatchOp {
    Get(String),
    Set(String, String),
    SetCacheOnly(String, String),
}

struct State {
    kv: HashMap<String, String>,
    batch: Vec<BatchOp>,
    stats: EndpointStats,
    memory: MemoryStats,
    resrc: ResourceVector,
    applied: Vec<ResourceUpdate>,
    ghost_ranges: Vec<(u64, u64, u64)>,
    configs: Vec<(String, Vec<String>)>,
    loaded_images: Vec<PathBuf>,
    barrier_count: u64,
    fail_next: u32,
}

impl Default for State {
    fn default() -> Self {
        Self {
            kv: HashMap::new(),
            batch: Vec::new(),
            stats: EndpointStats::default(),
            memory: MemoryStats::default(),
            resrc: ResourceVector::new(0, 0.0, 0.0, 0.0),
            applied: Vec::new(),
            ghost_ranges: Vec::new(),
            configs: Vec::new(),
            loaded_images: Vec::new(),
            barrier_count: 0,
            fail_next: 0,
        }
    }
}

/// In-memory [`CacheEndpoint`] whose stats and memory view are scripted
/// by the test.
///
/// All state sits behind one mutex, so the mock is `Send + Sync` and can
/// be shared across the controller's poll loops.
pub struct MockEndpoint {
    state: Mutex<State>,
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEndpoint {
    /// Create an empty mock with zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_fail(&self) -> Result<(), EndpointError> {
        let mut s = self.lock();
        if s.fail_next > 0 {
            s.fail_next -= 1;
            return Err(EndpointError::Unreachable {
                attempts: 1,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    /// Script the snapshot the next `stats()` calls return.
    pub fn set_stats(&self, stats: EndpointStats) {
        self.lock().stats = stats;
    }

    /// Script the memory view.
    pub fn set_total_allocated(&self, bytes: u64) {
        self.lock().memory = MemoryStats {
            total_allocated: bytes,
        };
    }

    /// Make the next `n` endpoint calls fail as transport errors.
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Script the barrier count.
    pub fn set_barrier_count(&self, count: u64) {
        self.lock().barrier_count = count;
    }

    /// Every `set_resrc` update applied so far, in order.
    #[must_use]
    pub fn applied_resrcs(&self) -> Vec<ResourceUpdate> {
        self.lock().applied.clone()
    }

    /// Every ghost range configured so far.
    #[must_use]
    pub fn ghost_ranges(&self) -> Vec<(u64, u64, u64)> {
        self.lock().ghost_ranges.clone()
    }

    /// Every `set_config` call so far.
    #[must_use]
    pub fn configs(&self) -> Vec<(String, Vec<String>)> {
        self.lock().configs.clone()
    }

    /// Paths passed to `load` so far.
    #[must_use]
    pub fn loaded_images(&self) -> Vec<PathBuf> {
        self.lock().loaded_images.clone()
    }

    /// Number of key-value pairs currently stored.
    #[must_use]
    pub fn num_keys(&self) -> usize {
        self.lock().kv.len()
    }
}

#[async_trait(?Send)]
impl CacheEndpoint for MockEndpoint {
    fn wait_ready(&self) {}

    fn get(&self, key: &str) -> Result<Option<String>, EndpointError> {
        self.check_fail()?;
        Ok(self.lock().kv.get(key).cloned())
    }

    fn set(&self, key: &str, val: &str) -> Result<(), EndpointError> {
        self.check_fail()?;
        let _ = self.lock().kv.insert(key.to_string(), val.to_string());
        Ok(())
    }

    fn set_cache_only(&self, key: &str, val: &str) -> Result<(), EndpointError> {
        self.set(key, val)
    }

    async fn get_async(&self, key: &str) -> Result<Option<String>, EndpointError> {
        self.get(key)
    }

    async fn set_async(&self, key: &str, val: &str) -> Result<(), EndpointError> {
        self.set(key, val)
    }

    fn batch_add_get(&self, key: &str) -> Result<(), EndpointError> {
        self.lock().batch.push(BatchOp::Get(key.to_string()));
        Ok(())
    }

    fn batch_add_set(&self, key: &str, val: &str) -> Result<(), EndpointError> {
        self.lock()
            .batch
            .push(BatchOp::Set(key.to_string(), val.to_string()));
        Ok(())
    }

    fn batch_add_set_cache_only(&self, key: &str, val: &str) -> Result<(), EndpointError> {
        self.lock()
            .batch
            .push(BatchOp::SetCacheOnly(key.to_string(), val.to_string()));
        Ok(())
    }

    fn batch_flush(&self) -> Result<Vec<Option<String>>, EndpointError> {
        self.check_fail()?;
        let mut s = self.lock();
        let batch = std::mem::take(&mut s.batch);
        Ok(batch
            .into_iter()
            .map(|op| match op {
                BatchOp::Get(k) => s.kv.get(&k).cloned(),
                BatchOp::Set(k, v) | BatchOp::SetCacheOnly(k, v) => {
                    let _ = s.kv.insert(k, v);
                    None
                }
            })
            .collect())
    }

    fn stats(&self) -> Result<EndpointStats, EndpointError> {
        self.check_fail()?;
        Ok(self.lock().stats.clone())
    }

    fn memory_stats(&self) -> Result<MemoryStats, EndpointError> {
        self.check_fail()?;
        Ok(self.lock().memory)
    }

    fn get_resrc(&self) -> Result<ResourceVector, EndpointError> {
        Ok(self.lock().resrc)
    }

    fn set_resrc(&self, update: &ResourceUpdate) -> Result<(), EndpointError> {
        self.check_fail()?;
        let mut s = self.lock();
        if let Some(cache) = update.cache_size {
            s.resrc.cache_size = cache;
        }
        if let Some(rcu) = update.db_rcu {
            s.resrc.db_rcu = rcu;
        }
        if let Some(wcu) = update.db_wcu {
            s.resrc.db_wcu = wcu;
        }
        if let Some(net) = update.net_bw {
            s.resrc.net_bw = net;
        }
        s.applied.push(*update);
        Ok(())
    }

    fn set_ghost_range(
        &self,
        tick: u64,
        min_tick: u64,
        max_tick: u64,
    ) -> Result<(), EndpointError> {
        self.lock().ghost_ranges.push((tick, min_tick, max_tick));
        Ok(())
    }

    fn set_config(&self, field: &str, args: &[&str]) -> Result<(), EndpointError> {
        self.lock().configs.push((
            field.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));
        Ok(())
    }

    fn barrier_wait(&self) -> Result<(), EndpointError> {
        Ok(())
    }

    fn barrier_signal(&self) -> Result<(), EndpointError> {
        self.lock().barrier_count = 0;
        Ok(())
    }

    fn barrier_count(&self) -> Result<u64, EndpointError> {
        Ok(self.lock().barrier_count)
    }

    fn load(&self, image_path: &Path) -> Result<(), EndpointError> {
        self.lock().loaded_images.push(image_path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_and_batch_round_trip() {
        let ep = MockEndpoint::new();
        ep.set("a", "1").unwrap();
        assert_eq!(ep.get("a").unwrap().as_deref(), Some("1"));
        ep.batch_add_get("a").unwrap();
        ep.batch_add_set("b", "2").unwrap();
        ep.batch_add_get("b").unwrap();
        let results = ep.batch_flush().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref(), Some("1"));
        assert!(results[1].is_none());
        assert_eq!(results[2].as_deref(), Some("2"));
    }

    #[test]
    fn partial_resource_updates_compose() {
        let ep = MockEndpoint::new();
        ep.set_resrc(&ResourceVector::new(100, 10.0, 1.0, 50.0).into())
            .unwrap();
        ep.set_resrc(&ResourceUpdate::cache_only(200)).unwrap();
        let r = ep.get_resrc().unwrap();
        assert_eq!(r.cache_size, 200);
        assert_eq!(r.db_rcu, 10.0);
        assert_eq!(ep.applied_resrcs().len(), 2);
    }

    #[test]
    fn injected_failures_surface_as_unreachable() {
        let ep = MockEndpoint::new();
        ep.fail_next(1);
        assert!(matches!(
            ep.stats(),
            Err(EndpointError::Unreachable { .. })
        ));
        assert!(ep.stats().is_ok());
    }
}
