// SPDX-License-Identifier: Apache-2.0

//! Preload paths: fill the cache before the measured run.
//!
//! `fill` writes the working set through the cache-only path in strided
//! slices (one slice per preload worker), by default in reverse so the
//! hot low offsets land last and survive eviction. `warmup` replays the
//! workload's own distribution for a fixed duration. `load` streams a
//! prepared image CSV.

use crate::error::DriverError;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use shardpool_endpoint::CacheEndpoint;
use shardpool_replay::ImageLoadSource;
use shardpool_workload::{RequestSource, StaticWorkload, SyntheticSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Write one strided slice of the working set through the cache-only
/// path.
pub fn fill(
    endpoint: &Arc<dyn CacheEndpoint + Send + Sync>,
    workload: &StaticWorkload,
    stride: u64,
    stride_shift: u64,
    batch_size: usize,
    reverse: bool,
) -> Result<(), DriverError> {
    let format = shardpool_workload::KvFormat::new(workload.key_size, workload.val_size)?;
    let begin = Instant::now();
    let mut count = 0usize;

    let offsets: Box<dyn Iterator<Item = u64>> = if reverse {
        Box::new((0..workload.num_keys).rev().filter(move |o| o % stride == stride_shift))
    } else {
        Box::new((0..workload.num_keys).filter(move |o| o % stride == stride_shift))
    };
    for offset in offsets {
        let key = format.make_key(offset);
        let val = format.make_val(offset);
        if batch_size > 0 {
            endpoint.batch_add_set_cache_only(&key, &val)?;
            count += 1;
            if count % batch_size == 0 {
                let _ = endpoint.batch_flush()?;
            }
        } else {
            endpoint.set_cache_only(&key, &val)?;
            count += 1;
        }
    }
    if batch_size > 0 && count % batch_size != 0 {
        let _ = endpoint.batch_flush()?;
    }
    info!(
        "preload-fill [{workload},{stride},{stride_shift}] complete in {:.1?} (reverse={reverse})",
        begin.elapsed()
    );
    Ok(())
}

/// Drive the workload's own distribution against the cache-only path for
/// a fixed duration.
pub fn warmup(
    endpoint: &Arc<dyn CacheEndpoint + Send + Sync>,
    workload: &StaticWorkload,
    duration: Duration,
    batch_size: usize,
    seed: Option<u64>,
) -> Result<(), DriverError> {
    let mut source = SyntheticSource::new(workload, 0)?;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let begin = Instant::now();
    let mut count = 0usize;
    while begin.elapsed() < duration {
        let Some(req) = source.make_req(&mut rng) else {
            break;
        };
        for op in req.ops() {
            // warmup only needs the keys resident; every op becomes a
            // cache-only write
            let val = match op.val {
                Some(v) => v.to_string(),
                None => source
                    .format()
                    .map(|f| f.make_val(op.offset))
                    .unwrap_or_default(),
            };
            if batch_size > 0 {
                endpoint.batch_add_set_cache_only(op.key, &val)?;
                count += 1;
                if count % batch_size == 0 {
                    let _ = endpoint.batch_flush()?;
                }
            } else {
                endpoint.set_cache_only(op.key, &val)?;
            }
        }
    }
    if batch_size > 0 && count % batch_size != 0 {
        let _ = endpoint.batch_flush()?;
    }
    info!("preload-warmup [{workload}] complete in {:.1?}", begin.elapsed());
    Ok(())
}

/// Stream a prepared image through the cache-only path.
pub fn load(
    endpoint: &Arc<dyn CacheEndpoint + Send + Sync>,
    mut image: ImageLoadSource,
    batch_size: usize,
) -> Result<(), DriverError> {
    let mut rng = SmallRng::seed_from_u64(0);
    let begin = Instant::now();
    let mut count = 0usize;
    while let Some(req) = image.make_req(&mut rng) {
        for op in req.ops() {
            let val = op.val.unwrap_or_default();
            if batch_size > 0 {
                endpoint.batch_add_set_cache_only(op.key, val)?;
                count += 1;
                if count % batch_size == 0 {
                    let _ = endpoint.batch_flush()?;
                }
            } else {
                endpoint.set_cache_only(op.key, val)?;
            }
        }
    }
    if batch_size > 0 && count % batch_size != 0 {
        let _ = endpoint.batch_flush()?;
    }
    info!("preload-load complete in {:.1?}", begin.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardpool_endpoint::testing::MockEndpoint;
    use std::str::FromStr;

    fn endpoint() -> Arc<dyn CacheEndpoint + Send + Sync> {
        Arc::new(MockEndpoint::new())
    }

    #[test]
    fn fill_covers_exactly_one_stride_slice() {
        let ep = Arc::new(MockEndpoint::new());
        let wl = StaticWorkload::from_str("k=16,v=40,n=100,w=1.0,d=seq").expect("workload");
        fill(
            &(Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>),
            &wl,
            4,
            1,
            0,
            true,
        )
        .expect("fill");
        // offsets 1, 5, 9, ... 97 -> 25 keys
        assert_eq!(ep.num_keys(), 25);
    }

    #[test]
    fn fill_with_batching_flushes_the_tail() {
        let ep = Arc::new(MockEndpoint::new());
        let wl = StaticWorkload::from_str("k=16,v=40,n=10,w=1.0,d=seq").expect("workload");
        fill(
            &(Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>),
            &wl,
            1,
            0,
            3,
            false,
        )
        .expect("fill");
        assert_eq!(ep.num_keys(), 10);
    }

    #[test]
    fn warmup_populates_some_of_the_working_set() {
        let ep = Arc::new(MockEndpoint::new());
        let wl = StaticWorkload::from_str("k=16,v=40,n=50,w=0.0,d=unif").expect("workload");
        warmup(
            &(Arc::clone(&ep) as Arc<dyn CacheEndpoint + Send + Sync>),
            &wl,
            Duration::from_millis(20),
            0,
            Some(1),
        )
        .expect("warmup");
        assert!(ep.num_keys() > 0);
    }

    #[test]
    fn warmup_requires_a_distribution() {
        let wl = StaticWorkload::from_str("k=16,v=40,n=50").expect("workload");
        assert!(warmup(&endpoint(), &wl, Duration::from_millis(1), 0, Some(1)).is_err());
    }
}
