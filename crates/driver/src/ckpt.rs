// SPDX-License-Identifier: Apache-2.0

//! Pre-flight validation of cache checkpoints.
//!
//! A checkpoint directory carries the endpoint's own dump files plus a
//! `ckpt.json` describing the workload it was taken under. Loading a
//! checkpoint whose key/value shape differs from the configured workload
//! would silently corrupt every measurement, so any mismatch aborts
//! before the experiment starts.

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use shardpool_model::ResourceVector;
use shardpool_workload::{DynamicWorkload, StaticWorkload};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Metadata stored next to a checkpoint's dump files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointInfo {
    /// The workload string the checkpoint was taken under.
    pub workload: String,
    /// Endpoint memory stats at checkpoint time (dotted names,
    /// `total.allocated` included).
    pub mem_stats: HashMap<String, u64>,
}

/// Files every checkpoint directory must contain besides `ckpt.json`.
const REQUIRED_DUMPS: [&str; 2] = ["dump.kv", "dump.ghost"];

/// Validate one checkpoint directory against the configured workload.
///
/// Compatibility rules: key and value sizes must match exactly, and the
/// checkpoint must not contain keys outside the configured working set
/// (`num_keys` must not shrink). A checkpoint smaller than 95% of the
/// initial cache only warns; the cache will warm the difference.
pub fn check_load_ckpt(
    ckpt_dir: &Path,
    workload: &DynamicWorkload,
    init_resrc: Option<&ResourceVector>,
) -> Result<(), DriverError> {
    let mismatch = |reason: String| DriverError::CheckpointMismatch {
        path: ckpt_dir.to_path_buf(),
        reason,
    };

    for dump in REQUIRED_DUMPS {
        if !ckpt_dir.join(dump).is_file() {
            return Err(mismatch(format!("missing {dump}")));
        }
    }
    let info_path = ckpt_dir.join("ckpt.json");
    let info_raw = std::fs::read_to_string(&info_path)
        .map_err(|e| mismatch(format!("cannot read ckpt.json: {e}")))?;
    let info: CheckpointInfo = serde_json::from_str(&info_raw)
        .map_err(|e| mismatch(format!("malformed ckpt.json: {e}")))?;

    let ckpt_workload: StaticWorkload = info
        .workload
        .parse()
        .map_err(|e| mismatch(format!("malformed checkpoint workload: {e}")))?;
    let first = workload.first();
    if ckpt_workload.key_size != first.key_size {
        return Err(mismatch(format!(
            "key_size {} != configured {}",
            ckpt_workload.key_size, first.key_size
        )));
    }
    if ckpt_workload.val_size != first.val_size {
        return Err(mismatch(format!(
            "val_size {} != configured {}",
            ckpt_workload.val_size, first.val_size
        )));
    }
    if ckpt_workload.num_keys > first.num_keys {
        return Err(mismatch(format!(
            "checkpoint holds {} keys but the workload only has {}",
            ckpt_workload.num_keys, first.num_keys
        )));
    }

    if let Some(init) = init_resrc {
        if let Some(&ckpt_mem) = info.mem_stats.get("total.allocated") {
            if (ckpt_mem as f64) < init.cache_size as f64 * 0.95 {
                warn!(
                    "checkpoint data ({ckpt_mem}B) is smaller than the configured cache ({}B)",
                    init.cache_size
                );
            }
        }
    }
    Ok(())
}
