// SPDX-License-Identifier: Apache-2.0

//! Serde-facing description of a whole experiment run.

use crate::error::Error;
use crate::tuning::{ApplyMode, PolicyKind};
use serde::{Deserialize, Serialize};
use shardpool_model::ResourceVector;

/// How the caches are populated before the measured run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum PreloadMode {
    /// Write the whole working set through the cache-only path.
    Fill,
    /// Replay the workload's own distribution for the preheat duration.
    Warmup,
    /// Stream prepared image CSVs (one per tenant).
    Load {
        /// Image path per tenant.
        image_paths: Vec<String>,
    },
}

/// Preload settings; absent means no preload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Parallel preload workers per tenant.
    pub num_workers: usize,
    /// What the workers write.
    #[serde(flatten)]
    pub mode: PreloadMode,
    /// Pipeline batch size for preload writes; 0 disables batching.
    #[serde(default)]
    pub batch_size: usize,
}

/// Everything the orchestration driver needs to run one experiment.
///
/// The struct is the programmatic entry point (there is no CLI layer); a
/// copy is serialized to `config.json` in the data directory so a run can
/// be reproduced and post-processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// One workload string per tenant (synthetic, `TRACE:` or `IMAGE:`).
    pub workloads: Vec<String>,
    /// Baseline resource string shared by all tenants.
    pub base_resrc: String,
    /// Optional per-tenant initial allocations; defaults to the baseline.
    #[serde(default)]
    pub init_resrcs: Option<Vec<String>>,
    /// Allocation timestamps, seconds from experiment start.
    #[serde(default)]
    pub alloc_sched: Vec<u64>,
    /// Seconds before each allocation timestamp reserved for statistics.
    #[serde(default = "default_stat_window")]
    pub alloc_stat_window: u64,
    /// Experiment duration in seconds; 0 means unbounded.
    pub duration: u64,
    /// Preheat duration in seconds before measurement starts.
    #[serde(default)]
    pub preheat_duration: u64,
    /// Optional operation-count limit per client.
    #[serde(default)]
    pub count: Option<u64>,
    /// Reporting epoch in seconds.
    #[serde(default = "default_epoch_duration")]
    pub epoch_duration: u64,
    /// Pipeline batch size; 0 disables batching.
    #[serde(default)]
    pub batch_size: usize,
    /// Cooperative queue depth; 0 selects the synchronous loop.
    #[serde(default)]
    pub async_queue_depth: usize,
    /// Number of adjacent epochs aggregated before deriving MRC/demand.
    #[serde(default = "default_smooth_window")]
    pub smooth_window: usize,
    /// Additive salt on measured miss ratios.
    #[serde(default)]
    pub mrc_salt: f64,
    /// Skip applying decisions whose gain is below this margin; 0
    /// disables the gate.
    #[serde(default)]
    pub alloc_apply_threshold: f64,
    /// How allocation decisions are applied.
    #[serde(default)]
    pub apply_mode: ApplyMode,
    /// Cache preload before the measured run.
    #[serde(default)]
    pub preload: Option<PreloadConfig>,
    /// Policies evaluated at each allocation; only the last one is applied.
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyKind>,
    /// Verify `get` results against the codec (failures are fatal).
    #[serde(default)]
    pub check: bool,
    /// Only collect statistics; never run the allocation algorithm.
    #[serde(default)]
    pub skip_alloc: bool,
    /// Run the allocation algorithm but never apply its decision.
    #[serde(default)]
    pub skip_apply: bool,
    /// Trace replay: stop beyond this timestamp (milliseconds).
    #[serde(default = "default_max_timestamp")]
    pub trace_max_timestamp: u64,
    /// Trace replay: stop beyond this many accepted lines.
    #[serde(default = "default_max_line")]
    pub trace_max_line: u64,
    /// Trace replay: bounded queue capacity.
    #[serde(default = "default_trace_queue_size")]
    pub trace_queue_size: usize,
}

fn default_stat_window() -> u64 {
    30
}

fn default_epoch_duration() -> u64 {
    1
}

fn default_smooth_window() -> usize {
    1
}

fn default_policies() -> Vec<PolicyKind> {
    vec![PolicyKind::Hare]
}

fn default_max_timestamp() -> u64 {
    u64::MAX
}

fn default_max_line() -> u64 {
    u64::MAX
}

fn default_trace_queue_size() -> usize {
    1_000_000
}

impl ExperimentConfig {
    /// Parse the shared baseline resource vector.
    pub fn base_resource(&self) -> Result<ResourceVector, Error> {
        Ok(self.base_resrc.parse()?)
    }

    /// Parse the per-tenant initial allocations, defaulting to the
    /// baseline when none were given.
    pub fn init_resources(&self) -> Result<Vec<ResourceVector>, Error> {
        let base = self.base_resource()?;
        match &self.init_resrcs {
            None => Ok(vec![base; self.workloads.len()]),
            Some(list) => list.iter().map(|s| Ok(s.parse()?)).collect(),
        }
    }

    /// Check cross-field consistency before the experiment starts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.workloads.is_empty() {
            return Err(Error::InvalidExperiment {
                reason: "no workloads".to_string(),
            });
        }
        if let Some(list) = &self.init_resrcs {
            if list.len() != self.workloads.len() {
                return Err(Error::InvalidExperiment {
                    reason: format!(
                        "{} init_resrcs for {} workloads",
                        list.len(),
                        self.workloads.len()
                    ),
                });
            }
        }
        if self.epoch_duration == 0 {
            return Err(Error::InvalidExperiment {
                reason: "epoch_duration must be positive".to_string(),
            });
        }
        if self.alloc_sched.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidExperiment {
                reason: "alloc_sched must be strictly increasing".to_string(),
            });
        }
        for &ts in &self.alloc_sched {
            if ts < self.alloc_stat_window {
                return Err(Error::InvalidExperiment {
                    reason: format!(
                        "allocation at {ts}s leaves no room for a {}s stat window",
                        self.alloc_stat_window
                    ),
                });
            }
        }
        if self.preheat_duration > 0 && self.workloads.iter().any(|w| w.starts_with("TRACE:")) {
            return Err(Error::InvalidExperiment {
                reason: "preheat is incompatible with trace replay".to_string(),
            });
        }
        if let Some(preload) = &self.preload {
            if preload.num_workers == 0 {
                return Err(Error::InvalidExperiment {
                    reason: "preload.num_workers must be positive".to_string(),
                });
            }
            if let PreloadMode::Load { image_paths } = &preload.mode {
                if image_paths.len() != self.workloads.len() {
                    return Err(Error::InvalidExperiment {
                        reason: format!(
                            "{} preload images for {} workloads",
                            image_paths.len(),
                            self.workloads.len()
                        ),
                    });
                }
            }
        }
        let _ = self.base_resource()?;
        let _ = self.init_resources()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ExperimentConfig {
        serde_json::from_value(serde_json::json!({
            "workloads": ["k=16,v=100,n=1000,w=0.1,d=zipf:0.99"],
            "base_resrc": "1G,1000,100,10M",
            "duration": 60,
        }))
        .unwrap()
    }

    #[test]
    fn defaults_are_filled_in() {
        let cfg = minimal();
        assert_eq!(cfg.epoch_duration, 1);
        assert_eq!(cfg.smooth_window, 1);
        assert_eq!(cfg.trace_queue_size, 1_000_000);
        assert_eq!(cfg.policies, vec![PolicyKind::Hare]);
        assert_eq!(cfg.apply_mode, ApplyMode::Direct);
        cfg.validate().unwrap();
    }

    #[test]
    fn schedule_must_fit_stat_window() {
        let mut cfg = minimal();
        cfg.alloc_sched = vec![10];
        cfg.alloc_stat_window = 30;
        assert!(cfg.validate().is_err());
        cfg.alloc_sched = vec![40, 80];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn init_resrcs_arity_is_checked() {
        let mut cfg = minimal();
        cfg.init_resrcs = Some(vec!["1G,1,1,1".into(), "1G,1,1,1".into()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn preheat_rejected_for_traces() {
        let mut cfg = minimal();
        cfg.workloads = vec!["TRACE:loop:/tmp/trace.csv".into()];
        cfg.preheat_duration = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn init_resources_default_to_base() {
        let cfg = minimal();
        let init = cfg.init_resources().unwrap();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0], cfg.base_resource().unwrap());
    }
}
