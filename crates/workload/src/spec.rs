// SPDX-License-Identifier: Apache-2.0

//! Workload string grammar.
//!
//! Static: `k=<u32>,v=<u32>,n=<u64>[,w=<f32>][,d=<distrib>]` (long field
//! names accepted). Dynamic: `<static>[@<until>[min|sec]];...`, where a
//! leading `~` clones the previous phase and overlays the named fields.
//! Trace replay: `TRACE:<timestamp|loop>:<path>`. Image load:
//! `IMAGE:<path>`.

use crate::distrib::Distrib;
use crate::error::Error;
use shardpool_model::human::{self, UnitScale};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One fixed-parameter workload phase.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticWorkload {
    /// Key length in bytes.
    pub key_size: usize,
    /// Value length in bytes.
    pub val_size: usize,
    /// Working-set size in keys.
    pub num_keys: u64,
    /// Probability that a request is a write; `None` means read-only.
    pub write_ratio: Option<f64>,
    /// Offset distribution; must be present to generate requests.
    pub distrib: Option<Distrib>,
}

impl StaticWorkload {
    /// Bytes per key-value pair; used as the ghost-range size hint.
    #[must_use]
    pub const fn req_size(&self) -> usize {
        self.key_size + self.val_size
    }

    /// Parse a field list on top of an optional base workload.
    ///
    /// With a base, every field may be overridden (the `~` overlay form);
    /// without one, duplicates are rejected and `k`, `v`, `n` must all be
    /// present.
    pub fn parse_with_base(s: &str, base: Option<&StaticWorkload>) -> Result<Self, Error> {
        let allow_dup = base.is_some();
        let mut key_size = base.map(|b| b.key_size);
        let mut val_size = base.map(|b| b.val_size);
        let mut num_keys = base.map(|b| b.num_keys);
        let mut write_ratio = base.and_then(|b| b.write_ratio);
        let mut distrib = base.and_then(|b| b.distrib);
        let mut seen: Vec<&str> = Vec::new();

        for field in s.split(',') {
            let field = field.trim();
            let (k, v) = field.split_once('=').ok_or_else(|| Error::UnknownField {
                field: field.to_string(),
                input: s.to_string(),
            })?;
            let canonical = match k {
                "n" | "num_keys" => "num_keys",
                "k" | "key_size" => "key_size",
                "v" | "val_size" => "val_size",
                "w" | "write_ratio" => "write_ratio",
                "d" | "distrib" => "distrib",
                other => {
                    return Err(Error::UnknownField {
                        field: other.to_string(),
                        input: s.to_string(),
                    })
                }
            };
            if !allow_dup && seen.contains(&canonical) {
                return Err(Error::DuplicateField {
                    field: canonical.to_string(),
                    input: s.to_string(),
                });
            }
            seen.push(canonical);

            let invalid = |reason: String| Error::InvalidField {
                field: canonical.to_string(),
                input: s.to_string(),
                reason,
            };
            match canonical {
                "num_keys" => {
                    let parsed = human::parse_human(v, UnitScale::Decimal)
                        .map_err(|e| invalid(e.to_string()))?;
                    num_keys = Some(parsed as u64);
                }
                "key_size" => key_size = Some(v.parse().map_err(|e| invalid(format!("{e}")))?),
                "val_size" => val_size = Some(v.parse().map_err(|e| invalid(format!("{e}")))?),
                "write_ratio" => {
                    write_ratio = Some(v.parse().map_err(|e| invalid(format!("{e}")))?)
                }
                "distrib" => distrib = Some(v.parse()?),
                _ => unreachable!("canonical names are exhaustive"),
            }
        }

        let require = |field: &str, present: bool| {
            if present {
                Ok(())
            } else {
                Err(Error::MissingField {
                    field: field.to_string(),
                    input: s.to_string(),
                })
            }
        };
        require("key_size", key_size.is_some())?;
        require("val_size", val_size.is_some())?;
        require("num_keys", num_keys.is_some())?;
        Ok(Self {
            key_size: key_size.unwrap_or_default(),
            val_size: val_size.unwrap_or_default(),
            num_keys: num_keys.unwrap_or_default(),
            write_ratio,
            distrib,
        })
    }
}

impl FromStr for StaticWorkload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::parse_with_base(s, None)
    }
}

impl fmt::Display for StaticWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k={},v={},n={}", self.key_size, self.val_size, self.num_keys)?;
        if let Some(w) = self.write_ratio {
            write!(f, ",w={w}")?;
        }
        if let Some(d) = &self.distrib {
            write!(f, ",d={d}")?;
        }
        Ok(())
    }
}

/// One phase of a dynamic workload with its deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadPhase {
    /// Elapsed seconds after which the phase ends; 0 means unbounded.
    pub until_secs: u64,
    /// The phase's workload parameters.
    pub workload: StaticWorkload,
}

/// An ordered sequence of timed workload phases.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicWorkload {
    /// Phases in play order.
    pub phases: Vec<WorkloadPhase>,
}

impl DynamicWorkload {
    /// The first phase's parameters (used for preload and ghost hints).
    #[must_use]
    pub fn first(&self) -> &StaticWorkload {
        &self.phases[0].workload
    }

    /// The last phase's parameters (recorded in checkpoints).
    #[must_use]
    pub fn last(&self) -> &StaticWorkload {
        &self.phases[self.phases.len() - 1].workload
    }
}

impl FromStr for DynamicWorkload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut phases: Vec<WorkloadPhase> = Vec::new();
        for part in s.split(';') {
            let part = part.trim();
            let (wl_str, until_str) = match part.split_once('@') {
                Some((w, u)) => (w, u),
                None => (part, "0"),
            };
            let until_secs = parse_until(until_str).map_err(|reason| Error::InvalidField {
                field: "until".to_string(),
                input: s.to_string(),
                reason,
            })?;
            let workload = if let Some(overlay) = wl_str.strip_prefix('~') {
                let base = phases.last().map(|p| &p.workload).ok_or_else(|| {
                    Error::OverlayWithoutBase {
                        input: s.to_string(),
                    }
                })?;
                // clone-with-overrides is resolved here, at parse time
                StaticWorkload::parse_with_base(overlay, Some(base))?
            } else {
                wl_str.parse()?
            };
            phases.push(WorkloadPhase {
                until_secs,
                workload,
            });
        }
        if phases.is_empty() {
            return Err(Error::UnknownWorkload {
                input: s.to_string(),
            });
        }
        Ok(Self { phases })
    }
}

impl fmt::Display for DynamicWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .phases
            .iter()
            .map(|p| format!("{}@{}", p.workload, p.until_secs))
            .collect();
        write!(f, "{}", parts.join(";"))
    }
}

fn parse_until(s: &str) -> Result<u64, String> {
    let (digits, mult) = if let Some(d) = s.strip_suffix("min") {
        (d, 60)
    } else if let Some(d) = s.strip_suffix("sec") {
        (d, 1)
    } else {
        (s, 1)
    };
    digits
        .parse::<u64>()
        .map(|v| v * mult)
        .map_err(|e| format!("{e}"))
}

/// How a trace replay paces its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Honor the trace's timestamps relative to a begin instant.
    Timestamp,
    /// Closed loop: submit as fast as the consumer allows.
    Loop,
}

/// A parsed top-level workload string of any supported form.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadSpec {
    /// Synthetic phases.
    Dynamic(DynamicWorkload),
    /// Trace replay from a `timestamp,op,key,val_size` CSV.
    Trace {
        /// Pacing mode.
        mode: ReplayMode,
        /// Path to the trace CSV.
        path: PathBuf,
    },
    /// Bulk image load from a `key,val_size` CSV.
    Image {
        /// Path to the image CSV.
        path: PathBuf,
    },
}

impl FromStr for WorkloadSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("TRACE:") {
            let (mode, path) = rest.split_once(':').ok_or_else(|| Error::UnknownWorkload {
                input: s.to_string(),
            })?;
            let mode = match mode.trim().to_ascii_lowercase().as_str() {
                "timestamp" => ReplayMode::Timestamp,
                "loop" => ReplayMode::Loop,
                _ => {
                    return Err(Error::UnknownWorkload {
                        input: s.to_string(),
                    })
                }
            };
            Ok(WorkloadSpec::Trace {
                mode,
                path: PathBuf::from(path.trim()),
            })
        } else if let Some(path) = s.strip_prefix("IMAGE:") {
            Ok(WorkloadSpec::Image {
                path: PathBuf::from(path.trim()),
            })
        } else {
            Ok(WorkloadSpec::Dynamic(s.parse()?))
        }
    }
}
