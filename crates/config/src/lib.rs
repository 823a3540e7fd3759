// SPDX-License-Identifier: Apache-2.0

//! Configuration surface for the allocator and the experiment harness.
//!
//! Three layers live here:
//! - [`floors::ResourceFloors`]: process-wide per-resource minima, built
//!   once at startup and read-only afterwards;
//! - [`tuning::AllocTuning`]: knobs for the allocation engine and the
//!   apply phase (cache granularity, bisection tolerance, boost/gradual
//!   pacing);
//! - [`experiment::ExperimentConfig`]: the serde-facing description of a
//!   whole experiment, dumped to `config.json` alongside the run's data.

pub mod error;
pub mod experiment;
pub mod floors;
pub mod ghost;
pub mod tuning;

pub use error::Error;
pub use experiment::{ExperimentConfig, PreloadConfig, PreloadMode};
pub use floors::ResourceFloors;
pub use ghost::GhostRangeConfig;
pub use tuning::{AllocTuning, ApplyMode, PolicyKind};
