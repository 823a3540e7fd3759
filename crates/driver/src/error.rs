// SPDX-License-Identifier: Apache-2.0

//! Errors for the driver crate.

use miette::Diagnostic;
use std::path::PathBuf;

/// Failures surfaced by clients, preload, or orchestration.
///
/// Per the propagation rule, anything reaching this type aborts the
/// experiment: per-tenant and per-cycle failures have already been
/// downgraded inside the allocation crate.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum DriverError {
    /// An endpoint call failed beyond its retry budget.
    #[error(transparent)]
    Endpoint(#[from] shardpool_endpoint::EndpointError),

    /// A workload string or codec configuration was invalid.
    #[error(transparent)]
    Workload(#[from] shardpool_workload::Error),

    /// A replay pipeline could not be constructed.
    #[error(transparent)]
    Replay(#[from] shardpool_replay::Error),

    /// Telemetry sinks or histograms failed.
    #[error(transparent)]
    Telemetry(#[from] shardpool_telemetry::Error),

    /// The allocation subsystem failed outside its recoverable paths.
    #[error(transparent)]
    Alloc(#[from] shardpool_alloc::Error),

    /// The experiment configuration was inconsistent.
    #[error(transparent)]
    Config(#[from] shardpool_config::Error),

    /// In check mode, a `get` returned a value failing the codec
    /// predicate.
    #[error("data integrity violation for key '{key}': expected '{expected_prefix}...', got '{actual_prefix}...'")]
    DataIntegrity {
        /// The key whose value failed the check.
        key: String,
        /// Leading bytes of the expected value.
        expected_prefix: String,
        /// Leading bytes of the fetched value.
        actual_prefix: String,
    },

    /// A client thread exited before reaching the start barrier, or
    /// failed while running.
    #[error("client '{name}' failed: {reason}")]
    ClientFailed {
        /// The client's name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A checkpoint does not match the current configuration.
    #[error("checkpoint at '{path}' does not match the configuration: {reason}")]
    CheckpointMismatch {
        /// The checkpoint directory.
        path: PathBuf,
        /// The mismatching parameter.
        reason: String,
    },

    /// Filesystem failures while preparing or writing the data dir.
    #[error("I/O failure: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization failures for config or stats dumps.
    #[error("cannot serialize snapshot: {source}")]
    Json {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
