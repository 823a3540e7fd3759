// SPDX-License-Identifier: Apache-2.0

//! Errors for the replay pipelines.

use miette::Diagnostic;
use std::path::PathBuf;

/// Errors raised while setting up or running a replay pipeline.
///
/// Errors observed *inside* the reader thread are not represented here:
/// the reader logs and exits the process instead (partial replay is never
/// meaningful).
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The trace or image file could not be opened.
    #[error("cannot open '{path}': {source}")]
    Open {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The shard index was not below the shard count.
    #[error("shard index {shard_idx} is out of range for {num_shards} shards")]
    ShardOutOfRange {
        /// Requested shard index.
        shard_idx: u32,
        /// Total shard count.
        num_shards: u32,
    },

    /// Failed to spawn the reader thread.
    #[error("failed to spawn reader thread: {0}")]
    SpawnReader(#[from] std::io::Error),
}
