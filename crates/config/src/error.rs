// SPDX-License-Identifier: Apache-2.0

//! Errors for the configuration crate.

use miette::Diagnostic;

/// Errors raised while building or validating configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A field in the experiment configuration is out of range or
    /// inconsistent with another field.
    #[error("invalid experiment configuration: {reason}")]
    InvalidExperiment {
        /// Human-readable description of the inconsistency.
        reason: String,
    },

    /// An embedded resource string failed to parse.
    #[error("invalid resource string: {0}")]
    InvalidResource(#[from] shardpool_model::Error),

    /// Ghost-range derivation was given degenerate inputs.
    #[error("cannot derive ghost range: {reason}")]
    InvalidGhostRange {
        /// Why the inputs were rejected.
        reason: String,
    },
}
