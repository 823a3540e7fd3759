// SPDX-License-Identifier: Apache-2.0

//! Errors for the telemetry crate.

use miette::Diagnostic;

/// Errors raised by the histogram ring or the epoch manager.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// Histogram construction was given an invalid configuration.
    #[error("cannot create latency histogram: {source}")]
    CreateHistogram {
        /// Underlying hdrhistogram error.
        #[source]
        source: hdrhistogram::CreationError,
    },

    /// A histogram blob could not be serialized for flushing.
    #[error("cannot serialize latency histogram: {reason}")]
    SerializeHistogram {
        /// Underlying serialization failure.
        reason: String,
    },

    /// Writing to a CSV sink failed.
    #[error("cannot write telemetry row: {source}")]
    Sink {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The ring was configured without any slots.
    #[error("latency histogram ring needs at least one slot")]
    EmptyRing,
}
