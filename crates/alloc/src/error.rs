// SPDX-License-Identifier: Apache-2.0

//! Errors for the allocation crate.

use miette::Diagnostic;

/// Errors raised by tenants, the engine, or the controller.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// No reads were observed in the statistics window.
    ///
    /// Recovered by the controller: the cycle emits an `NA` allocation row
    /// and the previous allocation stays in place.
    #[error("tenant {tid}: no progress observed in the statistics window")]
    NoProgress {
        /// The tenant that made no progress.
        tid: usize,
    },

    /// The tenant's endpoint could not be reached.
    #[error("tenant {tid}: {source}")]
    Endpoint {
        /// The tenant whose endpoint failed.
        tid: usize,
        /// The transport-level failure.
        #[source]
        source: shardpool_endpoint::EndpointError,
    },

    /// A derived quantity (stat delta, miss-ratio curve) was malformed.
    #[error(transparent)]
    Model(#[from] shardpool_model::Error),

    /// A tenant was asked to estimate throughput before its first
    /// post-snapshot poll.
    #[error("tenant {tid}: no model available yet (poll_post_snapshot has not succeeded)")]
    NotPolled {
        /// The tenant missing a model.
        tid: usize,
    },

    /// A pending-queue operation was issued with an empty queue.
    #[error("tenant {tid}: pending allocation queue is empty")]
    NoPending {
        /// The tenant with the empty queue.
        tid: usize,
    },

    /// A boost apply was started while an earlier one was still pending.
    #[error("tenant {tid}: pending allocation queue is not empty")]
    PendingNotEmpty {
        /// The tenant with the stale queue.
        tid: usize,
    },

    /// The allocator was run with no tenants.
    #[error("allocator has no tenants")]
    NoTenants,

    /// Even the zero-fairness allocation does not fit the pools.
    #[error("infeasible allocation: {reason}")]
    Infeasible {
        /// Which constraint cannot be met.
        reason: String,
    },

    /// Writing a report row or snapshot failed.
    #[error("cannot write allocation report: {source}")]
    Report {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing a tenant view snapshot failed.
    #[error("cannot serialize tenant view: {source}")]
    View {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
