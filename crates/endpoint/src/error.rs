// SPDX-License-Identifier: Apache-2.0

//! Errors for the endpoint facade.
//!
//! Keep these `Send + Sync`: they cross from blocking worker threads into
//! the cooperative client tier.

use miette::Diagnostic;

/// Errors surfaced by a cache endpoint implementation.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum EndpointError {
    /// The endpoint did not respond within the transport's retry budget.
    ///
    /// The tenant owning this endpoint is marked stale for the current
    /// allocation cycle; the cycle itself continues.
    #[error("endpoint unreachable after {attempts} attempts: {reason}")]
    Unreachable {
        /// How many transport attempts were made.
        attempts: u32,
        /// Description of the last failure.
        reason: String,
    },

    /// The endpoint answered, but outside its protocol.
    #[error("endpoint protocol error: {message}")]
    Protocol {
        /// What the endpoint sent.
        message: String,
    },

    /// A stats snapshot was missing a required field.
    #[error("stats snapshot is missing field '{name}'")]
    MissingStat {
        /// The absent dotted field name.
        name: String,
    },

    /// A stats field had an unusable value.
    #[error("stats field '{name}' has unusable value: {value}")]
    BadStatValue {
        /// The dotted field name.
        name: String,
        /// The value as received.
        value: String,
    },
}
