// SPDX-License-Identifier: Apache-2.0

//! Errors for the data-model crate.

use miette::Diagnostic;

/// Errors that can occur constructing or combining model types.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A scalar with an optional unit suffix could not be parsed.
    #[error("invalid scalar '{input}': {reason}")]
    InvalidScalar {
        /// The offending input string.
        input: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A binary-only unit suffix was used on a decimal-scaled field.
    #[error("binary unit suffix '{suffix}' is not allowed for '{input}' (decimal-scaled field)")]
    BinaryUnitOnDecimalField {
        /// The offending input string.
        input: String,
        /// The rejected suffix.
        suffix: String,
    },

    /// A resource string did not have exactly four comma-separated fields.
    #[error("resource string '{input}' must have 4 comma-separated fields, found {found}")]
    InvalidResourceArity {
        /// The offending input string.
        input: String,
        /// Number of fields found.
        found: usize,
    },

    /// An epoch-stat operation needed ghost counters but one side had none.
    #[error("ghost counter vector is empty; the endpoint has not reported any ticks yet")]
    EmptyGhostVector,

    /// A miss-ratio curve was constructed from inconsistent inputs.
    #[error("invalid miss-ratio curve: {reason}")]
    InvalidCurve {
        /// Why the curve inputs were rejected.
        reason: String,
    },
}
