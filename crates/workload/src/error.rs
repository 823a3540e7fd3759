// SPDX-License-Identifier: Apache-2.0

//! Errors for workload parsing and request generation.

use miette::Diagnostic;

/// Errors raised while parsing workload strings or building requests.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A distribution string did not match the grammar.
    #[error("unknown distribution '{input}' (expected seq | unif | zipf:<theta> | scan:<theta>:<max_range>)")]
    UnknownDistrib {
        /// The offending input.
        input: String,
    },

    /// A workload field was not recognized.
    #[error("unknown workload field '{field}' in '{input}'")]
    UnknownField {
        /// The unrecognized field name.
        field: String,
        /// The full workload string.
        input: String,
    },

    /// A workload field appeared twice in one phase.
    #[error("duplicate workload field '{field}' in '{input}'")]
    DuplicateField {
        /// The duplicated field name.
        field: String,
        /// The full workload string.
        input: String,
    },

    /// A field value could not be parsed.
    #[error("invalid value for '{field}' in '{input}': {reason}")]
    InvalidField {
        /// The field whose value failed to parse.
        field: String,
        /// The full workload string.
        input: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A required field was missing from a static workload.
    #[error("missing workload field '{field}' in '{input}'")]
    MissingField {
        /// The missing field name.
        field: String,
        /// The full workload string.
        input: String,
    },

    /// A phase used `~` with no previous phase to clone.
    #[error("'~' overlay used in the first phase of '{input}'")]
    OverlayWithoutBase {
        /// The full workload string.
        input: String,
    },

    /// The key/value sizes cannot host the codec fields.
    #[error("key_size={key_size} val_size={val_size} leave no room for the offset field")]
    CodecTooNarrow {
        /// Configured key size.
        key_size: usize,
        /// Configured value size.
        val_size: usize,
    },

    /// A workload string had an unsupported top-level form.
    #[error("unrecognized workload '{input}'")]
    UnknownWorkload {
        /// The offending input.
        input: String,
    },
}
