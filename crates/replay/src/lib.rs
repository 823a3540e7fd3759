// SPDX-License-Identifier: Apache-2.0

//! Trace-replay and image-load request sources.
//!
//! Both pipelines pair one background reader thread with a bounded channel
//! so file I/O never stalls the request path once warm. The reader is
//! fail-fast: a malformed file or I/O error terminates the process,
//! because replaying a partial trace would silently skew every downstream
//! measurement.

pub mod error;
pub mod image;
pub mod shard;
pub mod trace;

pub use error::Error;
pub use image::ImageLoadSource;
pub use shard::key_shard_hash;
pub use trace::TraceReplaySource;
