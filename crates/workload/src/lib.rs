// SPDX-License-Identifier: Apache-2.0

//! Synthetic workload generation.
//!
//! A workload turns a stream of key offsets (drawn from a configurable
//! distribution) into read/write requests against fixed-width encoded keys
//! and values. Workloads are described by compact strings
//! (`k=16,v=100,n=1M,w=0.1,d=zipf:0.99`) and can be chained into timed
//! phases; trace replay and image loading reuse the same
//! [`source::RequestSource`] contract from their own crate.

pub mod distrib;
pub mod error;
pub mod kv_format;
pub mod offset;
pub mod request;
pub mod source;
pub mod spec;

pub use distrib::Distrib;
pub use error::Error;
pub use kv_format::KvFormat;
pub use offset::{Offset, OffsetGen};
pub use request::{Op, Request, RequestBuilder};
pub use source::{RequestSource, SyntheticSource};
pub use spec::{DynamicWorkload, ReplayMode, StaticWorkload, WorkloadSpec};
