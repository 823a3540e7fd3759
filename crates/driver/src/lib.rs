// SPDX-License-Identifier: Apache-2.0

//! Client run loops and experiment orchestration.
//!
//! A client is one request loop bound to a set of endpoints through a
//! [`router::ShardRouter`]; it drives a [`shardpool_workload::RequestSource`]
//! either synchronously or as a fixed-depth set of cooperative tasks on a
//! single-threaded reactor. The [`experiment::Experiment`] wires
//! workloads, clients, tenants, and the allocation controller together
//! for one run.

pub mod ckpt;
pub mod client;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod preload;
pub mod router;

pub use client::{Client, ClientConfig};
pub use error::DriverError;
pub use experiment::Experiment;
pub use router::ShardRouter;
