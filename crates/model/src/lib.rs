// SPDX-License-Identifier: Apache-2.0

//! Data model shared by the allocator, the controller, and the client tier.
//!
//! The central types are [`resource::ResourceVector`] (the immutable
//! cache/RCU/WCU/network 4-tuple every allocation decision is expressed in),
//! [`stat::EpochStat`] (a snapshot of the per-tenant counters exported by a
//! cache endpoint), and [`mrc::MissRatioCurve`] (the piecewise-linear
//! cache-size to miss-ratio mapping derived from ghost-cache counters).

pub mod error;
pub mod human;
pub mod mrc;
pub mod resource;
pub mod stat;

pub use error::Error;
pub use mrc::MissRatioCurve;
pub use resource::{DemandIfMiss, ResourceVector};
pub use stat::EpochStat;
