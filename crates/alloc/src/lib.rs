// SPDX-License-Identifier: Apache-2.0

//! Multi-resource allocation across cache tenants.
//!
//! A [`tenant::Tenant`] turns raw endpoint counters into a miss-ratio
//! curve and a per-request demand vector; the [`engine::Allocator`]
//! searches for the fairness-optimal split of the resource pools across
//! tenants (DRF, HARE, or Memshare flavored); the
//! [`controller::Controller`] runs the timed poll/allocate/apply cycle and
//! reports every decision.

pub mod controller;
pub mod engine;
pub mod error;
pub mod tenant;

pub use engine::{AllocationDecision, Allocator, PolicyFlags, TenantInput};
pub use error::Error;
pub use tenant::Tenant;
