// SPDX-License-Identifier: Apache-2.0

//! Client-side latency and throughput telemetry.
//!
//! Latencies land in a ring of HDR histograms keyed by measurement epoch
//! ([`latency::LatencyHistogramRing`]); a slot is only serialized and
//! flushed when its epoch falls behind the ring's frontier, so the hot
//! path never writes. The [`epoch::EpochManager`] drives epoch rotation,
//! emits one `data.csv` row per epoch, and decides run termination.

pub mod epoch;
pub mod error;
pub mod latency;

pub use epoch::EpochManager;
pub use error::Error;
pub use latency::LatencyHistogramRing;

/// Header of the per-client `data.csv`.
pub const DATA_CSV_HEADER: &str =
    "timestamp,elapsed,tput,lat_mean,lat_min,lat_max,p10,p20,p30,p40,p50,p60,p70,p80,p90,p99,p999";

/// Header of the per-client `lat_hist.csv`.
pub const LAT_HIST_CSV_HEADER: &str = "elapsed,lat_hist_blob";
