// SPDX-License-Identifier: Apache-2.0

//! Epoch bookkeeping: rotation, per-epoch reporting, and termination.

use crate::latency::LatencyHistogramRing;
use crate::Error;
use std::io::Write;

/// Drives the measurement epochs of one client.
///
/// `add_ops` only bumps a counter; all I/O happens inside `refresh`, which
/// performs at most one epoch rotation per call. Termination is by
/// operation count, by elapsed duration, or never (both limits unset).
pub struct EpochManager<D: Write, H: Write> {
    ring: LatencyHistogramRing<H>,
    data_sink: D,
    epoch_duration: u64,
    epoch: u64,
    num_ops: u64,
    num_ops_last_epoch: u64,
    count_limit: Option<u64>,
    duration_limit: u64,
    elapsed_last_reported: f64,
    num_ops_last_reported: u64,
}

impl<D: Write, H: Write> EpochManager<D, H> {
    /// Create a manager owning the latency ring and the `data.csv` sink.
    ///
    /// `duration_limit` of zero means unbounded.
    pub fn new(
        ring: LatencyHistogramRing<H>,
        data_sink: D,
        epoch_duration: u64,
        count_limit: Option<u64>,
        duration_limit: u64,
    ) -> Self {
        Self {
            ring,
            data_sink,
            epoch_duration,
            epoch: 0,
            num_ops: 0,
            num_ops_last_epoch: 0,
            count_limit,
            duration_limit,
            elapsed_last_reported: 0.0,
            num_ops_last_reported: 0,
        }
    }

    /// Count completed operations; no I/O.
    pub fn add_ops(&mut self, num_ops: u64) {
        self.num_ops += num_ops;
    }

    /// Record one latency sample into the current epoch's histogram.
    pub fn record_latency(&mut self, latency_us: u64) {
        self.ring.record(latency_us);
    }

    /// The current epoch index.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Advance epochs for the given elapsed time; returns whether the run
    /// is done.
    ///
    /// On an epoch boundary the previous epoch's throughput/latency row is
    /// flushed to `data.csv` before the histogram ring rotates.
    pub fn refresh(&mut self, elapsed: f64) -> Result<bool, Error> {
        let new_epoch = (elapsed / self.epoch_duration as f64) as u64;
        if new_epoch > self.epoch {
            self.flush_row(elapsed)?;
            self.num_ops_last_epoch = self.num_ops;
            self.epoch = new_epoch;
        }
        if let Some(limit) = self.count_limit {
            if self.num_ops >= limit {
                return Ok(true);
            }
        }
        if self.duration_limit > 0 && elapsed >= self.duration_limit as f64 {
            return Ok(true);
        }
        self.ring.refresh_epoch(self.epoch)?;
        Ok(false)
    }

    /// Flush every in-memory histogram up to the current epoch; called
    /// once when the run ends.
    pub fn flush_histograms(&mut self) -> Result<(), Error> {
        self.ring.flush_until(self.epoch)
    }

    /// Throughput since the previous call to this method.
    pub fn report_tput(&mut self, elapsed: f64) -> f64 {
        let window = elapsed - self.elapsed_last_reported;
        let tput = if window > 0.0 {
            (self.num_ops - self.num_ops_last_reported) as f64 / window
        } else {
            0.0
        };
        self.elapsed_last_reported = elapsed;
        self.num_ops_last_reported = self.num_ops;
        tput
    }

    fn flush_row(&mut self, elapsed: f64) -> Result<(), Error> {
        let tput =
            (self.num_ops - self.num_ops_last_epoch) as f64 / self.epoch_duration as f64;
        let h = self.ring.current_histogram();
        let q = |quantile: f64| h.value_at_quantile(quantile);
        writeln!(
            self.data_sink,
            "{:.3},{},{},{:.0},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            elapsed,
            self.epoch * self.epoch_duration,
            tput,
            h.mean(),
            h.min(),
            h.max(),
            q(0.10),
            q(0.20),
            q(0.30),
            q(0.40),
            q(0.50),
            q(0.60),
            q(0.70),
            q(0.80),
            q(0.90),
            q(0.99),
            q(0.999),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(
        count: Option<u64>,
        duration: u64,
    ) -> EpochManager<Vec<u8>, Vec<u8>> {
        let ring = LatencyHistogramRing::new(8, Vec::new(), 1).expect("ring");
        EpochManager::new(ring, Vec::new(), 1, count, duration)
    }

    fn rows(mgr: &EpochManager<Vec<u8>, Vec<u8>>) -> Vec<String> {
        String::from_utf8(mgr.data_sink.clone())
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn rotation_without_ops_flushes_a_zero_row() {
        let mut mgr = manager(None, 0);
        assert!(!mgr.refresh(0.5).expect("refresh"));
        assert!(rows(&mgr).is_empty());
        assert!(!mgr.refresh(1.2).expect("refresh"));
        let rows = rows(&mgr);
        assert_eq!(rows.len(), 1);
        let cols: Vec<&str> = rows[0].split(',').collect();
        assert_eq!(cols.len(), 17);
        assert_eq!(cols[1], "0"); // elapsed column is the epoch start
        assert_eq!(cols[2], "0"); // zero throughput
        assert_eq!(cols[5], "0"); // empty histogram max
        assert_eq!(mgr.epoch(), 1);
    }

    #[test]
    fn tput_counts_ops_since_last_epoch() {
        let mut mgr = manager(None, 0);
        mgr.add_ops(500);
        assert!(!mgr.refresh(1.0).expect("refresh"));
        let rows = rows(&mgr);
        let cols: Vec<&str> = rows[0].split(',').collect();
        assert_eq!(cols[2], "500");
    }

    #[test]
    fn count_limit_terminates() {
        let mut mgr = manager(Some(100), 0);
        mgr.add_ops(99);
        assert!(!mgr.refresh(0.1).expect("refresh"));
        mgr.add_ops(1);
        assert!(mgr.refresh(0.2).expect("refresh"));
    }

    #[test]
    fn duration_limit_terminates() {
        let mut mgr = manager(None, 10);
        assert!(!mgr.refresh(9.9).expect("refresh"));
        assert!(mgr.refresh(10.0).expect("refresh"));
    }

    #[test]
    fn at_most_one_rotation_per_call() {
        let mut mgr = manager(None, 0);
        mgr.add_ops(10);
        // elapsed jumps three epochs at once; a single row is emitted
        assert!(!mgr.refresh(3.5).expect("refresh"));
        assert_eq!(rows(&mgr).len(), 1);
        assert_eq!(mgr.epoch(), 3);
    }

    #[test]
    fn report_tput_is_relative_to_last_report() {
        let mut mgr = manager(None, 0);
        mgr.add_ops(100);
        assert_eq!(mgr.report_tput(2.0), 50.0);
        mgr.add_ops(30);
        assert_eq!(mgr.report_tput(5.0), 10.0);
    }
}
