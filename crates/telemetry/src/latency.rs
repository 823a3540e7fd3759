// SPDX-License-Identifier: Apache-2.0

//! Ring of epoch-indexed HDR histograms with deferred flushing.

use crate::error::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hdrhistogram::serialization::{Serializer, V2Serializer};
use hdrhistogram::Histogram;
use std::io::Write;
use tracing::debug;

/// Histogram value range: 1 microsecond to 1 second, 3 significant digits.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 1_000_000;
const HIST_SIGFIG: u8 = 3;

/// Epoch marker for a slot that holds no data.
const EMPTY: i64 = -1;

struct Slot {
    /// Epoch currently hosted by this slot; [`EMPTY`] when idle.
    epoch: i64,
    hist: Histogram<u64>,
}

/// A fixed ring of HDR histograms, one slot per `epoch % N`.
///
/// `record` adds to the slot selected by the last `refresh_epoch` call and
/// never blocks or writes. When an epoch rotation reclaims a slot whose
/// previous occupant was never flushed, that occupant (and every earlier
/// unflushed epoch) is serialized to the sink first, so no recorded sample
/// is ever dropped.
///
/// Not thread-safe; all recordings for one client happen on one thread.
pub struct LatencyHistogramRing<W: Write> {
    slots: Vec<Slot>,
    current: usize,
    max_epoch_flushed: i64,
    sink: W,
    epoch_duration: u64,
}

impl<W: Write> LatencyHistogramRing<W> {
    /// Create a ring of `num_slots` histograms flushing to `sink`; the
    /// ring starts positioned at epoch 0.
    pub fn new(num_slots: usize, sink: W, epoch_duration: u64) -> Result<Self, Error> {
        if num_slots == 0 {
            return Err(Error::EmptyRing);
        }
        let mut slots = Vec::with_capacity(num_slots);
        for _ in 0..num_slots {
            slots.push(Slot {
                epoch: EMPTY,
                hist: Histogram::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                    .map_err(|source| Error::CreateHistogram { source })?,
            });
        }
        let mut ring = Self {
            slots,
            current: 0,
            max_epoch_flushed: EMPTY,
            sink,
            epoch_duration,
        };
        ring.refresh_epoch(0)?;
        Ok(ring)
    }

    /// Record one latency sample, in microseconds. Never suspends.
    pub fn record(&mut self, latency_us: u64) {
        self.slots[self.current].hist.saturating_record(latency_us.max(1));
    }

    /// Rotate the ring to `new_epoch`.
    ///
    /// Flushes the reclaimed slot's previous occupant (plus any earlier
    /// unflushed epochs) before resetting it. Calling again with the same
    /// epoch is a no-op.
    pub fn refresh_epoch(&mut self, new_epoch: u64) -> Result<(), Error> {
        let idx = (new_epoch as usize) % self.slots.len();
        if self.slots[idx].epoch == new_epoch as i64 {
            self.current = idx;
            return Ok(());
        }
        if self.slots[idx].epoch >= 0 {
            let evicted = self.slots[idx].epoch;
            self.flush_until(evicted as u64)?;
        }
        self.slots[idx].hist.reset();
        self.slots[idx].epoch = new_epoch as i64;
        self.current = idx;
        Ok(())
    }

    /// Flush every unflushed slot whose epoch is at most `until_epoch`.
    pub fn flush_until(&mut self, until_epoch: u64) -> Result<(), Error> {
        let begin = self.max_epoch_flushed + 1;
        let end = until_epoch as i64;
        self.max_epoch_flushed = self.max_epoch_flushed.max(end);
        for flush_epoch in begin..=end {
            let idx = (flush_epoch as usize) % self.slots.len();
            if self.slots[idx].epoch < 0 {
                continue;
            }
            self.flush_slot(idx)?;
            debug!("flushed latency histogram of epoch {flush_epoch}");
        }
        Ok(())
    }

    /// The histogram currently being recorded into.
    #[must_use]
    pub fn current_histogram(&self) -> &Histogram<u64> {
        &self.slots[self.current].hist
    }

    /// Total samples recorded into the ring and not yet flushed.
    #[must_use]
    pub fn unflushed_samples(&self) -> u64 {
        self.slots
            .iter()
            .filter(|s| s.epoch >= 0)
            .map(|s| s.hist.len())
            .sum()
    }

    fn flush_slot(&mut self, idx: usize) -> Result<(), Error> {
        let slot = &mut self.slots[idx];
        let mut blob = Vec::new();
        V2Serializer::new()
            .serialize(&slot.hist, &mut blob)
            .map_err(|e| Error::SerializeHistogram {
                reason: format!("{e:?}"),
            })?;
        let elapsed = slot.epoch as u64 * self.epoch_duration;
        writeln!(self.sink, "{},{}", elapsed, BASE64.encode(&blob))?;
        slot.hist.reset();
        slot.epoch = EMPTY;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdrhistogram::serialization::Deserializer;
    use std::io::Cursor;

    /// Shared sink the tests can inspect after moves.
    #[derive(Clone, Default)]
    struct SharedSink(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedSink {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.borrow().clone())
                .expect("utf8")
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn decode_blob(line: &str) -> Histogram<u64> {
        let blob = line.split(',').nth(1).expect("blob column");
        let bytes = BASE64.decode(blob).expect("base64");
        Deserializer::new()
            .deserialize(&mut Cursor::new(bytes))
            .expect("histogram blob")
    }

    #[test]
    fn recorded_equals_flushed_for_any_rotation_pattern() {
        let sink = SharedSink::default();
        let mut ring = LatencyHistogramRing::new(4, sink.clone(), 1).expect("ring");
        let mut recorded = 0u64;
        for epoch in 0..10u64 {
            ring.refresh_epoch(epoch).expect("refresh");
            for i in 0..(epoch + 1) * 3 {
                ring.record(100 + i);
                recorded += 1;
            }
        }
        ring.flush_until(9).expect("final flush");
        let flushed: u64 = sink.lines().iter().map(|l| decode_blob(l).len()).sum();
        assert_eq!(flushed, recorded);
        assert_eq!(ring.unflushed_samples(), 0);
    }

    #[test]
    fn refresh_same_epoch_is_idempotent() {
        let sink = SharedSink::default();
        let mut ring = LatencyHistogramRing::new(4, sink.clone(), 1).expect("ring");
        ring.record(10);
        ring.refresh_epoch(0).expect("refresh");
        // the slot kept its samples and nothing was flushed
        assert_eq!(ring.current_histogram().len(), 1);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn eviction_flushes_the_previous_occupant() {
        let sink = SharedSink::default();
        let mut ring = LatencyHistogramRing::new(2, sink.clone(), 5).expect("ring");
        ring.record(42);
        // epoch 2 reclaims slot 0, evicting epoch 0
        ring.refresh_epoch(2).expect("refresh");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        // the flushed row is stamped with the occupant's epoch * duration
        assert!(lines[0].starts_with("0,"));
        assert_eq!(decode_blob(&lines[0]).len(), 1);
    }

    #[test]
    fn flush_line_elapsed_uses_epoch_duration() {
        let sink = SharedSink::default();
        let mut ring = LatencyHistogramRing::new(8, sink.clone(), 3).expect("ring");
        ring.refresh_epoch(2).expect("refresh");
        ring.record(7);
        ring.flush_until(2).expect("flush");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("6,"), "got {}", lines[0]);
    }

    #[test]
    fn merged_blobs_reproduce_the_aggregate_distribution() {
        let sink = SharedSink::default();
        let mut ring = LatencyHistogramRing::new(4, sink.clone(), 1).expect("ring");
        // a bimodal mixture spread over 10 epochs
        let mut reference =
            Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG).expect("hist");
        let mut state = 0x9e3779b97f4a7c15u64;
        let mut next = || {
            // xorshift; cheap deterministic mixture source
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for epoch in 0..10u64 {
            ring.refresh_epoch(epoch).expect("refresh");
            for _ in 0..10_000 {
                let r = next();
                let v = if r % 10 < 8 { 50 + r % 100 } else { 5_000 + r % 10_000 };
                ring.record(v);
                reference.saturating_record(v.max(1));
            }
        }
        ring.flush_until(9).expect("flush");

        let mut merged =
            Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG).expect("hist");
        for line in sink.lines() {
            merged.add(decode_blob(&line)).expect("merge");
        }
        assert_eq!(merged.len(), reference.len());
        for q in [0.5, 0.99] {
            let a = merged.value_at_quantile(q) as f64;
            let b = reference.value_at_quantile(q) as f64;
            assert!(
                (a - b).abs() / b.max(1.0) < 0.01,
                "quantile {q}: merged={a} reference={b}"
            );
        }
    }
}
