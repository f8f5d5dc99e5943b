//! Ingest pacing against downstream queue depth (component G, spec.md §4.G).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

/// High-water mark for the disk-writer queue.
pub const DISK_WRITER_MARK: u64 = 10;
/// High-water mark for the index-sink queue.
pub const INDEX_SINK_MARK: u64 = 30;
/// Interval between poll retries while blocked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Emit a debug notice every this many poll cycles spent waiting on a single
/// queue, mirroring the `msgcnt % 10` rate limit in `reader_scheme_pause`.
const DEBUG_NOTICE_EVERY: u32 = 10;

/// Something the gate can read the depth of, without locking (spec.md §5:
/// "Backpressure counters read without locks ... accepting stale-by-one-poll
/// semantics").
pub trait QueueDepth: Send + Sync {
    fn depth(&self) -> u64;
}

/// A `QueueDepth` backed by a plain atomic counter, for tests and for
/// collaborators that only need a simple shared counter.
#[derive(Debug, Default)]
pub struct AtomicDepth(AtomicU64);

impl AtomicDepth {
    pub fn new(initial: u64) -> Self {
        AtomicDepth(AtomicU64::new(initial))
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        if delta >= 0 {
            self.0.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.0.fetch_sub((-delta) as u64, Ordering::Relaxed);
        }
    }
}

impl QueueDepth for AtomicDepth {
    fn depth(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Blocks ingest while any of three downstream queues exceeds its
/// watermark. Polled once per batch, from the worker thread only.
pub struct BackpressureGate {
    disk_writer: Arc<dyn QueueDepth>,
    index_sink: Arc<dyn QueueDepth>,
    in_flight_packets: Arc<dyn QueueDepth>,
    /// `max_in_queue - dispatch_after`, precomputed (spec.md §4.G table).
    in_flight_mark: u64,
    debug: bool,
}

impl BackpressureGate {
    pub fn new(
        disk_writer: Arc<dyn QueueDepth>,
        index_sink: Arc<dyn QueueDepth>,
        in_flight_packets: Arc<dyn QueueDepth>,
        max_in_queue: u32,
        dispatch_after: u32,
        debug: bool,
    ) -> Self {
        let in_flight_mark = (max_in_queue as i64 - dispatch_after as i64).max(0) as u64;
        BackpressureGate {
            disk_writer,
            index_sink,
            in_flight_packets,
            in_flight_mark,
            debug,
        }
    }

    /// Poll until all three queues are under their marks, or `shutdown` is
    /// raised. Sleeps in short bursts rather than busy-spinning (spec.md
    /// §4.G: "Poll interval is small").
    pub fn wait(&self, shutdown: &AtomicBool) {
        let mut msgcnt: u32 = 0;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let disk = self.disk_writer.depth();
            if disk > DISK_WRITER_MARK {
                self.notice(&mut msgcnt, "disk-writer", disk, DISK_WRITER_MARK);
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            let index = self.index_sink.depth();
            if index > INDEX_SINK_MARK {
                self.notice(&mut msgcnt, "index-sink", index, INDEX_SINK_MARK);
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            let in_flight = self.in_flight_packets.depth();
            if in_flight > self.in_flight_mark {
                self.notice(&mut msgcnt, "in-flight packets", in_flight, self.in_flight_mark);
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            return;
        }
    }

    fn notice(&self, msgcnt: &mut u32, queue: &str, depth: u64, mark: u64) {
        if self.debug {
            if *msgcnt % DEBUG_NOTICE_EVERY == 0 {
                debug!("waiting to process more packets, {queue} q: {depth} (mark {mark})");
            }
            *msgcnt = msgcnt.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn passes_through_immediately_when_all_queues_are_shallow() {
        let gate = BackpressureGate::new(
            Arc::new(AtomicDepth::new(0)),
            Arc::new(AtomicDepth::new(0)),
            Arc::new(AtomicDepth::new(0)),
            2500,
            100,
            false,
        );
        let shutdown = AtomicBool::new(false);
        gate.wait(&shutdown); // must return promptly
    }

    #[test]
    fn shutdown_flag_breaks_out_even_under_backpressure() {
        let gate = BackpressureGate::new(
            Arc::new(AtomicDepth::new(1000)),
            Arc::new(AtomicDepth::new(0)),
            Arc::new(AtomicDepth::new(0)),
            2500,
            100,
            false,
        );
        let shutdown = AtomicBool::new(true);
        gate.wait(&shutdown); // must not hang
    }

    #[test]
    fn in_flight_mark_is_max_minus_dispatch_after() {
        let gate = BackpressureGate::new(
            Arc::new(AtomicDepth::new(0)),
            Arc::new(AtomicDepth::new(0)),
            Arc::new(AtomicDepth::new(0)),
            2500,
            2500,
            false,
        );
        assert_eq!(gate.in_flight_mark, 0);
    }
}
