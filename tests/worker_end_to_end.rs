//! End-to-end tests driving [`ingest_core::IngestContext`] against real
//! files on disk, exercising the worker thread, backpressure gate, and file
//! scheme together (spec.md §8).

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ingest_core::{
    AtomicDepth, Batcher, FilenameRuleEngine, IngestConfig, IngestContext, IngestError, Packet,
    QueueDepths, SchemeFlags,
};
use zerocopy::IntoBytes;

fn write_pcap(path: &std::path::Path, packets: &[(u32, &[u8])]) {
    use ingest_core::{RawFileHeader, RawRecordHeader, MAGIC_MICRO};
    let mut out = Vec::new();
    out.extend_from_slice(
        RawFileHeader {
            magic: MAGIC_MICRO,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 65535,
            dlt: 1,
        }
        .as_bytes(),
    );
    for (ts_sec, body) in packets {
        out.extend_from_slice(
            RawRecordHeader {
                ts_sec: *ts_sec,
                ts_frac: 0,
                caplen: body.len() as u32,
                origlen: body.len() as u32,
            }
            .as_bytes(),
        );
        out.extend_from_slice(body);
    }
    std::fs::File::create(path).unwrap().write_all(&out).unwrap();
}

#[derive(Default)]
struct CountingTotals {
    files: AtomicU64,
    packets: AtomicU64,
}

struct CountingBatcher {
    totals: Arc<CountingTotals>,
}

impl Batcher for CountingBatcher {
    fn configure(&mut self, _dlt: u32, _snaplen: u32) -> Result<(), IngestError> {
        Ok(())
    }

    fn submit(&mut self, _packet: Packet<'_>) -> Result<(), IngestError> {
        self.totals.packets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&mut self) {}

    fn end_of_file(&mut self, _slot_id: u8) {
        self.totals.files.fetch_add(1, Ordering::Relaxed);
    }
}

fn zero_depths() -> QueueDepths {
    QueueDepths {
        disk_writer: Arc::new(AtomicDepth::new(0)),
        index_sink: Arc::new(AtomicDepth::new(0)),
        in_flight_packets: Arc::new(AtomicDepth::new(0)),
    }
}

#[test]
fn ingests_a_single_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.pcap");
    write_pcap(&path, &[(1, b"hello"), (2, b"world")]);

    let totals = Arc::new(CountingTotals::default());
    let config = IngestConfig {
        initial_files: vec![path.to_str().unwrap().to_string()],
        ..Default::default()
    };
    let context = IngestContext::start(
        config,
        FilenameRuleEngine::default(),
        Vec::new(),
        Box::new(CountingBatcher {
            totals: totals.clone(),
        }),
        zero_depths(),
        None,
    )
    .unwrap();
    context.join();

    assert_eq!(totals.files.load(Ordering::Relaxed), 1);
    assert_eq!(totals.packets.load(Ordering::Relaxed), 2);
}

#[test]
fn ingests_a_directory_of_files() {
    let dir = tempfile::tempdir().unwrap();
    write_pcap(&dir.path().join("a.pcap"), &[(1, b"x")]);
    write_pcap(&dir.path().join("b.pcap"), &[(1, b"y"), (2, b"z")]);

    let totals = Arc::new(CountingTotals::default());
    let config = IngestConfig {
        initial_directories: vec![dir.path().to_str().unwrap().to_string()],
        default_flags: SchemeFlags::empty(),
        ..Default::default()
    };
    let context = IngestContext::start(
        config,
        FilenameRuleEngine::default(),
        Vec::new(),
        Box::new(CountingBatcher {
            totals: totals.clone(),
        }),
        zero_depths(),
        None,
    )
    .unwrap();
    context.join();

    assert_eq!(totals.files.load(Ordering::Relaxed), 2);
    assert_eq!(totals.packets.load(Ordering::Relaxed), 3);
}

#[test]
fn two_foreign_threads_each_submit_one_uri_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pcap");
    let b = dir.path().join("b.pcap");
    write_pcap(&a, &[(1, b"one")]);
    write_pcap(&b, &[(1, b"two"), (2, b"three")]);

    // MONITOR keeps the worker's drain loop blocked on the pending queue
    // instead of auto-shutting-down once the (empty) initial-source list is
    // exhausted, so both foreign submissions are guaranteed to be picked up
    // rather than racing an early worker exit.
    let totals = Arc::new(CountingTotals::default());
    let config = IngestConfig {
        default_flags: SchemeFlags::MONITOR,
        ..Default::default()
    };
    let context = Arc::new(
        IngestContext::start(
            config,
            FilenameRuleEngine::default(),
            Vec::new(),
            Box::new(CountingBatcher {
                totals: totals.clone(),
            }),
            zero_depths(),
            None,
        )
        .unwrap(),
    );

    let c1 = context.clone();
    let a_uri = a.to_str().unwrap().to_string();
    let t1 = std::thread::spawn(move || {
        c1.submit(
            ingest_core::OwnedUri::new(a_uri),
            SchemeFlags::empty(),
            ingest_core::ActionSet::empty(),
        );
    });
    let c2 = context.clone();
    let b_uri = b.to_str().unwrap().to_string();
    let t2 = std::thread::spawn(move || {
        c2.submit(
            ingest_core::OwnedUri::new(b_uri),
            SchemeFlags::empty(),
            ingest_core::ActionSet::empty(),
        );
    });
    t1.join().unwrap();
    t2.join().unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while totals.files.load(Ordering::Relaxed) < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    // Only safe to shut down once both submissions have actually drained:
    // the worker drops any item it pops after observing the shutdown flag,
    // so shutting down too early could silently discard a pending one.
    assert_eq!(totals.files.load(Ordering::Relaxed), 2);
    assert_eq!(totals.packets.load(Ordering::Relaxed), 3);

    context.shutdown();
    Arc::try_unwrap(context)
        .unwrap_or_else(|_| panic!("context still shared"))
        .join();
}
