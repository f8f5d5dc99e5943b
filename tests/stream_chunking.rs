//! Chunking-invariance and boundary-scenario tests for the stream parser
//! (spec.md §8: invariant 1, boundary scenarios 1-6).

use ingest_core::{
    ActionSet, Batcher, FilenameRuleEngine, HeaderParser, OwnedUri, Packet, StreamParser,
    StreamPolicy,
};
use ingest_core::{FileSlotTable, IngestError};

fn le_header(magic: u32, snaplen: u32, dlt: u32, swap: bool) -> Vec<u8> {
    let maybe = |v: u32| if swap { v.swap_bytes() } else { v };
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&magic.to_ne_bytes());
    out.extend_from_slice(&2u16.to_ne_bytes());
    out.extend_from_slice(&4u16.to_ne_bytes());
    out.extend_from_slice(&0u32.to_ne_bytes());
    out.extend_from_slice(&0u32.to_ne_bytes());
    out.extend_from_slice(&maybe(snaplen).to_ne_bytes());
    out.extend_from_slice(&maybe(dlt).to_ne_bytes());
    out
}

fn record(ts_sec: u32, ts_frac: u32, body: &[u8], swap: bool) -> Vec<u8> {
    let maybe = |v: u32| if swap { v.swap_bytes() } else { v };
    let mut out = Vec::with_capacity(16 + body.len());
    out.extend_from_slice(&maybe(ts_sec).to_ne_bytes());
    out.extend_from_slice(&maybe(ts_frac).to_ne_bytes());
    out.extend_from_slice(&maybe(body.len() as u32).to_ne_bytes());
    out.extend_from_slice(&maybe(body.len() as u32).to_ne_bytes());
    out.extend_from_slice(body);
    out
}

/// Recording [`Batcher`] that captures `(ts_sec, ts_frac, original_len,
/// body.to_vec())` per submitted packet, for comparing emission sequences
/// across differently-chunked feeds.
#[derive(Default)]
struct RecordingBatcher {
    configured: Vec<(u32, u32)>,
    packets: Vec<(u32, u32, u32, Vec<u8>)>,
    eofs: Vec<u8>,
}

impl Batcher for RecordingBatcher {
    fn configure(&mut self, dlt: u32, snaplen: u32) -> Result<(), IngestError> {
        self.configured.push((dlt, snaplen));
        Ok(())
    }

    fn submit(&mut self, packet: Packet<'_>) -> Result<(), IngestError> {
        self.packets
            .push((packet.ts_sec, packet.ts_frac, packet.original_len, packet.data.to_vec()));
        Ok(())
    }

    fn flush(&mut self) {}

    fn end_of_file(&mut self, slot_id: u8) {
        self.eofs.push(slot_id);
    }
}

fn feed_in_chunks(bytes: &[u8], chunk_sizes: &[usize]) -> RecordingBatcher {
    let mut parser = StreamParser::new(OwnedUri::new("/tmp/t.pcap"), None, "file", ActionSet::empty());
    let mut slots = FileSlotTable::new();
    let mut batcher = RecordingBatcher::default();
    let rules = FilenameRuleEngine::default();
    let policy = StreamPolicy {
        allow_truncated_packets: false,
        scheme_ethertype: ingest_core::DEFAULT_SCHEME_ETHERTYPE,
        dry_run: false,
        copy_only: false,
    };

    let mut offset = 0;
    for &size in chunk_sizes {
        let end = (offset + size).min(bytes.len());
        let mut hp = HeaderParser {
            rules: &rules,
            filter_compiler: None,
        };
        parser
            .feed(&bytes[offset..end], &mut hp, &mut slots, &mut batcher, policy)
            .unwrap();
        offset = end;
        if offset >= bytes.len() {
            break;
        }
    }
    parser.finish(&slots, &mut batcher);
    batcher
}

fn sample_pcap() -> Vec<u8> {
    let mut bytes = le_header(ingest_core::MAGIC_MICRO, 65535, 1, false);
    bytes.extend(record(1, 100, b"first-packet-body", false));
    bytes.extend(record(2, 200, b"second", false));
    bytes.extend(record(3, 300, b"third-one-is-longer", false));
    bytes
}

#[test]
fn chunking_invariant_holds_across_many_split_strategies() {
    let bytes = sample_pcap();
    let whole = feed_in_chunks(&bytes, &[bytes.len()]);

    let split_strategies: &[&[usize]] = &[
        &[1; 200],
        &[7, 13, 1, 50, 3, 1000],
        &[bytes.len() / 2, bytes.len()],
        &[3, 3, 3, 3, 3, 3, 3, 3, 1000],
    ];
    for strategy in split_strategies {
        let chunked = feed_in_chunks(&bytes, strategy);
        assert_eq!(chunked.packets, whole.packets, "strategy {strategy:?} diverged");
        assert_eq!(chunked.configured, whole.configured);
        assert_eq!(chunked.eofs, whole.eofs);
    }
}

#[test]
fn boundary_scenario_1_classic_micro_header() {
    let mut bytes = le_header(ingest_core::MAGIC_MICRO, 65535, 1, false);
    bytes.extend(record(1, 0, &[0u8; 64], false));
    let batcher = feed_in_chunks(&bytes, &[bytes.len()]);
    assert_eq!(batcher.packets.len(), 1);
    assert_eq!(batcher.packets[0].2, 64);
}

#[test]
fn boundary_scenario_2_byte_swapped_magic_matches_scenario_1() {
    let mut bytes = le_header(ingest_core::MAGIC_MICRO_SWAPPED, 65535, 1, true);
    bytes.extend(record(1, 0, &[0u8; 64], true));
    let batcher = feed_in_chunks(&bytes, &[bytes.len()]);
    assert_eq!(batcher.packets.len(), 1);
    assert_eq!(batcher.packets[0].2, 64);
}

#[test]
fn boundary_scenario_3_nanosecond_magic_normalises_to_microseconds() {
    let mut bytes = le_header(ingest_core::MAGIC_NANO, 65535, 1, false);
    bytes.extend(record(1, 500_000_000, b"x", false));
    let batcher = feed_in_chunks(&bytes, &[bytes.len()]);
    assert_eq!(batcher.packets[0].0, 1);
    assert_eq!(batcher.packets[0].1, 500_000);
}

#[test]
fn boundary_scenario_4_unknown_magic_is_fatal_by_default() {
    let bytes = le_header(0xDEAD_BEEF, 0, 0, false);
    let mut parser = StreamParser::new(OwnedUri::new("/tmp/bad.pcap"), None, "file", ActionSet::empty());
    let mut slots = FileSlotTable::new();
    let mut batcher = RecordingBatcher::default();
    let rules = FilenameRuleEngine::default();
    let mut hp = HeaderParser {
        rules: &rules,
        filter_compiler: None,
    };
    let result = parser.feed(
        &bytes,
        &mut hp,
        &mut slots,
        &mut batcher,
        StreamPolicy {
            allow_truncated_packets: false,
            scheme_ethertype: ingest_core::DEFAULT_SCHEME_ETHERTYPE,
            dry_run: false,
            copy_only: false,
        },
    );
    assert!(matches!(result, Err(IngestError::UnknownFormat { .. })));
}

#[test]
fn boundary_scenario_5_header_split_across_three_small_chunks() {
    let mut bytes = le_header(ingest_core::MAGIC_MICRO, 65535, 1, false);
    bytes.extend(record(1, 0, b"x", false));
    let batcher = feed_in_chunks(&bytes, &[10, 7, 7, bytes.len()]);
    assert_eq!(batcher.packets.len(), 1);
    assert_eq!(batcher.configured.len(), 1);
}

#[test]
fn boundary_scenario_6_oversize_caplen_is_skipped_and_parsing_resumes() {
    let mut bytes = le_header(ingest_core::MAGIC_MICRO, 65535, 1, false);
    bytes.extend(record(0, 0, &vec![0u8; 100_000], false));
    bytes.extend(record(1, 0, b"abcd", false));
    let batcher = feed_in_chunks(&bytes, &[bytes.len()]);
    assert_eq!(batcher.packets.len(), 1);
    assert_eq!(batcher.packets[0].3, b"abcd");
}
