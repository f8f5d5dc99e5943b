//! The resumable pcap/pcap-ns stream parser (component F, spec.md §4.F) —
//! the central state machine this crate exists to implement.
//!
//! One [`StreamParser`] is created per file load and fed successive byte
//! chunks of arbitrary length and alignment; it must continue correctly
//! across chunk boundaries that split a header or a packet body, without
//! allocating in the hot path beyond the one reused accumulator buffer.
//!
//! Tagged variants rather than a mode integer plus flags (spec.md §9): each
//! `StreamState` carries exactly the payload its transition needs, so an
//! invalid combination (a "remaining body" count while awaiting a header,
//! say) is not representable.

use zerocopy::FromBytes;

use crate::actions::ActionSet;
use crate::batch::{Batcher, Packet};
use crate::error::IngestError;
use crate::filter::PacketFilter;
use crate::header::HeaderParser;
use crate::pcap_format::{maybe_swap32, RawRecordHeader, FILE_HEADER_LEN, MAX_CAPTURED_LEN, RECORD_HEADER_LEN};
use crate::slots::{FileSlotTable, Timestamp};
use crate::uri::OwnedUri;

/// A record header, decoded and byte-swapped, carried until its body
/// arrives.
#[derive(Debug, Clone, Copy)]
struct PendingRecord {
    ts: Timestamp,
    original_len: u32,
    packet_len: u32,
}

#[derive(Debug)]
enum StreamState {
    AwaitingFileHeader,
    AwaitingRecordHeader,
    AwaitingPacketBody(PendingRecord),
    SkippingOversizedBody { remaining: u32 },
}

/// The knobs `feed` needs from `IngestConfig` (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct StreamPolicy {
    pub allow_truncated_packets: bool,
    /// Ethertype the link-layer shim strips an 18-byte prefix for
    /// (spec.md §6, default [`crate::config::DEFAULT_SCHEME_ETHERTYPE`]).
    pub scheme_ethertype: u16,
    /// Parse every record and update slot statistics, but never hand the
    /// packet to the [`Batcher`] (spec.md §6 `dry_run`).
    pub dry_run: bool,
    /// Read files without deleting them even if `DELETE_AFTER` is set
    /// (spec.md §6 `copy_only`). Consulted by scheme loaders, not by the
    /// stream parser itself; it rides on `StreamPolicy` because that's the
    /// one per-file knob bundle every loader already threads through.
    pub copy_only: bool,
}

/// Consumes arbitrary byte chunks for a single file, emitting complete
/// packet records into a [`Batcher`] as they're decoded.
pub struct StreamParser {
    state: StreamState,
    /// Reused across calls; cleared, never reallocated, once a header or
    /// body completes (spec.md §4.F: "no per-chunk allocation ... in the hot
    /// path").
    accumulator: Vec<u8>,
    byte_offset: u64,
    needs_byte_swap: bool,
    nanosecond_ts: bool,
    header_accepted: bool,
    slot_id: u8,
    uri: OwnedUri,
    extra_info: Option<String>,
    scheme_name: &'static str,
    actions: ActionSet,
    filter: Option<Box<dyn PacketFilter>>,
    total_packets: u64,
    oversized_packets: u64,
    corrupt_packets: u64,
    filter_dropped: u64,
}

impl StreamParser {
    pub fn new(
        uri: OwnedUri,
        extra_info: Option<String>,
        scheme_name: &'static str,
        actions: ActionSet,
    ) -> Self {
        StreamParser {
            state: StreamState::AwaitingFileHeader,
            accumulator: Vec::with_capacity(FILE_HEADER_LEN.max(RECORD_HEADER_LEN)),
            byte_offset: 0,
            needs_byte_swap: false,
            nanosecond_ts: false,
            header_accepted: false,
            slot_id: 0,
            uri,
            extra_info,
            scheme_name,
            actions,
            filter: None,
            total_packets: 0,
            oversized_packets: 0,
            corrupt_packets: 0,
            filter_dropped: 0,
        }
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn total_packets(&self) -> u64 {
        self.total_packets
    }

    pub fn oversized_packets(&self) -> u64 {
        self.oversized_packets
    }

    /// Packets whose ethertype matched `scheme_ethertype` but were too short
    /// for the shim's 18-byte prefix (spec.md §6: "reported as corrupt").
    pub fn corrupt_packets(&self) -> u64 {
        self.corrupt_packets
    }

    /// Packets a configured slot filter (spec.md §4.H) matched and dropped
    /// before they reached the batcher.
    pub fn filter_dropped(&self) -> u64 {
        self.filter_dropped
    }

    pub fn slot_id(&self) -> u8 {
        self.slot_id
    }

    /// Consume `chunk`, driving as many state transitions as the available
    /// bytes allow. Safe to call again with the next chunk once this
    /// returns `Ok`; the accumulator carries any partial header or body
    /// forward.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        header_parser: &mut HeaderParser<'_>,
        slots: &mut FileSlotTable,
        batcher: &mut dyn Batcher,
        policy: StreamPolicy,
    ) -> Result<(), IngestError> {
        let mut cursor = 0usize;
        let mut submitted_any = false;

        loop {
            let current = std::mem::replace(&mut self.state, StreamState::AwaitingRecordHeader);
            match current {
                StreamState::AwaitingFileHeader => {
                    // spec.md §9: bytes consumed toward the still-unaccepted
                    // file header are credited to the slot that will become
                    // active once `begin_file` runs, not to whatever slot is
                    // "active" right now — preserved verbatim from the
                    // original's `lastBytes`-before-`slot_id`-advance HACK.
                    let before = self.accumulator.len();
                    let complete = self.fill_accumulator(chunk, &mut cursor, FILE_HEADER_LEN);
                    let consumed = self.accumulator.len().saturating_sub(before) as u64;
                    if consumed > 0 {
                        let next = slots.next_slot_id();
                        slots.slot_mut(next).last_bytes += consumed;
                    }
                    if !complete {
                        self.state = StreamState::AwaitingFileHeader;
                        break;
                    }
                    let raw = std::mem::take(&mut self.accumulator);
                    let outcome = header_parser.on_header(
                        self.uri.as_uri(),
                        self.extra_info.clone(),
                        self.scheme_name,
                        self.actions.acquire(),
                        &raw,
                        slots,
                        batcher,
                    );
                    self.accumulator = raw;
                    self.accumulator.clear();
                    let outcome = outcome.map_err(|(_, e)| e)?;
                    self.needs_byte_swap = outcome.info.needs_byte_swap;
                    self.nanosecond_ts = outcome.info.nanosecond_ts;
                    self.slot_id = outcome.slot_id;
                    self.filter = outcome.filter;
                    self.header_accepted = true;
                    self.byte_offset = FILE_HEADER_LEN as u64;
                    self.state = StreamState::AwaitingRecordHeader;
                }
                StreamState::AwaitingRecordHeader => {
                    if !self.fill_accumulator(chunk, &mut cursor, RECORD_HEADER_LEN) {
                        self.state = StreamState::AwaitingRecordHeader;
                        break;
                    }
                    let header =
                        RawRecordHeader::ref_from_bytes(&self.accumulator).expect("record-sized slice");
                    let ts_sec = maybe_swap32(header.ts_sec, self.needs_byte_swap);
                    let ts_frac = maybe_swap32(header.ts_frac, self.needs_byte_swap);
                    let captured_len = maybe_swap32(header.caplen, self.needs_byte_swap);
                    let original_len = maybe_swap32(header.origlen, self.needs_byte_swap);
                    self.accumulator.clear();
                    self.byte_offset += RECORD_HEADER_LEN as u64 + captured_len as u64;
                    let ts = Timestamp {
                        sec: ts_sec,
                        usec: if self.nanosecond_ts { ts_frac / 1000 } else { ts_frac },
                    };
                    if captured_len > MAX_CAPTURED_LEN {
                        self.oversized_packets += 1;
                        self.state = StreamState::SkippingOversizedBody {
                            remaining: captured_len,
                        };
                    } else if captured_len != original_len && !policy.allow_truncated_packets {
                        return Err(IngestError::TruncatedRecord {
                            uri: self.uri.to_string(),
                            captured_len,
                            original_len,
                        });
                    } else {
                        self.state = StreamState::AwaitingPacketBody(PendingRecord {
                            ts,
                            original_len,
                            packet_len: captured_len,
                        });
                    }
                }
                StreamState::AwaitingPacketBody(record) => {
                    let need = record.packet_len as usize;
                    if self.accumulator.is_empty() && chunk.len() - cursor >= need {
                        let body = &chunk[cursor..cursor + need];
                        let submitted = self.emit_packet(&record, body, slots, batcher, policy)?;
                        cursor += need;
                        submitted_any |= submitted;
                        self.state = StreamState::AwaitingRecordHeader;
                        continue;
                    }
                    if !self.fill_accumulator(chunk, &mut cursor, need) {
                        self.state = StreamState::AwaitingPacketBody(record);
                        break;
                    }
                    let body = std::mem::take(&mut self.accumulator);
                    let submitted = self.emit_packet(&record, &body, slots, batcher, policy)?;
                    self.accumulator = body;
                    self.accumulator.clear();
                    submitted_any |= submitted;
                    self.state = StreamState::AwaitingRecordHeader;
                }
                StreamState::SkippingOversizedBody { remaining } => {
                    let avail = chunk.len() - cursor;
                    let consume = avail.min(remaining as usize);
                    cursor += consume;
                    let left = remaining - consume as u32;
                    if left == 0 {
                        self.state = StreamState::AwaitingRecordHeader;
                    } else {
                        self.state = StreamState::SkippingOversizedBody { remaining: left };
                        break;
                    }
                }
            }
        }

        if submitted_any {
            slots.slot_mut(self.slot_id).did_batch = true;
            batcher.flush();
        }
        Ok(())
    }

    /// The loader has reported end-of-stream for this file: emit the
    /// explicit end-of-file marker if any packet was ever batched for it
    /// (spec.md §4.F edge case).
    pub fn finish(&self, slots: &FileSlotTable, batcher: &mut dyn Batcher) {
        if self.header_accepted && slots.slot(self.slot_id).did_batch {
            batcher.end_of_file(self.slot_id);
        }
    }

    /// Drive this parser to completion by reading from `reader` in fixed-size
    /// chunks until EOF, then emit the end-of-file marker. The chunk size is
    /// an implementation choice, not a protocol requirement — `feed` is
    /// correct for any chunking (spec.md §8, invariant 1).
    pub fn consume_reader(
        &mut self,
        reader: &mut dyn std::io::Read,
        header_parser: &mut HeaderParser<'_>,
        slots: &mut FileSlotTable,
        batcher: &mut dyn Batcher,
        policy: StreamPolicy,
    ) -> Result<(), IngestError> {
        const CHUNK_SIZE: usize = 64 * 1024;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            self.feed(&buf[..n], header_parser, slots, batcher, policy)?;
        }
        self.finish(slots, batcher);
        Ok(())
    }

    /// Append up to `total - accumulator.len()` bytes of `chunk[*cursor..]`
    /// into the accumulator, advancing `*cursor`. Returns whether the
    /// accumulator now holds exactly `total` bytes.
    fn fill_accumulator(&mut self, chunk: &[u8], cursor: &mut usize, total: usize) -> bool {
        let need = total - self.accumulator.len();
        let avail = chunk.len() - *cursor;
        let take = need.min(avail);
        self.accumulator.extend_from_slice(&chunk[*cursor..*cursor + take]);
        *cursor += take;
        self.accumulator.len() == total
    }

    /// Apply the configured filter, update slot statistics, and hand the
    /// packet to the batcher. Returns whether it was actually submitted
    /// (`false` if the filter dropped it).
    fn emit_packet(
        &mut self,
        record: &PendingRecord,
        body: &[u8],
        slots: &mut FileSlotTable,
        batcher: &mut dyn Batcher,
        policy: StreamPolicy,
    ) -> Result<bool, IngestError> {
        // spec.md §4.F: "increment total_packets, slot.last_packets, record
        // slot.last_packet_ts; if a slot filter ... matches, drop; else
        // submit" — stats are unconditional, ahead of the link-layer shim and
        // the filter decision, exactly as reader-scheme.c:536-539 does before
        // its own bpf_filter(...) check.
        self.total_packets += 1;
        let slot = slots.slot_mut(self.slot_id);
        slot.last_packets += 1;
        slot.last_bytes += record.original_len as u64;
        slot.last_packet_ts = record.ts;

        let body = match crate::linklayer::strip_scheme_prefix(body, policy.scheme_ethertype) {
            Some(b) => b,
            None => {
                self.corrupt_packets += 1;
                log::warn!(
                    "corrupt packet in {}: shorter than the link-layer shim's prefix",
                    self.uri
                );
                return Ok(false);
            }
        };
        if let Some(filter) = &self.filter {
            if filter.reject(body) {
                self.filter_dropped += 1;
                return Ok(false);
            }
        }
        if policy.dry_run {
            return Ok(false);
        }
        batcher
            .submit(Packet {
                ts_sec: record.ts.sec,
                ts_frac: record.ts.usec,
                original_len: record.original_len,
                slot_id: self.slot_id,
                data: body,
            })
            .map_err(|_| IngestError::LoaderFailure {
                uri: self.uri.to_string(),
                detail: "batcher rejected packet".to_string(),
            })?;
        Ok(true)
    }
}
