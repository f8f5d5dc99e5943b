//! On-disk pcap / pcap-nanosecond wire format.
//!
//! The file header and per-record header are fixed-size, packed structs
//! read directly out of the byte stream with `zerocopy`, the same way
//! `ll/fuse_abi.rs` defines the kernel ABI structs it parses out of raw
//! FUSE request buffers (see `ll/argument.rs`'s `ArgumentIterator`).

use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Size, in bytes, of the file header (spec.md §6).
pub const FILE_HEADER_LEN: usize = 24;
/// Size, in bytes, of a single record header (spec.md §6).
pub const RECORD_HEADER_LEN: usize = 16;
/// A captured-length value above this is rejected (spec.md §3).
pub const MAX_CAPTURED_LEN: u32 = 0xFFFF;

/// Classic pcap magic: no byte swap, microsecond timestamps.
pub const MAGIC_MICRO: u32 = 0xA1B2_C3D4;
/// Byte-swapped classic pcap magic: swap, microsecond timestamps.
pub const MAGIC_MICRO_SWAPPED: u32 = 0xD4C3_B2A1;
/// pcap-ns magic: no byte swap, nanosecond timestamps.
pub const MAGIC_NANO: u32 = 0xA1B2_3C4D;
/// Byte-swapped pcap-ns magic: swap, nanosecond timestamps.
pub const MAGIC_NANO_SWAPPED: u32 = 0x4D3C_B2A1;

/// The raw 24-byte file header, laid out exactly as it appears on disk.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct RawFileHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: u32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub dlt: u32,
}

/// The raw 16-byte per-record header, laid out exactly as it appears on disk.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct RawRecordHeader {
    pub ts_sec: u32,
    pub ts_frac: u32,
    pub caplen: u32,
    pub origlen: u32,
}

/// What the magic number tells us about the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicInfo {
    pub needs_byte_swap: bool,
    pub nanosecond_ts: bool,
}

impl MagicInfo {
    /// Classify a magic number, per the table in spec.md §4.E.
    pub fn classify(magic: u32) -> Option<MagicInfo> {
        match magic {
            MAGIC_MICRO => Some(MagicInfo {
                needs_byte_swap: false,
                nanosecond_ts: false,
            }),
            MAGIC_MICRO_SWAPPED => Some(MagicInfo {
                needs_byte_swap: true,
                nanosecond_ts: false,
            }),
            MAGIC_NANO => Some(MagicInfo {
                needs_byte_swap: false,
                nanosecond_ts: true,
            }),
            MAGIC_NANO_SWAPPED => Some(MagicInfo {
                needs_byte_swap: true,
                nanosecond_ts: true,
            }),
            _ => None,
        }
    }
}

#[inline]
pub fn maybe_swap32(value: u32, needs_byte_swap: bool) -> u32 {
    if needs_byte_swap {
        value.swap_bytes()
    } else {
        value
    }
}
