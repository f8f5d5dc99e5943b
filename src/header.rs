//! Validates a capture file's 24-byte header and drives the side effects a
//! successful parse triggers (component E, spec.md §4.E).

use zerocopy::FromBytes;

use crate::actions::ActionSet;
use crate::batch::Batcher;
use crate::error::IngestError;
use crate::filename_rules::FilenameRuleEngine;
use crate::filter::{FilterCompiler, PacketFilter};
use crate::pcap_format::{MagicInfo, RawFileHeader, FILE_HEADER_LEN};
use crate::slots::FileSlotTable;
use crate::uri::{OwnedUri, Uri};

/// What a file header tells the rest of the parser about the bytes that
/// follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub needs_byte_swap: bool,
    pub nanosecond_ts: bool,
    pub snaplen: u32,
    pub dlt: u32,
}

/// Parse the raw 24-byte header. `raw` must be exactly [`FILE_HEADER_LEN`]
/// bytes; callers (the stream parser) only invoke this once that many bytes
/// are available.
///
/// Returns the header's magic number on failure so the caller can build an
/// `IngestError::UnknownFormat` with the URI it has in scope.
pub fn parse_raw(raw: &[u8]) -> Result<HeaderInfo, u32> {
    debug_assert_eq!(raw.len(), FILE_HEADER_LEN);
    // Infallible: `raw` is exactly `FILE_HEADER_LEN` bytes and `RawFileHeader`
    // has no alignment requirement above 4, which `FILE_HEADER_LEN`-sized
    // slices from a `Vec<u8>`/array source always satisfy.
    let header = RawFileHeader::ref_from_bytes(raw).expect("header-sized slice");
    let magic = MagicInfo::classify(header.magic).ok_or(header.magic)?;
    let snaplen = crate::pcap_format::maybe_swap32(header.snaplen, magic.needs_byte_swap);
    let dlt = crate::pcap_format::maybe_swap32(header.dlt, magic.needs_byte_swap);
    Ok(HeaderInfo {
        needs_byte_swap: magic.needs_byte_swap,
        nanosecond_ts: magic.nanosecond_ts,
        snaplen,
        dlt,
    })
}

/// Outcome of successfully accepting a file header: the decoded info, the
/// slot the file now occupies, and a freshly compiled filter if one is
/// configured.
pub struct HeaderOutcome {
    pub info: HeaderInfo,
    pub slot_id: u8,
    pub filter: Option<Box<dyn PacketFilter>>,
}

/// Bundles the collaborators a successful header parse must drive: filename
/// rules (§4.D) and BPF recompilation.
///
/// Deliberately does *not* hold the [`FileSlotTable`] or the [`Batcher`] —
/// the stream parser that owns this `HeaderParser` also needs `&mut`
/// access to both for its own per-packet bookkeeping, so they're threaded
/// through as plain arguments to [`HeaderParser::on_header`] instead of
/// being captured for this struct's whole lifetime, which would alias that
/// later borrow.
pub struct HeaderParser<'a> {
    pub rules: &'a FilenameRuleEngine,
    pub filter_compiler: Option<&'a dyn FilterCompiler>,
}

impl<'a> HeaderParser<'a> {
    /// Accept a raw header for `uri`, running every side effect spec.md
    /// §4.E lists: slot registration, link-layer/snaplen configuration, BPF
    /// recompilation, filename rules.
    pub fn on_header(
        &mut self,
        uri: &Uri,
        extra_info: Option<String>,
        scheme_name: &'static str,
        actions: ActionSet,
        raw: &[u8],
        slots: &mut FileSlotTable,
        batcher: &mut dyn Batcher,
    ) -> Result<HeaderOutcome, (u32, IngestError)> {
        let info = parse_raw(raw).map_err(|magic| {
            (
                magic,
                IngestError::UnknownFormat {
                    uri: uri.as_str().to_owned(),
                    magic,
                },
            )
        })?;

        let slot_id = slots.begin_file(OwnedUri::from(uri), extra_info, scheme_name, actions);
        self.rules.apply(uri, slots.slot_mut(slot_id));

        batcher
            .configure(info.dlt, info.snaplen)
            .map_err(|e| (0, e))?;

        let filter = match self.filter_compiler {
            Some(compiler) => Some(compiler.compile(info.dlt).map_err(|e| (0, e))?),
            None => None,
        };

        Ok(HeaderOutcome {
            info,
            slot_id,
            filter,
        })
    }
}
