//! The downstream hand-off trait: batching decoded packets and configuring
//! the per-file link-layer context (spec.md §4.F/§4.E).
//!
//! Like [`crate::filter`], this is a collaborator seam rather than a
//! concrete sink — the actual packet-processing pipeline beyond "I have a
//! well-formed record" sits outside this crate's scope (spec.md Non-goals).
//!
//! Link-layer configuration and packet submission live on one trait rather
//! than two: both need exclusive access to the same downstream sink, and a
//! stream parser threading them through as two independently-held `&mut`
//! borrows of that one sink would alias. Giving the sink a single entry
//! point avoids the conflict rather than working around it.

use crate::error::IngestError;

/// One fully parsed packet, handed to a [`Batcher`] by the stream parser.
pub struct Packet<'a> {
    pub ts_sec: u32,
    pub ts_frac: u32,
    pub original_len: u32,
    pub slot_id: u8,
    pub data: &'a [u8],
}

/// Receives per-file link-layer configuration, decoded packets, and
/// end-of-file notifications.
///
/// Mirrors the handoff `reader_scheme_process_packet` makes into the session
/// layer once a record is fully parsed.
pub trait Batcher: Send {
    /// A new file declared this link-layer type and snap length; reconfigure
    /// any per-dlt decoders before the first packet of that file arrives
    /// (spec.md §4.E).
    fn configure(&mut self, dlt: u32, snaplen: u32) -> Result<(), IngestError>;

    /// Hand off one packet. `Err` is treated as a [`IngestError::LoaderFailure`]
    /// by the caller.
    fn submit(&mut self, packet: Packet<'_>) -> Result<(), IngestError>;

    /// Force any buffered work out, independent of file boundaries.
    fn flush(&mut self);

    /// The active file has been fully consumed (spec.md §4.F: `did_batch`
    /// flag, flush-between-files quiesce).
    fn end_of_file(&mut self, slot_id: u8);
}

/// A [`Batcher`] that drops everything. Useful for tests, or as a stand-in
/// when no real downstream pipeline is wired up yet; `dry_run` (spec.md §6)
/// is enforced upstream in [`crate::stream::StreamParser`] itself and works
/// with any `Batcher`, not just this one.
#[derive(Default)]
pub struct NullBatcher {
    pub submitted: usize,
    pub flushes: usize,
    pub configured_dlt: Option<u32>,
    pub end_of_file_calls: usize,
}

impl Batcher for NullBatcher {
    fn configure(&mut self, dlt: u32, _snaplen: u32) -> Result<(), IngestError> {
        self.configured_dlt = Some(dlt);
        Ok(())
    }

    fn submit(&mut self, _packet: Packet<'_>) -> Result<(), IngestError> {
        self.submitted += 1;
        Ok(())
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn end_of_file(&mut self, _slot_id: u8) {
        self.end_of_file_calls += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_batcher_counts_submissions_and_flushes() {
        let mut b = NullBatcher::default();
        b.configure(1, 262144).unwrap();
        b.submit(Packet {
            ts_sec: 0,
            ts_frac: 0,
            original_len: 4,
            slot_id: 0,
            data: &[1, 2, 3, 4],
        })
        .unwrap();
        b.flush();
        b.end_of_file(0);
        assert_eq!(b.submitted, 1);
        assert_eq!(b.flushes, 1);
        assert_eq!(b.configured_dlt, Some(1));
        assert_eq!(b.end_of_file_calls, 1);
    }
}
