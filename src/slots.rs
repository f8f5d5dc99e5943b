//! The fixed 256-entry ring of per-file metadata (component C, spec.md §4.C).

use crate::actions::{ActionSet, FieldOp};
use crate::uri::OwnedUri;

/// Number of slots in the ring. Also the modulus the 8-bit cursor wraps on.
pub const SLOT_COUNT: usize = 256;

/// A capture timestamp, normalised to (seconds, microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    pub sec: u32,
    pub usec: u32,
}

/// Per-file metadata, addressed by an 8-bit `slot_id`.
///
/// Invariant (spec.md §3): a `FileSlot` is valid iff its `slot_id` matches
/// the table's current `active_slot`; a stale `slot_id` captured before a
/// wrap may now name a different file.
#[derive(Debug, Default)]
pub struct FileSlot {
    pub uri: Option<OwnedUri>,
    pub extra_info: Option<String>,
    pub scheme_name: Option<&'static str>,
    pub last_bytes: u64,
    pub last_packets: u64,
    pub last_packet_ts: Timestamp,
    pub did_batch: bool,
    pub field_ops: Vec<FieldOp>,
    pub actions: Option<ActionSet>,
}

impl FileSlot {
    fn clear(&mut self) {
        self.uri = None;
        self.extra_info = None;
        self.scheme_name = None;
        self.last_bytes = 0;
        self.last_packets = 0;
        self.last_packet_ts = Timestamp::default();
        self.did_batch = false;
        self.field_ops.clear();
        // Dropping the `ActionSet` here is the `release` half of the
        // acquire/release pair (§4.C step 2); `Arc`'s `Drop` does the
        // refcount decrement.
        self.actions = None;
    }
}

/// The fixed ring of [`FileSlot`]s, plus the rolling cursor that selects the
/// currently active one.
///
/// Mutated only from the single ingest worker thread (spec.md §5); read by
/// downstream consumers through an opaque `slot_id` that may, after a wrap,
/// refer to a different file than the one that produced it — callers must
/// tolerate that staleness, per spec.md §4.C.
#[derive(Debug)]
pub struct FileSlotTable {
    slots: Box<[FileSlot; SLOT_COUNT]>,
    active_slot: u8,
    /// True once at least one file header has been accepted; distinguishes
    /// "slot 0 is the active slot because we wrapped" from "no file has ever
    /// been accepted yet" for the very first call to `begin_file`.
    started: bool,
}

impl Default for FileSlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSlotTable {
    pub fn new() -> Self {
        FileSlotTable {
            slots: Box::new(std::array::from_fn(|_| FileSlot::default())),
            active_slot: 0,
            started: false,
        }
    }

    /// The slot id currently considered active.
    pub fn active_slot_id(&self) -> u8 {
        self.active_slot
    }

    /// The slot id that will become active the *next* time [`begin_file`] is
    /// called, without advancing the cursor. Used for the `lastBytes`
    /// byte-accounting hack described in spec.md §9 (preserved verbatim: a
    /// byte count attributed to a file is credited to the slot that file
    /// will occupy once its header is accepted, even though that hasn't
    /// happened yet on the very first chunk of the stream).
    ///
    /// [`begin_file`]: FileSlotTable::begin_file
    pub fn next_slot_id(&self) -> u8 {
        if self.started {
            self.active_slot
        } else {
            self.active_slot.wrapping_add(1)
        }
    }

    pub fn slot(&self, id: u8) -> &FileSlot {
        &self.slots[id as usize]
    }

    pub fn slot_mut(&mut self, id: u8) -> &mut FileSlot {
        &mut self.slots[id as usize]
    }

    pub fn active_slot(&self) -> &FileSlot {
        self.slot(self.active_slot)
    }

    pub fn active_slot_mut(&mut self) -> &mut FileSlot {
        self.slot_mut(self.active_slot)
    }

    /// Has at least one header been accepted since this table was created?
    pub fn started(&self) -> bool {
        self.started
    }

    /// Advance the cursor and take ownership of the new active slot,
    /// releasing whatever tenant previously occupied it.
    ///
    /// Mirrors `reader_scheme_header`'s `readerPos++` / wrap-and-clear /
    /// populate sequence (spec.md §4.C steps 1-3).
    #[allow(clippy::too_many_arguments)]
    pub fn begin_file(
        &mut self,
        uri: OwnedUri,
        extra_info: Option<String>,
        scheme_name: &'static str,
        actions: ActionSet,
    ) -> u8 {
        self.active_slot = self.active_slot.wrapping_add(1);
        self.started = true;
        let slot = &mut self.slots[self.active_slot as usize];
        slot.clear();
        slot.uri = Some(uri);
        slot.extra_info = extra_info;
        slot.scheme_name = Some(scheme_name);
        slot.actions = Some(actions.acquire());
        self.active_slot
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn actions() -> ActionSet {
        ActionSet::parse::<&str>(&[]).unwrap()
    }

    #[test]
    fn cursor_advances_by_one_per_file() {
        let mut table = FileSlotTable::new();
        let a = table.begin_file(OwnedUri::new("a"), None, "file", actions());
        let b = table.begin_file(OwnedUri::new("b"), None, "file", actions());
        assert_eq!(b, a.wrapping_add(1));
    }

    #[test]
    fn wraps_after_256_files_and_releases_prior_tenant() {
        let mut table = FileSlotTable::new();
        let first = table.begin_file(OwnedUri::new("first"), None, "file", actions());
        for i in 0..255 {
            table.begin_file(OwnedUri::new(format!("f{i}")), None, "file", actions());
        }
        // 256 begin_file calls total: cursor has wrapped exactly once back to `first`.
        assert_eq!(table.active_slot_id(), first);
        assert_eq!(
            table.active_slot().uri.as_ref().unwrap().as_uri().as_str(),
            "f254"
        );
    }

    #[test]
    fn reuse_releases_the_previous_actions_reference() {
        let mut table = FileSlotTable::new();
        let a = actions();
        assert_eq!(a.strong_count(), 1);
        table.begin_file(OwnedUri::new("a"), None, "file", a.acquire());
        assert_eq!(a.strong_count(), 2);
        // Wrap all the way around so the same slot is reused.
        for i in 0..256 {
            table.begin_file(OwnedUri::new(format!("f{i}")), None, "file", actions());
        }
        assert_eq!(a.strong_count(), 1);
    }

    #[test]
    fn next_slot_id_before_any_file_points_one_past_zero() {
        let table = FileSlotTable::new();
        assert!(!table.started());
        assert_eq!(table.next_slot_id(), 1);
    }
}
