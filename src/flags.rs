//! Per-request flags.

use bitflags::bitflags;

bitflags! {
    /// Flags composed from configuration defaults and per-request overrides.
    ///
    /// Immutable once a request is enqueued, per the data model invariant in
    /// spec.md §3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SchemeFlags: u8 {
        /// Keep watching the source (directory) for newly-appearing files.
        const MONITOR        = 0b0000_0001;
        /// Recurse into sub-directories.
        const RECURSIVE       = 0b0000_0010;
        /// Skip files already known to have been processed.
        const SKIP_PROCESSED  = 0b0000_0100;
        /// Delete the source file after it has been fully ingested.
        const DELETE_AFTER    = 0b0000_1000;
        /// The URI names a directory, not a single file.
        const DIR_HINT        = 0b0001_0000;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_compose() {
        let f = SchemeFlags::MONITOR | SchemeFlags::RECURSIVE;
        assert!(f.contains(SchemeFlags::MONITOR));
        assert!(f.contains(SchemeFlags::RECURSIVE));
        assert!(!f.contains(SchemeFlags::DELETE_AFTER));
    }

    #[test]
    fn override_clears_a_single_bit() {
        let mut f = SchemeFlags::MONITOR | SchemeFlags::RECURSIVE;
        f.remove(SchemeFlags::RECURSIVE);
        assert_eq!(f, SchemeFlags::MONITOR);
    }
}
