//! Read-only-after-startup configuration (spec.md §6 "Configuration knobs").
//!
//! Plain data, constructed by the embedding application. Loading it from a
//! file or environment is explicitly out of scope (spec.md §1) — this struct
//! is the destination of that loading, not the loader.

use std::sync::Arc;

use crate::filter::FilterCompiler;
use crate::flags::SchemeFlags;

/// Default `scheme_ethertype` for the built-in link-layer shim (spec.md §6).
pub const DEFAULT_SCHEME_ETHERTYPE: u16 = 0xFF12;

/// A `--op field=value` given on the control channel or in static config.
pub type OpString = String;

/// Everything the ingest core needs at startup, beyond the `IngestContext`
/// collaborators it's paired with in `context.rs`.
pub struct IngestConfig {
    /// Individual files (or URIs) to ingest at startup, in order.
    pub initial_files: Vec<String>,
    /// Files listing one URI per line (`-` meaning stdin), consumed in order.
    pub file_list_files: Vec<String>,
    /// Directories to ingest at startup, in order.
    pub initial_directories: Vec<String>,
    /// Flags applied to every initial source unless overridden per-request.
    pub default_flags: SchemeFlags,
    /// Compiles the operator-supplied filter expression against a file's
    /// declared link-layer type. `None` means no filter is configured.
    pub filter_compiler: Option<Arc<dyn FilterCompiler>>,
    /// Upper bound on in-flight packets the backpressure gate enforces.
    pub max_in_queue: u32,
    /// How many in-flight packets may accumulate before the gate engages;
    /// must not exceed `max_in_queue + 1000` (spec.md §9, preserved verbatim).
    pub dispatch_after: u32,
    /// Quiesce all outstanding work between consecutive files.
    pub flush_between_files: bool,
    /// Abandon an unparseable file and continue, instead of treating
    /// `UnknownFormat` as fatal.
    pub tolerate_errors: bool,
    /// Accept `captured_len != original_len` records instead of treating
    /// them as a fatal `TruncatedRecord`.
    pub allow_truncated_packets: bool,
    /// Parse but never hand packets to the batcher.
    pub dry_run: bool,
    /// Read files without deleting them even if `DELETE_AFTER` is set.
    pub copy_only: bool,
    /// Ethertype the default link-layer shim strips a prefix for.
    pub scheme_ethertype: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            initial_files: Vec::new(),
            file_list_files: Vec::new(),
            initial_directories: Vec::new(),
            default_flags: SchemeFlags::empty(),
            filter_compiler: None,
            max_in_queue: 2500,
            dispatch_after: 2500,
            flush_between_files: false,
            tolerate_errors: false,
            allow_truncated_packets: false,
            dry_run: false,
            copy_only: false,
            scheme_ethertype: DEFAULT_SCHEME_ETHERTYPE,
        }
    }
}

/// An `IngestConfig` failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `dispatch_after` exceeded `max_in_queue + 1000` (spec.md §9: the
    /// headroom is load-bearing for the backpressure formula and must be
    /// preserved verbatim, not tightened).
    DispatchAfterTooLarge { dispatch_after: u32, max_in_queue: u32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DispatchAfterTooLarge {
                dispatch_after,
                max_in_queue,
            } => write!(
                f,
                "dispatch_after ({dispatch_after}) exceeds max_in_queue + 1000 ({})",
                *max_in_queue as u64 + 1000
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl IngestConfig {
    /// Checks the one cross-field bound spec.md §9 calls out as load-bearing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_after as u64 > self.max_in_queue as u64 + 1000 {
            return Err(ConfigError::DispatchAfterTooLarge {
                dispatch_after: self.dispatch_after,
                max_in_queue: self.max_in_queue,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(IngestConfig::default().validate().is_ok());
    }

    #[test]
    fn dispatch_after_within_headroom_is_accepted() {
        let mut cfg = IngestConfig {
            max_in_queue: 100,
            dispatch_after: 1100,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.dispatch_after = 1101;
        assert!(cfg.validate().is_err());
    }
}
