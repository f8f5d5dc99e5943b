//! The ingest-core error taxonomy (spec.md §7).
//!
//! A single closed enum, with a hand-written `Display`/`Error` impl in the
//! style used for library errors elsewhere in this crate's lineage
//! (`ll/request.rs::RequestError`) rather than a `thiserror` derive —
//! nothing here needs more than what a short manual impl already gives,
//! and this dependency stack has no other use for `thiserror`.

use std::fmt;

use crate::actions::OpParseError;
use crate::uri::SchemeTooLong;

/// Errors raised while ingesting capture sources.
#[derive(Debug)]
pub enum IngestError {
    /// No loader registered for a URI's scheme prefix.
    UnknownScheme { uri: String },
    /// A URI's scheme prefix exceeded the 29-byte limit.
    SchemeTooLong(SchemeTooLong),
    /// The file header magic was not one of the four recognised values.
    UnknownFormat { uri: String, magic: u32 },
    /// `captured_len != original_len` under the strict (non-truncated)
    /// policy.
    TruncatedRecord {
        uri: String,
        captured_len: u32,
        original_len: u32,
    },
    /// A scheme loader returned a non-zero / `Err` result.
    LoaderFailure { uri: String, detail: String },
    /// The configured link-layer filter could not be compiled for a file's
    /// declared link-layer type.
    BpfCompileFailure { dlt: u32, detail: String },
    /// A `--op` argument (or the set of them) failed to parse.
    OpParseFailure(OpParseError),
    /// Underlying I/O failure from a scheme transport.
    Io(std::io::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::UnknownScheme { uri } => write!(f, "unknown scheme for {uri}"),
            IngestError::SchemeTooLong(e) => write!(f, "{e}"),
            IngestError::UnknownFormat { uri, magic } => {
                write!(f, "unknown magic {magic:#x} in {uri}")
            }
            IngestError::TruncatedRecord {
                uri,
                captured_len,
                original_len,
            } => write!(
                f,
                "truncated packet in {uri}: caplen {captured_len} != origlen {original_len}"
            ),
            IngestError::LoaderFailure { uri, detail } => {
                write!(f, "loader failed for {uri}: {detail}")
            }
            IngestError::BpfCompileFailure { dlt, detail } => {
                write!(f, "couldn't compile bpf filter for dlt {dlt}: {detail}")
            }
            IngestError::OpParseFailure(e) => write!(f, "{e}"),
            IngestError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::SchemeTooLong(e) => Some(e),
            IngestError::OpParseFailure(e) => Some(e),
            IngestError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemeTooLong> for IngestError {
    fn from(e: SchemeTooLong) -> Self {
        IngestError::SchemeTooLong(e)
    }
}

impl From<OpParseError> for IngestError {
    fn from(e: OpParseError) -> Self {
        IngestError::OpParseFailure(e)
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e)
    }
}

/// Whether an error that occurred while parsing a file should abandon that
/// file and continue, or propagate as fatal — decided by the `tolerate_errors`
/// / `allow_truncated_packets` policy flags (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    AbandonFile,
    Fatal,
}

impl IngestError {
    /// Classify this error per spec.md §7's taxonomy: `UnknownFormat` is
    /// fatal unless `tolerate_errors` is set, in which case the file is
    /// abandoned and ingest continues with the next source. `TruncatedRecord`
    /// and `BpfCompileFailure` are unconditionally fatal, with no
    /// tolerate-errors carve-out — `TruncatedRecord` is only ever constructed
    /// once [`crate::stream::StreamPolicy::allow_truncated_packets`] has
    /// already ruled out tolerating it, and `BpfCompileFailure` is a
    /// configuration-time error, not one `tolerate_errors` is meant to paper
    /// over. Every other variant abandons just the one file regardless of
    /// policy.
    ///
    /// The redesign flag in spec.md §9 replaces the original's process-exit
    /// macro with this classification: a fatal disposition tells the worker
    /// to stop draining further sources, rather than the crate calling
    /// `std::process::exit` itself.
    pub fn disposition(&self, tolerate_errors: bool) -> ErrorDisposition {
        match self {
            IngestError::UnknownFormat { .. } if !tolerate_errors => ErrorDisposition::Fatal,
            IngestError::TruncatedRecord { .. } => ErrorDisposition::Fatal,
            IngestError::BpfCompileFailure { .. } => ErrorDisposition::Fatal,
            _ => ErrorDisposition::AbandonFile,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_format_is_fatal_unless_tolerated() {
        let e = IngestError::UnknownFormat {
            uri: "a.pcap".to_string(),
            magic: 0xDEAD_BEEF,
        };
        assert_eq!(e.disposition(false), ErrorDisposition::Fatal);
        assert_eq!(e.disposition(true), ErrorDisposition::AbandonFile);
    }

    #[test]
    fn other_errors_always_abandon_just_the_file() {
        let e = IngestError::LoaderFailure {
            uri: "a.pcap".to_string(),
            detail: "boom".to_string(),
        };
        assert_eq!(e.disposition(false), ErrorDisposition::AbandonFile);
        assert_eq!(e.disposition(true), ErrorDisposition::AbandonFile);
    }

    #[test]
    fn truncated_record_is_unconditionally_fatal() {
        let e = IngestError::TruncatedRecord {
            uri: "a.pcap".to_string(),
            captured_len: 4,
            original_len: 8,
        };
        assert_eq!(e.disposition(false), ErrorDisposition::Fatal);
        assert_eq!(e.disposition(true), ErrorDisposition::Fatal);
    }

    #[test]
    fn bpf_compile_failure_is_unconditionally_fatal() {
        let e = IngestError::BpfCompileFailure {
            dlt: 1,
            detail: "bad filter".to_string(),
        };
        assert_eq!(e.disposition(false), ErrorDisposition::Fatal);
        assert_eq!(e.disposition(true), ErrorDisposition::Fatal);
    }
}
