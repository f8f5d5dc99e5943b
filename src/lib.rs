//! `ingest-core`: the offline packet-ingest core of a network-capture
//! analysis system.
//!
//! This crate accepts capture sources identified by [`Uri`]s, streams raw
//! bytes from pluggable [`Scheme`] transports, parses the pcap / pcap-ns
//! file format across arbitrary chunk boundaries, reconstructs packet
//! records, and hands them to a downstream [`Batcher`] under backpressure.
//!
//! It does not capture packets live, write capture files, rewrite packets,
//! or decode protocols beyond the link-layer hand-off — those are the
//! embedding application's concern. Build an [`IngestConfig`], a
//! [`FilenameRuleEngine`], a [`Batcher`] implementation, and the queue-depth
//! gauges an [`IngestContext`] needs, then call [`IngestContext::start`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use crate::actions::{ActionSet, FieldOp, OpParseError, MAX_OPS};
pub use crate::backpressure::{AtomicDepth, BackpressureGate, QueueDepth};
pub use crate::batch::{Batcher, NullBatcher, Packet};
pub use crate::command::{parse_add_dir, parse_add_file, AddRequest, CommandError};
pub use crate::config::{ConfigError, IngestConfig, DEFAULT_SCHEME_ETHERTYPE};
pub use crate::context::{ContextError, IngestContext, QueueDepths};
pub use crate::error::{ErrorDisposition, IngestError};
pub use crate::file_scheme::FileScheme;
pub use crate::filename_rules::{FilenameRuleEngine, Rule};
pub use crate::filter::{AcceptAll, FilterCompiler, NoopFilterCompiler, PacketFilter};
pub use crate::flags::SchemeFlags;
pub use crate::header::{HeaderInfo, HeaderOutcome, HeaderParser};
pub use crate::linklayer::strip_scheme_prefix;
pub use crate::pcap_format::{
    MagicInfo, RawFileHeader, RawRecordHeader, FILE_HEADER_LEN, MAGIC_MICRO, MAGIC_MICRO_SWAPPED,
    MAGIC_NANO, MAGIC_NANO_SWAPPED, MAX_CAPTURED_LEN, RECORD_HEADER_LEN,
};
pub use crate::queue::{PendingItem, PendingQueue};
pub use crate::quiesce::QuiesceProbe;
pub use crate::scheme::{LoadContext, LoadRequest, Scheme, SchemeRegistry, DEFAULT_SCHEME_NAME};
pub use crate::slots::{FileSlot, FileSlotTable, Timestamp, SLOT_COUNT};
pub use crate::stream::{StreamParser, StreamPolicy};
pub use crate::uri::{OwnedUri, SchemeTooLong, Uri, MAX_SCHEME_LEN};
pub use crate::worker::{Dispatcher, IngestWorker, Phase, WorkerHandle, INLINE_RECURSION_LIMIT};

mod actions;
mod backpressure;
mod batch;
mod command;
mod config;
mod context;
mod error;
mod file_scheme;
mod filename_rules;
mod filter;
mod flags;
mod header;
mod linklayer;
mod pcap_format;
mod queue;
mod quiesce;
mod scheme;
mod slots;
mod stream;
mod uri;
mod worker;
