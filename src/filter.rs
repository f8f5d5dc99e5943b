//! Link-layer packet filtering (component H, spec.md §4.H).
//!
//! The original ties this to libpcap's BPF compiler; nothing in this crate's
//! dependency stack replaces that, so the compiler is left as a trait an
//! embedder supplies. [`NoopFilterCompiler`] is the default when no filter
//! expression is configured: every packet passes.

use crate::error::IngestError;

/// A compiled filter for one link-layer type, able to decide per packet
/// whether it should be dropped before reaching the batcher.
pub trait PacketFilter: Send + Sync {
    /// Returns `true` if `packet` should be dropped.
    fn reject(&self, packet: &[u8]) -> bool;
}

/// Compiles the operator-supplied filter expression against a file's
/// declared link-layer type. Invoked once per file by the header parser
/// (spec.md §4.E), since `dlt` can change between files.
pub trait FilterCompiler: Send + Sync {
    fn compile(&self, dlt: u32) -> Result<Box<dyn PacketFilter>, IngestError>;
}

/// A filter that rejects nothing. Used when no filter expression is
/// configured at all.
pub struct AcceptAll;

impl PacketFilter for AcceptAll {
    fn reject(&self, _packet: &[u8]) -> bool {
        false
    }
}

/// The default [`FilterCompiler`]: every `dlt` compiles to [`AcceptAll`].
#[derive(Default)]
pub struct NoopFilterCompiler;

impl FilterCompiler for NoopFilterCompiler {
    fn compile(&self, _dlt: u32) -> Result<Box<dyn PacketFilter>, IngestError> {
        Ok(Box::new(AcceptAll))
    }
}
