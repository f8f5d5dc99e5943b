//! Maps URI scheme prefixes to loaders (component A, spec.md §4.A).

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::actions::ActionSet;
use crate::backpressure::BackpressureGate;
use crate::batch::Batcher;
use crate::error::IngestError;
use crate::filename_rules::FilenameRuleEngine;
use crate::filter::FilterCompiler;
use crate::flags::SchemeFlags;
use crate::slots::FileSlotTable;
use crate::stream::StreamPolicy;
use crate::uri::{OwnedUri, Uri};

/// Name of the scheme selected when a URI carries no `scheme://` prefix
/// (spec.md §3).
pub const DEFAULT_SCHEME_NAME: &str = "file";

/// One ingest request, resolved to a scheme and handed to its [`Scheme::load`].
pub struct LoadRequest {
    pub uri: OwnedUri,
    pub flags: SchemeFlags,
    pub actions: ActionSet,
    pub extra_info: Option<String>,
}

/// Collaborators a scheme's `load` needs: everything [`crate::stream::StreamParser`]
/// needs to drive a file through to completion, plus a way to recursively
/// submit sub-URIs (a directory yielding files, say) back into the worker
/// (spec.md §2, §4.J).
///
/// `slots` and `batcher` ride behind a [`RefCell`] rather than a plain `&mut`:
/// a directory loader calls `submit` for each entry it finds, and an inline
/// recursive submission (spec.md §4.J) re-enters [`Scheme::load`] for that
/// sub-URI *while this `LoadContext` is still on the stack*. A loader that
/// actually touches `slots`/`batcher` — only a leaf, byte-consuming loader
/// does — borrows them transiently around its own feed loop and drops the
/// borrow before returning; a loader that only recurses (a directory walker)
/// never borrows them at all. That non-overlap is what makes the `RefCell`
/// never panic here, in place of the raw back-pointers spec.md §9 calls out
/// to avoid.
pub struct LoadContext<'a> {
    pub slots: &'a RefCell<FileSlotTable>,
    pub rules: &'a FilenameRuleEngine,
    pub filter_compiler: Option<&'a dyn FilterCompiler>,
    pub batcher: &'a RefCell<Box<dyn Batcher>>,
    pub policy: StreamPolicy,
    pub gate: &'a BackpressureGate,
    pub shutdown: &'a AtomicBool,
    /// Recursively enqueue a sub-URI (spec.md §4.J). Depth-bounded inline
    /// execution vs. deferral to the cross-thread pending queue is the
    /// closure's job to decide — callers just call it.
    pub submit: &'a mut dyn FnMut(OwnedUri, SchemeFlags, ActionSet),
}

impl<'a> LoadContext<'a> {
    /// Borrow the slot table for the duration of one feed/header step. Drop
    /// the guard before calling `submit` — see the struct docs.
    pub fn slots_mut(&self) -> RefMut<'_, FileSlotTable> {
        self.slots.borrow_mut()
    }

    pub fn slots(&self) -> Ref<'_, FileSlotTable> {
        self.slots.borrow()
    }

    /// Borrow the batcher for the duration of one feed/header step. Drop the
    /// guard before calling `submit` — see the struct docs.
    pub fn batcher_mut(&self) -> RefMut<'_, Box<dyn Batcher>> {
        self.batcher.borrow_mut()
    }
}

/// A pluggable capture-source transport.
///
/// Registered exactly once per name (spec.md §3); `exit` is reserved for
/// process shutdown and is never called from the hot path.
pub trait Scheme: Send + Sync {
    fn name(&self) -> &'static str;
    fn load(&self, request: LoadRequest, cx: &mut LoadContext<'_>) -> Result<(), IngestError>;
    fn exit(&self) {}
}

/// Read-only-after-init map from scheme name to loader (spec.md §5: "set
/// once at init, then read-only").
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: HashMap<&'static str, Arc<dyn Scheme>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        SchemeRegistry::default()
    }

    /// Register a scheme. Registering the same name twice is a programmer
    /// error (spec.md §4.A): it panics rather than silently overwriting,
    /// since duplicate registration can only happen at startup wiring time.
    pub fn register(&mut self, scheme: Arc<dyn Scheme>) {
        let name = scheme.name();
        if self.schemes.insert(name, scheme).is_some() {
            panic!("scheme '{name}' registered twice");
        }
    }

    /// Resolve `uri` to its scheme: the prefix before `://`, or the implicit
    /// `file` default for a bare path.
    pub fn resolve(&self, uri: &Uri) -> Result<Arc<dyn Scheme>, IngestError> {
        let name = match uri.scheme_prefix()? {
            Some(prefix) => prefix,
            None => DEFAULT_SCHEME_NAME,
        };
        self.schemes
            .get(name)
            .cloned()
            .ok_or_else(|| IngestError::UnknownScheme {
                uri: uri.as_str().to_owned(),
            })
    }
}
